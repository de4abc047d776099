//! # Common Provider Utilities
//!
//! HTTP plumbing shared by the metrics providers.

use super::ProviderError;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Join a target server and an API path, tolerating a trailing slash on the server
pub fn endpoint(target_server: &str, path: &str) -> String {
    format!("{}{}", target_server.trim_end_matches('/'), path)
}

/// Send a request and decode a JSON body
///
/// Non-success statuses become [`ProviderError::Http`] unless `on_error_body`
/// can turn the body into a more specific error.
pub async fn send_json<T, F>(
    provider: &'static str,
    url: &str,
    request: reqwest::RequestBuilder,
    on_error_body: F,
) -> Result<T, ProviderError>
where
    T: DeserializeOwned,
    F: FnOnce(&str) -> Option<ProviderError>,
{
    debug!("Running {} query: {}", provider, url);

    let response = request.send().await.map_err(|e| ProviderError::Transport {
        url: url.to_string(),
        source: e,
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| ProviderError::Transport {
        url: url.to_string(),
        source: e,
    })?;

    if !status.is_success() {
        return Err(on_error_body(&body).unwrap_or(ProviderError::Http {
            provider,
            status: status.as_u16(),
            body,
        }));
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::Decode {
        provider,
        message: e.to_string(),
    })
}
