//! # Prometheus Provider
//!
//! Instant queries against the Prometheus HTTP API.
//!
//! References:
//! - [Prometheus HTTP API](https://prometheus.io/docs/prometheus/latest/querying/api/#instant-queries)

use super::common::{endpoint, send_json};
use super::{Credentials, ProviderError, QueryProvider};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

pub const PROVIDER_NAME: &str = "prometheus";

/// Prometheus instant query client
#[derive(Debug, Clone)]
pub struct PrometheusProvider {
    http_client: reqwest::Client,
}

/// Body of `/api/v1/query`, for both success and error responses
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(default, rename = "errorType")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryData {
    #[serde(rename = "resultType")]
    pub result_type: String,
    #[serde(default)]
    pub result: serde_json::Value,
}

/// One series of a vector result; `value` is `[<unix time>, "<sample>"]`
#[derive(Debug, Deserialize)]
struct VectorSample {
    value: (f64, String),
}

impl PrometheusProvider {
    #[must_use]
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

/// Reduce a query response to its single sample value
///
/// # Errors
///
/// Fails on error responses, non-vector results and on vectors that do not
/// hold exactly one series.
pub fn single_value(response: QueryResponse) -> Result<String, ProviderError> {
    if response.status != "success" {
        return Err(ProviderError::Query(server_message(&response)));
    }

    if let Some(warning) = response.warnings.first() {
        info!("Prometheus API returned warnings: {}", warning);
    }

    let data = response
        .data
        .ok_or_else(|| ProviderError::Query("response carries no data".to_string()))?;

    if data.result_type != "vector" {
        return Err(ProviderError::UnexpectedResultType(data.result_type));
    }

    let mut samples: Vec<VectorSample> =
        serde_json::from_value(data.result).map_err(|e| ProviderError::Decode {
            provider: PROVIDER_NAME,
            message: e.to_string(),
        })?;

    match samples.len() {
        0 => Err(ProviderError::NoValues),
        1 => Ok(samples.remove(0).value.1),
        _ => Err(ProviderError::TooManyValues),
    }
}

fn server_message(response: &QueryResponse) -> String {
    match (&response.error_type, &response.error) {
        (Some(kind), Some(message)) => format!("{kind}: {message}"),
        (None, Some(message)) => message.clone(),
        _ => format!("query returned status {}", response.status),
    }
}

#[async_trait]
impl QueryProvider for PrometheusProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn evaluate_query(
        &self,
        query: &str,
        target_server: &str,
        credentials: Option<&Credentials>,
    ) -> Result<String, ProviderError> {
        let url = endpoint(target_server, "/api/v1/query");
        let mut request = self.http_client.get(&url).query(&[("query", query)]);
        if let Some(credentials) = credentials {
            request = request.bearer_auth(&credentials.token);
        }

        // Bad queries come back as HTTP 400 with a regular error body
        let response: QueryResponse = send_json(PROVIDER_NAME, &url, request, |body| {
            serde_json::from_str::<QueryResponse>(body)
                .ok()
                .map(|r| ProviderError::Query(server_message(&r)))
        })
        .await?;

        single_value(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vector(result: serde_json::Value) -> QueryResponse {
        serde_json::from_value(json!({
            "status": "success",
            "data": { "resultType": "vector", "result": result }
        }))
        .unwrap()
    }

    #[test]
    fn test_single_series_returns_sample_value() {
        let response = vector(json!([
            { "metric": { "job": "api" }, "value": [1_700_000_000.123, "42"] }
        ]));
        assert_eq!(single_value(response).unwrap(), "42");
    }

    #[test]
    fn test_empty_vector_has_no_values() {
        let err = single_value(vector(json!([]))).unwrap_err();
        assert!(matches!(err, ProviderError::NoValues));
        assert_eq!(err.to_string(), "no values");
    }

    #[test]
    fn test_two_series_are_too_many_values() {
        let response = vector(json!([
            { "metric": { "pod": "a" }, "value": [1.0, "1"] },
            { "metric": { "pod": "b" }, "value": [1.0, "2"] }
        ]));
        let err = single_value(response).unwrap_err();
        assert!(matches!(err, ProviderError::TooManyValues));
        assert_eq!(err.to_string(), "too many values");
    }

    #[test]
    fn test_matrix_result_cannot_be_cast() {
        let response: QueryResponse = serde_json::from_value(json!({
            "status": "success",
            "data": { "resultType": "matrix", "result": [] }
        }))
        .unwrap();
        let err = single_value(response).unwrap_err();
        assert_eq!(err.to_string(), "could not cast result");
    }

    #[test]
    fn test_error_status_surfaces_server_message() {
        let response: QueryResponse = serde_json::from_value(json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "parse error at char 4"
        }))
        .unwrap();
        let err = single_value(response).unwrap_err();
        assert_eq!(err.to_string(), "bad_data: parse error at char 4");
    }
}
