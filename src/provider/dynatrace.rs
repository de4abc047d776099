//! # Dynatrace Provider
//!
//! Metric queries against the Dynatrace Metrics API v2. The answer is the mean
//! of every non-null data point across all returned series.
//!
//! References:
//! - [Metrics API v2 query](https://docs.dynatrace.com/docs/dynatrace-api/environment-api/metric-v2/get-data-points)

use super::common::{endpoint, send_json};
use super::{Credentials, ProviderError, QueryProvider};
use async_trait::async_trait;
use serde::Deserialize;

pub const PROVIDER_NAME: &str = "dynatrace";

/// Dynatrace metrics client
#[derive(Debug, Clone)]
pub struct DynatraceProvider {
    http_client: reqwest::Client,
    /// Relative timeframe, e.g. `now-2h`
    window: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynatraceResponse {
    #[serde(default)]
    pub total_count: i64,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub result: Vec<DynatraceResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynatraceResult {
    pub metric_id: String,
    #[serde(default)]
    pub data: Vec<DynatraceData>,
}

#[derive(Debug, Deserialize)]
pub struct DynatraceData {
    #[serde(default)]
    pub timestamps: Vec<i64>,
    #[serde(default)]
    pub values: Vec<Option<f64>>,
}

impl DynatraceProvider {
    #[must_use]
    pub fn new(http_client: reqwest::Client, window: String) -> Self {
        Self {
            http_client,
            window,
        }
    }
}

/// Mean of all non-null values; `0` when there are none
#[must_use]
pub fn mean_value(response: &DynatraceResponse) -> f64 {
    let (sum, count) = response
        .result
        .iter()
        .flat_map(|r| &r.data)
        .flat_map(|d| d.values.iter().flatten())
        .fold((0.0_f64, 0_u32), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

#[async_trait]
impl QueryProvider for DynatraceProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn evaluate_query(
        &self,
        query: &str,
        target_server: &str,
        credentials: Option<&Credentials>,
    ) -> Result<String, ProviderError> {
        let token = credentials
            .map(|c| c.token.trim())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::MissingCredentials(PROVIDER_NAME.to_string()))?;

        let url = endpoint(target_server, "/api/v2/metrics/query");
        let request = self
            .http_client
            .get(&url)
            .query(&[("metricSelector", query), ("from", self.window.as_str())])
            .header("Authorization", format!("Api-Token {token}"));

        let response: DynatraceResponse = send_json(PROVIDER_NAME, &url, request, |_| None).await?;

        Ok(mean_value(&response).to_string())
    }
}
