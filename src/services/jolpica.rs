//! Jolpica (Ergast-compatible) season schedule client.
//!
//! See: https://github.com/jolpica/jolpica-f1

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::time::Duration;

use crate::errors::AppError;
use crate::services::schedule::{races_from_payload, Race};

/// Per-request timeout for the schedule feed.
const FETCH_TIMEOUT_SECS: u64 = 10;

/// Client for the season schedule endpoint.
#[derive(Debug, Clone)]
pub struct ScheduleClient {
    client: reqwest::Client,
    url: String,
}

impl ScheduleClient {
    pub fn new(url: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Fetch the raw schedule JSON.
    pub async fn fetch_payload(&self) -> Result<serde_json::Value, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let response = self
            .client
            .get(&self.url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!("Schedule request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "Schedule feed returned HTTP {}",
                response.status()
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("Schedule JSON parse error: {}", e))
        })
    }

    /// Fetch and extract the season's races. A payload without races is an
    /// empty season, not an error.
    pub async fn fetch_races(&self) -> Result<Vec<Race>, AppError> {
        let payload = self.fetch_payload().await?;
        Ok(races_from_payload(&payload))
    }
}
