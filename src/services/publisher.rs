//! Home Assistant state publisher.
//!
//! Pushes sensor states through the REST API (`POST /api/states/<entity_id>`),
//! retrying once against a fallback base URL.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

use crate::errors::AppError;
use crate::services::sensors::SensorState;

const PUBLISH_TIMEOUT_SECS: u64 = 10;

/// How a publish attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Primary,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct StatePublisher {
    client: reqwest::Client,
    base_url: String,
    fallback_url: String,
    token: String,
}

impl StatePublisher {
    pub fn new(base_url: &str, fallback_url: &str, token: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PUBLISH_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            fallback_url: fallback_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Publish one sensor, falling back to the alternate base URL once.
    pub async fn publish(
        &self,
        entity_id: &str,
        state: &SensorState,
    ) -> Result<PublishOutcome, AppError> {
        match self.post_state(&self.base_url, entity_id, state).await {
            Ok(()) => {
                tracing::info!("Sensor {} updated", entity_id);
                Ok(PublishOutcome::Primary)
            }
            Err(e) => {
                tracing::warn!("Failed to update sensor {}: {}", entity_id, e);
                self.post_state(&self.fallback_url, entity_id, state)
                    .await
                    .map(|()| {
                        tracing::info!("Sensor {} updated via fallback URL", entity_id);
                        PublishOutcome::Fallback
                    })
                    .map_err(|e2| {
                        tracing::error!("Fallback update of sensor {} failed: {}", entity_id, e2);
                        e2
                    })
            }
        }
    }

    async fn post_state(
        &self,
        base_url: &str,
        entity_id: &str,
        state: &SensorState,
    ) -> Result<(), AppError> {
        let url = format!("{}/api/states/{}", base_url, entity_id);

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))
                .map_err(|e| AppError::InternalError(format!("Invalid token header: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(state)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("POST {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "POST {} returned HTTP {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sensors::unavailable_state;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENTITY: &str = "sensor.f1_next_race";

    #[tokio::test]
    async fn test_publish_primary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/states/sensor.f1_next_race"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({ "state": "Unavailable", "attributes": null })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = StatePublisher::new(&server.uri(), "http://127.0.0.1:9", "secret").unwrap();
        let outcome = tokio_test::assert_ok!(publisher.publish(ENTITY, &unavailable_state()).await);
        assert_eq!(outcome, PublishOutcome::Primary);
    }

    #[tokio::test]
    async fn test_publish_falls_back_once() {
        let primary = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&primary)
            .await;

        let fallback = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/states/sensor.f1_next_race"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&fallback)
            .await;

        let publisher = StatePublisher::new(&primary.uri(), &fallback.uri(), "secret").unwrap();
        let outcome = tokio_test::assert_ok!(publisher.publish(ENTITY, &unavailable_state()).await);
        assert_eq!(outcome, PublishOutcome::Fallback);
    }

    #[tokio::test]
    async fn test_publish_both_fail() {
        let primary = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&primary)
            .await;
        let fallback = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&fallback)
            .await;

        let publisher = StatePublisher::new(&primary.uri(), &fallback.uri(), "secret").unwrap();
        let err = tokio_test::assert_err!(publisher.publish(ENTITY, &unavailable_state()).await);
        assert!(err.to_string().contains("500"));
    }
}
