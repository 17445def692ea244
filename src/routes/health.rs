use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::poller::SharedScheduleState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok", or "degraded" when the last schedule fetch failed)
    pub status: String,
    /// API version
    pub version: String,
    /// Outcome of the last schedule fetch; null before the first poll
    pub last_fetch_ok: Option<bool>,
}

/// Health check endpoint.
///
/// Always returns 200 so load balancers can tell a degraded feed apart from a
/// dead process.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<SharedScheduleState>) -> Json<HealthResponse> {
    let last_fetch_ok = state.read().await.status.last_fetch_ok;

    Json(HealthResponse {
        status: if last_fetch_ok == Some(false) {
            "degraded".to_string()
        } else {
            "ok".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        last_fetch_ok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::poller::ScheduleState;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[tokio::test]
    async fn test_health_before_first_poll() {
        let state = Arc::new(RwLock::new(ScheduleState::new(3600)));
        let Json(resp) = health_check(State(state)).await;
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.last_fetch_ok, None);
        assert!(!resp.version.is_empty());
    }

    #[tokio::test]
    async fn test_health_degraded_after_failed_fetch() {
        let state = Arc::new(RwLock::new(ScheduleState::new(3600)));
        state.write().await.status.last_fetch_ok = Some(false);
        let Json(resp) = health_check(State(state)).await;
        assert_eq!(resp.status, "degraded");
    }
}
