//! Poller status HTTP endpoint.
//!
//! GET /api/v1/poller/status — returns the current state of the background
//! schedule poller as JSON.

use axum::extract::State;
use axum::Json;

use crate::services::poller::{PollerStatus, SharedScheduleState};

/// Get the current poller status.
///
/// Returns global info (next_wakeup_at, last_poll_completed_at, last_fetch_ok),
/// the last publish result per sensor and any races skipped for bad dates.
#[utoipa::path(
    get,
    path = "/api/v1/poller/status",
    tag = "Poller",
    responses(
        (status = 200, description = "Current poller status", body = PollerStatus),
    )
)]
pub async fn get_poller_status(State(state): State<SharedScheduleState>) -> Json<PollerStatus> {
    let s = state.read().await;
    Json(s.status.clone())
}
