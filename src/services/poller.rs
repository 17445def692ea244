//! Background schedule poller.
//!
//! Architecture:
//! - One cycle = fetch the season, select previous/current/next, publish the
//!   three sensors, record the outcome in shared state
//! - Cycles never overlap; the loop sleeps the configured interval after each
//! - A failed fetch skips publishing and marks the snapshot unavailable
//! - The three publishes run concurrently and fail independently
//! - State is in-memory (`Arc<RwLock<ScheduleState>>`) and read by the HTTP
//!   entity view

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::services::jolpica::ScheduleClient;
use crate::services::publisher::{PublishOutcome, StatePublisher};
use crate::services::schedule::Race;
use crate::services::selector::{select, SelectionResult, SkippedRaceInfo};
use crate::services::sensors::{sensor_state, SensorKind, STATE_NO_DATA};

// ---------------------------------------------------------------------------
// Poller state (in-memory, shared via Arc<RwLock<>>)
// ---------------------------------------------------------------------------

/// The last successfully fetched season.
#[derive(Debug, Clone)]
pub struct ScheduleSnapshot {
    pub races: Vec<Race>,
    pub fetched_at: DateTime<Utc>,
}

/// Last publish attempt for one sensor.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SensorPublishStatus {
    pub entity_id: String,
    pub state: String,
    /// "published", "published_fallback", "no_race", "disabled" or "error: ..."
    pub last_publish_result: String,
}

/// Poller bookkeeping, exposed via the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PollerStatus {
    pub active: bool,
    pub update_interval_secs: u64,
    pub next_wakeup_at: Option<DateTime<Utc>>,
    pub last_poll_completed_at: Option<DateTime<Utc>>,
    pub last_poll_duration_ms: Option<u64>,
    /// `None` until the first cycle finishes.
    pub last_fetch_ok: Option<bool>,
    pub last_error: Option<String>,
    pub race_count: usize,
    pub total_polls: u64,
    pub skipped_races: Vec<SkippedRaceInfo>,
    pub sensors: Vec<SensorPublishStatus>,
}

#[derive(Debug, Clone)]
pub struct ScheduleState {
    /// `None` before the first fetch and after a failed one.
    pub snapshot: Option<ScheduleSnapshot>,
    pub status: PollerStatus,
}

impl ScheduleState {
    pub fn new(update_interval_secs: u64) -> Self {
        Self {
            snapshot: None,
            status: PollerStatus {
                active: true,
                update_interval_secs,
                next_wakeup_at: None,
                last_poll_completed_at: None,
                last_poll_duration_ms: None,
                last_fetch_ok: None,
                last_error: None,
                race_count: 0,
                total_polls: 0,
                skipped_races: Vec::new(),
                sensors: Vec::new(),
            },
        }
    }
}

/// Shared schedule state handle.
pub type SharedScheduleState = Arc<RwLock<ScheduleState>>;

/// Everything a poll cycle needs besides the shared state.
#[derive(Debug, Clone)]
pub struct PollerContext {
    pub client: ScheduleClient,
    /// `None` when no Home Assistant token is configured.
    pub publisher: Option<StatePublisher>,
    pub display_tz: Option<Tz>,
    pub update_interval_secs: u64,
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    FetchFailed,
    Completed { published: usize, failed: usize },
}

// ---------------------------------------------------------------------------
// Main poller loop
// ---------------------------------------------------------------------------

/// Run the background poller. This function never returns (runs until process exit).
///
/// Should be spawned via `tokio::spawn(run_poller(...))`.
pub async fn run_poller(ctx: PollerContext, state: SharedScheduleState) {
    tracing::info!(
        "Background poller started, update interval {} seconds",
        ctx.update_interval_secs
    );

    loop {
        run_cycle(&ctx, &state).await;
        tracing::info!(
            "Poller: next update in {} seconds",
            ctx.update_interval_secs
        );
        sleep_secs(ctx.update_interval_secs).await;
    }
}

/// Fetch, select, publish and record one cycle.
pub async fn run_cycle(ctx: &PollerContext, state: &SharedScheduleState) -> CycleOutcome {
    let poll_start = Utc::now();
    tracing::info!("Poller: fetching Formula 1 schedule");

    let races = match ctx.client.fetch_races().await {
        Ok(races) => races,
        Err(e) => {
            tracing::error!("Poller: failed to fetch schedule: {}", e);
            let mut s = state.write().await;
            s.snapshot = None;
            s.status.last_fetch_ok = Some(false);
            s.status.last_error = Some(e.to_string());
            finalize_status(&mut s.status, ctx.update_interval_secs, poll_start);
            return CycleOutcome::FetchFailed;
        }
    };

    let now = Utc::now();
    let selection = select(&races, now);
    if !selection.skipped.is_empty() {
        tracing::warn!(
            "Poller: {} race(s) with unparseable date/time ignored",
            selection.skipped.len()
        );
    }

    let sensors = publish_selection(ctx, &selection, now).await;
    let failed = sensors
        .iter()
        .filter(|s| s.last_publish_result.starts_with("error"))
        .count();
    let published = sensors
        .iter()
        .filter(|s| s.last_publish_result.starts_with("published"))
        .count();

    {
        let mut s = state.write().await;
        s.status.race_count = races.len();
        s.status.skipped_races = selection.skipped.iter().map(SkippedRaceInfo::from).collect();
        s.status.sensors = sensors;
        s.status.last_fetch_ok = Some(true);
        s.status.last_error = None;
        s.snapshot = Some(ScheduleSnapshot {
            races,
            fetched_at: now,
        });
        finalize_status(&mut s.status, ctx.update_interval_secs, poll_start);
    }

    tracing::info!(
        "Poller: cycle complete, {} sensor(s) published, {} failed",
        published,
        failed
    );

    CycleOutcome::Completed { published, failed }
}

/// Publish the three sensors concurrently. Empty slots are not pushed.
async fn publish_selection(
    ctx: &PollerContext,
    selection: &SelectionResult,
    now: DateTime<Utc>,
) -> Vec<SensorPublishStatus> {
    let publishes = SensorKind::ALL.into_iter().map(|kind| async move {
        let entity_id = kind.entity_id();
        let Some(race) = kind.pick(selection) else {
            tracing::info!("Poller: no {} race found", kind.as_str());
            return SensorPublishStatus {
                entity_id,
                state: STATE_NO_DATA.to_string(),
                last_publish_result: "no_race".to_string(),
            };
        };

        let sensor = sensor_state(kind, Some(race), ctx.display_tz, now);
        let last_publish_result = match &ctx.publisher {
            None => "disabled".to_string(),
            Some(publisher) => match publisher.publish(&entity_id, &sensor).await {
                Ok(PublishOutcome::Primary) => "published".to_string(),
                Ok(PublishOutcome::Fallback) => "published_fallback".to_string(),
                Err(e) => format!("error: {}", e),
            },
        };

        SensorPublishStatus {
            entity_id,
            state: sensor.state,
            last_publish_result,
        }
    });

    futures::future::join_all(publishes).await
}

fn finalize_status(status: &mut PollerStatus, interval_secs: u64, poll_start: DateTime<Utc>) {
    let finished = Utc::now();
    status.last_poll_completed_at = Some(finished);
    status.last_poll_duration_ms = Some((finished - poll_start).num_milliseconds().max(0) as u64);
    status.next_wakeup_at = Some(finished + Duration::seconds(interval_secs as i64));
    status.total_polls += 1;
}

/// Async sleep helper.
async fn sleep_secs(secs: u64) {
    tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
