use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::{AppError, ErrorResponse};
use crate::services::poller::{ScheduleState, SharedScheduleState};
use crate::services::selector::select;
use crate::services::sensors::{sensor_state, unavailable_state, SensorKind, SensorState};

/// Shared state for the sensor routes.
#[derive(Clone)]
pub struct AppState {
    pub schedule: SharedScheduleState,
    pub display_tz: Option<Tz>,
}

/// One race sensor, rendered the way the host platform shows it.
#[derive(Debug, Serialize, ToSchema)]
pub struct SensorView {
    /// Slot key (e.g. "next_race")
    pub key: String,
    /// Entity id (e.g. "sensor.f1_next_race")
    pub entity_id: String,
    /// Display name (e.g. "F1 Next Race")
    pub name: String,
    /// Material Design icon
    pub icon: String,
    /// Race name, or "Unknown" / "No data" / "Unavailable"
    pub state: String,
    /// Attribute bundle, recomputed on every request
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<serde_json::Value>,
}

impl SensorView {
    fn new(kind: SensorKind, sensor: SensorState) -> Self {
        Self {
            key: kind.key().to_string(),
            entity_id: kind.entity_id(),
            name: kind.friendly_name().to_string(),
            icon: kind.icon().to_string(),
            state: sensor.state,
            attributes: sensor
                .attributes
                .and_then(|a| serde_json::to_value(a).ok()),
        }
    }
}

/// Render all three sensors against `now`.
fn render_sensors(
    schedule: &ScheduleState,
    display_tz: Option<Tz>,
    now: DateTime<Utc>,
) -> Vec<SensorView> {
    let selection = schedule
        .snapshot
        .as_ref()
        .map(|snapshot| select(&snapshot.races, now));

    SensorKind::ALL
        .into_iter()
        .map(|kind| {
            let sensor = match &selection {
                Some(selection) => sensor_state(kind, kind.pick(selection), display_tz, now),
                None => unavailable_state(),
            };
            SensorView::new(kind, sensor)
        })
        .collect()
}

/// List the previous, current and next race sensors.
#[utoipa::path(
    get,
    path = "/api/v1/sensors",
    tag = "Sensors",
    responses(
        (status = 200, description = "The three race sensors", body = Vec<SensorView>),
    )
)]
pub async fn list_sensors(State(app): State<AppState>) -> Json<Vec<SensorView>> {
    let schedule = app.schedule.read().await;
    Json(render_sensors(&schedule, app.display_tz, Utc::now()))
}

/// Get a single race sensor.
#[utoipa::path(
    get,
    path = "/api/v1/sensors/{kind}",
    tag = "Sensors",
    params(
        ("kind" = String, Path, description = "previous, current or next (the *_race keys work too)"),
    ),
    responses(
        (status = 200, description = "The requested sensor", body = SensorView),
        (status = 404, description = "Unknown sensor", body = ErrorResponse),
    )
)]
pub async fn get_sensor(
    State(app): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<SensorView>, AppError> {
    let kind = SensorKind::parse(&kind)
        .ok_or_else(|| AppError::NotFound(format!("Sensor '{}' not found", kind)))?;

    let schedule = app.schedule.read().await;
    let view = render_sensors(&schedule, app.display_tz, Utc::now())
        .into_iter()
        .find(|v| v.key == kind.key())
        .ok_or_else(|| AppError::InternalError(format!("Sensor {} not rendered", kind.key())))?;
    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::poller::ScheduleSnapshot;
    use crate::services::schedule::tests::race;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse::<DateTime<Utc>>().unwrap()
    }

    fn state_with_races(races: Option<Vec<crate::services::schedule::Race>>) -> ScheduleState {
        let mut state = ScheduleState::new(3600);
        state.snapshot = races.map(|races| ScheduleSnapshot {
            races,
            fetched_at: utc("2024-03-01T00:00:00Z"),
        });
        state
    }

    #[test]
    fn test_render_unavailable_without_snapshot() {
        let views = render_sensors(&state_with_races(None), None, utc("2024-03-15T00:00:00Z"));
        assert_eq!(views.len(), 3);
        assert!(views.iter().all(|v| v.state == "Unavailable" && v.attributes.is_none()));
    }

    #[test]
    fn test_render_selection() {
        let state = state_with_races(Some(vec![
            race("Bahrain GP", "2024-03-02", Some("15:00:00Z")),
            race("Saudi Arabian GP", "2024-03-09", Some("17:00:00Z")),
        ]));
        let views = render_sensors(&state, None, utc("2024-03-05T00:00:00Z"));

        assert_eq!(views[0].key, "previous_race");
        assert_eq!(views[0].state, "Bahrain GP");
        assert_eq!(views[1].state, "Saudi Arabian GP");
        assert_eq!(views[2].state, "No data");
        let attrs = views[1].attributes.as_ref().unwrap();
        assert_eq!(attrs["status"], "current");
        assert_eq!(attrs["race_time_formatted"], "09/03/2024 17:00 UTC");
    }

    #[test]
    fn test_render_empty_season() {
        let views = render_sensors(&state_with_races(Some(vec![])), None, Utc::now());
        assert!(views.iter().all(|v| v.state == "No data"));
    }

    #[tokio::test]
    async fn test_get_sensor_unknown_kind() {
        let app = AppState {
            schedule: Arc::new(RwLock::new(state_with_races(None))),
            display_tz: None,
        };
        let result = get_sensor(State(app), Path("fastest_lap".to_string())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_sensor_by_short_and_long_key() {
        let app = AppState {
            schedule: Arc::new(RwLock::new(state_with_races(None))),
            display_tz: None,
        };
        let Json(short) = get_sensor(State(app.clone()), Path("next".to_string()))
            .await
            .unwrap();
        let Json(long) = get_sensor(State(app), Path("next_race".to_string()))
            .await
            .unwrap();
        assert_eq!(short.entity_id, "sensor.f1_next_race");
        assert_eq!(long.entity_id, short.entity_id);
        assert_eq!(short.state, "Unavailable");
    }

    #[tokio::test]
    async fn test_list_sensors_handler() {
        let app = AppState {
            schedule: Arc::new(RwLock::new(state_with_races(None))),
            display_tz: Some(chrono_tz::Europe::Rome),
        };
        let Json(views) = list_sensors(State(app)).await;
        let names: Vec<&str> = views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["F1 Previous Race", "F1 Current Race", "F1 Next Race"]);
    }
}
