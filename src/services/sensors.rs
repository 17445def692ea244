//! Sensor states for the three selected races.
//!
//! A sensor's state is the race name; its attributes carry the circuit, the
//! normalized session times and the race status, all recomputed from `now`.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::schedule::Race;
use crate::services::selector::SelectionResult;
use crate::services::timing::{classify, normalize_session, RaceStatus};

/// State shown when a selected race has no name.
pub const STATE_UNKNOWN: &str = "Unknown";
/// State shown when no race fills the slot.
pub const STATE_NO_DATA: &str = "No data";
/// State shown before the first successful fetch, or after a failed one.
pub const STATE_UNAVAILABLE: &str = "Unavailable";

/// The three race slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Previous,
    Current,
    Next,
}

impl SensorKind {
    pub const ALL: [SensorKind; 3] = [SensorKind::Previous, SensorKind::Current, SensorKind::Next];

    /// Value of the `race_type` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            SensorKind::Previous => "previous",
            SensorKind::Current => "current",
            SensorKind::Next => "next",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            SensorKind::Previous => "previous_race",
            SensorKind::Current => "current_race",
            SensorKind::Next => "next_race",
        }
    }

    pub fn entity_id(self) -> String {
        format!("sensor.f1_{}", self.key())
    }

    pub fn friendly_name(self) -> &'static str {
        match self {
            SensorKind::Previous => "F1 Previous Race",
            SensorKind::Current => "F1 Current Race",
            SensorKind::Next => "F1 Next Race",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            SensorKind::Previous => "mdi:flag-checkered",
            SensorKind::Current => "mdi:racing-helmet",
            SensorKind::Next => "mdi:flag",
        }
    }

    /// Accepts `previous` as well as `previous_race`.
    pub fn parse(s: &str) -> Option<Self> {
        SensorKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s || k.key() == s)
    }

    pub fn pick(self, selection: &SelectionResult) -> Option<&Race> {
        match self {
            SensorKind::Previous => selection.previous.as_ref(),
            SensorKind::Current => selection.current.as_ref(),
            SensorKind::Next => selection.next.as_ref(),
        }
    }
}

/// Attribute bundle published alongside a race sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceAttributes {
    pub friendly_name: String,
    pub icon: String,
    pub race_name: String,
    pub circuit_name: String,
    pub country: String,
    pub locality: String,
    pub season: String,
    pub round: String,
    pub race_date: String,
    pub race_type: String,
    /// `<session>` and `<session>_formatted` for each session the race lists.
    #[serde(flatten)]
    pub sessions: BTreeMap<String, Option<String>>,
    pub race_time: Option<String>,
    pub race_time_formatted: Option<String>,
    pub status: RaceStatus,
    pub last_updated: String,
}

/// Build the attribute bundle for one race.
pub fn build_attributes(
    race: &Race,
    kind: SensorKind,
    display_tz: Option<Tz>,
    now: DateTime<Utc>,
) -> RaceAttributes {
    let mut sessions = BTreeMap::new();
    for (session_kind, session) in race.sessions() {
        let normalized =
            normalize_session(session.date.as_deref(), session.time.as_deref(), display_tz);
        let key = session_kind.attribute_key();
        sessions.insert(key.to_string(), normalized.iso);
        sessions.insert(format!("{}_formatted", key), normalized.formatted);
    }

    let race_session = race.race_session();
    let race_time = normalize_session(
        race_session.date.as_deref(),
        race_session.time.as_deref(),
        display_tz,
    );

    let last_updated = match display_tz {
        Some(tz) => now
            .with_timezone(&tz)
            .to_rfc3339_opts(SecondsFormat::Secs, false),
        None => now.to_rfc3339_opts(SecondsFormat::Secs, false),
    };

    RaceAttributes {
        friendly_name: kind.friendly_name().to_string(),
        icon: kind.icon().to_string(),
        race_name: race.race_name.clone().unwrap_or_default(),
        circuit_name: race.circuit_name().to_string(),
        country: race.country().to_string(),
        locality: race.locality().to_string(),
        season: race.season.clone().unwrap_or_default(),
        round: race.round.clone().unwrap_or_default(),
        race_date: race.date.clone().unwrap_or_default(),
        race_type: kind.as_str().to_string(),
        sessions,
        race_time: race_time.iso,
        race_time_formatted: race_time.formatted,
        status: classify(race.date.as_deref(), race.time.as_deref(), now),
        last_updated,
    }
}

/// A sensor as pushed to Home Assistant: `{ "state", "attributes" }`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SensorState {
    /// Race name or a placeholder ("Unknown", "No data", "Unavailable")
    pub state: String,
    /// Race attributes; `null` when no race fills the slot
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<RaceAttributes>,
}

/// Sensor state for a slot. `race == None` renders the "No data" placeholder.
pub fn sensor_state(
    kind: SensorKind,
    race: Option<&Race>,
    display_tz: Option<Tz>,
    now: DateTime<Utc>,
) -> SensorState {
    match race {
        Some(race) => SensorState {
            state: race
                .race_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| STATE_UNKNOWN.to_string()),
            attributes: Some(build_attributes(race, kind, display_tz, now)),
        },
        None => SensorState {
            state: STATE_NO_DATA.to_string(),
            attributes: None,
        },
    }
}

/// Placeholder state used while no schedule snapshot is available.
pub fn unavailable_state() -> SensorState {
    SensorState {
        state: STATE_UNAVAILABLE.to_string(),
        attributes: None,
    }
}
