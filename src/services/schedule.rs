//! Season schedule model as served by the Jolpica (Ergast) API.
//!
//! The feed is permissive: every field may be missing, `season`/`round` show
//! up as strings but are accepted as numbers too, and the race list is not
//! guaranteed to be sorted.

use serde::{Deserialize, Deserializer, Serialize};

/// One race weekend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Race {
    #[serde(default, deserialize_with = "lenient_string")]
    pub season: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub round: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "raceName", default)]
    pub race_name: Option<String>,
    #[serde(rename = "Circuit", default)]
    pub circuit: Option<Circuit>,
    /// ISO `YYYY-MM-DD`; compared lexically.
    #[serde(default)]
    pub date: Option<String>,
    /// UTC wall clock, usually `HH:MM:SSZ`.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(rename = "FirstPractice", default)]
    pub first_practice: Option<SessionTime>,
    #[serde(rename = "SecondPractice", default)]
    pub second_practice: Option<SessionTime>,
    #[serde(rename = "ThirdPractice", default)]
    pub third_practice: Option<SessionTime>,
    #[serde(rename = "Qualifying", default)]
    pub qualifying: Option<SessionTime>,
    #[serde(rename = "Sprint", default)]
    pub sprint: Option<SessionTime>,
    #[serde(rename = "SprintQualifying", default)]
    pub sprint_qualifying: Option<SessionTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    #[serde(rename = "circuitId", default)]
    pub circuit_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "circuitName", default)]
    pub circuit_name: Option<String>,
    #[serde(rename = "Location", default)]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default)]
    pub long: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Date and optional time of a single session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTime {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

impl SessionTime {
    pub fn new(date: Option<&str>, time: Option<&str>) -> Self {
        Self {
            date: date.map(str::to_string),
            time: time.map(str::to_string),
        }
    }
}

/// Sub-events of a race weekend, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    FirstPractice,
    SecondPractice,
    ThirdPractice,
    Qualifying,
    Sprint,
    SprintQualifying,
    Race,
}

impl SessionKind {
    /// Label used by the feed.
    pub fn label(self) -> &'static str {
        match self {
            SessionKind::FirstPractice => "FirstPractice",
            SessionKind::SecondPractice => "SecondPractice",
            SessionKind::ThirdPractice => "ThirdPractice",
            SessionKind::Qualifying => "Qualifying",
            SessionKind::Sprint => "Sprint",
            SessionKind::SprintQualifying => "SprintQualifying",
            SessionKind::Race => "Race",
        }
    }

    /// Key used in the published attribute bundle.
    pub fn attribute_key(self) -> &'static str {
        match self {
            SessionKind::FirstPractice => "first_practice",
            SessionKind::SecondPractice => "second_practice",
            SessionKind::ThirdPractice => "third_practice",
            SessionKind::Qualifying => "qualifying",
            SessionKind::Sprint => "sprint",
            SessionKind::SprintQualifying => "sprint_qualifying",
            SessionKind::Race => "race_time",
        }
    }
}

impl Race {
    /// Sessions the feed listed for this weekend, excluding the race itself.
    pub fn sessions(&self) -> Vec<(SessionKind, &SessionTime)> {
        [
            (SessionKind::FirstPractice, self.first_practice.as_ref()),
            (SessionKind::SecondPractice, self.second_practice.as_ref()),
            (SessionKind::ThirdPractice, self.third_practice.as_ref()),
            (SessionKind::Qualifying, self.qualifying.as_ref()),
            (SessionKind::Sprint, self.sprint.as_ref()),
            (SessionKind::SprintQualifying, self.sprint_qualifying.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, session)| session.map(|s| (kind, s)))
        .collect()
    }

    /// The race's own start as a session.
    pub fn race_session(&self) -> SessionTime {
        SessionTime {
            date: self.date.clone(),
            time: self.time.clone(),
        }
    }

    /// Sort/compare key: the raw date string, `""` when missing.
    pub fn date_key(&self) -> &str {
        self.date.as_deref().unwrap_or("")
    }

    pub fn circuit_name(&self) -> &str {
        self.circuit
            .as_ref()
            .and_then(|c| c.circuit_name.as_deref())
            .unwrap_or("")
    }

    pub fn country(&self) -> &str {
        self.location()
            .and_then(|l| l.country.as_deref())
            .unwrap_or("")
    }

    pub fn locality(&self) -> &str {
        self.location()
            .and_then(|l| l.locality.as_deref())
            .unwrap_or("")
    }

    fn location(&self) -> Option<&Location> {
        self.circuit.as_ref().and_then(|c| c.location.as_ref())
    }
}

/// Pull `MRData.RaceTable.Races` out of a raw feed response.
///
/// Any missing level yields an empty list. Array elements that are not race
/// objects are skipped with a warning.
pub fn races_from_payload(payload: &serde_json::Value) -> Vec<Race> {
    let Some(items) = payload
        .get("MRData")
        .and_then(|m| m.get("RaceTable"))
        .and_then(|t| t.get("Races"))
        .and_then(|r| r.as_array())
    else {
        tracing::debug!("Schedule payload has no MRData.RaceTable.Races, treating as empty");
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(
            |(i, item)| match serde_json::from_value::<Race>(item.clone()) {
                Ok(race) => Some(race),
                Err(e) => {
                    tracing::warn!("Skipping malformed race entry #{}: {}", i, e);
                    None
                }
            },
        )
        .collect()
}

/// Accept a JSON string or number; anything else is treated as missing.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
