//! Previous / current / next race selection.
//!
//! The season list arrives unsorted. Races are stable-sorted by their raw
//! `date` string, which orders correctly only because the feed uses zero-padded
//! ISO dates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::schedule::Race;
use crate::services::timing::{combine_instant, TimeParseError};

/// A race left out of the previous/current scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRace {
    /// Position in the date-sorted list.
    pub position: usize,
    pub race_name: Option<String>,
    pub reason: TimeParseError,
}

/// Serializable form of [`SkippedRace`] for the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SkippedRaceInfo {
    pub position: usize,
    pub race_name: Option<String>,
    pub reason: String,
}

impl From<&SkippedRace> for SkippedRaceInfo {
    fn from(s: &SkippedRace) -> Self {
        Self {
            position: s.position,
            race_name: s.race_name.clone(),
            reason: s.reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionResult {
    /// Last race that started strictly before now.
    pub previous: Option<Race>,
    /// First race starting at or after now.
    pub current: Option<Race>,
    /// First race dated strictly after `current`.
    pub next: Option<Race>,
    pub skipped: Vec<SkippedRace>,
}

/// Partition a season into previous, current and next races relative to `now`.
///
/// Races whose date/time cannot be parsed are ignored by the previous and
/// current scans and reported in `skipped`; they stay eligible for `next`,
/// which compares date strings only.
pub fn select(races: &[Race], now: DateTime<Utc>) -> SelectionResult {
    let mut sorted: Vec<&Race> = races.iter().collect();
    sorted.sort_by(|a, b| a.date_key().cmp(b.date_key()));

    let instants: Vec<Result<DateTime<Utc>, TimeParseError>> = sorted
        .iter()
        .map(|r| combine_instant(r.date.as_deref(), r.time.as_deref()))
        .collect();

    let skipped: Vec<SkippedRace> = instants
        .iter()
        .enumerate()
        .filter_map(|(position, instant)| {
            instant.as_ref().err().map(|reason| SkippedRace {
                position,
                race_name: sorted[position].race_name.clone(),
                reason: reason.clone(),
            })
        })
        .collect();

    for s in &skipped {
        tracing::debug!(
            "Skipping race #{} ({}) in selection: {}",
            s.position,
            s.race_name.as_deref().unwrap_or("unnamed"),
            s.reason
        );
    }

    let previous = sorted
        .iter()
        .zip(&instants)
        .rev()
        .find(|(_, instant)| matches!(instant, Ok(t) if *t < now))
        .map(|(race, _)| (*race).clone());

    let current = sorted
        .iter()
        .zip(&instants)
        .find(|(_, instant)| matches!(instant, Ok(t) if *t >= now))
        .map(|(race, _)| *race);

    let next = current.and_then(|current| {
        sorted
            .iter()
            .find(|race| race.date_key() > current.date_key())
            .map(|race| (*race).clone())
    });

    SelectionResult {
        previous,
        current: current.cloned(),
        next,
        skipped,
    }
}
