//! Session time normalization and race status classification.
//!
//! The feed publishes UTC dates (`YYYY-MM-DD`) and optional wall-clock times
//! (`HH:MM:SSZ`). Everything here is pure: callers pass "now" and the display
//! zone explicitly, and parse failures are reported as values, never panics.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use utoipa::ToSchema;

/// A race starting within this many whole days counts as current.
pub const CURRENT_WINDOW_DAYS: i64 = 7;

/// Display format for session times in the configured zone.
const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Display format when no zone is configured.
const DISPLAY_FORMAT_UTC: &str = "%d/%m/%Y %H:%M UTC";

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Why a date/time pair could not be turned into an instant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeParseError {
    #[error("missing date")]
    MissingDate,

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("invalid date/time '{0}'")]
    InvalidDateTime(String),
}

/// Derived state of a race relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RaceStatus {
    Completed,
    Current,
    Upcoming,
    Unknown,
}

impl RaceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RaceStatus::Completed => "completed",
            RaceStatus::Current => "current",
            RaceStatus::Upcoming => "upcoming",
            RaceStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session time in its two published forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedTime {
    /// Zone-aware RFC 3339 timestamp, or a best-effort passthrough.
    pub iso: Option<String>,
    /// `DD/MM/YYYY HH:MM` (suffixed ` UTC` when no zone is configured).
    pub formatted: Option<String>,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Merge a date and an optional time-of-day into a UTC instant.
///
/// Without a time the instant is midnight UTC of the date. A time without an
/// offset is taken as UTC; a trailing `Z` means UTC.
pub fn combine_instant(
    date: Option<&str>,
    time: Option<&str>,
) -> Result<DateTime<Utc>, TimeParseError> {
    let date = non_empty(date).ok_or(TimeParseError::MissingDate)?;

    match non_empty(time) {
        Some(time) => parse_date_time(&format!("{}T{}", date, time)),
        None => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or_else(|| TimeParseError::InvalidDate(date.to_string())),
    }
}

/// Parse a combined `DATE T TIME [offset]` string, assuming UTC when no
/// offset is given.
fn parse_date_time(combined: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let normalized = match combined.strip_suffix('Z') {
        Some(rest) => format!("{}+00:00", rest),
        None => combined.to_string(),
    };

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(TimeParseError::InvalidDateTime(combined.to_string()))
}

/// Convert a session's date/time into the display zone.
///
/// - date + time: zone-aware ISO plus `DD/MM/YYYY HH:MM`
/// - date only: the raw date, no formatted form
/// - nothing usable: both absent
/// - unparsable date/time: the raw combined string, no formatted form
pub fn normalize_session(
    date: Option<&str>,
    time: Option<&str>,
    display_tz: Option<Tz>,
) -> NormalizedTime {
    let date = non_empty(date);
    let time = non_empty(time);

    match (date, time) {
        (Some(date), Some(time)) => {
            let combined = format!("{}T{}", date, time);
            match parse_date_time(&combined) {
                Ok(instant) => render(instant, display_tz),
                Err(e) => {
                    tracing::error!("Failed to parse session time: {}", e);
                    NormalizedTime {
                        iso: Some(combined),
                        formatted: None,
                    }
                }
            }
        }
        (Some(date), None) => NormalizedTime {
            iso: Some(date.to_string()),
            formatted: None,
        },
        _ => NormalizedTime::default(),
    }
}

fn render(instant: DateTime<Utc>, display_tz: Option<Tz>) -> NormalizedTime {
    match display_tz {
        Some(tz) => {
            let local = instant.with_timezone(&tz);
            NormalizedTime {
                iso: Some(local.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
                formatted: Some(local.format(DISPLAY_FORMAT).to_string()),
            }
        }
        None => NormalizedTime {
            iso: Some(instant.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
            formatted: Some(instant.format(DISPLAY_FORMAT_UTC).to_string()),
        },
    }
}

/// Classify a race against `now`.
///
/// Anything already started is completed. Otherwise the whole-day difference
/// (fractions truncated) decides: up to `CURRENT_WINDOW_DAYS` is current, so a
/// race 7 days and 23 hours out is still current.
pub fn classify(date: Option<&str>, time: Option<&str>, now: DateTime<Utc>) -> RaceStatus {
    match combine_instant(date, time) {
        Ok(instant) if instant < now => RaceStatus::Completed,
        Ok(instant) => {
            if (instant - now).num_days() <= CURRENT_WINDOW_DAYS {
                RaceStatus::Current
            } else {
                RaceStatus::Upcoming
            }
        }
        Err(e) => {
            tracing::warn!("Cannot determine race status: {}", e);
            RaceStatus::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use chrono_tz::Europe::Rome;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse::<DateTime<Utc>>().unwrap()
    }

    #[test]
    fn test_combine_instant_with_z() {
        let dt = combine_instant(Some("2024-03-02"), Some("15:00:00Z")).unwrap();
        assert_eq!(dt, utc("2024-03-02T15:00:00Z"));
    }

    #[test]
    fn test_combine_instant_without_offset_is_utc() {
        let dt = combine_instant(Some("2024-03-02"), Some("15:00:00")).unwrap();
        assert_eq!(dt, utc("2024-03-02T15:00:00Z"));
    }

    #[test]
    fn test_combine_instant_explicit_offset() {
        let dt = combine_instant(Some("2024-03-02"), Some("18:00:00+03:00")).unwrap();
        assert_eq!(dt, utc("2024-03-02T15:00:00Z"));
    }

    #[test]
    fn test_combine_instant_minutes_only_and_fraction() {
        assert_eq!(
            combine_instant(Some("2024-03-02"), Some("15:00")).unwrap(),
            utc("2024-03-02T15:00:00Z")
        );
        assert_eq!(
            combine_instant(Some("2024-03-02"), Some("15:00:00.250Z")).unwrap(),
            utc("2024-03-02T15:00:00.250Z")
        );
    }

    #[test]
    fn test_combine_instant_date_only_is_midnight_utc() {
        let dt = combine_instant(Some("2024-03-02"), None).unwrap();
        assert_eq!(dt, utc("2024-03-02T00:00:00Z"));
        // An empty time is the same as no time
        let dt = combine_instant(Some("2024-03-02"), Some("")).unwrap();
        assert_eq!(dt, utc("2024-03-02T00:00:00Z"));
    }

    #[test]
    fn test_combine_instant_errors() {
        assert_eq!(
            combine_instant(None, Some("15:00:00Z")),
            Err(TimeParseError::MissingDate)
        );
        assert_eq!(
            combine_instant(Some("not-a-date"), None),
            Err(TimeParseError::InvalidDate("not-a-date".to_string()))
        );
        assert_eq!(
            combine_instant(Some("2024-03-02"), Some("25:99")),
            Err(TimeParseError::InvalidDateTime("2024-03-02T25:99".to_string()))
        );
    }

    #[test]
    fn test_normalize_rome_before_dst() {
        let n = normalize_session(Some("2024-03-02"), Some("15:00:00Z"), Some(Rome));
        assert_eq!(n.iso.as_deref(), Some("2024-03-02T16:00:00+01:00"));
        assert_eq!(n.formatted.as_deref(), Some("02/03/2024 16:00"));
    }

    #[test]
    fn test_normalize_rome_after_dst() {
        // Japanese GP 2024, after the 31 March spring-forward
        let n = normalize_session(Some("2024-04-07"), Some("05:00:00Z"), Some(Rome));
        assert_eq!(n.iso.as_deref(), Some("2024-04-07T07:00:00+02:00"));
        assert_eq!(n.formatted.as_deref(), Some("07/04/2024 07:00"));
    }

    #[test]
    fn test_normalize_rome_dst_transition_instant() {
        // Clocks jump 02:00 -> 03:00 local at 01:00 UTC
        let before = normalize_session(Some("2024-03-31"), Some("00:59:00Z"), Some(Rome));
        assert_eq!(before.iso.as_deref(), Some("2024-03-31T01:59:00+01:00"));
        let after = normalize_session(Some("2024-03-31"), Some("01:00:00Z"), Some(Rome));
        assert_eq!(after.iso.as_deref(), Some("2024-03-31T03:00:00+02:00"));
        assert_eq!(after.formatted.as_deref(), Some("31/03/2024 03:00"));
    }

    #[test]
    fn test_normalize_without_timezone_stays_utc() {
        let n = normalize_session(Some("2024-03-02"), Some("15:00:00Z"), None);
        assert_eq!(n.iso.as_deref(), Some("2024-03-02T15:00:00+00:00"));
        assert_eq!(n.formatted.as_deref(), Some("02/03/2024 15:00 UTC"));
    }

    #[test]
    fn test_normalize_date_only() {
        let n = normalize_session(Some("2024-03-02"), None, Some(Rome));
        assert_eq!(n.iso.as_deref(), Some("2024-03-02"));
        assert_eq!(n.formatted, None);
    }

    #[test]
    fn test_normalize_nothing() {
        assert_eq!(
            normalize_session(None, None, Some(Rome)),
            NormalizedTime::default()
        );
        // A time with no date is unusable
        assert_eq!(
            normalize_session(None, Some("15:00:00Z"), Some(Rome)),
            NormalizedTime::default()
        );
    }

    #[test]
    fn test_normalize_malformed_passes_through() {
        let n = normalize_session(Some("2024-13-45"), Some("15:00:00Z"), Some(Rome));
        assert_eq!(n.iso.as_deref(), Some("2024-13-45T15:00:00Z"));
        assert_eq!(n.formatted, None);
    }

    #[test]
    fn test_classify_past_is_completed() {
        let now = utc("2024-06-01T12:00:00Z");
        assert_eq!(
            classify(Some("2024-06-01"), Some("11:59:59Z"), now),
            RaceStatus::Completed
        );
        assert_eq!(
            classify(Some("2023-06-01"), Some("12:00:00Z"), now),
            RaceStatus::Completed
        );
    }

    #[test]
    fn test_classify_now_is_current() {
        let now = utc("2024-06-01T12:00:00Z");
        assert_eq!(
            classify(Some("2024-06-01"), Some("12:00:00Z"), now),
            RaceStatus::Current
        );
    }

    #[test]
    fn test_classify_day_truncation_boundary() {
        let now = utc("2024-06-01T12:00:00Z");
        let almost_eight = now + Duration::days(7) + Duration::hours(23);
        assert_eq!(
            classify(
                Some(&almost_eight.format("%Y-%m-%d").to_string()),
                Some(&almost_eight.format("%H:%M:%SZ").to_string()),
                now
            ),
            RaceStatus::Current
        );
        assert_eq!(
            classify(Some("2024-06-09"), Some("12:00:00Z"), now),
            RaceStatus::Upcoming
        );
    }

    #[test]
    fn test_classify_date_only_uses_midnight() {
        let now = utc("2024-06-01T12:00:00Z");
        // Midnight of today is already past
        assert_eq!(classify(Some("2024-06-01"), None, now), RaceStatus::Completed);
        assert_eq!(classify(Some("2024-06-05"), None, now), RaceStatus::Current);
        assert_eq!(classify(Some("2024-07-05"), None, now), RaceStatus::Upcoming);
    }

    #[test]
    fn test_classify_malformed_is_unknown() {
        let now = utc("2024-06-01T12:00:00Z");
        assert_eq!(classify(Some("not-a-date"), None, now), RaceStatus::Unknown);
        assert_eq!(
            classify(Some("not-a-date"), Some("12:00:00Z"), now),
            RaceStatus::Unknown
        );
        assert_eq!(classify(None, None, now), RaceStatus::Unknown);
    }

    #[test]
    fn test_race_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(RaceStatus::Upcoming).unwrap(),
            serde_json::json!("upcoming")
        );
        assert_eq!(RaceStatus::Completed.to_string(), "completed");
    }
}
