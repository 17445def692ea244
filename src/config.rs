use chrono_tz::Tz;

/// Current-season schedule feed.
pub const DEFAULT_SCHEDULE_URL: &str = "https://api.jolpi.ca/ergast/f1/current.json";

/// Supervisor proxy to the Home Assistant core API.
pub const DEFAULT_HA_URL: &str = "http://supervisor/core";

/// Zone used for session display unless `DISPLAY_TIMEZONE` overrides it.
pub const DEFAULT_DISPLAY_TIMEZONE: &str = "Europe/Rome";

/// Poll interval bounds (seconds).
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 3600;
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 300;
pub const MAX_UPDATE_INTERVAL_SECS: u64 = 86_400;

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub schedule_url: String,
    /// Seconds between poll cycles, already clamped.
    pub update_interval_secs: u64,
    pub ha_url: String,
    /// Base URL tried once when a publish against `ha_url` fails.
    pub ha_fallback_url: String,
    /// `None` disables publishing.
    pub ha_token: Option<String>,
    /// Display zone for session times. `None` means times stay in UTC.
    pub display_tz: Option<Tz>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let ha_token = non_empty_var("SUPERVISOR_TOKEN").or_else(|| non_empty_var("HA_TOKEN"));
        let display_tz = resolve_timezone(
            &std::env::var("DISPLAY_TIMEZONE")
                .unwrap_or_else(|_| DEFAULT_DISPLAY_TIMEZONE.to_string()),
        );

        Self {
            schedule_url: std::env::var("F1_API_URL")
                .unwrap_or_else(|_| DEFAULT_SCHEDULE_URL.to_string()),
            update_interval_secs: parse_update_interval(std::env::var("UPDATE_INTERVAL").ok()),
            ha_url: std::env::var("HA_URL").unwrap_or_else(|_| DEFAULT_HA_URL.to_string()),
            ha_fallback_url: std::env::var("HA_FALLBACK_URL")
                .unwrap_or_else(|_| DEFAULT_HA_URL.to_string()),
            ha_token,
            display_tz,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `UPDATE_INTERVAL`, falling back to the default on garbage and
/// clamping into the allowed range.
pub fn parse_update_interval(raw: Option<String>) -> u64 {
    let secs = match raw {
        None => DEFAULT_UPDATE_INTERVAL_SECS,
        Some(s) => s.trim().parse::<u64>().unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid UPDATE_INTERVAL '{}', using default {}s",
                s,
                DEFAULT_UPDATE_INTERVAL_SECS
            );
            DEFAULT_UPDATE_INTERVAL_SECS
        }),
    };
    clamp_update_interval(secs)
}

pub fn clamp_update_interval(secs: u64) -> u64 {
    secs.clamp(MIN_UPDATE_INTERVAL_SECS, MAX_UPDATE_INTERVAL_SECS)
}

/// Resolve an IANA zone name once at startup.
///
/// An empty name or one chrono-tz does not know yields `None`, which the
/// normalizer treats as "render in UTC".
pub fn resolve_timezone(name: &str) -> Option<Tz> {
    let name = name.trim();
    if name.is_empty() {
        tracing::warn!("DISPLAY_TIMEZONE is empty, session times will be shown in UTC");
        return None;
    }
    match name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(e) => {
            tracing::warn!(
                "Unknown timezone '{}' ({}), session times will be shown in UTC",
                name,
                e
            );
            None
        }
    }
}
