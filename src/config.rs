use anyhow::Result;
use chrono::Duration;
use std::path::PathBuf;

/// Process-wide configuration, constructed once at startup and passed
/// explicitly to every component.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Global base polling period, in minutes.
    pub pull_interval_minutes: u32,
    /// Driver wake cadence, in seconds. Always <= the pull interval.
    pub sleep_interval_seconds: u64,
    /// Lookback used for the top-level status overview, in hours.
    pub overview_range_hours: u32,
    /// Outbound liveness endpoint. Pings are suppressed when unset.
    pub healthcheck_ping_url: Option<String>,
    pub database_path: PathBuf,
    pub analyses_path: PathBuf,
    /// Debug/dev mode also suppresses liveness pings.
    pub debug_mode: bool,
}

impl CoreConfig {
    pub fn from_env() -> Result<Self> {
        let pull_interval_minutes = env_u32("STATUSWATCH_PULL_INTERVAL_MINUTES", 15).max(1);
        let sleep_interval_seconds = env_u64("STATUSWATCH_SLEEP_INTERVAL_SECONDS", 60)
            .clamp(1, u64::from(pull_interval_minutes) * 60);
        let overview_range_hours = env_u32("STATUSWATCH_OVERVIEW_RANGE_HOURS", 24).max(1);
        let healthcheck_ping_url = env_optional_string("STATUSWATCH_HEALTHCHECK_PING_URL");
        let database_path = PathBuf::from(env_string(
            "STATUSWATCH_DATABASE_PATH",
            "statuswatch.db",
        ));
        let analyses_path = PathBuf::from(env_string(
            "STATUSWATCH_ANALYSES_PATH",
            "analyses.json",
        ));
        let debug_mode = env_bool("STATUSWATCH_DEBUG", false);

        Ok(Self {
            pull_interval_minutes,
            sleep_interval_seconds,
            overview_range_hours,
            healthcheck_ping_url,
            database_path,
            analyses_path,
            debug_mode,
        })
    }

    pub fn pull_interval(&self) -> Duration {
        Duration::minutes(i64::from(self.pull_interval_minutes))
    }

    pub fn overview_range(&self) -> Duration {
        Duration::hours(i64::from(self.overview_range_hours))
    }

    pub fn sleep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sleep_interval_seconds)
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_optional_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key)
        .ok()
        .map(|value| value.trim().to_lowercase())
    {
        Some(value) if value == "1" || value == "true" || value == "yes" => true,
        Some(value) if value == "0" || value == "false" || value == "no" => false,
        _ => default,
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
