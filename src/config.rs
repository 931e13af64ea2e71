use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::visibility::VisibilityPolicy;

#[derive(Debug, Clone)]
pub struct RouteProviderConfig {
    pub name: String,
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    /// Ordered failover chain; an empty list means every route degrades to
    /// the straight-line estimate.
    pub route_providers: Vec<RouteProviderConfig>,
    pub route_timeout: Duration,
    pub route_recompute_interval: Duration,
    pub route_retry_limit: u32,
    pub route_retry_base: Duration,
    pub fallback_speed_kmh: f64,
    pub arrival_threshold_km: f64,
    pub manual_otp_threshold_km: f64,
    pub arrival_poll_interval: Duration,
    pub publish_min_interval_ms: u64,
    pub subscribe_min_interval: Duration,
    pub heartbeat_interval: Duration,
    pub visibility_window_mins: i64,
    pub auto_start_window_mins: i64,
    pub schedule_fail_closed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            route_providers: Vec::new(),
            route_timeout: Duration::from_secs(8),
            route_recompute_interval: Duration::from_secs(60),
            route_retry_limit: 3,
            route_retry_base: Duration::from_millis(2000),
            fallback_speed_kmh: 30.0,
            arrival_threshold_km: 0.01,
            manual_otp_threshold_km: 0.05,
            arrival_poll_interval: Duration::from_secs(10),
            publish_min_interval_ms: 2000,
            subscribe_min_interval: Duration::from_millis(3000),
            heartbeat_interval: Duration::from_secs(30),
            visibility_window_mins: 30,
            auto_start_window_mins: 15,
            schedule_fail_closed: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let mut route_providers = Vec::new();
        for (name, url_var, key_var) in [
            ("primary", "ROUTE_PRIMARY_URL", "ROUTE_PRIMARY_API_KEY"),
            ("secondary", "ROUTE_SECONDARY_URL", "ROUTE_SECONDARY_API_KEY"),
        ] {
            if let Ok(url) = env::var(url_var) {
                route_providers.push(RouteProviderConfig {
                    name: name.to_string(),
                    url,
                    api_key: env::var(key_var).unwrap_or_default(),
                });
            }
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            route_providers,
            route_timeout: Duration::from_secs(parse_or_default("ROUTE_TIMEOUT_SECS", 8)?),
            route_recompute_interval: Duration::from_secs(parse_or_default(
                "ROUTE_RECOMPUTE_SECS",
                60,
            )?),
            route_retry_limit: parse_or_default("ROUTE_RETRY_LIMIT", 3)?,
            route_retry_base: Duration::from_millis(parse_or_default("ROUTE_RETRY_BASE_MS", 2000)?),
            fallback_speed_kmh: parse_or_default("FALLBACK_SPEED_KMH", 30.0)?,
            arrival_threshold_km: parse_or_default("ARRIVAL_THRESHOLD_KM", 0.01)?,
            manual_otp_threshold_km: parse_or_default("MANUAL_OTP_THRESHOLD_KM", 0.05)?,
            arrival_poll_interval: Duration::from_secs(parse_or_default("ARRIVAL_POLL_SECS", 10)?),
            publish_min_interval_ms: parse_or_default("PUBLISH_MIN_INTERVAL_MS", 2000)?,
            subscribe_min_interval: Duration::from_millis(parse_or_default(
                "SUBSCRIBE_MIN_INTERVAL_MS",
                3000,
            )?),
            heartbeat_interval: Duration::from_secs(parse_or_default("HEARTBEAT_SECS", 30)?),
            visibility_window_mins: parse_or_default("VISIBILITY_WINDOW_MINS", 30)?,
            auto_start_window_mins: parse_or_default("AUTO_START_WINDOW_MINS", 15)?,
            schedule_fail_closed: parse_or_default("SCHEDULE_FAIL_CLOSED", false)?,
        })
    }

    pub fn visibility_policy(&self) -> VisibilityPolicy {
        VisibilityPolicy {
            window_minutes: self.visibility_window_mins,
            fail_closed: self.schedule_fail_closed,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
