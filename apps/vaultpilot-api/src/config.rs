use std::str::FromStr;
use std::time::Duration;

/// VaultPilot API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP/WebSocket server binds to.
    pub port: u16,
    /// How often the heartbeat monitor runs.
    pub heartbeat_interval: Duration,
    /// Connections idle for longer than this are evicted.
    pub heartbeat_timeout: Duration,
    /// Upper bound on a single heartbeat send.
    pub heartbeat_send_timeout: Duration,
    /// Pause after a failed monitor cycle.
    pub monitor_backoff: Duration,
    /// Allowed CORS origins. `None` allows any origin.
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8001,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(60),
            heartbeat_send_timeout: Duration::from_secs(10),
            monitor_backoff: Duration::from_secs(5),
            cors_allowed_origins: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables. Every variable is
    /// optional; unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: var_or("PORT", defaults.port),
            heartbeat_interval: secs_or("HEARTBEAT_INTERVAL_SECS", defaults.heartbeat_interval),
            heartbeat_timeout: secs_or("HEARTBEAT_TIMEOUT_SECS", defaults.heartbeat_timeout),
            heartbeat_send_timeout: secs_or(
                "HEARTBEAT_SEND_TIMEOUT_SECS",
                defaults.heartbeat_send_timeout,
            ),
            monitor_backoff: secs_or("MONITOR_BACKOFF_SECS", defaults.monitor_backoff),
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .and_then(|v| parse_origins(&v)),
        }
    }
}

fn var_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn secs_or(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn parse_origins(raw: &str) -> Option<Vec<String>> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        None
    } else {
        Some(origins)
    }
}
