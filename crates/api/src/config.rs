use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on the post-shutdown cleanup phase (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Seconds between display-path polls of a subscribed subject (default: `5`).
    pub poll_interval_secs: u64,
    /// Readings held per subject window (default: `12`).
    pub window_capacity: usize,
    /// Windows untouched for this long are dropped (default: `86400`).
    pub window_idle_secs: u64,
    /// Days a persisted reading is kept (default: `30`).
    pub reading_ttl_days: i64,
    /// Alert notifications are POSTed here when set; otherwise only logged.
    pub notify_webhook_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `POLL_INTERVAL_SECS`    | `5`                     |
    /// | `WINDOW_CAPACITY`       | `12`                    |
    /// | `WINDOW_IDLE_SECS`      | `86400`                 |
    /// | `READING_TTL_DAYS`      | `30`                    |
    /// | `NOTIFY_WEBHOOK_URL`    | unset                   |
    ///
    /// Panics on malformed values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let notify_webhook_url = std::env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let config = Self {
            host,
            port: env_or("PORT", 3000),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            poll_interval_secs: env_or("POLL_INTERVAL_SECS", 5),
            window_capacity: env_or("WINDOW_CAPACITY", herdwatch_core::window::DEFAULT_WINDOW_CAPACITY),
            window_idle_secs: env_or("WINDOW_IDLE_SECS", 86_400),
            reading_ttl_days: env_or("READING_TTL_DAYS", 30),
            notify_webhook_url,
        };

        assert!(config.poll_interval_secs > 0, "POLL_INTERVAL_SECS must be positive");
        assert!(config.window_capacity > 0, "WINDOW_CAPACITY must be positive");
        assert!(config.reading_ttl_days > 0, "READING_TTL_DAYS must be positive");
        config
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn window_idle(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_idle_secs as i64)
    }

    pub fn reading_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.reading_ttl_days)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            poll_interval_secs: 5,
            window_capacity: herdwatch_core::window::DEFAULT_WINDOW_CAPACITY,
            window_idle_secs: 86_400,
            reading_ttl_days: 30,
            notify_webhook_url: None,
        }
    }
}

/// Read `key` and parse it, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
