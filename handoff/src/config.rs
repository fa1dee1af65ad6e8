use serde::Deserialize;
use std::env;
use std::time::Duration;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse a comma-separated list, dropping blank items.
fn parse_env_list(var: &str) -> Vec<String> {
    match env::var(var) {
        Ok(val) => val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn clamp_request_timeout(secs: u64) -> u64 {
    let clamped = secs.clamp(MIN_REQUEST_TIMEOUT_SECS, MAX_REQUEST_TIMEOUT_SECS);
    if clamped != secs {
        tracing::warn!(
            "REQUEST_TIMEOUT_SECS={} is out of range; using {}",
            secs,
            clamped
        );
    }
    clamped
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub lifecycle: LifecycleConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
}

/// Bounds for `REQUEST_TIMEOUT_SECS`; a day is the longest a caller waits.
pub const MIN_REQUEST_TIMEOUT_SECS: u64 = 1;
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 86_400;

/// Timing rules of the help-request state machine.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Seconds a request may stay pending before it times out.
    pub request_timeout_secs: u64,
    /// How often the timeout sweeper looks for overdue requests.
    pub sweep_interval_secs: u64,
}

impl LifecycleConfig {
    /// The timeout window, clamped to the supported range.
    pub fn request_timeout(&self) -> chrono::Duration {
        let secs = self
            .request_timeout_secs
            .clamp(MIN_REQUEST_TIMEOUT_SECS, MAX_REQUEST_TIMEOUT_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(60))
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            sweep_interval_secs: 5,
        }
    }
}

/// Settings for the supervisor dashboard client.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub backend_url: String,
    pub poll_interval_ms: u64,
    pub submit_timeout_secs: u64,
}

impl DashboardConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs.max(1))
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".to_string(),
            poll_interval_ms: 1000,
            submit_timeout_secs: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let lifecycle_defaults = LifecycleConfig::default();
        let dashboard_defaults = DashboardConfig::default();

        Self {
            server: ServerConfig {
                host: env::var("HANDOFF_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("HANDOFF_PORT", 8000),
                cors_allowed_origins: parse_env_list("CORS_ALLOWED_ORIGINS"),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:handoff.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("DATABASE_LOCAL_PATH").ok(),
            },
            lifecycle: LifecycleConfig {
                request_timeout_secs: clamp_request_timeout(parse_env_or(
                    "REQUEST_TIMEOUT_SECS",
                    lifecycle_defaults.request_timeout_secs,
                )),
                sweep_interval_secs: parse_env_or(
                    "TIMEOUT_SWEEP_INTERVAL_SECS",
                    lifecycle_defaults.sweep_interval_secs,
                ),
            },
            dashboard: DashboardConfig {
                backend_url: env::var("HANDOFF_BACKEND_URL")
                    .unwrap_or(dashboard_defaults.backend_url),
                poll_interval_ms: parse_env_or(
                    "DASHBOARD_POLL_INTERVAL_MS",
                    dashboard_defaults.poll_interval_ms,
                ),
                submit_timeout_secs: parse_env_or(
                    "DASHBOARD_SUBMIT_TIMEOUT_SECS",
                    dashboard_defaults.submit_timeout_secs,
                ),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_lifecycle_defaults() {
        std::env::remove_var("REQUEST_TIMEOUT_SECS");
        std::env::remove_var("TIMEOUT_SWEEP_INTERVAL_SECS");

        let config = Config::default();
        assert_eq!(config.lifecycle.request_timeout_secs, 60);
        assert_eq!(config.lifecycle.sweep_interval_secs, 5);
        assert_eq!(config.lifecycle.request_timeout(), chrono::Duration::seconds(60));
    }

    #[test]
    #[serial]
    fn test_lifecycle_from_env() {
        std::env::set_var("REQUEST_TIMEOUT_SECS", "120");
        std::env::set_var("TIMEOUT_SWEEP_INTERVAL_SECS", "2");

        let config = Config::default();
        assert_eq!(config.lifecycle.request_timeout_secs, 120);
        assert_eq!(config.lifecycle.sweep_interval_secs, 2);

        std::env::remove_var("REQUEST_TIMEOUT_SECS");
        std::env::remove_var("TIMEOUT_SWEEP_INTERVAL_SECS");
    }

    #[test]
    #[serial]
    fn test_invalid_value_falls_back_to_default() {
        std::env::set_var("REQUEST_TIMEOUT_SECS", "soon");
        let config = Config::default();
        assert_eq!(config.lifecycle.request_timeout_secs, 60);
        std::env::remove_var("REQUEST_TIMEOUT_SECS");
    }

    #[test]
    #[serial]
    fn test_out_of_range_timeout_is_clamped() {
        for (raw, expected) in [
            ("0", MIN_REQUEST_TIMEOUT_SECS),
            ("18446744073709551615", MAX_REQUEST_TIMEOUT_SECS),
            ("10000000000000000", MAX_REQUEST_TIMEOUT_SECS),
        ] {
            std::env::set_var("REQUEST_TIMEOUT_SECS", raw);
            let config = Config::default();
            assert_eq!(config.lifecycle.request_timeout_secs, expected);
            assert_eq!(
                config.lifecycle.request_timeout(),
                chrono::Duration::seconds(expected as i64)
            );
        }
        std::env::remove_var("REQUEST_TIMEOUT_SECS");
    }

    #[test]
    fn test_request_timeout_never_wraps() {
        let lifecycle = LifecycleConfig {
            request_timeout_secs: u64::MAX,
            ..LifecycleConfig::default()
        };
        assert_eq!(
            lifecycle.request_timeout(),
            chrono::Duration::seconds(MAX_REQUEST_TIMEOUT_SECS as i64)
        );

        let lifecycle = LifecycleConfig {
            request_timeout_secs: 0,
            ..LifecycleConfig::default()
        };
        assert_eq!(lifecycle.request_timeout(), chrono::Duration::seconds(1));
    }

    #[test]
    #[serial]
    fn test_server_defaults() {
        std::env::remove_var("HANDOFF_PORT");
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert!(config.server.cors_allowed_origins.is_empty());
    }

    #[test]
    #[serial]
    fn test_cors_origins_from_env() {
        std::env::set_var(
            "CORS_ALLOWED_ORIGINS",
            "http://localhost:3000, ,https://desk.example.com",
        );
        let config = Config::default();
        assert_eq!(
            config.server.cors_allowed_origins,
            vec![
                "http://localhost:3000".to_string(),
                "https://desk.example.com".to_string()
            ]
        );
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
    }

    #[test]
    #[serial]
    fn test_dashboard_defaults() {
        std::env::remove_var("HANDOFF_BACKEND_URL");
        std::env::remove_var("DASHBOARD_POLL_INTERVAL_MS");
        let config = Config::default();
        assert_eq!(config.dashboard.backend_url, "http://127.0.0.1:8000");
        assert_eq!(config.dashboard.poll_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_poll_interval_has_a_floor() {
        let dashboard = DashboardConfig {
            poll_interval_ms: 0,
            ..DashboardConfig::default()
        };
        assert_eq!(dashboard.poll_interval(), Duration::from_millis(100));
        assert_eq!(
            DashboardConfig::default().submit_timeout(),
            Duration::from_secs(10)
        );
    }
}
