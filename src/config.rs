use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Read once at startup from the process environment (after `.env` is
// loaded) and passed explicitly to whatever needs it.
//
// ============================================================================

pub const ENV_STORE_BACKEND: &str = "KITCHEN_STORE_BACKEND";
pub const ENV_DATA_PATH: &str = "KITCHEN_DATA_PATH";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_REDPANDA_BROKERS: &str = "REDPANDA_BROKERS";
pub const ENV_NOTIFICATION_TOPIC: &str = "KITCHEN_NOTIFICATION_TOPIC";
pub const ENV_METRICS_PORT: &str = "KITCHEN_METRICS_PORT";
pub const ENV_POLL_INTERVAL_MS: &str = "KITCHEN_POLL_INTERVAL_MS";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} is required when {because}")]
    Missing {
        var: &'static str,
        because: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    File,
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(StoreBackend::File),
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("expected file, memory or postgres, got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub data_path: PathBuf,
    pub database_url: Option<String>,
    /// No brokers means notifications are only logged.
    pub redpanda_brokers: Option<String>,
    pub notification_topic: String,
    pub metrics_port: u16,
    pub poll_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::File,
            data_path: PathBuf::from("data/orders.json"),
            database_url: None,
            redpanda_brokers: None,
            notification_topic: "order-notifications".to_string(),
            metrics_port: 9090,
            poll_interval: Duration::from_secs(3),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset or blank values keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(raw) = get(ENV_STORE_BACKEND) {
            config.store_backend = raw.parse().map_err(|reason| ConfigError::Invalid {
                var: ENV_STORE_BACKEND,
                value: raw.clone(),
                reason,
            })?;
        }
        if let Some(path) = get(ENV_DATA_PATH) {
            config.data_path = PathBuf::from(path);
        }
        config.database_url = get(ENV_DATABASE_URL);
        config.redpanda_brokers = get(ENV_REDPANDA_BROKERS);
        if let Some(topic) = get(ENV_NOTIFICATION_TOPIC) {
            config.notification_topic = topic;
        }
        if let Some(raw) = get(ENV_METRICS_PORT) {
            config.metrics_port = parse_number(ENV_METRICS_PORT, &raw)?;
        }
        if let Some(raw) = get(ENV_POLL_INTERVAL_MS) {
            let millis: u64 = parse_number(ENV_POLL_INTERVAL_MS, &raw)?;
            if millis == 0 {
                return Err(ConfigError::Invalid {
                    var: ENV_POLL_INTERVAL_MS,
                    value: raw,
                    reason: "must be greater than zero".to_string(),
                });
            }
            config.poll_interval = Duration::from_millis(millis);
        }

        if config.store_backend == StoreBackend::Postgres && config.database_url.is_none() {
            return Err(ConfigError::Missing {
                var: ENV_DATABASE_URL,
                because: "the postgres store backend is selected",
            });
        }

        Ok(config)
    }
}

fn parse_number<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_STORE_BACKEND, "Memory"),
            (ENV_DATA_PATH, "/tmp/orders.json"),
            (ENV_REDPANDA_BROKERS, "localhost:9092"),
            (ENV_METRICS_PORT, "9191"),
            (ENV_POLL_INTERVAL_MS, "500"),
        ]))
        .unwrap();

        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.data_path, PathBuf::from("/tmp/orders.json"));
        assert_eq!(config.redpanda_brokers.as_deref(), Some("localhost:9092"));
        assert_eq!(config.metrics_port, 9191);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = AppConfig::from_lookup(lookup(&[(ENV_REDPANDA_BROKERS, "  ")])).unwrap();
        assert_eq!(config.redpanda_brokers, None);
    }

    #[test]
    fn test_invalid_port_is_reported() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_METRICS_PORT, "ninety")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_METRICS_PORT, .. }));
    }

    #[test]
    fn test_unknown_backend_is_reported() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_STORE_BACKEND, "redis")])).unwrap_err();
        assert!(err.to_string().contains("KITCHEN_STORE_BACKEND"));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_POLL_INTERVAL_MS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_POLL_INTERVAL_MS, .. }));
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_STORE_BACKEND, "postgres")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                var: ENV_DATABASE_URL,
                because: "the postgres store backend is selected",
            }
        );

        let config = AppConfig::from_lookup(lookup(&[
            (ENV_STORE_BACKEND, "postgres"),
            (ENV_DATABASE_URL, "postgres://localhost/kitchen"),
        ]))
        .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Postgres);
    }
}
