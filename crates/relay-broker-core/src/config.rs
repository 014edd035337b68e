//! Broker configuration (TOML file + environment overrides).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BrokerError;
use crate::store::ttl_from_seconds;

pub const ENV_TTL_SECONDS: &str = "RELAY_BROKER_TTL_SECONDS";
pub const ENV_MAX_TASKS_PER_RELAY: &str = "RELAY_BROKER_MAX_TASKS_PER_RELAY";
pub const ENV_LOG_LEVEL: &str = "RELAY_BROKER_LOG_LEVEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error(transparent)]
    Invalid(#[from] BrokerError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Seconds after the last state change before a task is dropped.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: i64,

    #[serde(default = "default_max_tasks_per_relay")]
    pub max_tasks_per_relay: usize,

    /// Period of the background reaper; `None` leaves expiration to the lazy
    /// sweep on access.
    #[serde(default)]
    pub reaper_interval_seconds: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String, // "text" | "json"

    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_ttl_seconds() -> i64 { 120 }
fn default_max_tasks_per_relay() -> usize { 10 }
fn default_log_format() -> String { "text".to_string() }
fn default_log_level() -> String { "info".to_string() }

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            max_tasks_per_relay: default_max_tasks_per_relay(),
            reaper_interval_seconds: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

impl BrokerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg = toml::from_str::<BrokerConfig>(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read `path` (defaults when it does not exist), apply environment
    /// overrides, validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut cfg = if path.exists() {
            let s = std::fs::read_to_string(path)?;
            toml::from_str::<BrokerConfig>(&s)?
        } else {
            BrokerConfig::default()
        };

        cfg.apply_overrides(|name| std::env::var(name).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`load`](Self::load)). Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var(ENV_TTL_SECONDS) {
            self.ttl_seconds = v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_TTL_SECONDS,
                value: v.clone(),
            })?;
        }
        if let Some(v) = var(ENV_MAX_TASKS_PER_RELAY) {
            self.max_tasks_per_relay = v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_MAX_TASKS_PER_RELAY,
                value: v.clone(),
            })?;
        }
        if let Some(v) = var(ENV_LOG_LEVEL) {
            self.logging.level = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), BrokerError> {
        ttl_from_seconds(self.ttl_seconds)?;
        if self.max_tasks_per_relay == 0 {
            return Err(BrokerError::InvalidConfiguration(
                "max_tasks_per_relay must be > 0".to_string(),
            ));
        }
        if self.reaper_interval_seconds == Some(0) {
            return Err(BrokerError::InvalidConfiguration(
                "reaper_interval_seconds must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let cfg = BrokerConfig::default();
        assert_eq!(cfg.ttl_seconds, 120);
        assert_eq!(cfg.max_tasks_per_relay, 10);
        assert!(cfg.reaper_interval_seconds.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn parses_full_file() {
        let cfg = BrokerConfig::from_toml_str(
            r#"
            ttl_seconds = 300
            max_tasks_per_relay = 2
            reaper_interval_seconds = 30

            [logging]
            format = "json"
            level = "relay_broker_core=debug"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.ttl_seconds, 300);
        assert_eq!(cfg.max_tasks_per_relay, 2);
        assert_eq!(cfg.reaper_interval_seconds, Some(30));
        assert_eq!(cfg.logging.format, "json");
        assert_eq!(cfg.logging.level, "relay_broker_core=debug");
    }

    #[test]
    fn missing_fields_get_defaults() {
        let cfg = BrokerConfig::from_toml_str("ttl_seconds = 5").unwrap();
        assert_eq!(cfg.max_tasks_per_relay, 10);
        assert_eq!(cfg.logging, LoggingConfig::default());
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        let err = BrokerConfig::from_toml_str("ttl_seconds = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(BrokerError::InvalidConfiguration(_))
        ));

        let err = BrokerConfig::from_toml_str("ttl_seconds = -1").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = BrokerConfig::from_toml_str("max_tasks_per_relay = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = BrokerConfig::from_toml_str("ttl_seconds = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_TTL_SECONDS, "45"),
            (ENV_MAX_TASKS_PER_RELAY, " 3 "),
            (ENV_LOG_LEVEL, ""),
        ]);
        let mut cfg = BrokerConfig::default();
        cfg.apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(cfg.ttl_seconds, 45);
        assert_eq!(cfg.max_tasks_per_relay, 3);
        // empty values are ignored
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn unparsable_override_is_reported() {
        let mut cfg = BrokerConfig::default();
        let err = cfg
            .apply_overrides(|name| (name == ENV_TTL_SECONDS).then(|| "abc".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { name: ENV_TTL_SECONDS, .. }
        ));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let cfg = BrokerConfig::load("/nonexistent/relay-broker.toml");
        // The environment may carry overrides; only the absence of a read error matters.
        assert!(!matches!(cfg, Err(ConfigError::Read(_))));
    }
}
