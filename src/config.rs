//! Runtime configuration
//!
//! Loaded from environment variables with the `POINT_LEDGER_` prefix. Unset variables keep their
//! defaults.

use std::env;

use crate::telemetry::{LogConfig, LogFormat};

pub const ENV_PREFIX: &str = "POINT_LEDGER_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub log: LogConfig,
    /// Maximum number of users whose operations are replayed at the same time
    pub replay_concurrency: usize,
}

fn default_replay_concurrency() -> usize {
    16
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            replay_concurrency: default_replay_concurrency(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl LedgerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any variable source
    ///
    /// `lookup` receives the full variable name, prefix included.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value))
        };
        let mut config = Self::default();

        if let Some((_, filter)) = get("LOG") {
            config.log.filter = filter;
        }
        if let Some((key, value)) = get("LOG_FORMAT") {
            config.log.format = value
                .parse::<LogFormat>()
                .map_err(|reason| ConfigError::InvalidValue {
                    key,
                    value: value.clone(),
                    reason,
                })?;
        }
        if let Some((key, value)) = get("REPLAY_CONCURRENCY") {
            config.replay_concurrency = match value.parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::InvalidValue {
                        key,
                        value,
                        reason: "must be at least 1".to_string(),
                    })
                }
                Ok(n) => n,
                Err(err) => {
                    return Err(ConfigError::InvalidValue {
                        key,
                        value,
                        reason: err.to_string(),
                    })
                }
            };
        }

        Ok(config)
    }
}
