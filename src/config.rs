//! Handler configuration
//!
//! Loaded either from environment variables (the CLI, after `dotenv`) or from a
//! JSON connection-data object handed over by whatever hosts the handler.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.dune.com/api/v1";
pub const DEFAULT_SIM_BASE_URL: &str = "https://api.sim.dune.com/v1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    MissingVariable(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Connection settings for the Dune and Sim APIs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Dune API key, also sent to Sim
    pub api_key: String,

    /// Dune Analytics API base URL
    pub base_url: String,

    /// Sim by Dune API base URL (wallet tables)
    pub sim_base_url: String,

    /// Per-request timeout
    pub timeout_secs: u64,

    /// How many times a 429 carrying Retry-After is retried
    pub rate_limit_retries: u32,

    /// Upper bound on a single Retry-After sleep
    pub max_retry_after_secs: u64,

    /// Delay between result polls while an execution is pending
    pub poll_interval_ms: u64,

    /// Result polls before giving up on a pending execution
    pub max_poll_attempts: u32,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            sim_base_url: DEFAULT_SIM_BASE_URL.to_string(),
            timeout_secs: 30,
            rate_limit_retries: 1,
            max_retry_after_secs: 60,
            poll_interval_ms: 1_000,
            max_poll_attempts: 10,
        }
    }
}

impl HandlerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_sim_base_url(mut self, sim_base_url: impl Into<String>) -> Self {
        self.sim_base_url = sim_base_url.into();
        self
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `DUNE_API_KEY` (required)
    /// - `DUNE_BASE_URL` (default: https://api.dune.com/api/v1)
    /// - `DUNE_SIM_BASE_URL` (default: https://api.sim.dune.com/v1)
    /// - `DUNE_TIMEOUT_SECS` (default: 30)
    /// - `DUNE_RATE_LIMIT_RETRIES` (default: 1)
    /// - `DUNE_MAX_RETRY_AFTER_SECS` (default: 60)
    /// - `DUNE_POLL_INTERVAL_MS` (default: 1000)
    /// - `DUNE_MAX_POLL_ATTEMPTS` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("DUNE_API_KEY")
            .ok_or_else(|| ConfigError::MissingVariable("DUNE_API_KEY".to_string()))?;

        let config = Self {
            api_key,
            base_url: lookup("DUNE_BASE_URL").unwrap_or(defaults.base_url),
            sim_base_url: lookup("DUNE_SIM_BASE_URL").unwrap_or(defaults.sim_base_url),
            timeout_secs: parse_var(&lookup, "DUNE_TIMEOUT_SECS", defaults.timeout_secs)?,
            rate_limit_retries: parse_var(
                &lookup,
                "DUNE_RATE_LIMIT_RETRIES",
                defaults.rate_limit_retries,
            )?,
            max_retry_after_secs: parse_var(
                &lookup,
                "DUNE_MAX_RETRY_AFTER_SECS",
                defaults.max_retry_after_secs,
            )?,
            poll_interval_ms: parse_var(&lookup, "DUNE_POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            max_poll_attempts: parse_var(
                &lookup,
                "DUNE_MAX_POLL_ATTEMPTS",
                defaults.max_poll_attempts,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Build configuration from a connection-data object such as
    /// `{"api_key": "...", "base_url": "..."}`. Unknown keys are ignored.
    pub fn from_connection_data(data: &serde_json::Value) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(data.clone())
            .map_err(|e| ConfigError::InvalidValue(format!("connection data: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingVariable("api_key".to_string()));
        }

        for (name, url) in [("base_url", &self.base_url), ("sim_base_url", &self.sim_base_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must start with http:// or https://, got '{}'",
                    name, url
                )));
            }
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{} is not a valid number: '{}'", key, raw))),
        None => Ok(default),
    }
}

/// Describes one connection argument for host registration
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionArg {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub arg_type: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
}

pub fn connection_args() -> Vec<ConnectionArg> {
    vec![
        ConnectionArg {
            name: "api_key",
            arg_type: "str",
            description: "Dune Analytics API key",
            required: true,
            default: None,
        },
        ConnectionArg {
            name: "base_url",
            arg_type: "str",
            description: "Dune Analytics API base URL",
            required: false,
            default: Some(DEFAULT_BASE_URL),
        },
        ConnectionArg {
            name: "sim_base_url",
            arg_type: "str",
            description: "Sim by Dune API base URL used by the wallet tables",
            required: false,
            default: Some(DEFAULT_SIM_BASE_URL),
        },
        ConnectionArg {
            name: "timeout_secs",
            arg_type: "int",
            description: "Per-request timeout in seconds",
            required: false,
            default: Some("30"),
        },
        ConnectionArg {
            name: "rate_limit_retries",
            arg_type: "int",
            description: "Retries after an HTTP 429 that carries Retry-After",
            required: false,
            default: Some("1"),
        },
        ConnectionArg {
            name: "max_retry_after_secs",
            arg_type: "int",
            description: "Upper bound on a Retry-After wait, in seconds",
            required: false,
            default: Some("60"),
        },
        ConnectionArg {
            name: "poll_interval_ms",
            arg_type: "int",
            description: "Delay between polls of a running execution, in milliseconds",
            required: false,
            default: Some("1000"),
        },
        ConnectionArg {
            name: "max_poll_attempts",
            arg_type: "int",
            description: "Polls of a running execution before giving up",
            required: false,
            default: Some("10"),
        },
    ]
}

/// Example connection data, as shown to users configuring the handler
pub fn connection_args_example() -> serde_json::Value {
    serde_json::json!({
        "api_key": "your_dune_api_key_here",
        "base_url": DEFAULT_BASE_URL,
    })
}
