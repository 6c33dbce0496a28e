//! Settings - YAML + 環境変数
//!
//! 読み込み順: デフォルト値 → YAML ファイル → `CACHET_*` 環境変数。
//! どの段階でも全フィールドが埋まっている。

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for {var}: {reason}")]
    Env { var: String, reason: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub results: ResultSettings,
    pub retry: RetryPolicy,
    pub workers: WorkerSettings,
    pub sweeper: SweeperSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL given to entries populated on a cache miss.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultSettings {
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for ResultSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub count: usize,

    /// Upper bound on how long an idle worker parks before polling again.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Tries for a state transition the broker rejected as unavailable.
    pub transition_attempts: u32,

    /// First wait between those tries; doubles after each one.
    #[serde(with = "humantime_serde")]
    pub transition_backoff: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            count: 4,
            poll_interval: Duration::from_millis(500),
            transition_attempts: 5,
            transition_backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperSettings {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    #[default]
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}', expected text or json")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl Settings {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load a YAML file, then apply `CACHET_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        settings.with_env_overrides()
    }

    /// Defaults plus `CACHET_*` environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Settings::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary lookup, e.g. a map in tests.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CACHET_CACHE_TTL") {
            self.cache.default_ttl = parse_duration("CACHET_CACHE_TTL", &v)?;
        }
        if let Some(v) = lookup("CACHET_RESULT_TTL") {
            self.results.ttl = parse_duration("CACHET_RESULT_TTL", &v)?;
        }
        if let Some(v) = lookup("CACHET_RETRY_BASE_DELAY") {
            self.retry.base_delay = parse_duration("CACHET_RETRY_BASE_DELAY", &v)?;
        }
        if let Some(v) = lookup("CACHET_RETRY_MAX_JITTER") {
            self.retry.max_jitter = parse_duration("CACHET_RETRY_MAX_JITTER", &v)?;
        }
        if let Some(v) = lookup("CACHET_WORKERS") {
            self.workers.count = v.trim().parse().map_err(|e| ConfigError::Env {
                var: "CACHET_WORKERS".to_string(),
                reason: format!("{e}"),
            })?;
        }
        if let Some(v) = lookup("CACHET_POLL_INTERVAL") {
            self.workers.poll_interval = parse_duration("CACHET_POLL_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("CACHET_SWEEP_INTERVAL") {
            self.sweeper.interval = parse_duration("CACHET_SWEEP_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("CACHET_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("CACHET_LOG_FORMAT") {
            self.logging.format = v.parse().map_err(|reason| ConfigError::Env {
                var: "CACHET_LOG_FORMAT".to_string(),
                reason,
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.default_ttl.is_zero() {
            return Err(ConfigError::Invalid("cache.default_ttl must be > 0".to_string()));
        }
        if self.results.ttl.is_zero() {
            return Err(ConfigError::Invalid("results.ttl must be > 0".to_string()));
        }
        if self.workers.count == 0 {
            return Err(ConfigError::Invalid("workers.count must be > 0".to_string()));
        }
        if self.workers.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "workers.poll_interval must be > 0".to_string(),
            ));
        }
        if self.workers.transition_attempts == 0 {
            return Err(ConfigError::Invalid(
                "workers.transition_attempts must be > 0".to_string(),
            ));
        }
        if self.sweeper.interval.is_zero() {
            return Err(ConfigError::Invalid("sweeper.interval must be > 0".to_string()));
        }
        Ok(())
    }
}

fn parse_duration(var: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::Env {
        var: var.to_string(),
        reason: e.to_string(),
    })
}
