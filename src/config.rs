//! # Engine Configuration
//!
//! JSON file, every field optional. Absent `data_path` keeps the store in
//! memory.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::confidence::WeightTable;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Revision worker tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound of the random delay added to each poll
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_stale_retries")]
    pub max_stale_retries: u32,

    #[serde(default)]
    pub resolution: ResolutionMode,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_jitter_ms() -> u64 {
    250
}

fn default_batch_size() -> usize {
    50
}

fn default_max_stale_retries() -> u32 {
    3
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            poll_interval_ms: default_poll_interval_ms(),
            jitter_ms: default_jitter_ms(),
            batch_size: default_batch_size(),
            max_stale_retries: default_max_stale_retries(),
            resolution: ResolutionMode::default(),
        }
    }
}

/// How a worker finishes reviewed reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// Move reports to `reviewed` and leave resolution to `POST /reports/{id}/advance`
    #[default]
    Manual,
    /// Resolve every reviewed report keeping the attribution as is
    AutoConfirm,
}

/// HTTP binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Browser origins allowed to call the API. `"*"` allows any origin,
    /// an empty list sends no CORS headers.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 7040))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: Vec::new(),
        }
    }
}

impl HttpConfig {
    /// True when `"*"` is listed
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.bind.port() == 0 {
            return Err(ConfigError::Invalid("http.bind port must be > 0".into()));
        }
        for origin in &self.cors_origins {
            let scheme_ok = origin.starts_with("http://") || origin.starts_with("https://");
            if origin != "*" && (!scheme_ok || origin.ends_with('/')) {
                return Err(ConfigError::Invalid(format!(
                    "http.cors_origins entry '{}' must be \"*\" or scheme://host[:port]",
                    origin
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Store file; `None` runs fully in memory
    #[serde(default)]
    pub data_path: Option<PathBuf>,

    #[serde(default = "default_cooldown_window_secs")]
    pub cooldown_window_secs: u64,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub weights: WeightTable,

    #[serde(default)]
    pub http: HttpConfig,
}

fn default_cooldown_window_secs() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            cooldown_window_secs: default_cooldown_window_secs(),
            worker: WorkerConfig::default(),
            weights: WeightTable::default(),
            http: HttpConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.cooldown_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "cooldown_window_secs must be > 0".into(),
            ));
        }
        if self.worker.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "worker.poll_interval_ms must be > 0".into(),
            ));
        }
        if self.worker.batch_size == 0 {
            return Err(ConfigError::Invalid("worker.batch_size must be > 0".into()));
        }
        self.http.validate()?;
        self.weights.validate().map_err(ConfigError::Invalid)
    }

    pub fn cooldown_window(&self) -> Duration {
        Duration::seconds(i64::try_from(self.cooldown_window_secs).unwrap_or(i64::MAX / 1000))
    }
}
