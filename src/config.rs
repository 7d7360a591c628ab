use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::{Error, Result};

/// Default lock expiry in seconds. A worker that dies while holding a lock
/// self-heals after this long.
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 30;

/// Default number of interchangeable workers in the pool.
pub const DEFAULT_WORKER_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for all persisted state. Defaults to `~/.foreman`.
    pub data_dir: Option<String>,
    /// Seconds before an unrenewed lock record expires.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,
    /// Attempts to enter the lock-store gate before reporting busy.
    #[serde(default = "default_gate_retries")]
    pub gate_retries: u32,
    /// Delay between gate attempts, in milliseconds.
    #[serde(default = "default_gate_retry_delay_ms")]
    pub gate_retry_delay_ms: u64,
    /// Number of workers the coordinator drives.
    #[serde(default = "default_worker_count")]
    pub workers: usize,
}

fn default_lock_timeout() -> u64 {
    DEFAULT_LOCK_TIMEOUT_SECS
}

fn default_gate_retries() -> u32 {
    5
}

fn default_gate_retry_delay_ms() -> u64 {
    20
}

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            lock_timeout_secs: default_lock_timeout(),
            gate_retries: default_gate_retries(),
            gate_retry_delay_ms: default_gate_retry_delay_ms(),
            workers: default_worker_count(),
        }
    }
}

impl Config {
    pub fn foreman_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".foreman"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::foreman_dir()?.join("foreman.toml"))
    }

    /// Resolve the root data directory, honoring the `data_dir` override.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Self::foreman_dir(),
        }
    }

    pub fn graph_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("goal_graphs"))
    }

    pub fn prd_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("prd"))
    }

    pub fn lock_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("locks"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        debug!(path = %path.display(), "loading config");
        if !path.exists() {
            debug!("config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        debug!(
            lock_timeout_secs = config.lock_timeout_secs,
            workers = config.workers,
            "config loaded"
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::foreman_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "config saved");
        Ok(())
    }

    /// Create the data directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.graph_dir()?, self.prd_dir()?, self.lock_dir()?] {
            if !dir.exists() {
                debug!(dir = %dir.display(), "creating data directory");
                fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
