//! Agent configuration.
//!
//! Read from a JSON file; every field is optional. `STEWARD_BASE_DIR` wins
//! over the file's `base_dir`.
//!
//! ```json
//! {
//!   "base_dir": "/var/vcap",
//!   "ownership": { "user": "root", "group": "vcap" },
//!   "retry": { "interval_secs": 5, "timeout_secs": 120 },
//!   "package_file_mode": 493,
//!   "job_file_mode": 488
//! }
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{BASE_DIR_ENV, JOB_FILE_MODE, PACKAGE_FILE_MODE};
use crate::platform::paths::default_base_dir;
use crate::platform::{DirProvider, Ownership, RetryPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
  pub interval_secs: u64,
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
  pub base_dir: PathBuf,
  /// `None` leaves ownership of installed content untouched.
  pub ownership: Option<Ownership>,
  /// `None` selects the platform default.
  pub retry: Option<RetryConfig>,
  pub package_file_mode: u32,
  pub job_file_mode: u32,
}

impl Default for AgentConfig {
  fn default() -> Self {
    Self {
      base_dir: default_base_dir(),
      ownership: Some(Ownership::default()),
      retry: None,
      package_file_mode: PACKAGE_FILE_MODE,
      job_file_mode: JOB_FILE_MODE,
    }
  }
}

impl AgentConfig {
  /// Defaults with environment overrides applied.
  pub fn from_env() -> Self {
    Self::default().with_env_overrides()
  }

  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    debug!(path = %path.display(), "loaded agent config");
    Ok(config.with_env_overrides())
  }

  fn with_env_overrides(mut self) -> Self {
    if let Ok(base_dir) = std::env::var(BASE_DIR_ENV) {
      self.base_dir = PathBuf::from(base_dir);
    }
    self
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    match self.retry {
      Some(retry) => RetryPolicy::bounded(
        Duration::from_secs(retry.interval_secs),
        Duration::from_secs(retry.timeout_secs),
      ),
      None => RetryPolicy::current(),
    }
  }

  pub fn dirs(&self) -> DirProvider {
    DirProvider::new(&self.base_dir)
  }
}
