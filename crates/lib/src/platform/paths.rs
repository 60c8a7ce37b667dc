//! Directory layout under the agent base directory.
//!
//! ```text
//! <base>/
//! ├── data/
//! │   ├── jobs/<job>/<sha1(version)>/      # job install dirs
//! │   ├── packages/<pkg>/<sha1(version)>/  # package install dirs
//! │   ├── compile/<pkg>/                   # extracted package sources
//! │   ├── tmp/                             # downloads in flight
//! │   ├── sys/log/<dir>/                   # command logs
//! │   └── <job>/                           # job data dir
//! ├── jobs/<job> -> data/jobs/<job>/<sha1>
//! │   └── packages/<pkg> -> data/packages/<pkg>/<sha1>
//! ├── packages/<pkg> -> data/packages/<pkg>/<sha1>
//! ├── monit/job/                           # supervisor configs
//! └── sys/{log,run}/<job>/                 # job working dirs
//! ```

use std::path::{Path, PathBuf};

use crate::consts::BASE_DIR_ENV;

#[cfg(windows)]
pub fn default_base_dir() -> PathBuf {
  let drive = std::env::var("SYSTEMDRIVE").unwrap_or_else(|_| "C:".to_string());
  PathBuf::from(format!("{drive}\\")).join("var").join("vcap")
}

#[cfg(not(windows))]
pub fn default_base_dir() -> PathBuf {
  PathBuf::from("/var/vcap")
}

/// Base directory, honoring the `STEWARD_BASE_DIR` override.
pub fn base_dir() -> PathBuf {
  if let Ok(path) = std::env::var(BASE_DIR_ENV) {
    return PathBuf::from(path);
  }

  default_base_dir()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirProvider {
  base: PathBuf,
}

impl DirProvider {
  pub fn new(base: impl Into<PathBuf>) -> Self {
    Self { base: base.into() }
  }

  pub fn base_dir(&self) -> &Path {
    &self.base
  }

  pub fn data_dir(&self) -> PathBuf {
    self.base.join("data")
  }

  pub fn compile_dir(&self) -> PathBuf {
    self.data_dir().join("compile")
  }

  pub fn tmp_dir(&self) -> PathBuf {
    self.data_dir().join("tmp")
  }

  /// Root under which every job's package symlink slots live.
  pub fn jobs_dir(&self) -> PathBuf {
    self.base.join("jobs")
  }

  pub fn monit_jobs_dir(&self) -> PathBuf {
    self.base.join("monit").join("job")
  }

  pub fn logs_dir(&self) -> PathBuf {
    self.base.join("sys").join("log")
  }

  pub fn run_dir(&self) -> PathBuf {
    self.base.join("sys").join("run")
  }

  pub fn command_logs_dir(&self) -> PathBuf {
    self.data_dir().join("sys").join("log")
  }

  pub fn job_log_dir(&self, job_name: &str) -> PathBuf {
    self.logs_dir().join(job_name)
  }

  pub fn job_run_dir(&self, job_name: &str) -> PathBuf {
    self.run_dir().join(job_name)
  }

  pub fn job_data_dir(&self, job_name: &str) -> PathBuf {
    self.data_dir().join(job_name)
  }
}
