//! Registration of job process configs with the process supervisor.
//!
//! Supervising processes is not this crate's concern; appliers only hand
//! configs over through [`JobSupervisor`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SupervisorError {
  #[error("{context} {path}: {source}")]
  Io {
    context: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

pub trait JobSupervisor: Send + Sync {
  fn add_job(&self, name: &str, index: usize, config_path: &Path) -> Result<(), SupervisorError>;
}

/// Copies monit configs into the directory monit includes, named
/// `<index:04>_<name>.monitrc`.
#[derive(Debug, Clone)]
pub struct MonitFileSupervisor {
  jobs_dir: PathBuf,
}

impl MonitFileSupervisor {
  pub fn new(jobs_dir: impl Into<PathBuf>) -> Self {
    Self {
      jobs_dir: jobs_dir.into(),
    }
  }

  pub fn config_path(&self, name: &str, index: usize) -> PathBuf {
    self.jobs_dir.join(format!("{index:04}_{name}.monitrc"))
  }
}

impl JobSupervisor for MonitFileSupervisor {
  fn add_job(&self, name: &str, index: usize, config_path: &Path) -> Result<(), SupervisorError> {
    fs::create_dir_all(&self.jobs_dir).map_err(|source| SupervisorError::Io {
      context: "Creating monit job dir",
      path: self.jobs_dir.clone(),
      source,
    })?;

    let target = self.config_path(name, index);
    fs::copy(config_path, &target).map_err(|source| SupervisorError::Io {
      context: "Copying monit config",
      path: config_path.to_path_buf(),
      source,
    })?;

    info!(job = %name, index, target = %target.display(), "registered job with supervisor");
    Ok(())
  }
}
