//! Appliers: drive bundles for jobs and packages toward a desired state.
//!
//! Per item the lifecycle is `NotInstalled -> Installed -> Enabled`; under
//! [`Applier::keep_only`] anything not desired goes `Enabled -> Disabled ->
//! Removed`. Disable always precedes Uninstall so a crash between the two
//! never leaves a live symlink to a deleted directory.
//!
//! # Submodules
//!
//! - [`job`] - [`RenderedJobApplier`], job templates plus their packages
//! - [`package`] - [`ConcretePackageApplier`], owning and non-owning variants
//! - [`provider`] - [`PackageApplierProvider`], root vs job-specific appliers

pub mod job;
pub mod package;
pub mod provider;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::blob::BlobError;
use crate::bundle::BundleError;
use crate::compress::CompressError;
use crate::consts::{JOB_BIN_FILE_MODE, JOB_FILE_MODE, JOB_OTHER_FILE_MODE};
use crate::models::{Job, ModelError};
use crate::platform::{FileSystem, Ownership};
use crate::supervisor::SupervisorError;

pub use job::RenderedJobApplier;
pub use package::ConcretePackageApplier;
pub use provider::{FilePackageApplierProvider, PackageApplierProvider};

#[derive(Debug, Error)]
pub enum ApplierError {
  #[error("{context}: {source}")]
  Bundle {
    context: String,
    #[source]
    source: BundleError,
  },

  #[error("{context}: {source}")]
  Model {
    context: String,
    #[source]
    source: ModelError,
  },

  #[error("{context}: {source}")]
  Blob {
    context: String,
    #[source]
    source: BlobError,
  },

  #[error("{context}: {source}")]
  Compress {
    context: String,
    #[source]
    source: CompressError,
  },

  #[error("{context}: {source}")]
  Supervisor {
    context: String,
    #[source]
    source: SupervisorError,
  },

  #[error("{context} {path}: {source}")]
  Io {
    context: String,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// A nested applier (e.g. a job's package applier) failed.
  #[error("{context}: {source}")]
  Nested {
    context: String,
    #[source]
    source: Box<ApplierError>,
  },
}

impl ApplierError {
  pub(crate) fn bundle(context: impl Into<String>) -> impl FnOnce(BundleError) -> Self {
    let context = context.into();
    move |source| Self::Bundle { context, source }
  }

  pub(crate) fn model(context: impl Into<String>) -> impl FnOnce(ModelError) -> Self {
    let context = context.into();
    move |source| Self::Model { context, source }
  }

  pub(crate) fn blob(context: impl Into<String>) -> impl FnOnce(BlobError) -> Self {
    let context = context.into();
    move |source| Self::Blob { context, source }
  }

  pub(crate) fn compress(context: impl Into<String>) -> impl FnOnce(CompressError) -> Self {
    let context = context.into();
    move |source| Self::Compress { context, source }
  }

  pub(crate) fn supervisor(context: impl Into<String>) -> impl FnOnce(SupervisorError) -> Self {
    let context = context.into();
    move |source| Self::Supervisor { context, source }
  }

  pub(crate) fn io(context: impl Into<String>, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
    let context = context.into();
    let path = path.into();
    move |source| Self::Io { context, path, source }
  }

  pub(crate) fn nested(context: impl Into<String>) -> impl FnOnce(ApplierError) -> Self {
    let context = context.into();
    move |source| Self::Nested {
      context,
      source: Box::new(source),
    }
  }
}

pub trait Applier {
  type Item;

  /// Make sure the item is installed, downloading it if needed.
  fn prepare(&self, item: &Self::Item) -> Result<(), ApplierError>;

  /// Prepare the item and make it the enabled version.
  fn apply(&self, item: &Self::Item) -> Result<(), ApplierError>;

  /// Disable (and, where the applier owns the content, uninstall) every
  /// installed bundle that is not one of `items`. Stops at the first error.
  fn keep_only(&self, items: &[Self::Item]) -> Result<(), ApplierError>;
}

pub trait JobApplier: Applier<Item = Job> {
  /// Register the job's monit files with the supervisor.
  fn configure(&self, job: &Job, index: usize) -> Result<(), ApplierError>;

  /// Delete each distinct source blob referenced by `jobs` exactly once.
  fn delete_source_blobs(&self, jobs: &[Job]) -> Result<(), ApplierError>;
}

/// Normalize a freshly installed job tree.
///
/// Directories and every file under the top-level `bin/` get 0750, all other
/// files 0640. Symlinks are left alone.
pub(crate) fn fix_permissions(
  fs: &dyn FileSystem,
  root: &Path,
  ownership: Option<&Ownership>,
) -> Result<(), ApplierError> {
  for entry in WalkDir::new(root).follow_links(false) {
    let entry = entry.map_err(|e| {
      let path = e.path().unwrap_or(root).to_path_buf();
      ApplierError::io("Walking", path)(e.into())
    })?;

    let file_type = entry.file_type();
    if file_type.is_symlink() {
      continue;
    }

    let path = entry.path();
    let mode = if file_type.is_dir() {
      JOB_FILE_MODE
    } else if under_bin(root, path) {
      JOB_BIN_FILE_MODE
    } else {
      JOB_OTHER_FILE_MODE
    };

    if let Some(ownership) = ownership {
      fs.chown(path, ownership).map_err(ApplierError::io("Chowning", path))?;
    }
    fs.chmod(path, mode).map_err(ApplierError::io("Chmoding", path))?;
  }

  Ok(())
}

fn under_bin(root: &Path, path: &Path) -> bool {
  path
    .strip_prefix(root)
    .ok()
    .and_then(|rel| rel.components().next())
    .is_some_and(|first| first.as_os_str() == "bin")
}
