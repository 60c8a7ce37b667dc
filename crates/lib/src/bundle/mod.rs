//! Bundles: installable, enable/disable-able units of software.
//!
//! A bundle is one version of a job template or package, addressed by a
//! [`BundleDefinition`]. Its state lives entirely on disk:
//!
//! - **installed**: the install directory exists
//! - **enabled**: the per-name enable slot is a symlink to the install dir
//!
//! The mutation that flips each state (rename, mkdir, remove) is always the
//! last fallible step of an operation, so existence checks never disagree with
//! what actually happened, and every operation is safe to repeat after a
//! partial failure.
//!
//! # Submodules
//!
//! - [`file`] - [`FileBundle`], the filesystem-backed bundle
//! - [`collection`] - [`FileBundleCollection`], path derivation and listing

pub mod collection;
pub mod file;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::platform::{Clock, FileSystem, Ownership, RetryPolicy};

pub use collection::FileBundleCollection;
pub use file::FileBundle;

/// Identity of a bundle. Two definitions are equal iff name and version match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BundleDefinition {
  pub name: String,
  pub version: String,
}

impl BundleDefinition {
  pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      version: version.into(),
    }
  }

  pub fn validate(&self) -> Result<(), BundleError> {
    if self.name.is_empty() {
      return Err(BundleError::MissingName);
    }
    if self.version.is_empty() {
      return Err(BundleError::MissingVersion);
    }
    Ok(())
  }
}

#[derive(Debug, Error)]
pub enum BundleError {
  #[error("Missing bundle name")]
  MissingName,

  #[error("Missing bundle version")]
  MissingVersion,

  #[error("bundle must be installed")]
  NotInstalled,

  #[error("install dir does not exist")]
  InstallDirMissing,

  #[error("cannot determine enabled state of {path}: {source}")]
  EnabledState {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{context} {path}: {source}")]
  Io {
    context: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Building bundle from {path}: {source}")]
  Listed {
    path: String,
    #[source]
    source: Box<BundleError>,
  },
}

impl BundleError {
  pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
    let path = path.into();
    move |source| Self::Io { context, path, source }
  }
}

pub trait Bundle {
  /// Move the extracted content at `source_path/path_in_bundle` into place.
  fn install(&self, source_path: &std::path::Path, path_in_bundle: &str) -> Result<PathBuf, BundleError>;

  /// Create an empty install directory. Idempotent.
  fn install_without_contents(&self) -> Result<PathBuf, BundleError>;

  /// Remove the install directory. Idempotent.
  fn uninstall(&self) -> Result<(), BundleError>;

  /// Whether the install directory exists. Content is not verified.
  fn is_installed(&self) -> Result<bool, BundleError>;

  fn install_path(&self) -> Result<PathBuf, BundleError>;

  /// Point the enable slot at this bundle. Idempotent.
  fn enable(&self) -> Result<PathBuf, BundleError>;

  /// Clear the enable slot if, and only if, it points at this bundle.
  fn disable(&self) -> Result<(), BundleError>;
}

pub trait BundleCollection {
  type Bundle: Bundle + PartialEq;

  fn get(&self, definition: &BundleDefinition) -> Result<Self::Bundle, BundleError>;

  /// Every bundle currently installed in the collection.
  fn list(&self) -> Result<Vec<Self::Bundle>, BundleError>;
}

/// Collaborators shared by every bundle a collection hands out.
#[derive(Clone)]
pub struct BundleContext {
  pub fs: Arc<dyn FileSystem>,
  pub clock: Arc<dyn Clock>,
  pub retry: RetryPolicy,
  /// `None` leaves ownership untouched.
  pub ownership: Option<Ownership>,
}

impl std::fmt::Debug for BundleContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BundleContext")
      .field("retry", &self.retry)
      .field("ownership", &self.ownership)
      .finish_non_exhaustive()
  }
}
