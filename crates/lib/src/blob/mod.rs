//! Blob source: where job templates and package archives come from, and
//! where compiled packages go.
//!
//! The transport (signed URLs, blobstore providers, local caches) lives
//! outside this crate; appliers and the compiler only see [`BlobSource`].
//!
//! # Submodules
//!
//! - [`local`] - [`LocalBlobSource`], a directory-backed implementation

pub mod local;

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::util::hash::{BlobDigest, DigestError};

pub use local::LocalBlobSource;

/// Extra HTTP headers sent with signed URL requests.
pub type Headers = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum BlobError {
  #[error("blob {0} not found")]
  NotFound(String),

  #[error("blob has neither a blobstore ID nor a signed URL")]
  MissingLocation,

  #[error("{0}")]
  Unsupported(String),

  #[error("verifying blob {id}: {source}")]
  Digest {
    id: String,
    #[source]
    source: DigestError,
  },

  #[error("{context} {path}: {source}")]
  Io {
    context: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl BlobError {
  pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
    let path = path.into();
    move |source| Self::Io { context, path, source }
  }
}

pub trait BlobSource: Send + Sync {
  /// Fetch a blob to a local temporary file and verify it against `digest`
  /// (skipped when `digest` is empty).
  fn get(
    &self,
    digest: &str,
    signed_url: Option<&str>,
    blobstore_id: &str,
    headers: &Headers,
  ) -> Result<PathBuf, BlobError>;

  /// Upload a file, returning its new blob ID and digest.
  fn write(&self, signed_url: Option<&str>, path: &Path, headers: &Headers) -> Result<(String, BlobDigest), BlobError>;

  /// Release a file previously returned by [`BlobSource::get`].
  fn clean_up(&self, signed_url: Option<&str>, path: &Path) -> Result<(), BlobError>;

  fn delete(&self, signed_url: Option<&str>, blob_id: &str) -> Result<(), BlobError>;
}
