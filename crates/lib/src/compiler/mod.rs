//! Package compilation: source package plus dependencies in, uploaded
//! compiled artifact out.
//!
//! # Submodules
//!
//! - [`execute`] - [`ConcreteCompiler`], the compile pipeline
//! - [`order`] - dependency ordering for a batch of compile requests

pub mod execute;
pub mod order;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::applier::ApplierError;
use crate::blob::{BlobError, Headers};
use crate::bundle::BundleError;
use crate::compress::CompressError;
use crate::models::{Package, Source};
use crate::runner::RunnerError;
use crate::util::hash::BlobDigest;

pub use execute::ConcreteCompiler;
pub use order::sort_for_compilation;

/// A source package to compile, plus where to upload the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilePackage {
  pub name: String,
  pub version: String,
  pub source: Source,
  pub upload_signed_url: Option<String>,
  pub upload_headers: Headers,
}

/// One entry of a release-wide compile batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
  pub package: CompilePackage,
  pub dependencies: Vec<Package>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPackage {
  pub blob_id: String,
  pub digest: BlobDigest,
}

#[derive(Debug, Error)]
pub enum CompileError {
  #[error("package {0} has neither a blobstore ID nor a signed URL")]
  MissingSource(String),

  #[error("dependency cycle detected involving package {0}")]
  DependencyCycle(String),

  #[error("{context}: {source}")]
  Applier {
    context: String,
    #[source]
    source: ApplierError,
  },

  #[error("{context}: {source}")]
  Bundle {
    context: String,
    #[source]
    source: BundleError,
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
  Runner {
    context: String,
    #[source]
    source: RunnerError,
  },

  #[error("{context} {path}: {source}")]
  Io {
    context: String,
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl CompileError {
  pub(crate) fn applier(context: impl Into<String>) -> impl FnOnce(ApplierError) -> Self {
    let context = context.into();
    move |source| Self::Applier { context, source }
  }

  pub(crate) fn bundle(context: impl Into<String>) -> impl FnOnce(BundleError) -> Self {
    let context = context.into();
    move |source| Self::Bundle { context, source }
  }

  pub(crate) fn blob(context: impl Into<String>) -> impl FnOnce(BlobError) -> Self {
    let context = context.into();
    move |source| Self::Blob { context, source }
  }

  pub(crate) fn compress(context: impl Into<String>) -> impl FnOnce(CompressError) -> Self {
    let context = context.into();
    move |source| Self::Compress { context, source }
  }

  pub(crate) fn runner(context: impl Into<String>) -> impl FnOnce(RunnerError) -> Self {
    let context = context.into();
    move |source| Self::Runner { context, source }
  }

  pub(crate) fn io(context: impl Into<String>, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
    let context = context.into();
    let path = path.into();
    move |source| Self::Io { context, path, source }
  }
}

pub trait Compiler {
  /// Compile `package` against `dependencies` and upload the result.
  ///
  /// All or nothing: any failed step aborts the pipeline and nothing is
  /// uploaded.
  fn compile(&self, package: &CompilePackage, dependencies: &[Package]) -> Result<CompiledPackage, CompileError>;
}
