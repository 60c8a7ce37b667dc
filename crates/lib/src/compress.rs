//! Archive handling for job templates, package sources and compiled packages.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CompressError {
  #[error("{context} {path}: {source}")]
  Io {
    context: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl CompressError {
  fn io(context: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
    let path = path.into();
    move |source| Self::Io { context, path, source }
  }
}

pub trait Compressor: Send + Sync {
  /// Unpack `archive` into the existing directory `dir`.
  fn decompress_file_to_dir(&self, archive: &Path, dir: &Path) -> Result<(), CompressError>;

  /// Pack the contents of `dir` into a new temporary archive.
  fn compress_files_in_dir(&self, dir: &Path) -> Result<PathBuf, CompressError>;

  /// Remove an archive produced by [`Compressor::compress_files_in_dir`].
  fn clean_up(&self, archive: &Path) -> Result<(), CompressError>;
}

/// Gzip-compressed tarballs.
#[derive(Debug, Clone)]
pub struct TarGzCompressor {
  tmp_dir: PathBuf,
}

impl TarGzCompressor {
  pub fn new(tmp_dir: impl Into<PathBuf>) -> Self {
    Self { tmp_dir: tmp_dir.into() }
  }
}

impl Compressor for TarGzCompressor {
  fn decompress_file_to_dir(&self, archive: &Path, dir: &Path) -> Result<(), CompressError> {
    let file = File::open(archive).map_err(CompressError::io("Opening archive", archive))?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball.set_preserve_permissions(true);
    tarball.set_overwrite(true);
    tarball
      .unpack(dir)
      .map_err(CompressError::io("Unpacking archive into", dir))?;

    debug!(archive = %archive.display(), dir = %dir.display(), "archive unpacked");
    Ok(())
  }

  fn compress_files_in_dir(&self, dir: &Path) -> Result<PathBuf, CompressError> {
    fs::create_dir_all(&self.tmp_dir).map_err(CompressError::io("Creating temp dir", &self.tmp_dir))?;
    let (file, archive) = tempfile::Builder::new()
      .prefix("compressed-")
      .suffix(".tgz")
      .tempfile_in(&self.tmp_dir)
      .map_err(CompressError::io("Creating temp archive in", &self.tmp_dir))?
      .keep()
      .map_err(|e| CompressError::Io {
        context: "Persisting temp archive in",
        path: self.tmp_dir.clone(),
        source: e.error,
      })?;

    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    builder
      .append_dir_all(".", dir)
      .map_err(CompressError::io("Archiving", dir))?;
    builder
      .into_inner()
      .and_then(|encoder| encoder.finish())
      .map_err(CompressError::io("Finishing archive", &archive))?;

    debug!(dir = %dir.display(), archive = %archive.display(), "directory compressed");
    Ok(archive)
  }

  fn clean_up(&self, archive: &Path) -> Result<(), CompressError> {
    match fs::remove_file(archive) {
      Err(e) if e.kind() != io::ErrorKind::NotFound => Err(CompressError::io("Removing archive", archive)(e)),
      _ => Ok(()),
    }
  }
}
