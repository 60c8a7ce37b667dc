//! Directory-backed blob source.
//!
//! Blobs are stored flat as `<dir>/<id>` where the ID is the SHA-1 of the
//! content. Fetches copy into a temp directory so callers may freely move or
//! delete what they receive.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::blob::{BlobError, BlobSource, Headers};
use crate::util::hash::{BlobDigest, DigestAlgorithm, hash_file};

#[derive(Debug, Clone)]
pub struct LocalBlobSource {
  dir: PathBuf,
  tmp_dir: PathBuf,
}

impl LocalBlobSource {
  pub fn new(dir: impl Into<PathBuf>, tmp_dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      tmp_dir: tmp_dir.into(),
    }
  }

  fn blob_path(&self, id: &str) -> PathBuf {
    self.dir.join(id)
  }
}

impl BlobSource for LocalBlobSource {
  fn get(
    &self,
    digest: &str,
    signed_url: Option<&str>,
    blobstore_id: &str,
    _headers: &Headers,
  ) -> Result<PathBuf, BlobError> {
    if blobstore_id.is_empty() {
      return Err(match signed_url {
        Some(url) => BlobError::Unsupported(format!("local blob source cannot fetch signed URL {url}")),
        None => BlobError::MissingLocation,
      });
    }

    let source = self.blob_path(blobstore_id);
    if !source.is_file() {
      return Err(BlobError::NotFound(blobstore_id.to_string()));
    }

    fs::create_dir_all(&self.tmp_dir).map_err(BlobError::io("Creating temp dir", &self.tmp_dir))?;
    let (_, local_path) = tempfile::Builder::new()
      .prefix("blob-")
      .tempfile_in(&self.tmp_dir)
      .map_err(BlobError::io("Creating temp file in", &self.tmp_dir))?
      .keep()
      .map_err(|e| BlobError::Io {
        context: "Persisting temp file in",
        path: self.tmp_dir.clone(),
        source: e.error,
      })?;

    fs::copy(&source, &local_path).map_err(BlobError::io("Copying blob from", &source))?;

    if !digest.is_empty() {
      let verified = BlobDigest::parse(digest).and_then(|expected| expected.verify_file(&local_path));
      if let Err(source) = verified {
        let _ = fs::remove_file(&local_path);
        return Err(BlobError::Digest {
          id: blobstore_id.to_string(),
          source,
        });
      }
    }

    debug!(id = %blobstore_id, path = %local_path.display(), "fetched blob");
    Ok(local_path)
  }

  fn write(&self, _signed_url: Option<&str>, path: &Path, _headers: &Headers) -> Result<(String, BlobDigest), BlobError> {
    let digest = hash_file(path, DigestAlgorithm::Sha1).map_err(|source| BlobError::Digest {
      id: path.display().to_string(),
      source,
    })?;
    let id = digest.hex.clone();

    fs::create_dir_all(&self.dir).map_err(BlobError::io("Creating blob dir", &self.dir))?;
    let staging = self.dir.join(format!(".{id}.partial"));
    fs::copy(path, &staging).map_err(BlobError::io("Copying blob from", path))?;
    fs::rename(&staging, self.blob_path(&id)).map_err(BlobError::io("Storing blob", &staging))?;

    info!(id = %id, "stored blob");
    Ok((id, digest))
  }

  fn clean_up(&self, _signed_url: Option<&str>, path: &Path) -> Result<(), BlobError> {
    match fs::remove_file(path) {
      Err(e) if e.kind() != io::ErrorKind::NotFound => Err(BlobError::io("Removing", path)(e)),
      _ => Ok(()),
    }
  }

  fn delete(&self, _signed_url: Option<&str>, blob_id: &str) -> Result<(), BlobError> {
    let path = self.blob_path(blob_id);
    match fs::remove_file(&path) {
      Err(e) if e.kind() != io::ErrorKind::NotFound => Err(BlobError::io("Deleting blob", &path)(e)),
      _ => {
        info!(id = %blob_id, "deleted blob");
        Ok(())
      }
    }
  }
}
