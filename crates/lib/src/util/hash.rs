//! Hashing utilities for content-addressed bundle paths and blob verification.
//!
//! This module provides:
//! - `version_digest()`: the SHA-1 directory name for a bundle version
//! - `BlobDigest`: a parsed blob digest (`<sha1-hex>` or `sha256:<hex>`,
//!   optionally `;`-separated as a multi-digest)
//! - `hash_file()`: streaming file hashing with a chosen algorithm

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Compute the lowercase SHA-1 hex digest of a bundle version.
///
/// Install directories are named by this digest so that arbitrary version
/// strings map to fixed-length, filesystem-safe names.
pub fn version_digest(version: &str) -> String {
  let mut hasher = Sha1::new();
  hasher.update(version.as_bytes());
  hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DigestAlgorithm {
  Sha1,
  Sha256,
}

impl DigestAlgorithm {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Sha1 => "sha1",
      Self::Sha256 => "sha256",
    }
  }
}

/// Error during digest parsing or verification.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
  #[error("empty digest")]
  Empty,

  #[error("unsupported digest algorithm '{0}'")]
  UnsupportedAlgorithm(String),

  #[error("malformed digest '{0}'")]
  Malformed(String),

  #[error("failed to read file {path}: {source}")]
  ReadFile {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("expected {algorithm} digest {expected}, got {actual}")]
  Mismatch {
    algorithm: &'static str,
    expected: String,
    actual: String,
  },
}

/// A single blob digest.
///
/// SHA-1 digests render as bare hex, for compatibility with directors that
/// predate multi-digests; every other algorithm renders as `<algo>:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobDigest {
  pub algorithm: DigestAlgorithm,
  pub hex: String,
}

impl BlobDigest {
  /// Parse a digest string.
  ///
  /// For a multi-digest (`sha1:abc;sha256:def`) the strongest supported
  /// algorithm wins.
  pub fn parse(value: &str) -> Result<Self, DigestError> {
    let value = value.trim();
    if value.is_empty() {
      return Err(DigestError::Empty);
    }

    let mut strongest: Option<BlobDigest> = None;
    for part in value.split(';').filter(|p| !p.is_empty()) {
      let digest = Self::parse_single(part)?;
      if strongest.as_ref().is_none_or(|s| digest.algorithm > s.algorithm) {
        strongest = Some(digest);
      }
    }

    strongest.ok_or_else(|| DigestError::Malformed(value.to_string()))
  }

  fn parse_single(part: &str) -> Result<Self, DigestError> {
    let (algorithm, hex) = match part.split_once(':') {
      Some(("sha1", hex)) => (DigestAlgorithm::Sha1, hex),
      Some(("sha256", hex)) => (DigestAlgorithm::Sha256, hex),
      Some((other, _)) => return Err(DigestError::UnsupportedAlgorithm(other.to_string())),
      None => (DigestAlgorithm::Sha1, part),
    };

    let expected_len = match algorithm {
      DigestAlgorithm::Sha1 => 40,
      DigestAlgorithm::Sha256 => 64,
    };
    if hex.len() != expected_len || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
      return Err(DigestError::Malformed(part.to_string()));
    }

    Ok(Self {
      algorithm,
      hex: hex.to_ascii_lowercase(),
    })
  }

  /// Hash `path` with this digest's algorithm and compare.
  pub fn verify_file(&self, path: &Path) -> Result<(), DigestError> {
    let actual = hash_file(path, self.algorithm)?;
    if actual.hex != self.hex {
      return Err(DigestError::Mismatch {
        algorithm: self.algorithm.as_str(),
        expected: self.hex.clone(),
        actual: actual.hex,
      });
    }
    Ok(())
  }
}

impl fmt::Display for BlobDigest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.algorithm {
      DigestAlgorithm::Sha1 => write!(f, "{}", self.hex),
      other => write!(f, "{}:{}", other.as_str(), self.hex),
    }
  }
}

/// Hash a file's contents.
pub fn hash_file(path: &Path, algorithm: DigestAlgorithm) -> Result<BlobDigest, DigestError> {
  let mut file = fs::File::open(path).map_err(|source| DigestError::ReadFile {
    path: path.display().to_string(),
    source,
  })?;

  let mut sha1 = Sha1::new();
  let mut sha256 = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(|source| DigestError::ReadFile {
      path: path.display().to_string(),
      source,
    })?;
    if bytes_read == 0 {
      break;
    }
    match algorithm {
      DigestAlgorithm::Sha1 => sha1.update(&buffer[..bytes_read]),
      DigestAlgorithm::Sha256 => sha256.update(&buffer[..bytes_read]),
    }
  }

  let hex = match algorithm {
    DigestAlgorithm::Sha1 => hex::encode(sha1.finalize()),
    DigestAlgorithm::Sha256 => hex::encode(sha256.finalize()),
  };

  Ok(BlobDigest { algorithm, hex })
}
