use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bundle::BundleDefinition;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
  #[error("job name must not be empty")]
  EmptyJobName,

  #[error("job '{0}' has an empty version")]
  EmptyJobVersion(String),
}

/// Where a bundle's archive lives and how to verify it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Source {
  /// Blob digest: bare SHA-1 hex or `algo:hex` (multi-digests allowed).
  #[serde(alias = "sha1")]
  pub digest: String,
  pub blobstore_id: String,
  pub signed_url: Option<String>,
  /// Directory inside the archive that becomes the bundle's content.
  pub path_in_archive: String,
  #[serde(alias = "blobstore_headers")]
  pub headers: BTreeMap<String, String>,
}

/// A rendered job template and the packages it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
  pub name: String,
  pub version: String,
  #[serde(flatten)]
  pub source: Source,
  #[serde(default)]
  pub packages: Vec<Package>,
}

impl Job {
  /// Bundle identity: `version-digest`.
  ///
  /// The digest disambiguates renders that share a version number but differ
  /// in content.
  pub fn bundle_definition(&self) -> Result<BundleDefinition, ModelError> {
    if self.name.is_empty() {
      return Err(ModelError::EmptyJobName);
    }
    if self.version.is_empty() {
      return Err(ModelError::EmptyJobVersion(self.name.clone()));
    }
    Ok(BundleDefinition::new(
      &self.name,
      format!("{}-{}", self.version, self.source.digest),
    ))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
  pub name: String,
  pub version: String,
  #[serde(flatten)]
  pub source: Source,
}

impl Package {
  /// Bundle identity: `version-digest` (the digest may be empty).
  pub fn bundle_definition(&self) -> BundleDefinition {
    BundleDefinition::new(&self.name, format!("{}-{}", self.version, self.source.digest))
  }
}
