//! Filesystem-backed bundle collection.
//!
//! # Layout
//!
//! ```text
//! <install_root>/<collection>/<bundle>/<sha1(version)>/   # install paths
//! <enable_root>/<collection>/<bundle>                     # enable slot
//! ```
//!
//! There is one enable slot per bundle *name*, so enabling another version
//! switches the slot rather than adding a second one.

use std::path::PathBuf;

use tracing::debug;

use crate::bundle::{BundleCollection, BundleContext, BundleDefinition, BundleError, FileBundle};
use crate::util::hash::version_digest;
use crate::util::path::{base, clean, dir};

#[derive(Debug, Clone)]
pub struct FileBundleCollection {
  install_root: PathBuf,
  enable_root: PathBuf,
  name: String,
  file_mode: u32,
  ctx: BundleContext,
}

impl FileBundleCollection {
  pub fn new(
    install_root: impl Into<PathBuf>,
    enable_root: impl Into<PathBuf>,
    name: impl Into<String>,
    file_mode: u32,
    ctx: BundleContext,
  ) -> Self {
    Self {
      install_root: install_root.into(),
      enable_root: enable_root.into(),
      name: name.into(),
      file_mode,
      ctx,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Bundle for a version that is already digested, as found on disk.
  fn bundle_for(&self, bundle_name: &str, digested_version: &str) -> FileBundle {
    let install_path = self
      .install_root
      .join(&self.name)
      .join(bundle_name)
      .join(digested_version);
    let enable_path = self.enable_root.join(&self.name).join(bundle_name);
    FileBundle::new(install_path, enable_path, self.file_mode, self.ctx.clone())
  }
}

/// Recover `(name, digested version)` from `<...>/<name>/<version>`.
///
/// Segments that clean to `.` or `/` count as empty.
fn definition_from_install_path(path: &str) -> BundleDefinition {
  let cleaned = clean(path);
  let segment = |value: String| if value == "." || value == "/" { String::new() } else { value };

  BundleDefinition::new(segment(base(&dir(&cleaned))), segment(base(&cleaned)))
}

impl BundleCollection for FileBundleCollection {
  type Bundle = FileBundle;

  fn get(&self, definition: &BundleDefinition) -> Result<FileBundle, BundleError> {
    definition.validate()?;
    Ok(self.bundle_for(&definition.name, &version_digest(&definition.version)))
  }

  fn list(&self) -> Result<Vec<FileBundle>, BundleError> {
    let root = self.install_root.join(&self.name);
    let pattern = format!("{}/*/*", glob::Pattern::escape(&clean(&root.to_string_lossy())));

    let paths = self
      .ctx
      .fs
      .glob(&pattern)
      .map_err(BundleError::io("Globbing for installed bundles in", &root))?;

    let mut bundles = Vec::with_capacity(paths.len());
    for path in paths {
      let path = path.to_string_lossy().to_string();
      let definition = definition_from_install_path(&path);
      definition.validate().map_err(|source| BundleError::Listed {
        path: path.clone(),
        source: Box::new(source),
      })?;

      bundles.push(self.bundle_for(&definition.name, &definition.version));
    }

    debug!(collection = %self.name, count = bundles.len(), "listed installed bundles");
    Ok(bundles)
  }
}
