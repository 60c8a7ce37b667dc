//! Filesystem-backed bundle.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::bundle::{Bundle, BundleContext, BundleError};
use crate::util::path::clean;

pub struct FileBundle {
  install_path: PathBuf,
  enable_path: PathBuf,
  file_mode: u32,
  ctx: BundleContext,
}

impl FileBundle {
  pub fn new(install_path: PathBuf, enable_path: PathBuf, file_mode: u32, ctx: BundleContext) -> Self {
    Self {
      install_path,
      enable_path,
      file_mode,
      ctx,
    }
  }

  pub fn enable_path(&self) -> &Path {
    &self.enable_path
  }

  fn set_ownership(&self, path: &Path, context: &'static str) -> Result<(), BundleError> {
    match &self.ctx.ownership {
      Some(ownership) => self
        .ctx
        .fs
        .chown(path, ownership)
        .map_err(BundleError::io(context, path)),
      None => Ok(()),
    }
  }

  fn points_here(&self, target: &Path) -> bool {
    clean(&target.to_string_lossy()) == clean(&self.install_path.to_string_lossy())
  }
}

fn parent_of(path: &Path) -> Result<&Path, BundleError> {
  path.parent().ok_or_else(|| BundleError::Io {
    context: "Resolving parent of",
    path: path.to_path_buf(),
    source: io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"),
  })
}

impl Bundle for FileBundle {
  fn install(&self, source_path: &Path, path_in_bundle: &str) -> Result<PathBuf, BundleError> {
    let source = if path_in_bundle.is_empty() {
      source_path.to_path_buf()
    } else {
      source_path.join(path_in_bundle)
    };

    debug!(source = %source.display(), install_path = %self.install_path.display(), "installing bundle");

    self
      .ctx
      .fs
      .chmod(&source, self.file_mode)
      .map_err(BundleError::io("Setting permissions on", &source))?;
    self.set_ownership(&source, "Setting ownership on")?;

    let parent = parent_of(&self.install_path)?;
    self
      .ctx
      .fs
      .mkdir_all(parent, self.file_mode)
      .map_err(BundleError::io("Creating installation directory", parent))?;
    self.set_ownership(parent, "Setting ownership on")?;

    // Must stay the last fallible step: is_installed() is an existence check.
    self
      .ctx
      .fs
      .rename(&source, &self.install_path)
      .map_err(BundleError::io("Installing bundle to", &self.install_path))?;

    info!(install_path = %self.install_path.display(), "bundle installed");
    Ok(self.install_path.clone())
  }

  fn install_without_contents(&self) -> Result<PathBuf, BundleError> {
    self
      .ctx
      .fs
      .mkdir_all(&self.install_path, self.file_mode)
      .map_err(BundleError::io("Creating installation directory", &self.install_path))?;

    Ok(self.install_path.clone())
  }

  fn uninstall(&self) -> Result<(), BundleError> {
    let install_path = &self.install_path;
    self
      .ctx
      .retry
      .run(&*self.ctx.clock, "remove install dir", || self.ctx.fs.remove_all(install_path))
      .map_err(BundleError::io("Removing install dir", install_path))?;

    info!(install_path = %install_path.display(), "bundle uninstalled");
    Ok(())
  }

  fn is_installed(&self) -> Result<bool, BundleError> {
    Ok(self.ctx.fs.file_exists(&self.install_path))
  }

  fn install_path(&self) -> Result<PathBuf, BundleError> {
    if !self.ctx.fs.file_exists(&self.install_path) {
      return Err(BundleError::InstallDirMissing);
    }
    Ok(self.install_path.clone())
  }

  fn enable(&self) -> Result<PathBuf, BundleError> {
    if !self.ctx.fs.file_exists(&self.install_path) {
      return Err(BundleError::NotInstalled);
    }

    let parent = parent_of(&self.enable_path)?;
    self
      .ctx
      .fs
      .mkdir_all(parent, self.file_mode)
      .map_err(BundleError::io("Creating enable directory", parent))?;
    self.set_ownership(parent, "Setting ownership on")?;

    self
      .ctx
      .fs
      .symlink(&self.install_path, &self.enable_path)
      .map_err(BundleError::io("Enabling bundle at", &self.enable_path))?;

    info!(
      install_path = %self.install_path.display(),
      enable_path = %self.enable_path.display(),
      "bundle enabled"
    );
    Ok(self.enable_path.clone())
  }

  fn disable(&self) -> Result<(), BundleError> {
    let target = match self.ctx.fs.read_link(&self.enable_path) {
      Ok(target) => target,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
      Err(source) => {
        return Err(BundleError::EnabledState {
          path: self.enable_path.clone(),
          source,
        });
      }
    };

    if !self.points_here(&target) {
      // Another version owns the slot now; it is not ours to clear.
      debug!(
        enable_path = %self.enable_path.display(),
        enabled = %target.display(),
        "different version enabled, leaving slot"
      );
      return Ok(());
    }

    self
      .ctx
      .fs
      .remove_all(&self.enable_path)
      .map_err(BundleError::io("Disabling bundle at", &self.enable_path))?;

    info!(enable_path = %self.enable_path.display(), "bundle disabled");
    Ok(())
  }
}

impl PartialEq for FileBundle {
  fn eq(&self, other: &Self) -> bool {
    self.install_path == other.install_path && self.enable_path == other.enable_path
  }
}

impl std::fmt::Debug for FileBundle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FileBundle")
      .field("install_path", &self.install_path)
      .field("enable_path", &self.enable_path)
      .field("file_mode", &format_args!("{:o}", self.file_mode))
      .finish()
  }
}
