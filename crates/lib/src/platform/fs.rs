//! Filesystem seam.
//!
//! Every mutation the bundle engine performs goes through [`FileSystem`], so
//! tests can inject failures (for example a directory that stays locked for a
//! few attempts) without touching the real disk semantics.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{DEFAULT_OWNER_GROUP, DEFAULT_OWNER_USER};

/// Owner applied to installed content, e.g. `root:vcap`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
  pub user: String,
  pub group: String,
}

impl Default for Ownership {
  fn default() -> Self {
    Self {
      user: DEFAULT_OWNER_USER.to_string(),
      group: DEFAULT_OWNER_GROUP.to_string(),
    }
  }
}

impl std::fmt::Display for Ownership {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.user, self.group)
  }
}

pub trait FileSystem: Send + Sync {
  fn file_exists(&self, path: &Path) -> bool;

  /// Create `path` and any missing parents with `mode`.
  fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

  fn chown(&self, path: &Path, ownership: &Ownership) -> io::Result<()>;

  fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;

  fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

  /// Remove a file, symlink or directory tree. A missing path is success.
  fn remove_all(&self, path: &Path) -> io::Result<()>;

  /// Point `link` at `target`, replacing whatever link is already there.
  fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

  fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

  /// Expand a glob pattern. Results are sorted.
  fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>>;
}

/// [`FileSystem`] backed by the host operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
  fn file_exists(&self, path: &Path) -> bool {
    path.exists()
  }

  #[cfg(unix)]
  fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new().recursive(true).mode(mode).create(path)
  }

  #[cfg(not(unix))]
  fn mkdir_all(&self, path: &Path, _mode: u32) -> io::Result<()> {
    fs::create_dir_all(path)
  }

  #[cfg(unix)]
  fn chown(&self, path: &Path, ownership: &Ownership) -> io::Result<()> {
    use nix::unistd::{Group, User};

    let user = User::from_name(&ownership.user)?
      .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown user '{}'", ownership.user)))?;
    let group = Group::from_name(&ownership.group)?
      .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown group '{}'", ownership.group)))?;

    nix::unistd::chown(path, Some(user.uid), Some(group.gid))?;
    Ok(())
  }

  #[cfg(not(unix))]
  fn chown(&self, _path: &Path, _ownership: &Ownership) -> io::Result<()> {
    Ok(())
  }

  #[cfg(unix)]
  fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
  }

  #[cfg(not(unix))]
  fn chmod(&self, _path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
  }

  fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
  }

  fn remove_all(&self, path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
      Ok(metadata) => metadata,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
      Err(e) => return Err(e),
    };

    let file_type = metadata.file_type();
    if file_type.is_dir() {
      fs::remove_dir_all(path)
    } else {
      remove_file_or_dir_link(path)
    }
  }

  #[cfg(unix)]
  fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
    // Build the new link beside the slot, then rename it over the old one so
    // the slot never disappears mid-switch.
    let file_name = link
      .file_name()
      .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid link path {}", link.display())))?;
    let staging = link.with_file_name(format!(".{}.link-{}", file_name.to_string_lossy(), std::process::id()));

    self.remove_all(&staging)?;
    std::os::unix::fs::symlink(target, &staging)?;
    if let Err(e) = fs::rename(&staging, link) {
      let _ = fs::remove_file(&staging);
      return Err(e);
    }

    debug!(target = %target.display(), link = %link.display(), "symlink switched");
    Ok(())
  }

  #[cfg(windows)]
  fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
    self.remove_all(link)?;
    std::os::windows::fs::symlink_dir(target, link)
  }

  fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
    fs::read_link(path)
  }

  fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut matches = Vec::new();
    for entry in paths {
      matches.push(entry.map_err(io::Error::from)?);
    }
    matches.sort();

    Ok(matches)
  }
}

#[cfg(unix)]
fn remove_file_or_dir_link(path: &Path) -> io::Result<()> {
  fs::remove_file(path)
}

#[cfg(windows)]
fn remove_file_or_dir_link(path: &Path) -> io::Result<()> {
  // Directory symlinks on Windows are removed as directories.
  fs::remove_file(path).or_else(|_| fs::remove_dir(path))
}
