//! Package applier.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::applier::{Applier, ApplierError};
use crate::blob::BlobSource;
use crate::bundle::{Bundle, BundleCollection};
use crate::compress::Compressor;
use crate::consts::TMP_DIR_MODE;
use crate::models::Package;
use crate::platform::FileSystem;

/// Applies packages into a bundle collection.
///
/// An *owning* applier manages the system-wide package content and uninstalls
/// what it drops in [`Applier::keep_only`]. A non-owning one (job-specific)
/// only clears its own enable slots, since the shared content may still be
/// used by other jobs.
pub struct ConcretePackageApplier<C> {
  collection: C,
  owning: bool,
  fs: Arc<dyn FileSystem>,
  blobs: Arc<dyn BlobSource>,
  compressor: Arc<dyn Compressor>,
  tmp_dir: PathBuf,
}

impl<C: BundleCollection> ConcretePackageApplier<C> {
  pub fn new(
    collection: C,
    owning: bool,
    fs: Arc<dyn FileSystem>,
    blobs: Arc<dyn BlobSource>,
    compressor: Arc<dyn Compressor>,
    tmp_dir: impl Into<PathBuf>,
  ) -> Self {
    Self {
      collection,
      owning,
      fs,
      blobs,
      compressor,
      tmp_dir: tmp_dir.into(),
    }
  }

  pub fn is_owning(&self) -> bool {
    self.owning
  }

  fn package_bundle(&self, package: &Package) -> Result<C::Bundle, ApplierError> {
    self
      .collection
      .get(&package.bundle_definition())
      .map_err(ApplierError::bundle("Getting package bundle"))
  }

  fn download_and_install(&self, package: &Package, bundle: &C::Bundle) -> Result<(), ApplierError> {
    self
      .fs
      .mkdir_all(&self.tmp_dir, TMP_DIR_MODE)
      .map_err(ApplierError::io("Creating temp dir", &self.tmp_dir))?;
    let tmp = tempfile::Builder::new()
      .prefix("bosh-agent-applier-packages")
      .tempdir_in(&self.tmp_dir)
      .map_err(ApplierError::io("Creating temp dir in", &self.tmp_dir))?;

    let source = &package.source;
    let blob = self
      .blobs
      .get(
        &source.digest,
        source.signed_url.as_deref(),
        &source.blobstore_id,
        &source.headers,
      )
      .map_err(ApplierError::blob("Fetching package blob"))?;

    let result = self
      .compressor
      .decompress_file_to_dir(&blob, tmp.path())
      .map_err(ApplierError::compress("Decompressing package files"))
      .and_then(|()| {
        bundle
          .install(tmp.path(), &source.path_in_archive)
          .map_err(ApplierError::bundle("Installing package directory"))
      });

    if let Err(e) = self.blobs.clean_up(source.signed_url.as_deref(), &blob) {
      warn!(package = %package.name, blob = %blob.display(), error = %e, "failed to clean up package blob");
    }

    result.map(|_| ())
  }
}

impl<C: BundleCollection> Applier for ConcretePackageApplier<C> {
  type Item = Package;

  fn prepare(&self, package: &Package) -> Result<(), ApplierError> {
    let bundle = self.package_bundle(package)?;

    let installed = bundle
      .is_installed()
      .map_err(ApplierError::bundle("Checking if package is installed"))?;
    if installed {
      debug!(package = %package.name, version = %package.version, "package already installed");
      return Ok(());
    }

    self.download_and_install(package, &bundle)
  }

  fn apply(&self, package: &Package) -> Result<(), ApplierError> {
    self.prepare(package)?;

    self
      .package_bundle(package)?
      .enable()
      .map_err(ApplierError::bundle("Enabling package"))?;

    info!(package = %package.name, version = %package.version, "package applied");
    Ok(())
  }

  fn keep_only(&self, packages: &[Package]) -> Result<(), ApplierError> {
    let installed = self
      .collection
      .list()
      .map_err(ApplierError::bundle("Retrieving all installed packages"))?;

    let desired = packages
      .iter()
      .map(|package| self.package_bundle(package))
      .collect::<Result<Vec<_>, _>>()?;

    for bundle in installed.iter().filter(|bundle| !desired.contains(bundle)) {
      bundle.disable().map_err(ApplierError::bundle("Disabling package bundle"))?;

      if self.owning {
        bundle
          .uninstall()
          .map_err(ApplierError::bundle("Uninstalling package bundle"))?;
      }
    }

    Ok(())
  }
}
