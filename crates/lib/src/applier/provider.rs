//! Hands out package appliers for the system-wide and per-job slots.

use std::sync::Arc;

use crate::applier::{Applier, ConcretePackageApplier};
use crate::blob::BlobSource;
use crate::bundle::{BundleCollection, BundleContext, FileBundleCollection};
use crate::compress::Compressor;
use crate::consts::PACKAGES_COLLECTION;
use crate::models::Package;
use crate::platform::DirProvider;

pub trait PackageApplierProvider {
  type Collection: BundleCollection;

  /// Owning applier over the system-wide package collection.
  fn root(&self) -> Box<dyn Applier<Item = Package>>;

  /// Non-owning applier whose enable slots live under the job's directory.
  /// Content is still installed into the shared package root.
  fn job_specific(&self, job_name: &str) -> Box<dyn Applier<Item = Package>>;

  fn root_bundle_collection(&self) -> Self::Collection;
}

#[derive(Clone)]
pub struct FilePackageApplierProvider {
  dirs: DirProvider,
  file_mode: u32,
  ctx: BundleContext,
  blobs: Arc<dyn BlobSource>,
  compressor: Arc<dyn Compressor>,
}

impl FilePackageApplierProvider {
  pub fn new(
    dirs: DirProvider,
    file_mode: u32,
    ctx: BundleContext,
    blobs: Arc<dyn BlobSource>,
    compressor: Arc<dyn Compressor>,
  ) -> Self {
    Self {
      dirs,
      file_mode,
      ctx,
      blobs,
      compressor,
    }
  }

  fn applier(&self, collection: FileBundleCollection, owning: bool) -> Box<dyn Applier<Item = Package>> {
    Box::new(ConcretePackageApplier::new(
      collection,
      owning,
      self.ctx.fs.clone(),
      self.blobs.clone(),
      self.compressor.clone(),
      self.dirs.tmp_dir(),
    ))
  }
}

impl PackageApplierProvider for FilePackageApplierProvider {
  type Collection = FileBundleCollection;

  fn root(&self) -> Box<dyn Applier<Item = Package>> {
    self.applier(self.root_bundle_collection(), true)
  }

  fn job_specific(&self, job_name: &str) -> Box<dyn Applier<Item = Package>> {
    let collection = FileBundleCollection::new(
      self.dirs.data_dir(),
      self.dirs.jobs_dir().join(job_name),
      PACKAGES_COLLECTION,
      self.file_mode,
      self.ctx.clone(),
    );
    self.applier(collection, false)
  }

  fn root_bundle_collection(&self) -> FileBundleCollection {
    FileBundleCollection::new(
      self.dirs.data_dir(),
      self.dirs.base_dir(),
      PACKAGES_COLLECTION,
      self.file_mode,
      self.ctx.clone(),
    )
  }
}
