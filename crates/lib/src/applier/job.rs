//! Job applier.
//!
//! Installing a job downloads its rendered templates, normalizes permissions
//! and creates the job's working directories. Enabling it also applies the
//! job's packages into its own package slots under `<base>/jobs/<job>`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::applier::{Applier, ApplierError, JobApplier, PackageApplierProvider, fix_permissions};
use crate::blob::BlobSource;
use crate::bundle::{Bundle, BundleCollection, BundleContext};
use crate::compress::Compressor;
use crate::consts::{JOB_WORK_DIR_MODE, MONIT_EXTENSION, MONIT_FILE, TMP_DIR_MODE};
use crate::models::Job;
use crate::platform::DirProvider;
use crate::supervisor::JobSupervisor;

pub struct RenderedJobApplier<C, P> {
  collection: C,
  packages: P,
  blobs: Arc<dyn BlobSource>,
  compressor: Arc<dyn Compressor>,
  supervisor: Arc<dyn JobSupervisor>,
  dirs: DirProvider,
  ctx: BundleContext,
}

impl<C: BundleCollection, P: PackageApplierProvider> RenderedJobApplier<C, P> {
  pub fn new(
    collection: C,
    packages: P,
    blobs: Arc<dyn BlobSource>,
    compressor: Arc<dyn Compressor>,
    supervisor: Arc<dyn JobSupervisor>,
    dirs: DirProvider,
    ctx: BundleContext,
  ) -> Self {
    Self {
      collection,
      packages,
      blobs,
      compressor,
      supervisor,
      dirs,
      ctx,
    }
  }

  fn job_bundle(&self, job: &Job) -> Result<C::Bundle, ApplierError> {
    let definition = job.bundle_definition().map_err(ApplierError::model("Getting job bundle"))?;
    self
      .collection
      .get(&definition)
      .map_err(ApplierError::bundle("Getting job bundle"))
  }

  fn download_and_install(&self, job: &Job, bundle: &C::Bundle) -> Result<(), ApplierError> {
    let tmp_root = self.dirs.tmp_dir();
    self
      .ctx
      .fs
      .mkdir_all(&tmp_root, TMP_DIR_MODE)
      .map_err(ApplierError::io("Creating temp dir", &tmp_root))?;
    let tmp = tempfile::Builder::new()
      .prefix("bosh-agent-applier-jobs")
      .tempdir_in(&tmp_root)
      .map_err(ApplierError::io("Creating temp dir in", &tmp_root))?;

    let source = &job.source;
    let blob = self
      .blobs
      .get(
        &source.digest,
        source.signed_url.as_deref(),
        &source.blobstore_id,
        &source.headers,
      )
      .map_err(ApplierError::blob("Getting job source from blobstore"))?;

    let result = self
      .compressor
      .decompress_file_to_dir(&blob, tmp.path())
      .map_err(ApplierError::compress("Decompressing files for job"))
      .and_then(|()| {
        bundle
          .install(tmp.path(), &source.path_in_archive)
          .map_err(ApplierError::bundle("Installing job bundle"))
      })
      .and_then(|install_path| {
        fix_permissions(&*self.ctx.fs, &install_path, self.ctx.ownership.as_ref())
          .map_err(ApplierError::nested("Fixing job bundle permissions"))
      });

    if let Err(e) = self.blobs.clean_up(source.signed_url.as_deref(), &blob) {
      warn!(job = %job.name, blob = %blob.display(), error = %e, "failed to clean up job blob");
    }

    result
  }

  fn create_job_dirs(&self, job: &Job) -> Result<(), ApplierError> {
    let dirs = [
      self.dirs.job_log_dir(&job.name),
      self.dirs.job_run_dir(&job.name),
      self.dirs.job_data_dir(&job.name),
    ];

    for dir in &dirs {
      self
        .ctx
        .fs
        .mkdir_all(dir, JOB_WORK_DIR_MODE)
        .map_err(ApplierError::io("Creating job directory", dir))?;
      if let Some(ownership) = &self.ctx.ownership {
        self
          .ctx
          .fs
          .chown(dir, ownership)
          .map_err(ApplierError::io("Chowning job directory", dir))?;
      }
    }

    Ok(())
  }

  fn apply_packages(&self, job: &Job) -> Result<(), ApplierError> {
    let applier = self.packages.job_specific(&job.name);

    for package in &job.packages {
      applier.apply(package).map_err(ApplierError::nested(format!(
        "Applying package {} for job {}",
        package.name, job.name
      )))?;
    }

    applier
      .keep_only(&job.packages)
      .map_err(ApplierError::nested(format!("Keeping only needed packages for job {}", job.name)))
  }
}

impl<C: BundleCollection, P: PackageApplierProvider> Applier for RenderedJobApplier<C, P> {
  type Item = Job;

  fn prepare(&self, job: &Job) -> Result<(), ApplierError> {
    let bundle = self.job_bundle(job)?;

    let installed = bundle
      .is_installed()
      .map_err(ApplierError::bundle("Checking if job is installed"))?;
    if installed {
      debug!(job = %job.name, version = %job.version, "job already installed");
      return Ok(());
    }

    self.download_and_install(job, &bundle)
  }

  fn apply(&self, job: &Job) -> Result<(), ApplierError> {
    self.prepare(job)?;
    self.create_job_dirs(job)?;

    self
      .job_bundle(job)?
      .enable()
      .map_err(ApplierError::bundle("Enabling job"))?;

    self.apply_packages(job)?;

    info!(job = %job.name, version = %job.version, packages = job.packages.len(), "job applied");
    Ok(())
  }

  fn keep_only(&self, jobs: &[Job]) -> Result<(), ApplierError> {
    let installed = self
      .collection
      .list()
      .map_err(ApplierError::bundle("Finding all jobs"))?;

    let desired = jobs
      .iter()
      .map(|job| self.job_bundle(job))
      .collect::<Result<Vec<_>, _>>()?;

    for bundle in installed.iter().filter(|bundle| !desired.contains(bundle)) {
      bundle.disable().map_err(ApplierError::bundle("Disabling job bundle"))?;
      bundle.uninstall().map_err(ApplierError::bundle("Uninstalling job bundle"))?;
    }

    Ok(())
  }
}

impl<C: BundleCollection, P: PackageApplierProvider> JobApplier for RenderedJobApplier<C, P> {
  fn configure(&self, job: &Job, index: usize) -> Result<(), ApplierError> {
    let install_path = self
      .job_bundle(job)?
      .install_path()
      .map_err(ApplierError::bundle("Getting job install path"))?;

    let monit = install_path.join(MONIT_FILE);
    if self.ctx.fs.file_exists(&monit) {
      self
        .supervisor
        .add_job(&job.name, index, &monit)
        .map_err(ApplierError::supervisor("Adding monit configuration"))?;
    }

    let pattern = format!(
      "{}/*{}",
      glob::Pattern::escape(&install_path.to_string_lossy()),
      MONIT_EXTENSION
    );
    let extra = self
      .ctx
      .fs
      .glob(&pattern)
      .map_err(ApplierError::io("Looking for additional monit files in", &install_path))?;

    for path in extra {
      let Some(label) = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(MONIT_EXTENSION))
      else {
        continue;
      };

      let name = format!("{}_{}", job.name, label);
      self
        .supervisor
        .add_job(&name, index, &path)
        .map_err(ApplierError::supervisor("Adding additional monit configuration"))?;
    }

    Ok(())
  }

  fn delete_source_blobs(&self, jobs: &[Job]) -> Result<(), ApplierError> {
    let mut blobs: BTreeMap<&str, Option<&str>> = BTreeMap::new();
    for job in jobs {
      let source = &job.source;
      if source.blobstore_id.is_empty() {
        continue;
      }
      blobs
        .entry(source.blobstore_id.as_str())
        .or_insert(source.signed_url.as_deref());
    }

    for (blob_id, signed_url) in blobs {
      self
        .blobs
        .delete(signed_url, blob_id)
        .map_err(ApplierError::blob(format!("Deleting job source blob {blob_id}")))?;
      debug!(blob = %blob_id, "deleted job source blob");
    }

    Ok(())
  }
}
