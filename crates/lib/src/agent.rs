//! Wires configuration and collaborators into ready-to-use appliers and a
//! compiler.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::applier::{Applier, FilePackageApplierProvider, JobApplier, PackageApplierProvider, RenderedJobApplier};
use crate::blob::{BlobSource, LocalBlobSource};
use crate::bundle::{BundleContext, FileBundleCollection};
use crate::compiler::{Compiler, ConcreteCompiler};
use crate::compress::{Compressor, TarGzCompressor};
use crate::config::AgentConfig;
use crate::consts::JOBS_COLLECTION;
use crate::models::Package;
use crate::platform::{DirProvider, OsFileSystem, SystemClock};
use crate::runner::{CommandRunner, ProcessRunner};
use crate::supervisor::{JobSupervisor, MonitFileSupervisor};

/// External services the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
  pub blobs: Arc<dyn BlobSource>,
  pub compressor: Arc<dyn Compressor>,
  pub runner: Arc<dyn CommandRunner>,
  pub supervisor: Arc<dyn JobSupervisor>,
}

impl Collaborators {
  /// Local implementations: blobs from `blob_dir`, tarball archives, host
  /// processes and monit config files.
  pub fn local(dirs: &DirProvider, blob_dir: &Path) -> Self {
    Self {
      blobs: Arc::new(LocalBlobSource::new(blob_dir, dirs.tmp_dir())),
      compressor: Arc::new(TarGzCompressor::new(dirs.tmp_dir())),
      runner: Arc::new(ProcessRunner::new(dirs.command_logs_dir())),
      supervisor: Arc::new(MonitFileSupervisor::new(dirs.monit_jobs_dir())),
    }
  }
}

pub struct Agent {
  dirs: DirProvider,
  packages: Box<dyn Applier<Item = Package>>,
  jobs: RenderedJobApplier<FileBundleCollection, FilePackageApplierProvider>,
  compiler: ConcreteCompiler<FilePackageApplierProvider>,
}

impl Agent {
  /// Host filesystem and clock; retry policy and ownership from `config`.
  pub fn new(config: &AgentConfig, collaborators: Collaborators) -> Self {
    let ctx = BundleContext {
      fs: Arc::new(OsFileSystem),
      clock: Arc::new(SystemClock),
      retry: config.retry_policy(),
      ownership: config.ownership.clone(),
    };
    Self::with_context(config, ctx, collaborators)
  }

  pub fn with_context(config: &AgentConfig, ctx: BundleContext, collaborators: Collaborators) -> Self {
    let dirs = config.dirs();
    let provider = FilePackageApplierProvider::new(
      dirs.clone(),
      config.package_file_mode,
      ctx.clone(),
      collaborators.blobs.clone(),
      collaborators.compressor.clone(),
    );

    let job_collection = FileBundleCollection::new(
      dirs.data_dir(),
      dirs.base_dir(),
      JOBS_COLLECTION,
      config.job_file_mode,
      ctx.clone(),
    );
    let jobs = RenderedJobApplier::new(
      job_collection,
      provider.clone(),
      collaborators.blobs.clone(),
      collaborators.compressor.clone(),
      collaborators.supervisor.clone(),
      dirs.clone(),
      ctx.clone(),
    );

    let compiler = ConcreteCompiler::new(
      provider.clone(),
      collaborators.blobs,
      collaborators.compressor,
      collaborators.runner,
      dirs.compile_dir(),
      ctx.clone(),
    );

    info!(base_dir = %dirs.base_dir().display(), retry = ?ctx.retry, ownership = ?ctx.ownership, "agent wired");
    Self {
      packages: provider.root(),
      dirs,
      jobs,
      compiler,
    }
  }

  pub fn dirs(&self) -> &DirProvider {
    &self.dirs
  }

  /// The owning, system-wide package applier.
  pub fn package_applier(&self) -> &dyn Applier<Item = Package> {
    &*self.packages
  }

  pub fn job_applier(&self) -> &impl JobApplier {
    &self.jobs
  }

  pub fn compiler(&self) -> &impl Compiler {
    &self.compiler
  }
}
