//! The compile pipeline.
//!
//! ```text
//! keep_only([])            clean slate for dependencies
//! apply(dep) for each dep  download + enable
//! fetch + extract source   <compile>/<pkg>, via <pkg>-bosh-agent-unpack
//! install + enable output  BOSH_INSTALL_TARGET
//! run `packaging`          if present
//! compress + upload        new blob ID and digest
//! disable + uninstall      no local install is left behind
//! keep_only([])            drop dependencies again
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::applier::PackageApplierProvider;
use crate::blob::BlobSource;
use crate::bundle::{Bundle, BundleCollection, BundleContext, BundleDefinition};
use crate::compiler::{CompileError, CompilePackage, CompiledPackage, Compiler};
use crate::compress::Compressor;
use crate::consts::{PACKAGE_FILE_MODE, PACKAGING_SCRIPT, UNPACK_SUFFIX};
use crate::models::{Package, Source};
use crate::runner::{Command, CommandRunner};

const COMPILE_LOG_DIR: &str = "compilation";

pub struct ConcreteCompiler<P> {
  packages: P,
  blobs: Arc<dyn BlobSource>,
  compressor: Arc<dyn Compressor>,
  runner: Arc<dyn CommandRunner>,
  compile_root: PathBuf,
  ctx: BundleContext,
}

impl<P: PackageApplierProvider> ConcreteCompiler<P> {
  pub fn new(
    packages: P,
    blobs: Arc<dyn BlobSource>,
    compressor: Arc<dyn Compressor>,
    runner: Arc<dyn CommandRunner>,
    compile_root: impl Into<PathBuf>,
    ctx: BundleContext,
  ) -> Self {
    Self {
      packages,
      blobs,
      compressor,
      runner,
      compile_root: compile_root.into(),
      ctx,
    }
  }

  fn fetch_and_extract(&self, name: &str, source: &Source, target: &Path) -> Result<(), CompileError> {
    let blob = self
      .blobs
      .get(
        &source.digest,
        source.signed_url.as_deref(),
        &source.blobstore_id,
        &source.headers,
      )
      .map_err(CompileError::blob(format!("Fetching package {name}")))?;

    let result = self.atomically_extract(&blob, target);

    if let Err(e) = self.blobs.clean_up(source.signed_url.as_deref(), &blob) {
      warn!(package = %name, blob = %blob.display(), error = %e, "failed to clean up package blob");
    }

    result
  }

  /// Unpack into a sibling directory and rename it into place, so `target`
  /// never holds a partial extraction.
  fn atomically_extract(&self, archive: &Path, target: &Path) -> Result<(), CompileError> {
    let fs = &self.ctx.fs;
    let unpack = unpack_dir(target);

    fs.remove_all(target)
      .map_err(CompileError::io("Removing stale compile target", target))?;
    fs.remove_all(&unpack)
      .map_err(CompileError::io("Removing stale unpack dir", &unpack))?;
    fs.mkdir_all(&unpack, PACKAGE_FILE_MODE)
      .map_err(CompileError::io("Creating unpack dir", &unpack))?;

    self
      .compressor
      .decompress_file_to_dir(archive, &unpack)
      .map_err(CompileError::compress("Extracting package source"))?;

    self
      .ctx
      .retry
      .run(&*self.ctx.clock, "rename unpacked package", || fs.rename(&unpack, target))
      .map_err(CompileError::io("Moving unpacked package to", target))
  }

  fn run_packaging(
    &self,
    package: &CompilePackage,
    compile_target: &Path,
    install_target: &Path,
  ) -> Result<(), CompileError> {
    if !self.ctx.fs.file_exists(&compile_target.join(PACKAGING_SCRIPT)) {
      info!(package = %package.name, "no packaging script, skipping");
      return Ok(());
    }

    let command = packaging_command()
      .env("BOSH_COMPILE_TARGET", compile_target.to_string_lossy())
      .env("BOSH_INSTALL_TARGET", install_target.to_string_lossy())
      .env("BOSH_PACKAGE_NAME", &package.name)
      .env("BOSH_PACKAGE_VERSION", &package.version)
      .working_dir(compile_target);

    self
      .runner
      .run_command(COMPILE_LOG_DIR, PACKAGING_SCRIPT, &command)
      .map_err(CompileError::runner("Running packaging script"))?;

    Ok(())
  }

  fn upload(&self, package: &CompilePackage, install_path: &Path) -> Result<CompiledPackage, CompileError> {
    let archive = self
      .compressor
      .compress_files_in_dir(install_path)
      .map_err(CompileError::compress("Compressing compiled package"))?;

    let uploaded = self
      .blobs
      .write(package.upload_signed_url.as_deref(), &archive, &package.upload_headers)
      .map_err(CompileError::blob("Uploading compiled package"));

    if let Err(e) = self.compressor.clean_up(&archive) {
      warn!(package = %package.name, archive = %archive.display(), error = %e, "failed to clean up compiled archive");
    }

    let (blob_id, digest) = uploaded?;
    Ok(CompiledPackage { blob_id, digest })
  }

  fn run_pipeline(
    &self,
    package: &CompilePackage,
    dependencies: &[Package],
    compile_target: &Path,
  ) -> Result<CompiledPackage, CompileError> {
    let applier = self.packages.root();

    applier
      .keep_only(&[])
      .map_err(CompileError::applier("Removing packages"))?;

    for dependency in dependencies {
      applier
        .apply(dependency)
        .map_err(CompileError::applier(format!("Installing dependent package {}", dependency.name)))?;
    }

    self.fetch_and_extract(&package.name, &package.source, compile_target)?;

    let bundle = self
      .packages
      .root_bundle_collection()
      .get(&BundleDefinition::new(&package.name, &package.version))
      .map_err(CompileError::bundle("Getting compiled package bundle"))?;
    bundle
      .install_without_contents()
      .map_err(CompileError::bundle("Setting up new package bundle"))?;
    let install_target = bundle
      .enable()
      .map_err(CompileError::bundle("Enabling package bundle"))?;

    self.run_packaging(package, compile_target, &install_target)?;

    let install_path = bundle
      .install_path()
      .map_err(CompileError::bundle("Getting compiled package install path"))?;
    let compiled = self.upload(package, &install_path)?;

    bundle
      .disable()
      .map_err(CompileError::bundle("Disabling compiled package"))?;
    bundle
      .uninstall()
      .map_err(CompileError::bundle("Uninstalling compiled package"))?;

    applier
      .keep_only(&[])
      .map_err(CompileError::applier("Removing packages"))?;

    Ok(compiled)
  }
}

impl<P: PackageApplierProvider> Compiler for ConcreteCompiler<P> {
  fn compile(&self, package: &CompilePackage, dependencies: &[Package]) -> Result<CompiledPackage, CompileError> {
    let source = &package.source;
    if source.blobstore_id.is_empty() && source.signed_url.is_none() {
      return Err(CompileError::MissingSource(package.name.clone()));
    }

    info!(package = %package.name, version = %package.version, deps = dependencies.len(), "compiling package");

    self
      .ctx
      .fs
      .mkdir_all(&self.compile_root, PACKAGE_FILE_MODE)
      .map_err(CompileError::io("Creating compile dir", &self.compile_root))?;
    let compile_target = self.compile_root.join(&package.name);

    let result = self.run_pipeline(package, dependencies, &compile_target);

    if let Err(e) = self.ctx.fs.remove_all(&compile_target) {
      warn!(package = %package.name, dir = %compile_target.display(), error = %e, "failed to remove compile dir");
    }

    let compiled = result?;
    info!(package = %package.name, blob = %compiled.blob_id, digest = %compiled.digest, "package compiled");
    Ok(compiled)
  }
}

fn unpack_dir(target: &Path) -> PathBuf {
  let mut name = OsString::from(target.as_os_str());
  name.push(UNPACK_SUFFIX);
  PathBuf::from(name)
}

#[cfg(not(windows))]
fn packaging_command() -> Command {
  Command::new("bash").arg("-x").arg(PACKAGING_SCRIPT)
}

#[cfg(windows)]
fn packaging_command() -> Command {
  Command::new("powershell")
    .arg("-NoProfile")
    .arg("-NonInteractive")
    .arg("-Command")
    .arg(format!("& ./{PACKAGING_SCRIPT}"))
}
