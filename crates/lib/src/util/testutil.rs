//! Test utilities for steward-lib.
//!
//! Fakes for the collaborator seams plus cross-platform helpers for tests
//! that need to run shell commands or build archives.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::blob::{BlobError, BlobSource, Headers};
use crate::bundle::{Bundle, BundleCollection, BundleContext, BundleDefinition, BundleError};
use crate::compress::{Compressor, TarGzCompressor};
use crate::platform::{Clock, FileSystem, OsFileSystem, Ownership, RetryPolicy};
use crate::runner::{Command, CommandResult, CommandRunner, RunnerError};
use crate::supervisor::{JobSupervisor, SupervisorError};
use crate::util::hash::BlobDigest;

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Context with a fake clock, single-attempt retries and no chown.
pub fn test_context(fs: Arc<dyn FileSystem>) -> BundleContext {
  BundleContext {
    fs,
    clock: Arc::new(FakeClock::new()),
    retry: RetryPolicy::Once,
    ownership: None,
  }
}

/// Write `files` into a fresh directory under `scratch` and pack it as a
/// gzipped tarball.
pub fn tgz_of(scratch: &Path, files: &[(&str, &str)]) -> PathBuf {
  let content = tempfile::Builder::new().prefix("content-").tempdir_in(scratch).unwrap();
  for (name, body) in files {
    let path = content.path().join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
  }
  TarGzCompressor::new(scratch).compress_files_in_dir(content.path()).unwrap()
}

/// Clock whose sleeps advance virtual time instantly.
#[derive(Debug)]
pub struct FakeClock {
  now: Mutex<Instant>,
  sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
  pub fn new() -> Self {
    Self {
      now: Mutex::new(Instant::now()),
      sleeps: Mutex::new(Vec::new()),
    }
  }

  pub fn sleeps(&self) -> Vec<Duration> {
    self.sleeps.lock().unwrap().clone()
  }
}

impl Default for FakeClock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock for FakeClock {
  fn now(&self) -> Instant {
    *self.now.lock().unwrap()
  }

  fn sleep(&self, duration: Duration) {
    *self.now.lock().unwrap() += duration;
    self.sleeps.lock().unwrap().push(duration);
  }
}

/// Real filesystem that fails a configurable number of mkdirs, removals or
/// renames and can answer globs with canned paths.
#[derive(Debug, Default)]
pub struct FlakyFs {
  inner: OsFileSystem,
  mkdir_failures: AtomicUsize,
  removal_failures: AtomicUsize,
  rename_failures: AtomicUsize,
  glob_results: Mutex<Option<Vec<PathBuf>>>,
}

impl FlakyFs {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fail the next `count` calls to `mkdir_all`.
  pub fn fail_mkdirs(&self, count: usize) {
    self.mkdir_failures.store(count, Ordering::SeqCst);
  }

  /// Fail the next `count` calls to `remove_all`.
  pub fn fail_removals(&self, count: usize) {
    self.removal_failures.store(count, Ordering::SeqCst);
  }

  /// Fail the next `count` calls to `rename`.
  pub fn fail_renames(&self, count: usize) {
    self.rename_failures.store(count, Ordering::SeqCst);
  }

  pub fn set_glob_results(&self, paths: Vec<PathBuf>) {
    *self.glob_results.lock().unwrap() = Some(paths);
  }

  fn take_failure(counter: &AtomicUsize) -> bool {
    counter
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok()
  }
}

impl FileSystem for FlakyFs {
  fn file_exists(&self, path: &Path) -> bool {
    self.inner.file_exists(path)
  }

  fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
    if Self::take_failure(&self.mkdir_failures) {
      return Err(io::Error::other("fake mkdir failure"));
    }
    self.inner.mkdir_all(path, mode)
  }

  fn chown(&self, path: &Path, ownership: &Ownership) -> io::Result<()> {
    self.inner.chown(path, ownership)
  }

  fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
    self.inner.chmod(path, mode)
  }

  fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
    if Self::take_failure(&self.rename_failures) {
      return Err(io::Error::other("fake rename failure"));
    }
    self.inner.rename(from, to)
  }

  fn remove_all(&self, path: &Path) -> io::Result<()> {
    if Self::take_failure(&self.removal_failures) {
      return Err(io::Error::other("fake removal failure"));
    }
    self.inner.remove_all(path)
  }

  fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
    self.inner.symlink(target, link)
  }

  fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
    self.inner.read_link(path)
  }

  fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
    match &*self.glob_results.lock().unwrap() {
      Some(paths) => Ok(paths.clone()),
      None => self.inner.glob(pattern),
    }
  }
}

#[derive(Debug, Default)]
struct RecordedState {
  calls: Vec<&'static str>,
  installed: bool,
  enabled: bool,
}

/// In-memory bundle that records every lifecycle call made on it.
#[derive(Debug, Clone)]
pub struct RecordingBundle {
  definition: BundleDefinition,
  state: Arc<Mutex<RecordedState>>,
  failing: Arc<Mutex<Option<&'static str>>>,
}

impl RecordingBundle {
  fn new(definition: BundleDefinition) -> Self {
    Self {
      definition,
      state: Arc::default(),
      failing: Arc::default(),
    }
  }

  pub fn calls(&self) -> Vec<&'static str> {
    self.state.lock().unwrap().calls.clone()
  }

  pub fn is_enabled(&self) -> bool {
    self.state.lock().unwrap().enabled
  }

  /// Make the named call (`"Disable"`, `"Uninstall"`, ...) fail from now on.
  pub fn fail_on(&self, call: &'static str) {
    *self.failing.lock().unwrap() = Some(call);
  }

  fn path(&self) -> PathBuf {
    PathBuf::from("/fake").join(&self.definition.name).join(&self.definition.version)
  }

  fn record(&self, call: &'static str) -> Result<(), BundleError> {
    self.state.lock().unwrap().calls.push(call);
    if *self.failing.lock().unwrap() == Some(call) {
      return Err(BundleError::Io {
        context: call,
        path: self.path(),
        source: io::Error::other("fake bundle failure"),
      });
    }
    Ok(())
  }
}

impl PartialEq for RecordingBundle {
  fn eq(&self, other: &Self) -> bool {
    self.definition == other.definition
  }
}

impl Bundle for RecordingBundle {
  fn install(&self, _source_path: &Path, _path_in_bundle: &str) -> Result<PathBuf, BundleError> {
    self.record("Install")?;
    self.state.lock().unwrap().installed = true;
    Ok(self.path())
  }

  fn install_without_contents(&self) -> Result<PathBuf, BundleError> {
    self.record("InstallWithoutContents")?;
    self.state.lock().unwrap().installed = true;
    Ok(self.path())
  }

  fn uninstall(&self) -> Result<(), BundleError> {
    self.record("Uninstall")?;
    self.state.lock().unwrap().installed = false;
    Ok(())
  }

  fn is_installed(&self) -> Result<bool, BundleError> {
    Ok(self.state.lock().unwrap().installed)
  }

  fn install_path(&self) -> Result<PathBuf, BundleError> {
    if !self.state.lock().unwrap().installed {
      return Err(BundleError::InstallDirMissing);
    }
    Ok(self.path())
  }

  fn enable(&self) -> Result<PathBuf, BundleError> {
    self.record("Enable")?;
    let mut state = self.state.lock().unwrap();
    if !state.installed {
      return Err(BundleError::NotInstalled);
    }
    state.enabled = true;
    Ok(self.path())
  }

  fn disable(&self) -> Result<(), BundleError> {
    self.record("Disable")?;
    self.state.lock().unwrap().enabled = false;
    Ok(())
  }
}

/// Collection of [`RecordingBundle`]s keyed by definition.
#[derive(Debug, Clone, Default)]
pub struct RecordingCollection {
  bundles: Arc<Mutex<BTreeMap<BundleDefinition, RecordingBundle>>>,
}

impl RecordingCollection {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a bundle that already counts as installed; its call log starts
  /// empty.
  pub fn preinstall(&self, definition: BundleDefinition) -> RecordingBundle {
    let bundle = RecordingBundle::new(definition.clone());
    bundle.state.lock().unwrap().installed = true;
    self.bundles.lock().unwrap().insert(definition, bundle.clone());
    bundle
  }
}

impl BundleCollection for RecordingCollection {
  type Bundle = RecordingBundle;

  fn get(&self, definition: &BundleDefinition) -> Result<RecordingBundle, BundleError> {
    definition.validate()?;
    let mut bundles = self.bundles.lock().unwrap();
    let bundle = bundles
      .entry(definition.clone())
      .or_insert_with(|| RecordingBundle::new(definition.clone()));
    Ok(bundle.clone())
  }

  fn list(&self) -> Result<Vec<RecordingBundle>, BundleError> {
    let bundles = self.bundles.lock().unwrap();
    Ok(bundles.values().filter(|b| b.state.lock().unwrap().installed).cloned().collect())
  }
}

/// Blob source that only records deletions.
#[derive(Debug, Default)]
pub struct DeleteRecordingBlobSource {
  deleted: Mutex<Vec<String>>,
}

impl DeleteRecordingBlobSource {
  pub fn deleted(&self) -> Vec<String> {
    self.deleted.lock().unwrap().clone()
  }
}

impl BlobSource for DeleteRecordingBlobSource {
  fn get(&self, _: &str, _: Option<&str>, blobstore_id: &str, _: &Headers) -> Result<PathBuf, BlobError> {
    Err(BlobError::NotFound(blobstore_id.to_string()))
  }

  fn write(&self, _: Option<&str>, path: &Path, _: &Headers) -> Result<(String, BlobDigest), BlobError> {
    Err(BlobError::NotFound(path.display().to_string()))
  }

  fn clean_up(&self, _: Option<&str>, _: &Path) -> Result<(), BlobError> {
    Ok(())
  }

  fn delete(&self, _: Option<&str>, blob_id: &str) -> Result<(), BlobError> {
    self.deleted.lock().unwrap().push(blob_id.to_string());
    Ok(())
  }
}

/// Supervisor that records `(name, index, config_path)` registrations.
#[derive(Debug, Default)]
pub struct RecordingSupervisor {
  added: Mutex<Vec<(String, usize, PathBuf)>>,
}

impl RecordingSupervisor {
  pub fn added(&self) -> Vec<(String, usize, PathBuf)> {
    self.added.lock().unwrap().clone()
  }
}

impl JobSupervisor for RecordingSupervisor {
  fn add_job(&self, name: &str, index: usize, config_path: &Path) -> Result<(), SupervisorError> {
    self
      .added
      .lock()
      .unwrap()
      .push((name.to_string(), index, config_path.to_path_buf()));
    Ok(())
  }
}

/// Runner that records commands without executing them.
#[derive(Debug, Default)]
pub struct RecordingRunner {
  commands: Mutex<Vec<(String, String, Command)>>,
}

impl RecordingRunner {
  pub fn commands(&self) -> Vec<(String, String, Command)> {
    self.commands.lock().unwrap().clone()
  }
}

impl CommandRunner for RecordingRunner {
  fn run_command(&self, log_dir: &str, log_file: &str, command: &Command) -> Result<CommandResult, RunnerError> {
    self
      .commands
      .lock()
      .unwrap()
      .push((log_dir.to_string(), log_file.to_string(), command.clone()));
    Ok(CommandResult {
      stdout: String::new(),
      stderr: String::new(),
      exit_status: 0,
      stdout_path: PathBuf::from(log_dir).join(format!("{log_file}.stdout.log")),
      stderr_path: PathBuf::from(log_dir).join(format!("{log_file}.stderr.log")),
    })
  }
}
