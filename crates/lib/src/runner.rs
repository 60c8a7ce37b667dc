//! Command execution with per-command log files.
//!
//! Commands run with the agent's environment plus any variables they declare.
//! Output is captured to `<logs_root>/<log_dir>/<log_file>.{stdout,stderr}.log`
//! so a failed packaging script can be inspected after the fact.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tracing::{debug, info};

/// Bytes of captured output kept in [`CommandResult`] and error messages.
const OUTPUT_TAIL_LEN: usize = 8 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
  pub name: String,
  pub args: Vec<String>,
  pub env: BTreeMap<String, String>,
  pub working_dir: Option<PathBuf>,
}

impl Command {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Self::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.working_dir = Some(dir.into());
    self
  }

  fn display(&self) -> String {
    std::iter::once(self.name.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
  /// Tail of stdout.
  pub stdout: String,
  /// Tail of stderr.
  pub stderr: String,
  pub exit_status: i32,
  pub stdout_path: PathBuf,
  pub stderr_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum RunnerError {
  #[error("command '{cmd}' exited with status {code:?}: {stderr}")]
  Failed {
    cmd: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("{context} {path}: {source}")]
  Io {
    context: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

pub trait CommandRunner: Send + Sync {
  fn run_command(&self, log_dir: &str, log_file: &str, command: &Command) -> Result<CommandResult, RunnerError>;
}

/// [`CommandRunner`] that spawns host processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
  logs_root: PathBuf,
}

impl ProcessRunner {
  pub fn new(logs_root: impl Into<PathBuf>) -> Self {
    Self {
      logs_root: logs_root.into(),
    }
  }
}

fn read_tail(path: &Path) -> String {
  let content = fs::read(path).unwrap_or_default();
  let start = content.len().saturating_sub(OUTPUT_TAIL_LEN);
  String::from_utf8_lossy(&content[start..]).trim().to_string()
}

impl CommandRunner for ProcessRunner {
  fn run_command(&self, log_dir: &str, log_file: &str, command: &Command) -> Result<CommandResult, RunnerError> {
    let dir = self.logs_root.join(log_dir);
    fs::create_dir_all(&dir).map_err(|source| RunnerError::Io {
      context: "Creating log dir",
      path: dir.clone(),
      source,
    })?;

    let stdout_path = dir.join(format!("{log_file}.stdout.log"));
    let stderr_path = dir.join(format!("{log_file}.stderr.log"));
    let create = |path: &Path| {
      File::create(path).map_err(|source| RunnerError::Io {
        context: "Creating log file",
        path: path.to_path_buf(),
        source,
      })
    };
    let stdout = create(&stdout_path)?;
    let stderr = create(&stderr_path)?;

    let mut process = std::process::Command::new(&command.name);
    process
      .args(&command.args)
      .envs(&command.env)
      .stdin(Stdio::null())
      .stdout(Stdio::from(stdout))
      .stderr(Stdio::from(stderr));
    if let Some(working_dir) = &command.working_dir {
      process.current_dir(working_dir);
    }

    let cmd = command.display();
    info!(cmd = %cmd, working_dir = ?command.working_dir, "running command");

    let status = process.status().map_err(|source| RunnerError::Io {
      context: "Spawning",
      path: PathBuf::from(&command.name),
      source,
    })?;

    let stdout = read_tail(&stdout_path);
    let stderr = read_tail(&stderr_path);

    if !status.success() {
      debug!(stdout = %stdout, stderr = %stderr, "command failed");
      return Err(RunnerError::Failed {
        cmd,
        code: status.code(),
        stderr,
      });
    }

    Ok(CommandResult {
      stdout,
      stderr,
      exit_status: status.code().unwrap_or_default(),
      stdout_path,
      stderr_path,
    })
  }
}
