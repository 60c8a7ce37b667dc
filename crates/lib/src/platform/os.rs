/// Operating system families the agent distinguishes between.
///
/// Only filesystem behavior differs per family: Windows keeps file handles
/// open for a while after a process exits, so removals and renames there need
/// a retry window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Whether removing or renaming a directory may transiently fail because
  /// another process still holds a handle inside it.
  pub fn holds_file_handles(&self) -> bool {
    matches!(self, Self::Windows)
  }
}
