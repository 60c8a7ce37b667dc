//! Bounded retry for filesystem mutations that can be transiently blocked.
//!
//! The policy is chosen once per process from the target OS and threaded into
//! every bundle and the compiler, so reconciliation code stays platform
//! agnostic and tests can drive the loop with a fake clock.

use std::time::Duration;

use tracing::warn;

use crate::consts::{RETRY_INTERVAL, RETRY_TIMEOUT};
use crate::platform::clock::Clock;
use crate::platform::os::Os;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
  /// A single attempt; its error is returned as is.
  Once,
  /// Poll every `interval` until an attempt succeeds or more than `timeout`
  /// has elapsed since the first attempt.
  Bounded { interval: Duration, timeout: Duration },
}

impl RetryPolicy {
  pub fn bounded(interval: Duration, timeout: Duration) -> Self {
    Self::Bounded { interval, timeout }
  }

  pub fn for_os(os: Os) -> Self {
    if os.holds_file_handles() {
      Self::bounded(RETRY_INTERVAL, RETRY_TIMEOUT)
    } else {
      Self::Once
    }
  }

  /// Policy for the running OS. Unknown platforms get a single attempt.
  pub fn current() -> Self {
    Os::current().map(Self::for_os).unwrap_or(Self::Once)
  }

  /// Run `op` under this policy.
  ///
  /// Once the window is exhausted the last error from `op` is returned, not a
  /// synthetic timeout, so callers see the real cause.
  pub fn run<T, E, F>(&self, clock: &dyn Clock, what: &str, mut op: F) -> Result<T, E>
  where
    E: std::fmt::Display,
    F: FnMut() -> Result<T, E>,
  {
    let (interval, timeout) = match *self {
      Self::Once => return op(),
      Self::Bounded { interval, timeout } => (interval, timeout),
    };

    let start = clock.now();
    let mut attempt = 1u32;
    loop {
      match op() {
        Ok(value) => return Ok(value),
        Err(e) => {
          if clock.since(start) > timeout {
            return Err(e);
          }
          warn!(operation = %what, attempt, error = %e, "retrying after failure");
          clock.sleep(interval);
          attempt += 1;
        }
      }
    }
  }
}
