use std::time::{Duration, Instant};

/// Time source used by retry loops.
pub trait Clock: Send + Sync {
  fn now(&self) -> Instant;

  fn since(&self, start: Instant) -> Duration {
    self.now().saturating_duration_since(start)
  }

  fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> Instant {
    Instant::now()
  }

  fn sleep(&self, duration: Duration) {
    std::thread::sleep(duration);
  }
}
