//! Bounded condition polling

use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Upper bound and cadence for polling a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub fn from_millis(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(poll_interval_ms),
        )
    }

    pub fn start(self) -> Deadline {
        Deadline {
            started: Instant::now(),
            config: self,
        }
    }
}

/// A running wait. Check the condition first, then `tick()` until it gives up.
#[derive(Debug)]
pub struct Deadline {
    started: Instant,
    config: WaitConfig,
}

impl Deadline {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn expired(&self) -> bool {
        self.elapsed() >= self.config.timeout
    }

    /// Sleep one poll interval (clamped to what is left).
    /// Returns false without sleeping once the deadline has passed.
    pub async fn tick(&self) -> bool {
        let elapsed = self.elapsed();
        if elapsed >= self.config.timeout {
            return false;
        }
        sleep(self.config.poll_interval.min(self.config.timeout - elapsed)).await;
        true
    }
}
