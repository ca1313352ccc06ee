//! Scavenge Timer - Timing Utilities

use std::time::{Duration, Instant};

/// Timer for one pass or one task
#[derive(Debug, Clone, Copy)]
pub struct ScavengeTimer {
    start: Instant,
}

impl ScavengeTimer {
    /// Start a timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for ScavengeTimer {
    fn default() -> Self {
        Self::start()
    }
}
