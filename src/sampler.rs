//! Periodic sample production

use tracing::{debug, trace};

use crate::types::{AccelerationSample, Millis};
use crate::Result;

/// Turns sensor reads into at most one sample per period.
///
/// A failed read skips the cycle; nothing is retried because the next period
/// supersedes it. Downstream back-pressure never delays the schedule, and a
/// late tick does not shift it: due times stay on `start + k * period`.
#[derive(Debug)]
pub struct SampleSource {
    period: Millis,
    next_due: Millis,
    produced: u64,
    missed: u64,
}

impl SampleSource {
    /// First sample is due at `start`.
    pub fn new(period: Millis, start: Millis) -> Self {
        Self { period, next_due: start, produced: 0, missed: 0 }
    }

    pub fn period(&self) -> Millis {
        self.period
    }

    pub fn due(&self, now: Millis) -> bool {
        now >= self.next_due
    }

    pub fn next_due(&self) -> Millis {
        self.next_due
    }

    /// Account for one timer firing at `now`.
    pub fn on_tick(&mut self, now: Millis, reading: Result<AccelerationSample>) -> Option<AccelerationSample> {
        if now >= self.next_due {
            let period = self.period.max(1);
            let elapsed = (now - self.next_due) / period + 1;
            if elapsed > 1 {
                debug!(now, skipped = elapsed - 1, "Sampling periods passed without a tick");
            }
            self.next_due += elapsed * period;
        }
        match reading {
            Ok(sample) => {
                self.produced += 1;
                trace!(now, x = sample.x, y = sample.y, z = sample.z, "Sample taken");
                Some(sample)
            }
            Err(e) => {
                self.missed += 1;
                debug!(now, "Skipping sampling cycle: {}", e);
                None
            }
        }
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub fn missed(&self) -> u64 {
        self.missed
    }
}
