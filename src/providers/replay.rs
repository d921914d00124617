//! Replay sensor for recorded accelerometer traces

use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace};

use crate::provider::SensorProvider;
use crate::types::AccelerationSample;
use crate::{CollectionError, Result};

/// Sensor that replays a recorded trace.
///
/// A `None` entry stands for a failed read. When the trace runs out the
/// sensor either starts over or keeps failing, depending on `looping`.
#[derive(Debug, Clone)]
pub struct ReplaySensor {
    trace: Vec<Option<AccelerationSample>>,
    pending: VecDeque<Option<AccelerationSample>>,
    looping: bool,
    latency: Option<Duration>,
}

impl ReplaySensor {
    /// Play `trace` once.
    pub fn new(trace: Vec<Option<AccelerationSample>>) -> Self {
        let pending = trace.iter().copied().collect();
        Self { trace, pending, looping: false, latency: None }
    }

    /// Play `trace` forever.
    pub fn looping(trace: Vec<Option<AccelerationSample>>) -> Self {
        Self { looping: true, ..Self::new(trace) }
    }

    /// Constant reading, every period.
    pub fn constant(sample: AccelerationSample) -> Self {
        Self::looping(vec![Some(sample)])
    }

    /// Delay every read, e.g. to exercise the driver's read timeout.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Parse a YAML trace: a sequence of `[x, y, z]` triples, `~` for a failed read.
    pub fn from_yaml(yaml: &str, looping: bool) -> Result<Self> {
        let raw: Vec<Option<[i16; 3]>> = serde_yaml_ng::from_str(yaml)?;
        let trace = raw.into_iter().map(|r| r.map(|[x, y, z]| AccelerationSample::new(x, y, z))).collect();
        Ok(if looping { Self::looping(trace) } else { Self::new(trace) })
    }

    /// Readings not yet replayed in the current pass.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait::async_trait]
impl SensorProvider for ReplaySensor {
    async fn read(&mut self) -> Result<AccelerationSample> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.pending.is_empty() && self.looping && !self.trace.is_empty() {
            debug!(len = self.trace.len(), "Restarting sensor trace");
            self.pending.extend(self.trace.iter().copied());
        }

        match self.pending.pop_front() {
            Some(Some(sample)) => {
                trace!(x = sample.x, y = sample.y, z = sample.z, "Replayed reading");
                Ok(sample)
            }
            Some(None) => Err(CollectionError::sample_unavailable("recorded read failure")),
            None => Err(CollectionError::sample_unavailable("trace exhausted")),
        }
    }
}
