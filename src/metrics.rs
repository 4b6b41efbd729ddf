//! Metrics boundary for the observability collaborator.
//!
//! The orchestrator emits a small fixed set of samples (decomposition and
//! battle counters/durations); where they go is the caller's concern. The
//! sink is a trait so the transport can be anything from a no-op to a full
//! telemetry pipeline.

use std::sync::Mutex;

/// A single named measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: &'static str,
    pub value: f64,
}

impl MetricSample {
    pub fn new(name: &'static str, value: f64) -> Self {
        Self { name, value }
    }
}

/// Receiver for metric samples.
///
/// Implementations must tolerate being called from async contexts; `record`
/// must not block.
pub trait MetricsSink: Send + Sync {
    fn record(&self, sample: MetricSample);
}

/// Discards all samples.
#[derive(Debug, Default)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&self, _sample: MetricSample) {}
}

/// Buffers samples in memory; used by tests to assert on emissions.
#[derive(Debug, Default)]
pub struct MemorySink {
    samples: Mutex<Vec<MetricSample>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all samples recorded so far.
    pub fn samples(&self) -> Vec<MetricSample> {
        self.samples.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// The last recorded value for a metric name, if any.
    pub fn last_value(&self, name: &str) -> Option<f64> {
        self.samples
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|s| s.name == name)
            .map(|s| s.value)
    }
}

impl MetricsSink for MemorySink {
    fn record(&self, sample: MetricSample) {
        if let Ok(mut samples) = self.samples.lock() {
            samples.push(sample);
        }
    }
}

/// Forwards samples to the fray log at DEBUG level.
#[derive(Debug, Default)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn record(&self, sample: MetricSample) {
        crate::log::debug(&format!("metric {}={}", sample.name, sample.value));
    }
}
