//! Trailing per-metric sample windows
//!
//! One `MetricWindow` is kept per (entity, metric) inside that entity's
//! worker, serving both rule time-aggregation and anomaly baselines.

use std::collections::VecDeque;

/// Bounded trailing window of (timestamp, value) samples
#[derive(Debug, Clone)]
pub struct MetricWindow {
    samples: VecDeque<(i64, f64)>,
    max_samples: usize,
}

impl MetricWindow {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples.min(64)),
            max_samples,
        }
    }

    /// Append a sample, evicting the oldest when full
    pub fn push(&mut self, timestamp_ms: i64, value: f64) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back((timestamp_ms, value));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent value
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().map(|(_, v)| *v)
    }

    /// Values observed at or after the cutoff, oldest first
    pub fn values_since(&self, cutoff_ms: i64) -> Vec<f64> {
        self.samples
            .iter()
            .filter(|(ts, _)| *ts >= cutoff_ms)
            .map(|(_, v)| *v)
            .collect()
    }

    /// All retained values, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|(_, v)| *v).collect()
    }

    /// Mean of all retained values
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().map(|(_, v)| v).sum::<f64>() / self.samples.len() as f64)
    }

    /// Population standard deviation of retained values
    pub fn stddev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let var = self
            .samples
            .iter()
            .map(|(_, v)| (v - mean).powi(2))
            .sum::<f64>()
            / self.samples.len() as f64;
        Some(var.sqrt())
    }
}
