//! Metric snapshots ingested per entity

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A timestamped set of metric values for one monitored entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Entity being monitored (operator, driver, vehicle)
    pub entity_id: String,
    /// Metric name -> numeric value
    pub metrics: HashMap<String, f64>,
    /// Observation time (unix millis)
    pub timestamp_ms: i64,
}

impl MetricSnapshot {
    /// Create an empty snapshot
    pub fn new(entity_id: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            entity_id: entity_id.into(),
            metrics: HashMap::new(),
            timestamp_ms,
        }
    }

    /// Add a metric value
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Look up a metric value; absent metrics are a data gap, never zero
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied()
    }
}
