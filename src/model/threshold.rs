//! Single-metric threshold configuration

use serde::{Deserialize, Serialize};

/// How the monitored value is derived before the bound check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    /// Raw metric value
    Absolute,
    /// Percent change from the previous snapshot
    PercentChange,
    /// Trend slope over the window (handled by the anomaly detector)
    Trend,
    /// Deviation from the rolling baseline mean
    Comparative,
}

/// Which side of the bounds triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Above,
    Below,
    /// Absolute distance from warning_value exceeding critical_value
    Deviation,
}

/// Detection sensitivity, mapped to a z-score multiplier by the
/// anomaly detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Low,
    Medium,
    High,
}

impl Sensitivity {
    /// Z-score multiplier: higher sensitivity flags smaller deviations
    pub fn z_multiplier(&self) -> f64 {
        match self {
            Sensitivity::Low => 3.0,
            Sensitivity::Medium => 2.5,
            Sensitivity::High => 2.0,
        }
    }
}

/// Warning/critical bound check for one metric on one entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threshold {
    /// Unique threshold ID
    pub id: String,
    /// Entity this threshold applies to
    pub entity_id: String,
    /// Metric name to check
    pub metric: String,
    pub kind: ThresholdKind,
    pub direction: Direction,
    pub warning_value: f64,
    pub critical_value: f64,
    /// Evaluation window (unix millis span)
    pub window_ms: i64,
    pub sensitivity: Sensitivity,
    /// Disabled thresholds are skipped entirely
    pub enabled: bool,
}

impl Threshold {
    /// Create an absolute above-direction threshold with defaults
    pub fn new(
        id: impl Into<String>,
        entity_id: impl Into<String>,
        metric: impl Into<String>,
        warning_value: f64,
        critical_value: f64,
    ) -> Self {
        Self {
            id: id.into(),
            entity_id: entity_id.into(),
            metric: metric.into(),
            kind: ThresholdKind::Absolute,
            direction: Direction::Above,
            warning_value,
            critical_value,
            window_ms: 5 * 60 * 1000,
            sensitivity: Sensitivity::Medium,
            enabled: true,
        }
    }

    /// Set the derivation kind
    pub fn with_kind(mut self, kind: ThresholdKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the trigger direction
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Set the evaluation window
    pub fn with_window_ms(mut self, window_ms: i64) -> Self {
        self.window_ms = window_ms;
        self
    }

    /// Set detection sensitivity
    pub fn with_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Structural validation; invalid thresholds are rejected at
    /// registration, never silently evaluated
    pub fn validate(&self) -> Result<(), String> {
        if self.metric.is_empty() {
            return Err("metric name is empty".to_string());
        }
        if self.window_ms <= 0 {
            return Err(format!("window_ms must be positive, got {}", self.window_ms));
        }
        match self.direction {
            Direction::Above if self.critical_value < self.warning_value => Err(format!(
                "above-direction critical {} below warning {}",
                self.critical_value, self.warning_value
            )),
            Direction::Below if self.critical_value > self.warning_value => Err(format!(
                "below-direction critical {} above warning {}",
                self.critical_value, self.warning_value
            )),
            Direction::Deviation if self.critical_value < 0.0 => {
                Err("deviation tolerance must be non-negative".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_builder() {
        let t = Threshold::new("t1", "driver-1", "speed_kmh", 100.0, 120.0)
            .with_direction(Direction::Above)
            .with_sensitivity(Sensitivity::High);

        assert_eq!(t.metric, "speed_kmh");
        assert!(t.enabled);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let t = Threshold::new("t1", "e1", "m", 100.0, 50.0);
        assert!(t.validate().is_err());

        let t = Threshold::new("t2", "e1", "m", 50.0, 100.0).with_direction(Direction::Below);
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_sensitivity_multipliers_ordered() {
        assert!(Sensitivity::High.z_multiplier() < Sensitivity::Medium.z_multiplier());
        assert!(Sensitivity::Medium.z_multiplier() < Sensitivity::Low.z_multiplier());
    }
}
