//! Statistical and trend anomaly detection
//!
//! Each (entity, metric) keeps a trailing `MetricWindow`; the detector
//! flags values that deviate from the rolling mean by more than the
//! sensitivity-selected z-score multiplier, and trend reversals or
//! accelerations across the window. Detection is suppressed entirely
//! until the warm-up floor is met.

use serde::{Deserialize, Serialize};

use super::history::MetricWindow;
use crate::model::{AlertSeverity, Sensitivity};

/// Detector tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Samples required before any detection
    pub min_samples: usize,
    /// Slope-change magnitude (per sample) flagged as acceleration
    pub accel_magnitude: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            min_samples: 8,
            accel_magnitude: 2.0,
        }
    }
}

/// What kind of anomaly was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Value outside k standard deviations of the rolling mean
    Statistical,
    /// Slope sign reversal or acceleration across the window
    Trend,
}

/// A detected anomaly on one metric
#[derive(Debug, Clone)]
pub struct AnomalyFinding {
    pub kind: AnomalyKind,
    pub severity: AlertSeverity,
    /// Observed value (statistical) or newer-half slope (trend)
    pub value: f64,
    /// Rolling mean (statistical) or older-half slope (trend)
    pub expected: f64,
    /// z-score (statistical) or slope delta (trend)
    pub deviation: f64,
}

/// Stateless detector; all per-entity state lives in the caller's
/// `MetricWindow`s
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    /// Warm-up floor; baselines with fewer samples are not evaluated
    pub fn min_samples(&self) -> usize {
        self.config.min_samples
    }

    /// Check a new value against the baseline built from prior samples.
    /// Call before pushing the value into the window.
    pub fn check_statistical(
        &self,
        window: &MetricWindow,
        sensitivity: Sensitivity,
        value: f64,
    ) -> Option<AnomalyFinding> {
        if window.len() < self.config.min_samples {
            return None;
        }
        let mean = window.mean()?;
        let stddev = window.stddev()?;
        if stddev == 0.0 {
            // Flat baseline: any departure is anomalous
            if value != mean {
                return Some(AnomalyFinding {
                    kind: AnomalyKind::Statistical,
                    severity: AlertSeverity::Warning,
                    value,
                    expected: mean,
                    deviation: f64::INFINITY,
                });
            }
            return None;
        }

        let k = sensitivity.z_multiplier();
        let z = (value - mean).abs() / stddev;
        if z <= k {
            return None;
        }

        let severity = if z > k * 1.5 {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };
        Some(AnomalyFinding {
            kind: AnomalyKind::Statistical,
            severity,
            value,
            expected: mean,
            deviation: z,
        })
    }

    /// Check for a slope-sign reversal or acceleration between the
    /// older and newer halves of the window
    pub fn check_trend(&self, window: &MetricWindow) -> Option<AnomalyFinding> {
        if window.len() < self.config.min_samples {
            return None;
        }
        let values = window.values();
        let mid = values.len() / 2;
        let older = slope(&values[..mid])?;
        let newer = slope(&values[mid..])?;

        let reversal = older * newer < 0.0
            && older.abs() > f64::EPSILON
            && newer.abs() > f64::EPSILON;
        let acceleration = (newer - older).abs() > self.config.accel_magnitude;

        if !reversal && !acceleration {
            return None;
        }

        Some(AnomalyFinding {
            kind: AnomalyKind::Trend,
            severity: AlertSeverity::Warning,
            value: newer,
            expected: older,
            deviation: newer - older,
        })
    }
}

/// Least-squares slope over evenly indexed samples
fn slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_of(values: &[f64]) -> MetricWindow {
        let mut w = MetricWindow::new(64);
        for (i, v) in values.iter().enumerate() {
            w.push(i as i64 * 1000, *v);
        }
        w
    }

    #[test]
    fn test_warm_up_floor_suppresses_detection() {
        let detector = AnomalyDetector::default();
        let w = window_of(&[1.0, 1.0, 1.0]);
        // Wildly anomalous value, but history is too short
        assert!(detector
            .check_statistical(&w, Sensitivity::High, 100.0)
            .is_none());
        assert!(detector.check_trend(&w).is_none());
    }

    #[test]
    fn test_statistical_anomaly_flagged() {
        let detector = AnomalyDetector::default();
        let w = window_of(&[10.0, 11.0, 9.0, 10.5, 9.5, 10.0, 10.2, 9.8]);

        let finding = detector
            .check_statistical(&w, Sensitivity::High, 20.0)
            .unwrap();
        assert_eq!(finding.kind, AnomalyKind::Statistical);
        assert_eq!(finding.severity, AlertSeverity::Critical);
        assert!((finding.expected - 10.0).abs() < 0.1);

        // Ordinary value stays quiet
        assert!(detector
            .check_statistical(&w, Sensitivity::High, 10.3)
            .is_none());
    }

    #[test]
    fn test_sensitivity_changes_cutoff() {
        let detector = AnomalyDetector::default();
        let w = window_of(&[10.0, 11.0, 9.0, 10.5, 9.5, 10.0, 10.2, 9.8]);
        // stddev ~0.58; value at ~2.4 sigma: flagged at High (k=2.0),
        // quiet at Low (k=3.0)
        let value = 11.4;
        assert!(detector
            .check_statistical(&w, Sensitivity::High, value)
            .is_some());
        assert!(detector
            .check_statistical(&w, Sensitivity::Low, value)
            .is_none());
    }

    #[test]
    fn test_trend_reversal_flagged() {
        let detector = AnomalyDetector::default();
        // Rising then falling
        let w = window_of(&[1.0, 2.0, 3.0, 4.0, 4.0, 3.0, 2.0, 1.0]);
        let finding = detector.check_trend(&w).unwrap();
        assert_eq!(finding.kind, AnomalyKind::Trend);
        assert!(finding.expected > 0.0);
        assert!(finding.value < 0.0);
    }

    #[test]
    fn test_steady_trend_not_flagged() {
        let detector = AnomalyDetector::default();
        let w = window_of(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert!(detector.check_trend(&w).is_none());
    }

    #[test]
    fn test_acceleration_flagged() {
        let detector = AnomalyDetector::new(AnomalyConfig {
            min_samples: 8,
            accel_magnitude: 2.0,
        });
        // Gentle rise then a steep one, same sign
        let w = window_of(&[1.0, 1.2, 1.4, 1.6, 2.0, 6.0, 10.0, 14.0]);
        let finding = detector.check_trend(&w).unwrap();
        assert!(finding.deviation > 2.0);
    }
}
