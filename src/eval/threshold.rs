//! Pure threshold evaluation
//!
//! `evaluate` is stateless and deterministic: a value either clears the
//! warning bound or it does not. Derived-value resolution (percent
//! change, comparative baseline) happens in `derived_value` before the
//! bound check; a missing input there is a data gap and yields no
//! evaluation rather than a fabricated trigger.

use crate::model::{AlertSeverity, Direction, Threshold, ThresholdKind};

/// Check a derived value against the threshold bounds.
/// Returns the severity when triggered, None otherwise.
pub fn evaluate(threshold: &Threshold, value: f64) -> Option<AlertSeverity> {
    match threshold.direction {
        Direction::Above => {
            if value > threshold.warning_value {
                Some(if value > threshold.critical_value {
                    AlertSeverity::Critical
                } else {
                    AlertSeverity::Warning
                })
            } else {
                None
            }
        }
        Direction::Below => {
            if value < threshold.warning_value {
                Some(if value < threshold.critical_value {
                    AlertSeverity::Critical
                } else {
                    AlertSeverity::Warning
                })
            } else {
                None
            }
        }
        Direction::Deviation => {
            // warning_value is the center, critical_value the tolerance
            if (value - threshold.warning_value).abs() > threshold.critical_value {
                Some(AlertSeverity::Critical)
            } else {
                None
            }
        }
    }
}

/// Resolve the value a threshold is checked against.
///
/// - `Absolute`: the raw metric value.
/// - `PercentChange`: percent change from the previous sample; no
///   previous sample (or a zero base) means no evaluation.
/// - `Comparative`: signed deviation from the rolling baseline mean;
///   no baseline yet means no evaluation.
/// - `Trend`: handled by the anomaly detector, never here.
pub fn derived_value(
    threshold: &Threshold,
    value: f64,
    previous: Option<f64>,
    baseline_mean: Option<f64>,
) -> Option<f64> {
    match threshold.kind {
        ThresholdKind::Absolute => Some(value),
        ThresholdKind::PercentChange => {
            let prev = previous?;
            if prev == 0.0 {
                None
            } else {
                Some((value - prev) / prev.abs() * 100.0)
            }
        }
        ThresholdKind::Comparative => Some(value - baseline_mean?),
        ThresholdKind::Trend => None,
    }
}
