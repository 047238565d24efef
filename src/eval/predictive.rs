//! Predictive risk evaluation
//!
//! The scoring model is an external collaborator behind the
//! `RiskScorer` trait; this module only decides whether a returned
//! probability becomes an alert.

use serde::{Deserialize, Serialize};

use crate::model::AlertSeverity;

/// Errors from the external scorer
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("Scorer unavailable: {0}")]
    Unavailable(String),

    #[error("Probability {0} outside [0, 1]")]
    InvalidProbability(f64),
}

/// Prediction returned by the scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPrediction {
    /// Probability of decline/tier risk within the horizon
    pub probability: f64,
    /// Scorer's own severity estimate; can raise but never create an
    /// alert on its own
    #[serde(default)]
    pub severity_hint: Option<AlertSeverity>,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
}

impl RiskPrediction {
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            severity_hint: None,
            recommended_actions: Vec::new(),
        }
    }

    pub fn with_actions(mut self, actions: Vec<String>) -> Self {
        self.recommended_actions = actions;
        self
    }
}

/// External predictive scorer interface
pub trait RiskScorer: Send + Sync {
    fn predict(&self, entity_id: &str, horizon_ms: i64) -> Result<RiskPrediction, PredictError>;
}

/// Maps scorer probabilities to alert severities via tiered cutoffs
#[derive(Debug, Clone)]
pub struct RiskEvaluator {
    pub warning_cutoff: f64,
    pub critical_cutoff: f64,
}

impl Default for RiskEvaluator {
    fn default() -> Self {
        Self {
            warning_cutoff: 0.6,
            critical_cutoff: 0.8,
        }
    }
}

impl RiskEvaluator {
    /// Severity for a prediction; None below the warning cutoff. The
    /// scorer's hint can raise the cutoff severity but never triggers
    /// an alert by itself.
    pub fn assess(&self, prediction: &RiskPrediction) -> Result<Option<AlertSeverity>, PredictError> {
        let p = prediction.probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(PredictError::InvalidProbability(p));
        }
        let from_cutoffs = if p >= self.critical_cutoff {
            Some(AlertSeverity::Critical)
        } else if p >= self.warning_cutoff {
            Some(AlertSeverity::Warning)
        } else {
            None
        };
        Ok(from_cutoffs.map(|severity| match prediction.severity_hint {
            Some(hint) if hint > severity => hint,
            _ => severity,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(p: f64) -> RiskPrediction {
        RiskPrediction::new(p)
    }

    #[test]
    fn test_tiered_cutoffs() {
        let eval = RiskEvaluator::default();
        assert_eq!(eval.assess(&prediction(0.9)).unwrap(), Some(AlertSeverity::Critical));
        assert_eq!(eval.assess(&prediction(0.8)).unwrap(), Some(AlertSeverity::Critical));
        assert_eq!(eval.assess(&prediction(0.7)).unwrap(), Some(AlertSeverity::Warning));
        assert_eq!(eval.assess(&prediction(0.5)).unwrap(), None);
    }

    #[test]
    fn test_invalid_probability_rejected() {
        let eval = RiskEvaluator::default();
        assert!(eval.assess(&prediction(1.5)).is_err());
        assert!(eval.assess(&prediction(-0.1)).is_err());
    }

    #[test]
    fn test_hint_raises_but_never_creates() {
        let eval = RiskEvaluator::default();

        let mut warning_with_hint = prediction(0.7);
        warning_with_hint.severity_hint = Some(AlertSeverity::Emergency);
        assert_eq!(
            eval.assess(&warning_with_hint).unwrap(),
            Some(AlertSeverity::Emergency)
        );

        // Below the warning cutoff no hint matters
        let mut quiet_with_hint = prediction(0.3);
        quiet_with_hint.severity_hint = Some(AlertSeverity::Critical);
        assert_eq!(eval.assess(&quiet_with_hint).unwrap(), None);
    }
}
