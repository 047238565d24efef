//! Candidate-alert evaluators
//!
//! Four independent detectors run against each ingested snapshot:
//! threshold bound checks, composite rules, statistical/trend anomaly
//! detection, and predictive risk. Each produces candidate alerts that
//! the pipeline then correlates, suppresses, and stores.

pub mod anomaly;
pub mod history;
pub mod predictive;
pub mod rule;
pub mod threshold;

pub use anomaly::{AnomalyDetector, AnomalyFinding, AnomalyKind};
pub use history::MetricWindow;
pub use predictive::{PredictError, RiskEvaluator, RiskPrediction, RiskScorer};
pub use rule::{evaluate_rule, is_clear, CooldownTracker, RuleOutcome};
pub use threshold::{derived_value, evaluate};
