//! Composite alert rules: multiple conditions combined by an
//! aggregation policy, with a per-entity cooldown.

use serde::{Deserialize, Serialize};

use super::policy::EscalationPolicy;

/// Comparison operator for a rule condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
}

impl Comparator {
    /// Apply the operator to an observed value and the condition's target
    pub fn evaluate(&self, value: f64, target: f64) -> bool {
        const EPSILON: f64 = 1e-9;
        match self {
            Comparator::Gt => value > target,
            Comparator::Gte => value >= target,
            Comparator::Lt => value < target,
            Comparator::Lte => value <= target,
            Comparator::Eq => (value - target).abs() < EPSILON,
            Comparator::Ne => (value - target).abs() >= EPSILON,
        }
    }
}

/// How per-condition results combine into a rule verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Logical OR
    Any,
    /// Logical AND
    All,
    /// More than half of the conditions triggered
    Majority,
}

impl Aggregation {
    /// Combine condition results; an empty slice never triggers
    pub fn combine(&self, results: &[bool]) -> bool {
        if results.is_empty() {
            return false;
        }
        let fired = results.iter().filter(|r| **r).count();
        match self {
            Aggregation::Any => fired > 0,
            Aggregation::All => fired == results.len(),
            Aggregation::Majority => fired * 2 > results.len(),
        }
    }
}

/// How a condition reduces the retained window of samples to one value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAggregation {
    /// The most recent sample only
    Latest,
    Avg,
    Min,
    Max,
}

impl TimeAggregation {
    /// Reduce samples within the window; None when the window is empty
    pub fn reduce(&self, samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        match self {
            TimeAggregation::Latest => samples.last().copied(),
            TimeAggregation::Avg => {
                Some(samples.iter().sum::<f64>() / samples.len() as f64)
            }
            TimeAggregation::Min => samples.iter().copied().fold(f64::INFINITY, f64::min).into(),
            TimeAggregation::Max => samples
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max)
                .into(),
        }
    }
}

/// One metric comparison within a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub metric: String,
    pub comparator: Comparator,
    pub value: f64,
    /// Sample window for time aggregation (unix millis span)
    pub window_ms: i64,
    pub over_time: TimeAggregation,
}

impl RuleCondition {
    pub fn new(metric: impl Into<String>, comparator: Comparator, value: f64) -> Self {
        Self {
            metric: metric.into(),
            comparator,
            value,
            window_ms: 5 * 60 * 1000,
            over_time: TimeAggregation::Latest,
        }
    }

    /// Set the time aggregation over the window
    pub fn with_over_time(mut self, over_time: TimeAggregation, window_ms: i64) -> Self {
        self.over_time = over_time;
        self.window_ms = window_ms;
        self
    }
}

/// Composite rule over multiple conditions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    /// Unique rule ID
    pub id: String,
    /// Human-readable name, recorded on alerts as `triggered_by`
    pub name: String,
    /// Entity this rule applies to
    pub entity_id: String,
    pub conditions: Vec<RuleCondition>,
    pub aggregation: Aggregation,
    /// Repeat triggers inside this window are discarded per entity
    pub cooldown_ms: i64,
    /// Resolve the rule's active alerts once the condition clears
    pub auto_resolve: bool,
    pub escalation: Option<EscalationPolicy>,
    pub enabled: bool,
}

impl AlertRule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        entity_id: impl Into<String>,
        conditions: Vec<RuleCondition>,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            entity_id: entity_id.into(),
            conditions,
            aggregation,
            cooldown_ms: 10 * 60 * 1000,
            auto_resolve: false,
            escalation: None,
            enabled: true,
        }
    }

    /// Set the cooldown window
    pub fn with_cooldown_ms(mut self, cooldown_ms: i64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    /// Enable auto-resolve when the condition clears
    pub fn with_auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve = auto_resolve;
        self
    }

    /// Attach an escalation policy
    pub fn with_escalation(mut self, policy: EscalationPolicy) -> Self {
        self.escalation = Some(policy);
        self
    }

    /// Structural validation performed at registration
    pub fn validate(&self) -> Result<(), String> {
        if self.conditions.is_empty() {
            return Err("rule has no conditions".to_string());
        }
        if self.cooldown_ms < 0 {
            return Err(format!("negative cooldown_ms {}", self.cooldown_ms));
        }
        for cond in &self.conditions {
            if cond.metric.is_empty() {
                return Err("condition metric name is empty".to_string());
            }
            if cond.window_ms <= 0 {
                return Err(format!(
                    "condition window_ms must be positive, got {}",
                    cond.window_ms
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparator_evaluate() {
        assert!(Comparator::Gt.evaluate(2.0, 1.0));
        assert!(!Comparator::Gt.evaluate(1.0, 1.0));
        assert!(Comparator::Gte.evaluate(1.0, 1.0));
        assert!(Comparator::Lt.evaluate(0.5, 1.0));
        assert!(Comparator::Lte.evaluate(1.0, 1.0));
        assert!(Comparator::Eq.evaluate(1.0, 1.0));
        assert!(Comparator::Ne.evaluate(1.0, 2.0));
    }

    #[test]
    fn test_aggregation_combine() {
        assert!(Aggregation::Any.combine(&[false, true]));
        assert!(!Aggregation::Any.combine(&[false, false]));
        assert!(Aggregation::All.combine(&[true, true]));
        assert!(!Aggregation::All.combine(&[true, false]));
        assert!(Aggregation::Majority.combine(&[true, true, false]));
        assert!(!Aggregation::Majority.combine(&[true, false]));
        assert!(!Aggregation::All.combine(&[]));
    }

    #[test]
    fn test_time_aggregation_reduce() {
        let samples = [1.0, 3.0, 2.0];
        assert_eq!(TimeAggregation::Latest.reduce(&samples), Some(2.0));
        assert_eq!(TimeAggregation::Avg.reduce(&samples), Some(2.0));
        assert_eq!(TimeAggregation::Min.reduce(&samples), Some(1.0));
        assert_eq!(TimeAggregation::Max.reduce(&samples), Some(3.0));
        assert_eq!(TimeAggregation::Avg.reduce(&[]), None);
    }

    #[test]
    fn test_rule_validate() {
        let rule = AlertRule::new(
            "r1",
            "Speeding",
            "driver-1",
            vec![RuleCondition::new("speed_kmh", Comparator::Gt, 120.0)],
            Aggregation::Any,
        );
        assert!(rule.validate().is_ok());

        let empty = AlertRule::new("r2", "Empty", "driver-1", vec![], Aggregation::All);
        assert!(empty.validate().is_err());
    }
}
