//! Composite rule evaluation with per-entity cooldown tracking

use fxhash::FxHashMap;

use super::history::MetricWindow;
use crate::model::{AlertRule, AlertSeverity, TimeAggregation};

/// Result of a triggered rule
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub severity: AlertSeverity,
    /// Fraction of conditions that triggered
    pub ratio: f64,
    /// Metrics of the conditions that triggered
    pub triggered_metrics: Vec<String>,
}

/// Evaluate a rule against the retained metric history.
///
/// A condition whose metric has no sample in its window is a data gap:
/// the whole rule is skipped for this tick rather than evaluated
/// against fabricated values. Returns None when skipped or when the
/// aggregation does not trigger.
pub fn evaluate_rule(
    rule: &AlertRule,
    history: &FxHashMap<String, MetricWindow>,
    now_ms: i64,
) -> Option<RuleOutcome> {
    let (results, triggered_metrics) = evaluate_conditions(rule, history, now_ms)?;

    if !rule.aggregation.combine(&results) {
        return None;
    }

    let ratio = results.iter().filter(|r| **r).count() as f64 / results.len() as f64;
    let severity = AlertSeverity::from_trigger_ratio(ratio)?;

    Some(RuleOutcome {
        severity,
        ratio,
        triggered_metrics,
    })
}

/// Whether the rule evaluated cleanly and did not trigger. Used by
/// auto-resolve; a data gap is not "clear".
pub fn is_clear(
    rule: &AlertRule,
    history: &FxHashMap<String, MetricWindow>,
    now_ms: i64,
) -> bool {
    match evaluate_conditions(rule, history, now_ms) {
        Some((results, _)) => !rule.aggregation.combine(&results),
        None => false,
    }
}

/// Per-condition results and the metrics that fired; None on any data
/// gap (the whole rule is skipped rather than partially evaluated)
fn evaluate_conditions(
    rule: &AlertRule,
    history: &FxHashMap<String, MetricWindow>,
    now_ms: i64,
) -> Option<(Vec<bool>, Vec<String>)> {
    let mut results = Vec::with_capacity(rule.conditions.len());
    let mut triggered_metrics = Vec::new();

    for cond in &rule.conditions {
        let window = history.get(&cond.metric)?;
        let samples = match cond.over_time {
            TimeAggregation::Latest => window.latest().map(|v| vec![v]).unwrap_or_default(),
            _ => window.values_since(now_ms - cond.window_ms),
        };
        let value = cond.over_time.reduce(&samples)?;

        let fired = cond.comparator.evaluate(value, cond.value);
        if fired {
            triggered_metrics.push(cond.metric.clone());
        }
        results.push(fired);
    }
    Some((results, triggered_metrics))
}

/// Per-entity record of when each rule last fired.
///
/// Owned by the entity's worker task, so no locking is needed; the
/// per-entity serialization of the pipeline makes updates race-free.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_fired: FxHashMap<String, i64>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self {
            last_fired: FxHashMap::default(),
        }
    }

    /// Whether the rule is out of its cooldown window
    pub fn ready(&self, rule: &AlertRule, now_ms: i64) -> bool {
        match self.last_fired.get(&rule.id) {
            Some(last) => now_ms - last >= rule.cooldown_ms,
            None => true,
        }
    }

    /// Record a fire; repeat triggers inside the cooldown are discarded
    /// by the caller checking `ready` first
    pub fn record_fire(&mut self, rule_id: &str, now_ms: i64) {
        self.last_fired.insert(rule_id.to_string(), now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Aggregation, Comparator, RuleCondition};

    fn history_with(entries: &[(&str, f64)]) -> FxHashMap<String, MetricWindow> {
        let mut history = FxHashMap::default();
        for (metric, value) in entries {
            let mut window = MetricWindow::new(16);
            window.push(1000, *value);
            history.insert(metric.to_string(), window);
        }
        history
    }

    #[test]
    fn test_all_aggregation_requires_every_condition() {
        let rule = AlertRule::new(
            "r1",
            "Overload",
            "e1",
            vec![
                RuleCondition::new("load", Comparator::Gt, 0.9),
                RuleCondition::new("temp", Comparator::Gt, 80.0),
            ],
            Aggregation::All,
        );

        let both = history_with(&[("load", 0.95), ("temp", 85.0)]);
        assert!(evaluate_rule(&rule, &both, 1000).is_some());

        let one = history_with(&[("load", 0.95), ("temp", 60.0)]);
        assert!(evaluate_rule(&rule, &one, 1000).is_none());
    }

    #[test]
    fn test_any_aggregation_needs_one() {
        let rule = AlertRule::new(
            "r1",
            "Overload",
            "e1",
            vec![
                RuleCondition::new("load", Comparator::Gt, 0.9),
                RuleCondition::new("temp", Comparator::Gt, 80.0),
            ],
            Aggregation::Any,
        );

        let one = history_with(&[("load", 0.5), ("temp", 85.0)]);
        let outcome = evaluate_rule(&rule, &one, 1000).unwrap();
        assert_eq!(outcome.triggered_metrics, vec!["temp".to_string()]);
        assert_eq!(outcome.ratio, 0.5);

        let none = history_with(&[("load", 0.5), ("temp", 60.0)]);
        assert!(evaluate_rule(&rule, &none, 1000).is_none());
    }

    #[test]
    fn test_majority_aggregation() {
        let rule = AlertRule::new(
            "r1",
            "Degraded",
            "e1",
            vec![
                RuleCondition::new("a", Comparator::Gt, 1.0),
                RuleCondition::new("b", Comparator::Gt, 1.0),
                RuleCondition::new("c", Comparator::Gt, 1.0),
            ],
            Aggregation::Majority,
        );

        let two_of_three = history_with(&[("a", 2.0), ("b", 2.0), ("c", 0.5)]);
        assert!(evaluate_rule(&rule, &two_of_three, 1000).is_some());

        let one_of_three = history_with(&[("a", 2.0), ("b", 0.5), ("c", 0.5)]);
        assert!(evaluate_rule(&rule, &one_of_three, 1000).is_none());
    }

    #[test]
    fn test_missing_metric_skips_rule() {
        let rule = AlertRule::new(
            "r1",
            "Overload",
            "e1",
            vec![
                RuleCondition::new("load", Comparator::Gt, 0.9),
                RuleCondition::new("absent", Comparator::Gt, 1.0),
            ],
            Aggregation::Any,
        );

        // load alone would trigger, but the gap on `absent` skips the rule
        let history = history_with(&[("load", 0.95)]);
        assert!(evaluate_rule(&rule, &history, 1000).is_none());
    }

    #[test]
    fn test_severity_from_ratio() {
        let conds: Vec<RuleCondition> = (0..5)
            .map(|i| RuleCondition::new(format!("m{}", i), Comparator::Gt, 1.0))
            .collect();
        let rule = AlertRule::new("r1", "Ratio", "e1", conds, Aggregation::Any);

        // 5/5 triggered -> critical
        let all = history_with(&[
            ("m0", 2.0),
            ("m1", 2.0),
            ("m2", 2.0),
            ("m3", 2.0),
            ("m4", 2.0),
        ]);
        assert_eq!(
            evaluate_rule(&rule, &all, 1000).unwrap().severity,
            AlertSeverity::Critical
        );

        // 3/5 triggered -> warning
        let three = history_with(&[
            ("m0", 2.0),
            ("m1", 2.0),
            ("m2", 2.0),
            ("m3", 0.0),
            ("m4", 0.0),
        ]);
        assert_eq!(
            evaluate_rule(&rule, &three, 1000).unwrap().severity,
            AlertSeverity::Warning
        );

        // 1/5 triggered -> info
        let one = history_with(&[
            ("m0", 2.0),
            ("m1", 0.0),
            ("m2", 0.0),
            ("m3", 0.0),
            ("m4", 0.0),
        ]);
        assert_eq!(
            evaluate_rule(&rule, &one, 1000).unwrap().severity,
            AlertSeverity::Info
        );
    }

    #[test]
    fn test_avg_over_time_aggregation() {
        let rule = AlertRule::new(
            "r1",
            "SustainedLoad",
            "e1",
            vec![RuleCondition::new("load", Comparator::Gt, 0.8)
                .with_over_time(TimeAggregation::Avg, 1000)],
            Aggregation::All,
        );

        let mut window = MetricWindow::new(16);
        window.push(100, 0.7);
        window.push(500, 0.9);
        window.push(900, 0.95);
        let mut history = FxHashMap::default();
        history.insert("load".to_string(), window);

        // avg of [0.7, 0.9, 0.95] = 0.85 > 0.8
        assert!(evaluate_rule(&rule, &history, 1000).is_some());
    }

    #[test]
    fn test_is_clear_distinguishes_gap_from_quiet() {
        let rule = AlertRule::new(
            "r1",
            "Speeding",
            "e1",
            vec![RuleCondition::new("speed", Comparator::Gt, 120.0)],
            Aggregation::Any,
        );

        let quiet = history_with(&[("speed", 80.0)]);
        assert!(is_clear(&rule, &quiet, 1000));

        let firing = history_with(&[("speed", 130.0)]);
        assert!(!is_clear(&rule, &firing, 1000));

        // No data is a gap, not "clear"
        let empty = FxHashMap::default();
        assert!(!is_clear(&rule, &empty, 1000));
    }

    #[test]
    fn test_cooldown_gates_repeat_fires() {
        let rule = AlertRule::new(
            "r1",
            "Speeding",
            "e1",
            vec![RuleCondition::new("speed", Comparator::Gt, 120.0)],
            Aggregation::Any,
        )
        .with_cooldown_ms(60_000);

        let mut tracker = CooldownTracker::new();
        assert!(tracker.ready(&rule, 1000));
        tracker.record_fire(&rule.id, 1000);

        assert!(!tracker.ready(&rule, 30_000));
        assert!(tracker.ready(&rule, 61_000));
    }
}
