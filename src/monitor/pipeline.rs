//! Per-entity evaluation pipeline
//!
//! One `process_tick` call runs the full evaluate -> correlate ->
//! suppress -> store -> enqueue sequence for a single snapshot. The
//! caller (the entity's worker task) owns the `EntityState`, so all
//! entity-scoped mutable state is race-free by construction.

use std::sync::Arc;

use fxhash::FxHashMap;

use crate::config::ConfigStore;
use crate::correlate::Correlator;
use crate::dispatch::{DispatchJob, DispatchQueue};
use crate::eval::{
    self, AnomalyDetector, AnomalyKind, CooldownTracker, MetricWindow, RiskEvaluator, RiskScorer,
};
use crate::model::{
    Alert, AlertStatus, AlertType, Channel, EscalationPolicy, MetricSnapshot, Threshold,
    ThresholdKind,
};
use crate::store::AlertStore;
use crate::suppress::SuppressionEngine;

/// Engine tuning shared by all entities
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Samples retained per (entity, metric)
    pub history_samples: usize,
    /// Entity command channel depth
    pub channel_buffer: usize,
    /// Channels used when no escalation policy provides them
    pub default_channels: Vec<Channel>,
    /// Policy applied to escalation-required alerts whose rule has none
    pub default_escalation: Option<EscalationPolicy>,
    /// Horizon passed to the predictive scorer
    pub predict_horizon_ms: i64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            history_samples: 120,
            channel_buffer: 64,
            default_channels: vec![Channel::Log],
            default_escalation: None,
            predict_horizon_ms: 24 * 60 * 60 * 1000,
        }
    }
}

/// Mutable state owned by one entity's worker
pub struct EntityState {
    pub history: FxHashMap<String, MetricWindow>,
    pub cooldowns: CooldownTracker,
    history_samples: usize,
}

impl EntityState {
    pub fn new(history_samples: usize) -> Self {
        Self {
            history: FxHashMap::default(),
            cooldowns: CooldownTracker::new(),
            history_samples,
        }
    }

    fn window_mut(&mut self, metric: &str) -> &mut MetricWindow {
        let cap = self.history_samples;
        self.history
            .entry(metric.to_string())
            .or_insert_with(|| MetricWindow::new(cap))
    }
}

/// Shared, immutable pipeline dependencies
pub struct Pipeline {
    pub configs: Arc<ConfigStore>,
    pub store: Arc<dyn AlertStore>,
    pub scorer: Option<Arc<dyn RiskScorer>>,
    pub queue: Arc<DispatchQueue>,
    pub detector: AnomalyDetector,
    pub correlator: Correlator,
    pub suppression: SuppressionEngine,
    pub risk: RiskEvaluator,
    pub settings: MonitorSettings,
}

impl Pipeline {
    /// Process one snapshot for one entity. Returns the number of
    /// alerts persisted. Failures are logged, never propagated: one
    /// entity's bad tick must not disturb the others.
    pub fn process_tick(&self, state: &mut EntityState, snapshot: &MetricSnapshot) -> usize {
        let now_ms = snapshot.timestamp_ms;
        let entity_id = &snapshot.entity_id;
        let thresholds = self.configs.thresholds_for(entity_id);

        let mut candidates: Vec<(Alert, Option<EscalationPolicy>)> = Vec::new();

        // Bound checks and statistical anomaly detection run against
        // the baseline built from prior samples
        for (metric, value) in &snapshot.metrics {
            let metric_thresholds: Vec<&Threshold> =
                thresholds.iter().filter(|t| &t.metric == metric).collect();
            if metric_thresholds.is_empty() {
                continue;
            }
            let window = state.history.get(metric.as_str());

            for t in &metric_thresholds {
                if t.kind == ThresholdKind::Trend {
                    continue;
                }
                let prev = window.and_then(|w| w.latest());
                let baseline_mean = window
                    .filter(|w| w.len() >= self.detector.min_samples())
                    .and_then(|w| w.mean());
                let Some(derived) = eval::derived_value(t, *value, prev, baseline_mean) else {
                    continue;
                };
                if let Some(severity) = eval::evaluate(t, derived) {
                    let bound = if severity >= crate::model::AlertSeverity::Critical {
                        t.critical_value
                    } else {
                        t.warning_value
                    };
                    let alert = Alert::new(
                        entity_id.clone(),
                        AlertType::Threshold,
                        severity,
                        metric.clone(),
                        derived,
                        bound,
                        now_ms,
                    )
                    .with_title(format!("{} threshold exceeded", metric))
                    .with_description(format!(
                        "{} = {:.3} crossed the {:?} bound {:.3}",
                        metric, derived, t.direction, bound
                    ));
                    candidates.push((alert, None));
                }
            }

            // One statistical check per metric, at the most sensitive
            // configured threshold
            if let Some(w) = window {
                let most_sensitive = metric_thresholds
                    .iter()
                    .min_by(|a, b| {
                        a.sensitivity
                            .z_multiplier()
                            .total_cmp(&b.sensitivity.z_multiplier())
                    })
                    .map(|t| t.sensitivity);
                if let Some(sensitivity) = most_sensitive {
                    if let Some(finding) = self.detector.check_statistical(w, sensitivity, *value)
                    {
                        let alert = Alert::new(
                            entity_id.clone(),
                            AlertType::Anomaly,
                            finding.severity,
                            metric.clone(),
                            finding.value,
                            finding.expected,
                            now_ms,
                        )
                        .with_title(format!("Statistical anomaly on {}", metric))
                        .with_description(format!(
                            "{} = {:.3} deviates {:.1} sigma from baseline mean {:.3}",
                            metric, finding.value, finding.deviation, finding.expected
                        ));
                        candidates.push((alert, None));
                    }
                }
            }
        }

        // Fold the snapshot into the history
        for (metric, value) in &snapshot.metrics {
            state.window_mut(metric).push(now_ms, *value);
        }

        // Trend anomaly detection over the updated windows
        for t in thresholds.iter().filter(|t| t.kind == ThresholdKind::Trend) {
            let Some(window) = state.history.get(t.metric.as_str()) else {
                continue;
            };
            if let Some(finding) = self.detector.check_trend(window) {
                debug_assert_eq!(finding.kind, AnomalyKind::Trend);
                let alert = Alert::new(
                    entity_id.clone(),
                    AlertType::Anomaly,
                    finding.severity,
                    t.metric.clone(),
                    finding.value,
                    finding.expected,
                    now_ms,
                )
                .with_title(format!("Trend anomaly on {}", t.metric))
                .with_description(format!(
                    "{} slope changed from {:.3} to {:.3} over the window",
                    t.metric, finding.expected, finding.value
                ));
                candidates.push((alert, None));
            }
        }

        // Composite rules with cooldown and auto-resolve
        for rule in self.configs.rules_for(entity_id) {
            match eval::evaluate_rule(&rule, &state.history, now_ms) {
                Some(outcome) => {
                    if !state.cooldowns.ready(&rule, now_ms) {
                        tracing::debug!(
                            entity_id = %entity_id,
                            rule = %rule.name,
                            "Rule re-trigger discarded by cooldown"
                        );
                        continue;
                    }
                    state.cooldowns.record_fire(&rule.id, now_ms);
                    let alert = Alert::new(
                        entity_id.clone(),
                        AlertType::Rule,
                        outcome.severity,
                        rule.name.clone(),
                        outcome.ratio,
                        0.6,
                        now_ms,
                    )
                    .with_title(format!("Rule triggered: {}", rule.name))
                    .with_description(format!(
                        "{} of {} conditions met ({})",
                        outcome.triggered_metrics.len(),
                        rule.conditions.len(),
                        outcome.triggered_metrics.join(", ")
                    ));
                    candidates.push((alert, rule.escalation.clone()));
                }
                None => {
                    if rule.auto_resolve && eval::is_clear(&rule, &state.history, now_ms) {
                        self.auto_resolve_rule(entity_id, &rule.name, now_ms);
                    }
                }
            }
        }

        // Predictive risk
        if let Some(scorer) = &self.scorer {
            match scorer.predict(entity_id, self.settings.predict_horizon_ms) {
                Ok(prediction) => match self.risk.assess(&prediction) {
                    Ok(Some(severity)) => {
                        let alert = Alert::new(
                            entity_id.clone(),
                            AlertType::Predictive,
                            severity,
                            "predicted_risk",
                            prediction.probability,
                            self.risk.warning_cutoff,
                            now_ms,
                        )
                        .with_title("Predicted performance decline".to_string())
                        .with_description(format!(
                            "Decline probability {:.2} within the horizon",
                            prediction.probability
                        ))
                        .with_actions(prediction.recommended_actions);
                        candidates.push((alert, None));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(entity_id = %entity_id, error = %e, "Scorer returned invalid prediction");
                    }
                },
                Err(e) => {
                    tracing::warn!(entity_id = %entity_id, error = %e, "Predictive scorer failed");
                }
            }
        }

        self.finalize(candidates, now_ms)
    }

    /// Correlate, suppress, persist, and enqueue each candidate
    fn finalize(
        &self,
        candidates: Vec<(Alert, Option<EscalationPolicy>)>,
        now_ms: i64,
    ) -> usize {
        let mut created = 0;

        for (mut alert, policy) in candidates {
            if let Err(e) = self.correlator.correlate(self.store.as_ref(), &mut alert) {
                tracing::warn!(alert_id = %alert.id, error = %e, "Correlation failed");
            }

            if let Some(reason) =
                self.suppression
                    .check(&alert, &self.configs, self.store.as_ref(), now_ms)
            {
                alert.status = AlertStatus::Suppressed;
                alert.suppression_reason = Some(reason);
                tracing::info!(
                    alert_id = %alert.id,
                    entity_id = %alert.entity_id,
                    reason = ?reason,
                    "Alert suppressed"
                );
                if let Err(e) = self.store.insert(alert) {
                    tracing::error!(error = %e, "Failed to persist suppressed alert");
                } else {
                    created += 1;
                }
                continue;
            }

            let policy = policy.or_else(|| {
                if alert.escalation_required {
                    self.settings.default_escalation.clone()
                } else {
                    None
                }
            });
            let (channels, recipient_ids) = match policy.as_ref().and_then(|p| p.levels.first()) {
                Some(level) => (level.channels.clone(), level.recipients.clone()),
                None => (self.settings.default_channels.clone(), Vec::new()),
            };

            let job = DispatchJob {
                alert_id: alert.id.clone(),
                severity: alert.severity,
                alert_type: alert.alert_type,
                channels,
                recipient_ids,
                escalation: policy,
            };

            if let Err(e) = self.store.insert(alert) {
                tracing::error!(error = %e, "Failed to persist alert");
                continue;
            }
            created += 1;
            self.queue.push(job);
        }

        created
    }

    fn auto_resolve_rule(&self, entity_id: &str, rule_name: &str, now_ms: i64) {
        let matching: Vec<Alert> = self
            .store
            .active_alerts(Some(entity_id))
            .into_iter()
            .filter(|a| a.alert_type == AlertType::Rule && a.triggered_by == rule_name)
            .collect();

        for alert in matching {
            match self
                .store
                .resolve(&alert.id, Some("condition cleared".to_string()), now_ms)
            {
                Ok(_) => {
                    tracing::info!(alert_id = %alert.id, rule = %rule_name, "Alert auto-resolved");
                }
                Err(e) => {
                    tracing::warn!(alert_id = %alert.id, error = %e, "Auto-resolve failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Aggregation, AlertSeverity, Comparator, RuleCondition, AlertRule,
    };
    use crate::store::MemoryAlertStore;

    const MIN: i64 = 60 * 1000;

    struct Fixture {
        pipeline: Pipeline,
        store: Arc<MemoryAlertStore>,
        configs: Arc<ConfigStore>,
        queue: Arc<DispatchQueue>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryAlertStore::new());
        let configs = Arc::new(ConfigStore::new());
        let queue = Arc::new(DispatchQueue::new(64));
        let pipeline = Pipeline {
            configs: Arc::clone(&configs),
            store: Arc::clone(&store) as Arc<dyn AlertStore>,
            scorer: None,
            queue: Arc::clone(&queue),
            detector: AnomalyDetector::default(),
            correlator: Correlator::default(),
            suppression: SuppressionEngine::default(),
            risk: RiskEvaluator::default(),
            settings: MonitorSettings::default(),
        };
        Fixture {
            pipeline,
            store,
            configs,
            queue,
        }
    }

    fn snapshot(entity: &str, metric: &str, value: f64, ts: i64) -> MetricSnapshot {
        MetricSnapshot::new(entity, ts).with_metric(metric, value)
    }

    #[test]
    fn test_critical_threshold_creates_alert() {
        let f = fixture();
        f.configs
            .register_threshold(Threshold::new(
                "t1",
                "e1",
                "safety_incident_rate",
                1.0,
                2.0,
            ))
            .unwrap();

        let mut state = EntityState::new(120);
        let created =
            f.pipeline
                .process_tick(&mut state, &snapshot("e1", "safety_incident_rate", 2.5, 0));

        assert_eq!(created, 1);
        let alerts = f.store.active_alerts(Some("e1"));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].trigger_value, 2.5);
        assert_eq!(f.queue.len(), 1);
    }

    #[test]
    fn test_followup_alert_correlates_into_same_group() {
        let f = fixture();
        f.configs
            .register_threshold(Threshold::new(
                "t1",
                "e1",
                "safety_incident_rate",
                1.0,
                2.0,
            ))
            .unwrap();

        let mut state = EntityState::new(120);
        f.pipeline
            .process_tick(&mut state, &snapshot("e1", "safety_incident_rate", 2.5, 0));
        f.pipeline
            .process_tick(&mut state, &snapshot("e1", "safety_incident_rate", 2.6, MIN));

        let alerts = f.store.active_alerts(Some("e1"));
        assert_eq!(alerts.len(), 2);
        let group_a = alerts[0].correlation_group.clone().unwrap();
        let group_b = alerts[1].correlation_group.clone().unwrap();
        assert_eq!(group_a, group_b);
    }

    #[test]
    fn test_missing_metric_never_triggers() {
        let f = fixture();
        f.configs
            .register_threshold(Threshold::new("t1", "e1", "speed_kmh", 100.0, 120.0))
            .unwrap();

        let mut state = EntityState::new(120);
        let created = f
            .pipeline
            .process_tick(&mut state, &snapshot("e1", "other_metric", 999.0, 0));
        assert_eq!(created, 0);
    }

    #[test]
    fn test_rule_cooldown_yields_single_alert() {
        let f = fixture();
        f.configs
            .register_rule(
                AlertRule::new(
                    "r1",
                    "Speeding",
                    "e1",
                    vec![RuleCondition::new("speed_kmh", Comparator::Gt, 120.0)],
                    Aggregation::Any,
                )
                .with_cooldown_ms(10 * MIN),
            )
            .unwrap();

        let mut state = EntityState::new(120);
        f.pipeline
            .process_tick(&mut state, &snapshot("e1", "speed_kmh", 130.0, 0));
        f.pipeline
            .process_tick(&mut state, &snapshot("e1", "speed_kmh", 135.0, MIN));

        let rule_alerts: Vec<_> = f
            .store
            .active_alerts(Some("e1"))
            .into_iter()
            .filter(|a| a.alert_type == AlertType::Rule)
            .collect();
        assert_eq!(rule_alerts.len(), 1);

        // After the cooldown a new trigger fires again
        f.pipeline
            .process_tick(&mut state, &snapshot("e1", "speed_kmh", 140.0, 11 * MIN));
        let rule_alerts: Vec<_> = f
            .store
            .active_alerts(Some("e1"))
            .into_iter()
            .filter(|a| a.alert_type == AlertType::Rule)
            .collect();
        assert_eq!(rule_alerts.len(), 2);
    }

    #[test]
    fn test_auto_resolve_clears_rule_alert() {
        let f = fixture();
        f.configs
            .register_rule(
                AlertRule::new(
                    "r1",
                    "Speeding",
                    "e1",
                    vec![RuleCondition::new("speed_kmh", Comparator::Gt, 120.0)],
                    Aggregation::Any,
                )
                .with_cooldown_ms(0)
                .with_auto_resolve(true),
            )
            .unwrap();

        let mut state = EntityState::new(120);
        f.pipeline
            .process_tick(&mut state, &snapshot("e1", "speed_kmh", 130.0, 0));
        assert_eq!(f.store.active_alerts(Some("e1")).len(), 1);

        f.pipeline
            .process_tick(&mut state, &snapshot("e1", "speed_kmh", 80.0, MIN));
        assert!(f.store.active_alerts(Some("e1")).is_empty());

        let summary = f.store.summary(Some("e1"));
        assert_eq!(summary.resolved, 1);
    }

    #[test]
    fn test_duplicate_cap_suppresses_but_persists() {
        let f = fixture();
        f.configs
            .register_threshold(Threshold::new("t1", "e1", "speed_kmh", 100.0, 120.0))
            .unwrap();

        let mut state = EntityState::new(120);
        // Values spread >10% apart to dodge correlation tolerance but
        // hit the duplicate cap; each tick fires the threshold
        for i in 0..8 {
            let value = 130.0 + (i as f64) * 40.0;
            f.pipeline
                .process_tick(&mut state, &snapshot("e1", "speed_kmh", value, i * MIN));
        }

        let summary = f.store.summary(Some("e1"));
        assert_eq!(summary.total, 8);
        assert!(summary.suppressed >= 3);

        // Suppressed alerts never reached the queue
        assert_eq!(f.queue.len() as usize, summary.total - summary.suppressed);
    }

    #[test]
    fn test_predictive_scorer_produces_alert() {
        struct HighRisk;
        impl RiskScorer for HighRisk {
            fn predict(
                &self,
                _entity_id: &str,
                _horizon_ms: i64,
            ) -> Result<crate::eval::RiskPrediction, crate::eval::PredictError> {
                Ok(crate::eval::RiskPrediction::new(0.85)
                    .with_actions(vec!["schedule coaching".to_string()]))
            }
        }

        let mut f = fixture();
        f.pipeline.scorer = Some(Arc::new(HighRisk));

        let mut state = EntityState::new(120);
        let created = f
            .pipeline
            .process_tick(&mut state, &MetricSnapshot::new("e1", 0));
        assert_eq!(created, 1);

        let alerts = f.store.active_alerts(Some("e1"));
        assert_eq!(alerts[0].alert_type, AlertType::Predictive);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(
            alerts[0].recommended_actions,
            vec!["schedule coaching".to_string()]
        );
    }
}
