//! Timeout-driven escalation
//!
//! Tracks unacknowledged alerts with an escalation policy. Level 1 is
//! notified when the alert is first dispatched; each expired level
//! timeout advances to the next level until acknowledgment or the
//! policy is exhausted. `check` takes an explicit `now` so tests can
//! drive simulated time.

use dashmap::DashMap;

use super::queue::DispatchJob;
use crate::model::{AlertStatus, DeliveryState, EscalationPolicy};
use crate::store::AlertStore;

#[derive(Debug, Clone)]
struct EscalationState {
    policy: EscalationPolicy,
    /// Index of the last notified level
    level: usize,
    /// When the current level times out (unix millis)
    deadline_ms: i64,
}

/// Per-alert escalation state machine
pub struct EscalationTracker {
    states: DashMap<String, EscalationState>,
}

impl EscalationTracker {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    /// Begin tracking after level 1 has been dispatched
    pub fn register(&self, alert_id: &str, policy: EscalationPolicy, now_ms: i64) {
        let Some(first) = policy.levels.first() else {
            return;
        };
        let deadline_ms = now_ms + first.timeout_ms;
        self.states.insert(
            alert_id.to_string(),
            EscalationState {
                policy,
                level: 0,
                deadline_ms,
            },
        );
    }

    /// Stop tracking (acknowledged, resolved, or no longer relevant)
    pub fn remove(&self, alert_id: &str) {
        self.states.remove(alert_id);
    }

    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    /// Whether an alert is currently being escalated
    pub fn is_tracked(&self, alert_id: &str) -> bool {
        self.states.contains_key(alert_id)
    }

    /// Advance expired levels and emit dispatch jobs for each newly
    /// reached level. Exhausted policies without acknowledgment are
    /// logged as unresolved dispatch failures, never silently dropped.
    pub fn check(&self, store: &dyn AlertStore, now_ms: i64) -> Vec<DispatchJob> {
        let mut jobs = Vec::new();
        let mut finished = Vec::new();

        for mut entry in self.states.iter_mut() {
            let alert_id = entry.key().clone();
            let Some(alert) = store.get(&alert_id) else {
                finished.push(alert_id);
                continue;
            };

            // Acknowledgment (or any lifecycle exit) stops escalation
            if alert.status != AlertStatus::Active {
                finished.push(alert_id);
                continue;
            }

            if now_ms < entry.deadline_ms {
                continue;
            }

            let next = entry.level + 1;
            match entry.policy.levels.get(next) {
                Some(level) => {
                    tracing::info!(
                        alert_id = %alert_id,
                        level = next + 1,
                        "Escalating unacknowledged alert"
                    );
                    jobs.push(DispatchJob {
                        alert_id: alert_id.clone(),
                        severity: alert.severity,
                        alert_type: alert.alert_type,
                        channels: level.channels.clone(),
                        recipient_ids: level.recipients.clone(),
                        escalation: None,
                    });
                    entry.deadline_ms = now_ms + level.timeout_ms;
                    entry.level = next;
                }
                None => {
                    let delivered = alert
                        .notifications
                        .iter()
                        .any(|n| n.state == DeliveryState::Delivered);
                    if delivered {
                        tracing::warn!(
                            alert_id = %alert_id,
                            "Escalation policy exhausted without acknowledgment"
                        );
                    } else {
                        tracing::error!(
                            alert_id = %alert_id,
                            entity_id = %alert.entity_id,
                            "Unresolved dispatch failure: all escalation levels \
                             exhausted with no delivery and no acknowledgment"
                        );
                    }
                    finished.push(alert_id);
                }
            }
        }

        for id in finished {
            self.states.remove(&id);
        }
        jobs
    }
}

impl Default for EscalationTracker {
    fn default() -> Self {
        Self::new()
    }
}
