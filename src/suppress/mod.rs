//! Suppression engine
//!
//! Decides at creation time whether an alert should be held back from
//! notification. Checks run in fixed order: maintenance window, then
//! the duplicate cap, then quiet hours. Suppressed alerts are still
//! persisted with status `suppressed`, never dropped.

use crate::config::ConfigStore;
use crate::model::{Alert, AlertSeverity, SuppressionReason};
use crate::store::AlertStore;

/// Suppression parameters
#[derive(Debug, Clone)]
pub struct SuppressionEngine {
    /// Max same-(entity, metric, type) alerts in the trailing hour
    pub duplicate_cap: usize,
}

impl Default for SuppressionEngine {
    fn default() -> Self {
        Self { duplicate_cap: 5 }
    }
}

impl SuppressionEngine {
    /// Returns the suppression reason, or None when the alert should
    /// be dispatched
    pub fn check(
        &self,
        alert: &Alert,
        configs: &ConfigStore,
        store: &dyn AlertStore,
        now_ms: i64,
    ) -> Option<SuppressionReason> {
        if configs.in_maintenance(&alert.entity_id, now_ms) {
            return Some(SuppressionReason::MaintenanceWindow);
        }

        let hour_ago = now_ms - 60 * 60 * 1000;
        let recent = store.count_matching_since(
            &alert.entity_id,
            &alert.triggered_by,
            alert.alert_type,
            hour_ago,
        );
        if recent >= self.duplicate_cap {
            return Some(SuppressionReason::ExcessiveDuplicates);
        }

        // Quiet hours only hold back info; warning and above always
        // reach someone
        if alert.severity == AlertSeverity::Info {
            let recipients: Vec<_> = configs
                .all_recipients()
                .into_iter()
                .filter(|r| r.prefs.accepts(alert.severity, alert.alert_type))
                .collect();
            let all_quiet = !recipients.is_empty()
                && recipients.iter().all(|r| {
                    r.prefs
                        .quiet_hours
                        .map(|qh| qh.contains(now_ms))
                        .unwrap_or(false)
                });
            if all_quiet {
                return Some(SuppressionReason::QuietHours);
            }
        }

        None
    }
}
