//! Alert correlation
//!
//! Groups a new alert with recent active alerts on the same entity that
//! share its type and triggering metric and have a trigger value within
//! tolerance. Runs inside the entity's worker, so two alerts for one
//! entity can never race to create divergent groups.

use uuid::Uuid;

use crate::model::Alert;
use crate::store::{AlertStore, StoreError};

/// Correlation parameters
#[derive(Debug, Clone)]
pub struct Correlator {
    /// How far back to look for related alerts
    pub window_ms: i64,
    /// Relative trigger-value tolerance (0.10 = 10%)
    pub tolerance: f64,
}

impl Default for Correlator {
    fn default() -> Self {
        Self {
            window_ms: 5 * 60 * 1000,
            tolerance: 0.10,
        }
    }
}

impl Correlator {
    /// Correlate a not-yet-persisted alert against the store.
    ///
    /// Matches receive the shared group id retroactively; the group id
    /// is taken from the earliest matched alert that already has one
    /// (first group wins — pre-existing distinct groups are never
    /// merged), or freshly minted. Mutual similar-alert links are
    /// recorded both ways.
    pub fn correlate(
        &self,
        store: &dyn AlertStore,
        alert: &mut Alert,
    ) -> Result<(), StoreError> {
        let mut matches: Vec<Alert> = store
            .active_alerts(Some(&alert.entity_id))
            .into_iter()
            .filter(|a| a.id != alert.id)
            .filter(|a| a.alert_type == alert.alert_type && a.triggered_by == alert.triggered_by)
            .filter(|a| (alert.triggered_at - a.triggered_at).abs() <= self.window_ms)
            .filter(|a| self.within_tolerance(a.trigger_value, alert.trigger_value))
            .collect();

        if matches.is_empty() {
            return Ok(());
        }

        matches.sort_by_key(|a| a.triggered_at);
        let group_id = matches
            .iter()
            .find_map(|a| a.correlation_group.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        alert.correlation_group = Some(group_id.clone());
        for m in &matches {
            alert.similar_alerts.push(m.id.clone());
            store.set_correlation_group(&m.id, &group_id)?;
            store.add_similar_alert(&m.id, &alert.id)?;
        }

        tracing::debug!(
            alert_id = %alert.id,
            group_id = %group_id,
            matches = matches.len(),
            "Alert correlated"
        );
        Ok(())
    }

    fn within_tolerance(&self, existing: f64, candidate: f64) -> bool {
        (existing - candidate).abs() <= self.tolerance * candidate.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertSeverity, AlertType};
    use crate::store::MemoryAlertStore;

    fn make_alert(metric: &str, value: f64, triggered_at: i64) -> Alert {
        Alert::new(
            "e1",
            AlertType::Threshold,
            AlertSeverity::Critical,
            metric,
            value,
            2.0,
            triggered_at,
        )
    }

    #[test]
    fn test_close_alerts_share_group() {
        let store = MemoryAlertStore::new();
        let correlator = Correlator::default();

        let first = make_alert("safety_incident_rate", 2.5, 0);
        let first_id = first.id.clone();
        store.insert(first).unwrap();

        // One minute later, value within 10%
        let mut second = make_alert("safety_incident_rate", 2.6, 60_000);
        correlator.correlate(&store, &mut second).unwrap();
        store.insert(second.clone()).unwrap();

        let group = second.correlation_group.clone().unwrap();
        assert_eq!(
            store.get(&first_id).unwrap().correlation_group.as_deref(),
            Some(group.as_str())
        );
        assert_eq!(second.similar_alerts, vec![first_id.clone()]);
        assert_eq!(
            store.get(&first_id).unwrap().similar_alerts,
            vec![second.id.clone()]
        );
    }

    #[test]
    fn test_outside_window_not_grouped() {
        let store = MemoryAlertStore::new();
        let correlator = Correlator::default();

        store.insert(make_alert("m", 10.0, 0)).unwrap();

        let mut late = make_alert("m", 10.0, 6 * 60 * 1000);
        correlator.correlate(&store, &mut late).unwrap();
        assert!(late.correlation_group.is_none());
    }

    #[test]
    fn test_value_outside_tolerance_not_grouped() {
        let store = MemoryAlertStore::new();
        let correlator = Correlator::default();

        store.insert(make_alert("m", 10.0, 0)).unwrap();

        let mut far = make_alert("m", 12.0, 60_000);
        correlator.correlate(&store, &mut far).unwrap();
        assert!(far.correlation_group.is_none());
    }

    #[test]
    fn test_different_metric_not_grouped() {
        let store = MemoryAlertStore::new();
        let correlator = Correlator::default();

        store.insert(make_alert("m1", 10.0, 0)).unwrap();

        let mut other = make_alert("m2", 10.0, 1000);
        correlator.correlate(&store, &mut other).unwrap();
        assert!(other.correlation_group.is_none());
    }

    #[test]
    fn test_existing_group_reused() {
        let store = MemoryAlertStore::new();
        let correlator = Correlator::default();

        let first = make_alert("m", 10.0, 0);
        let first_id = first.id.clone();
        store.insert(first).unwrap();
        store.set_correlation_group(&first_id, "group-1").unwrap();

        let mut second = make_alert("m", 10.2, 30_000);
        correlator.correlate(&store, &mut second).unwrap();
        assert_eq!(second.correlation_group.as_deref(), Some("group-1"));
    }

    #[test]
    fn test_third_alert_joins_same_group() {
        let store = MemoryAlertStore::new();
        let correlator = Correlator::default();

        store.insert(make_alert("m", 10.0, 0)).unwrap();

        let mut second = make_alert("m", 10.1, 30_000);
        correlator.correlate(&store, &mut second).unwrap();
        store.insert(second.clone()).unwrap();
        let group = second.correlation_group.clone().unwrap();

        let mut third = make_alert("m", 10.2, 60_000);
        correlator.correlate(&store, &mut third).unwrap();
        assert_eq!(third.correlation_group, Some(group));
        assert_eq!(third.similar_alerts.len(), 2);
    }
}
