//! Alert store and lifecycle manager
//!
//! `AlertStore` is the durable-table seam: the engine only talks to the
//! trait, and `MemoryAlertStore` is the in-process keyed implementation.
//! The store enforces lifecycle transitions; evaluators create alerts,
//! the correlator assigns groups, the suppression engine sets the
//! suppressed status at creation, and nothing here ever deletes an
//! alert.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::Serialize;

use crate::model::{
    Alert, AlertSeverity, AlertStatus, AlertType, NotificationStatus,
};

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Alert not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition for alert {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: String,
        from: AlertStatus,
        to: AlertStatus,
    },
}

/// Read projection for dashboards
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertSummary {
    pub total: usize,
    pub active: usize,
    pub acknowledged: usize,
    pub resolved: usize,
    pub suppressed: usize,
    pub false_positive: usize,
    /// Active-family alerts by severity
    pub by_severity: HashMap<String, usize>,
}

/// Keyed alert table with lifecycle enforcement
pub trait AlertStore: Send + Sync {
    /// Persist a new alert (including suppressed ones)
    fn insert(&self, alert: Alert) -> Result<(), StoreError>;

    /// Fetch one alert by ID
    fn get(&self, id: &str) -> Option<Alert>;

    /// Active-family alerts, optionally filtered by entity
    fn active_alerts(&self, entity_id: Option<&str>) -> Vec<Alert>;

    /// Alerts with the same (entity, metric, type) triggered at or
    /// after `since_ms`; drives the duplicate-suppression cap
    fn count_matching_since(
        &self,
        entity_id: &str,
        triggered_by: &str,
        alert_type: AlertType,
        since_ms: i64,
    ) -> usize;

    /// Assign a correlation group to an alert (idempotent; an existing
    /// different group is left untouched, first group wins)
    fn set_correlation_group(&self, alert_id: &str, group_id: &str) -> Result<(), StoreError>;

    /// Record a similar-alert link
    fn add_similar_alert(&self, alert_id: &str, similar_id: &str) -> Result<(), StoreError>;

    /// Insert or update a per-(channel, recipient) delivery record
    fn upsert_notification(
        &self,
        alert_id: &str,
        status: NotificationStatus,
    ) -> Result<(), StoreError>;

    /// active -> acknowledged
    fn acknowledge(&self, id: &str, actor: &str, now_ms: i64) -> Result<Alert, StoreError>;

    /// active/acknowledged -> resolved
    fn resolve(&self, id: &str, notes: Option<String>, now_ms: i64) -> Result<Alert, StoreError>;

    /// Any non-terminal state -> false_positive
    fn mark_false_positive(&self, id: &str, now_ms: i64) -> Result<Alert, StoreError>;

    /// Aggregate counts, optionally per entity
    fn summary(&self, entity_id: Option<&str>) -> AlertSummary;
}

/// In-memory `AlertStore` backed by a concurrent keyed map. Treated as
/// a cache in front of whatever durable table a deployment provides.
pub struct MemoryAlertStore {
    alerts: DashMap<String, Alert>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self {
            alerts: DashMap::new(),
        }
    }

    fn transition(
        &self,
        id: &str,
        to: AlertStatus,
        apply: impl FnOnce(&mut Alert),
    ) -> Result<Alert, StoreError> {
        let mut entry = self
            .alerts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !entry.status.can_transition(to) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: entry.status,
                to,
            });
        }

        entry.status = to;
        apply(&mut entry);
        Ok(entry.clone())
    }
}

impl Default for MemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertStore for MemoryAlertStore {
    fn insert(&self, alert: Alert) -> Result<(), StoreError> {
        tracing::debug!(
            alert_id = %alert.id,
            entity_id = %alert.entity_id,
            severity = ?alert.severity,
            status = ?alert.status,
            "Alert persisted"
        );
        self.alerts.insert(alert.id.clone(), alert);
        Ok(())
    }

    fn get(&self, id: &str) -> Option<Alert> {
        self.alerts.get(id).map(|a| a.clone())
    }

    fn active_alerts(&self, entity_id: Option<&str>) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|a| a.is_active_family())
            .filter(|a| entity_id.map(|e| a.entity_id == e).unwrap_or(true))
            .map(|a| a.clone())
            .collect()
    }

    fn count_matching_since(
        &self,
        entity_id: &str,
        triggered_by: &str,
        alert_type: AlertType,
        since_ms: i64,
    ) -> usize {
        self.alerts
            .iter()
            .filter(|a| {
                a.entity_id == entity_id
                    && a.triggered_by == triggered_by
                    && a.alert_type == alert_type
                    && a.triggered_at >= since_ms
            })
            .count()
    }

    fn set_correlation_group(&self, alert_id: &str, group_id: &str) -> Result<(), StoreError> {
        let mut entry = self
            .alerts
            .get_mut(alert_id)
            .ok_or_else(|| StoreError::NotFound(alert_id.to_string()))?;
        if entry.correlation_group.is_none() {
            entry.correlation_group = Some(group_id.to_string());
        }
        Ok(())
    }

    fn add_similar_alert(&self, alert_id: &str, similar_id: &str) -> Result<(), StoreError> {
        let mut entry = self
            .alerts
            .get_mut(alert_id)
            .ok_or_else(|| StoreError::NotFound(alert_id.to_string()))?;
        if !entry.similar_alerts.iter().any(|s| s == similar_id) {
            entry.similar_alerts.push(similar_id.to_string());
        }
        Ok(())
    }

    fn upsert_notification(
        &self,
        alert_id: &str,
        status: NotificationStatus,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .alerts
            .get_mut(alert_id)
            .ok_or_else(|| StoreError::NotFound(alert_id.to_string()))?;

        if let Some(existing) = entry
            .notifications
            .iter_mut()
            .find(|n| n.channel == status.channel && n.recipient_id == status.recipient_id)
        {
            *existing = status;
        } else {
            entry.notifications.push(status);
        }
        Ok(())
    }

    fn acknowledge(&self, id: &str, actor: &str, now_ms: i64) -> Result<Alert, StoreError> {
        let alert = self.transition(id, AlertStatus::Acknowledged, |a| {
            a.acknowledged_at = Some(now_ms);
            a.acknowledged_by = Some(actor.to_string());
        })?;
        let tta_ms = now_ms - alert.triggered_at;
        tracing::info!(
            alert_id = %id,
            actor = %actor,
            time_to_acknowledge_ms = tta_ms,
            "Alert acknowledged"
        );
        Ok(alert)
    }

    fn resolve(&self, id: &str, notes: Option<String>, now_ms: i64) -> Result<Alert, StoreError> {
        let alert = self.transition(id, AlertStatus::Resolved, |a| {
            a.resolved_at = Some(now_ms);
            a.resolution_notes = notes;
        })?;
        tracing::info!(alert_id = %id, "Alert resolved");
        Ok(alert)
    }

    fn mark_false_positive(&self, id: &str, now_ms: i64) -> Result<Alert, StoreError> {
        let alert = self.transition(id, AlertStatus::FalsePositive, |a| {
            a.resolved_at = Some(now_ms);
        })?;
        tracing::info!(alert_id = %id, "Alert marked false positive");
        Ok(alert)
    }

    fn summary(&self, entity_id: Option<&str>) -> AlertSummary {
        let mut summary = AlertSummary::default();
        for alert in self.alerts.iter() {
            if let Some(e) = entity_id {
                if alert.entity_id != e {
                    continue;
                }
            }
            summary.total += 1;
            match alert.status {
                AlertStatus::Active => summary.active += 1,
                AlertStatus::Acknowledged => summary.acknowledged += 1,
                AlertStatus::Resolved => summary.resolved += 1,
                AlertStatus::Suppressed => summary.suppressed += 1,
                AlertStatus::FalsePositive => summary.false_positive += 1,
            }
            if alert.is_active_family() {
                let key = severity_key(alert.severity).to_string();
                *summary.by_severity.entry(key).or_insert(0) += 1;
            }
        }
        summary
    }
}

fn severity_key(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Info => "info",
        AlertSeverity::Warning => "warning",
        AlertSeverity::Critical => "critical",
        AlertSeverity::Emergency => "emergency",
    }
}
