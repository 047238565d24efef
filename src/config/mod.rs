//! Configuration store for thresholds, rules, recipients, and
//! maintenance windows.
//!
//! Registration validates each config; invalid entries are rejected
//! (or skipped with a warning during bulk loads) so that monitoring
//! continues with the remaining valid configs.

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::model::{AlertRule, MaintenanceWindow, Recipient, Threshold};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid threshold '{id}': {reason}")]
    InvalidThreshold { id: String, reason: String },

    #[error("Invalid rule '{id}': {reason}")]
    InvalidRule { id: String, reason: String },

    #[error("Invalid maintenance window '{id}': {reason}")]
    InvalidMaintenanceWindow { id: String, reason: String },
}

/// Keyed store of active monitoring configuration
pub struct ConfigStore {
    /// Thresholds keyed by entity ID
    thresholds: DashMap<String, Vec<Threshold>>,
    /// Rules keyed by entity ID
    rules: DashMap<String, Vec<AlertRule>>,
    /// Recipients keyed by recipient ID
    recipients: DashMap<String, Recipient>,
    /// Maintenance windows (small list, scanned per check)
    maintenance: RwLock<Vec<MaintenanceWindow>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            thresholds: DashMap::new(),
            rules: DashMap::new(),
            recipients: DashMap::new(),
            maintenance: RwLock::new(Vec::new()),
        }
    }

    /// Register a threshold; replaces an existing one with the same ID
    pub fn register_threshold(&self, threshold: Threshold) -> Result<(), ConfigError> {
        threshold
            .validate()
            .map_err(|reason| ConfigError::InvalidThreshold {
                id: threshold.id.clone(),
                reason,
            })?;

        let mut entry = self
            .thresholds
            .entry(threshold.entity_id.clone())
            .or_default();
        entry.retain(|t| t.id != threshold.id);
        entry.push(threshold);
        Ok(())
    }

    /// Register a rule; replaces an existing one with the same ID
    pub fn register_rule(&self, rule: AlertRule) -> Result<(), ConfigError> {
        rule.validate().map_err(|reason| ConfigError::InvalidRule {
            id: rule.id.clone(),
            reason,
        })?;

        let mut entry = self.rules.entry(rule.entity_id.clone()).or_default();
        entry.retain(|r| r.id != rule.id);
        entry.push(rule);
        Ok(())
    }

    /// Bulk-load thresholds, skipping invalid entries with a warning
    pub fn load_thresholds(&self, thresholds: Vec<Threshold>) -> usize {
        let mut loaded = 0;
        for threshold in thresholds {
            match self.register_threshold(threshold) {
                Ok(()) => loaded += 1,
                Err(e) => tracing::warn!(error = %e, "Skipping invalid threshold"),
            }
        }
        loaded
    }

    /// Bulk-load rules, skipping invalid entries with a warning
    pub fn load_rules(&self, rules: Vec<AlertRule>) -> usize {
        let mut loaded = 0;
        for rule in rules {
            match self.register_rule(rule) {
                Ok(()) => loaded += 1,
                Err(e) => tracing::warn!(error = %e, "Skipping invalid rule"),
            }
        }
        loaded
    }

    /// Register or replace a recipient
    pub fn register_recipient(&self, recipient: Recipient) {
        self.recipients.insert(recipient.id.clone(), recipient);
    }

    /// Add a maintenance window
    pub fn add_maintenance_window(
        &self,
        window: MaintenanceWindow,
    ) -> Result<(), ConfigError> {
        if window.end_ms <= window.start_ms {
            return Err(ConfigError::InvalidMaintenanceWindow {
                id: window.id.clone(),
                reason: "end_ms must be after start_ms".to_string(),
            });
        }
        self.maintenance.write().push(window);
        Ok(())
    }

    /// Enabled thresholds for an entity
    pub fn thresholds_for(&self, entity_id: &str) -> Vec<Threshold> {
        self.thresholds
            .get(entity_id)
            .map(|entry| entry.iter().filter(|t| t.enabled).cloned().collect())
            .unwrap_or_default()
    }

    /// Enabled rules for an entity
    pub fn rules_for(&self, entity_id: &str) -> Vec<AlertRule> {
        self.rules
            .get(entity_id)
            .map(|entry| entry.iter().filter(|r| r.enabled).cloned().collect())
            .unwrap_or_default()
    }

    /// Look up a recipient by ID
    pub fn recipient(&self, id: &str) -> Option<Recipient> {
        self.recipients.get(id).map(|r| r.clone())
    }

    /// All registered recipients
    pub fn all_recipients(&self) -> Vec<Recipient> {
        self.recipients.iter().map(|r| r.clone()).collect()
    }

    /// Whether the entity is inside an active maintenance window
    pub fn in_maintenance(&self, entity_id: &str, now_ms: i64) -> bool {
        self.maintenance
            .read()
            .iter()
            .any(|w| w.entity_id == entity_id && w.contains(now_ms))
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}
