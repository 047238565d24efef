//! Notification policy types: channels, recipients, escalation levels,
//! and maintenance windows.

use chrono::{TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::alert::{AlertSeverity, AlertType};

/// Delivery channel for a notification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Structured log entry (always available)
    Log,
    Email,
    Sms,
    /// HTTP POST to the recipient's webhook URL
    Webhook,
}

/// Hour-of-day range during which info-severity alerts are held back.
/// Wrap-around ranges (e.g. 22-6) are supported.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuietHours {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl QuietHours {
    /// Whether the given unix-millis timestamp falls inside the range
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        let hour = match Utc.timestamp_millis_opt(timestamp_ms).single() {
            Some(dt) => dt.hour() as u8,
            None => return false,
        };
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Per-recipient notification preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientPrefs {
    /// Alerts below this severity are not delivered
    pub min_severity: AlertSeverity,
    /// Alert types accepted; empty means all
    #[serde(default)]
    pub alert_types: Vec<AlertType>,
    /// Hourly delivery cap; 0 means unlimited
    #[serde(default)]
    pub max_alerts_per_hour: u32,
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
}

impl Default for RecipientPrefs {
    fn default() -> Self {
        Self {
            min_severity: AlertSeverity::Info,
            alert_types: Vec::new(),
            max_alerts_per_hour: 0,
            quiet_hours: None,
        }
    }
}

impl RecipientPrefs {
    /// Whether this recipient accepts an alert of the given severity/type
    pub fn accepts(&self, severity: AlertSeverity, alert_type: AlertType) -> bool {
        if severity < self.min_severity {
            return false;
        }
        self.alert_types.is_empty() || self.alert_types.contains(&alert_type)
    }
}

/// Notification recipient with channel addresses and preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub prefs: RecipientPrefs,
}

impl Recipient {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            phone: None,
            webhook_url: None,
            prefs: RecipientPrefs::default(),
        }
    }

    /// Set the email address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the webhook URL
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    /// Set notification preferences
    pub fn with_prefs(mut self, prefs: RecipientPrefs) -> Self {
        self.prefs = prefs;
        self
    }
}

/// One tier of an escalation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationLevel {
    /// Recipient IDs notified at this level
    pub recipients: Vec<String>,
    pub channels: Vec<Channel>,
    /// Unacknowledged time before advancing to the next level
    pub timeout_ms: i64,
}

/// Ordered escalation tiers; the dispatcher advances one level per
/// expired timeout until acknowledgment or the last level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub levels: Vec<EscalationLevel>,
}

impl EscalationPolicy {
    pub fn new(levels: Vec<EscalationLevel>) -> Self {
        Self { levels }
    }
}

/// Planned downtime during which an entity's alerts are suppressed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub id: String,
    pub entity_id: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub reason: String,
}

impl MaintenanceWindow {
    /// Whether the window is active at the given time
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms < self.end_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_hours_plain_range() {
        let qh = QuietHours {
            start_hour: 9,
            end_hour: 17,
        };
        // 1970-01-01 12:00 UTC
        assert!(qh.contains(12 * 3600 * 1000));
        // 1970-01-01 20:00 UTC
        assert!(!qh.contains(20 * 3600 * 1000));
    }

    #[test]
    fn test_quiet_hours_wraparound() {
        let qh = QuietHours {
            start_hour: 22,
            end_hour: 6,
        };
        assert!(qh.contains(23 * 3600 * 1000));
        assert!(qh.contains(3 * 3600 * 1000));
        assert!(!qh.contains(12 * 3600 * 1000));
    }

    #[test]
    fn test_prefs_accepts() {
        let prefs = RecipientPrefs {
            min_severity: AlertSeverity::Warning,
            alert_types: vec![AlertType::Threshold],
            ..Default::default()
        };
        assert!(prefs.accepts(AlertSeverity::Critical, AlertType::Threshold));
        assert!(!prefs.accepts(AlertSeverity::Info, AlertType::Threshold));
        assert!(!prefs.accepts(AlertSeverity::Critical, AlertType::Anomaly));
    }

    #[test]
    fn test_maintenance_window_contains() {
        let mw = MaintenanceWindow {
            id: "m1".to_string(),
            entity_id: "e1".to_string(),
            start_ms: 1000,
            end_ms: 2000,
            reason: "scheduled service".to_string(),
        };
        assert!(mw.contains(1500));
        assert!(!mw.contains(2000));
        assert!(!mw.contains(999));
    }
}
