//! Alerts, lifecycle states, and notification delivery records

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::policy::Channel;

/// Alert severity, ordered lowest to highest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl AlertSeverity {
    /// Severity from the fraction of rule conditions that triggered
    pub fn from_trigger_ratio(ratio: f64) -> Option<Self> {
        if ratio >= 0.8 {
            Some(AlertSeverity::Critical)
        } else if ratio >= 0.6 {
            Some(AlertSeverity::Warning)
        } else if ratio > 0.0 {
            Some(AlertSeverity::Info)
        } else {
            None
        }
    }
}

/// Which evaluator produced an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Threshold,
    Rule,
    Anomaly,
    Predictive,
}

/// Lifecycle state of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Suppressed,
    FalsePositive,
}

impl AlertStatus {
    /// Whether the lifecycle permits moving from `self` to `to`.
    /// Resolved and false-positive are terminal. Suppression only
    /// happens at creation, never as a transition.
    pub fn can_transition(&self, to: AlertStatus) -> bool {
        use AlertStatus::*;
        matches!(
            (self, to),
            (Active, Acknowledged)
                | (Active, Resolved)
                | (Acknowledged, Resolved)
                | (Active, FalsePositive)
                | (Acknowledged, FalsePositive)
                | (Suppressed, FalsePositive)
        )
    }

    /// Terminal states reject all further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::FalsePositive)
    }
}

/// Why an alert was suppressed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    MaintenanceWindow,
    ExcessiveDuplicates,
    QuietHours,
}

/// Delivery state of one notification attempt chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    Sent,
    Delivered,
    Failed,
    Bounced,
}

/// Per-(channel, recipient) delivery record attached to an alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationStatus {
    pub channel: Channel,
    pub recipient_id: String,
    pub state: DeliveryState,
    pub attempts: u32,
    pub last_attempt_ms: Option<i64>,
    pub error: Option<String>,
}

impl NotificationStatus {
    pub fn pending(channel: Channel, recipient_id: impl Into<String>) -> Self {
        Self {
            channel,
            recipient_id: recipient_id.into(),
            state: DeliveryState::Pending,
            attempts: 0,
            last_attempt_ms: None,
            error: None,
        }
    }
}

/// A single alert instance.
///
/// `trigger_value` and `threshold_value` are immutable after creation;
/// the correlator sets `correlation_group`/`similar_alerts`, the
/// suppression engine sets `status`/`suppression_reason` at creation
/// only, and lifecycle mutations go through the alert store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub entity_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    /// Metric name (threshold/anomaly/predictive) or rule name
    pub triggered_by: String,
    pub trigger_value: f64,
    pub threshold_value: f64,
    #[serde(default)]
    pub root_cause: Option<String>,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    pub escalation_required: bool,
    pub triggered_at: i64,
    #[serde(default)]
    pub acknowledged_at: Option<i64>,
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<i64>,
    #[serde(default)]
    pub resolution_notes: Option<String>,
    #[serde(default)]
    pub notifications: Vec<NotificationStatus>,
    pub status: AlertStatus,
    #[serde(default)]
    pub suppression_reason: Option<SuppressionReason>,
    #[serde(default)]
    pub correlation_group: Option<String>,
    #[serde(default)]
    pub similar_alerts: Vec<String>,
}

impl Alert {
    /// Create an active alert with a fresh ID
    pub fn new(
        entity_id: impl Into<String>,
        alert_type: AlertType,
        severity: AlertSeverity,
        triggered_by: impl Into<String>,
        trigger_value: f64,
        threshold_value: f64,
        triggered_at: i64,
    ) -> Self {
        let triggered_by = triggered_by.into();
        Self {
            id: Uuid::new_v4().to_string(),
            entity_id: entity_id.into(),
            alert_type,
            severity,
            title: format!("{:?} alert: {}", severity, triggered_by),
            description: String::new(),
            triggered_by,
            trigger_value,
            threshold_value,
            root_cause: None,
            recommended_actions: Vec::new(),
            escalation_required: severity >= AlertSeverity::Critical,
            triggered_at,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolution_notes: None,
            notifications: Vec::new(),
            status: AlertStatus::Active,
            suppression_reason: None,
            correlation_group: None,
            similar_alerts: Vec::new(),
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set recommended remediation actions
    pub fn with_actions(mut self, actions: Vec<String>) -> Self {
        self.recommended_actions = actions;
        self
    }

    /// Set the root-cause note
    pub fn with_root_cause(mut self, root_cause: impl Into<String>) -> Self {
        self.root_cause = Some(root_cause.into());
        self
    }

    /// Override the escalation flag
    pub fn with_escalation_required(mut self, required: bool) -> Self {
        self.escalation_required = required;
        self
    }

    /// Whether the alert still counts toward active views and
    /// correlation searches
    pub fn is_active_family(&self) -> bool {
        matches!(
            self.status,
            AlertStatus::Active | AlertStatus::Acknowledged
        )
    }
}
