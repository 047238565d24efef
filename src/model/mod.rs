//! Core domain types for monitoring and alerting
//!
//! Everything here is plain data: snapshots arriving from the metric
//! source, threshold/rule configuration, alerts and their delivery
//! records, and notification policy types.

pub mod alert;
pub mod policy;
pub mod rule;
pub mod snapshot;
pub mod threshold;

pub use alert::{
    Alert, AlertSeverity, AlertStatus, AlertType, DeliveryState, NotificationStatus,
    SuppressionReason,
};
pub use policy::{
    Channel, EscalationLevel, EscalationPolicy, MaintenanceWindow, QuietHours, Recipient,
    RecipientPrefs,
};
pub use rule::{Aggregation, AlertRule, Comparator, RuleCondition, TimeAggregation};
pub use snapshot::MetricSnapshot;
pub use threshold::{Direction, Sensitivity, Threshold, ThresholdKind};
