//! Fleetwatch: Real-Time Performance Monitoring and Alerting Engine
//!
//! Tracks per-entity operational metrics (drivers, vehicles, operators)
//! and raises alerts through four evaluators: threshold bound checks,
//! composite rules, statistical/trend anomaly detection, and predictive
//! risk scoring. Alerts flow through correlation, suppression, an
//! in-memory lifecycle store, and a retrying notification dispatcher
//! with timeout-driven escalation.
//!
//! # Features
//!
//! - **Per-Entity Pipelines**: One worker task per entity keeps
//!   evaluation strictly ordered per entity, concurrent across entities
//! - **Thresholds**: Absolute, percent-change, trend, and
//!   baseline-comparative bound checks
//! - **Rules**: Multi-condition any/all/majority aggregation with
//!   cooldown and auto-resolve
//! - **Anomaly Detection**: Rolling z-score baselines and slope
//!   reversal/acceleration checks
//! - **Correlation**: Time- and value-proximate alerts share a group
//! - **Suppression**: Maintenance windows, duplicate caps, quiet hours
//! - **Dispatch**: Worker pool with per-channel retries, recipient
//!   preferences, hourly caps, and multi-level escalation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fleetwatch::config::ConfigStore;
//! use fleetwatch::dispatch::DispatchQueue;
//! use fleetwatch::model::{MetricSnapshot, Threshold};
//! use fleetwatch::monitor::{MonitorEngine, MonitorSettings};
//! use fleetwatch::store::{AlertStore, MemoryAlertStore};
//!
//! # async fn run() {
//! let configs = Arc::new(ConfigStore::new());
//! configs
//!     .register_threshold(Threshold::new("t1", "driver-1", "speed_kmh", 100.0, 120.0))
//!     .unwrap();
//!
//! let store = Arc::new(MemoryAlertStore::new());
//! let engine = MonitorEngine::new(
//!     configs,
//!     Arc::clone(&store) as Arc<dyn AlertStore>,
//!     None,
//!     Arc::new(DispatchQueue::new(1024)),
//!     MonitorSettings::default(),
//! );
//!
//! let snapshot = MetricSnapshot::new("driver-1", 1_700_000_000_000)
//!     .with_metric("speed_kmh", 130.0);
//! engine.process_snapshot(snapshot).await.unwrap();
//! # }
//! ```

pub mod api;
pub mod config;
pub mod correlate;
pub mod dispatch;
pub mod eval;
pub mod model;
pub mod monitor;
pub mod store;
pub mod suppress;

// Re-export commonly used types
pub use model::{Alert, AlertSeverity, AlertStatus, AlertType, MetricSnapshot};
pub use monitor::{MonitorEngine, MonitorError, MonitorSettings};
pub use store::{AlertStore, MemoryAlertStore, StoreError};
