//! Monitoring engine
//!
//! Routes each entity's snapshots to a dedicated worker task over an
//! mpsc channel, so every entity's pipeline runs strictly in ingest
//! order while distinct entities evaluate concurrently. A worker panic
//! or bad tick affects only its own entity.

pub mod pipeline;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};

use crate::config::ConfigStore;
use crate::correlate::Correlator;
use crate::dispatch::DispatchQueue;
use crate::eval::{AnomalyDetector, RiskEvaluator, RiskScorer};
use crate::model::MetricSnapshot;
use crate::store::AlertStore;
use crate::suppress::SuppressionEngine;

pub use pipeline::{EntityState, MonitorSettings, Pipeline};

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Entity not monitored: {0}")]
    NotMonitored(String),

    #[error("Worker for entity {0} is gone")]
    WorkerGone(String),
}

enum EntityCommand {
    Snapshot(MetricSnapshot),
    /// Acknowledge once all prior commands have been processed
    Flush(oneshot::Sender<()>),
    Stop,
}

struct EntityHandle {
    tx: mpsc::Sender<EntityCommand>,
}

/// Per-entity monitoring orchestrator
pub struct MonitorEngine {
    pipeline: Arc<Pipeline>,
    entities: DashMap<String, EntityHandle>,
}

impl MonitorEngine {
    pub fn new(
        configs: Arc<ConfigStore>,
        store: Arc<dyn AlertStore>,
        scorer: Option<Arc<dyn RiskScorer>>,
        queue: Arc<DispatchQueue>,
        settings: MonitorSettings,
    ) -> Self {
        let pipeline = Arc::new(Pipeline {
            configs,
            store,
            scorer,
            queue,
            detector: AnomalyDetector::default(),
            correlator: Correlator::default(),
            suppression: SuppressionEngine::default(),
            risk: RiskEvaluator::default(),
            settings,
        });
        Self {
            pipeline,
            entities: DashMap::new(),
        }
    }

    /// Spawn a worker for an entity. Returns false when one is already
    /// running.
    pub fn start_monitoring(&self, entity_id: &str) -> bool {
        if self.entities.contains_key(entity_id) {
            return false;
        }
        let (tx, rx) = mpsc::channel(self.pipeline.settings.channel_buffer);
        let pipeline = Arc::clone(&self.pipeline);
        let id = entity_id.to_string();
        tokio::spawn(entity_worker(pipeline, id, rx));
        self.entities
            .insert(entity_id.to_string(), EntityHandle { tx });
        true
    }

    /// Hand a snapshot to the entity's worker, starting one on first
    /// sight of the entity
    pub async fn process_snapshot(&self, snapshot: MetricSnapshot) -> Result<(), MonitorError> {
        self.start_monitoring(&snapshot.entity_id);
        let tx = self
            .entities
            .get(&snapshot.entity_id)
            .map(|h| h.tx.clone())
            .ok_or_else(|| MonitorError::NotMonitored(snapshot.entity_id.clone()))?;
        let entity_id = snapshot.entity_id.clone();
        tx.send(EntityCommand::Snapshot(snapshot))
            .await
            .map_err(|_| MonitorError::WorkerGone(entity_id))
    }

    /// Stop an entity's worker after it drains queued snapshots.
    /// Returns false for an unknown entity.
    pub async fn stop_monitoring(&self, entity_id: &str) -> bool {
        match self.entities.remove(entity_id) {
            Some((_, handle)) => {
                let _ = handle.tx.send(EntityCommand::Stop).await;
                true
            }
            None => false,
        }
    }

    /// Wait until the entity's worker has processed everything queued
    /// so far
    pub async fn flush(&self, entity_id: &str) -> Result<(), MonitorError> {
        let tx = self
            .entities
            .get(entity_id)
            .map(|h| h.tx.clone())
            .ok_or_else(|| MonitorError::NotMonitored(entity_id.to_string()))?;
        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(EntityCommand::Flush(ack_tx))
            .await
            .map_err(|_| MonitorError::WorkerGone(entity_id.to_string()))?;
        ack_rx
            .await
            .map_err(|_| MonitorError::WorkerGone(entity_id.to_string()))
    }

    pub fn is_monitored(&self, entity_id: &str) -> bool {
        self.entities.contains_key(entity_id)
    }

    pub fn monitored_entities(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.key().clone()).collect()
    }

    /// Stop all workers; queued snapshots drain first
    pub async fn shutdown(&self) {
        let ids = self.monitored_entities();
        for id in ids {
            self.stop_monitoring(&id).await;
        }
    }
}

async fn entity_worker(
    pipeline: Arc<Pipeline>,
    entity_id: String,
    mut rx: mpsc::Receiver<EntityCommand>,
) {
    let mut state = EntityState::new(pipeline.settings.history_samples);
    tracing::info!(entity_id = %entity_id, "Monitoring started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            EntityCommand::Snapshot(snapshot) => {
                let created = pipeline.process_tick(&mut state, &snapshot);
                if created > 0 {
                    tracing::debug!(
                        entity_id = %entity_id,
                        alerts = created,
                        "Snapshot produced alerts"
                    );
                }
            }
            EntityCommand::Flush(ack) => {
                let _ = ack.send(());
            }
            EntityCommand::Stop => break,
        }
    }
    tracing::info!(entity_id = %entity_id, "Monitoring stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Threshold;
    use crate::store::MemoryAlertStore;

    fn engine_with(
        configs: Arc<ConfigStore>,
        store: Arc<MemoryAlertStore>,
    ) -> MonitorEngine {
        MonitorEngine::new(
            configs,
            store as Arc<dyn AlertStore>,
            None,
            Arc::new(DispatchQueue::new(64)),
            MonitorSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_auto_start_on_first_snapshot() {
        let configs = Arc::new(ConfigStore::new());
        let store = Arc::new(MemoryAlertStore::new());
        let engine = engine_with(configs, Arc::clone(&store));

        assert!(!engine.is_monitored("driver-1"));
        engine
            .process_snapshot(MetricSnapshot::new("driver-1", 0).with_metric("speed_kmh", 80.0))
            .await
            .unwrap();
        assert!(engine.is_monitored("driver-1"));
        assert_eq!(engine.monitored_entities(), vec!["driver-1".to_string()]);
    }

    #[tokio::test]
    async fn test_snapshots_flow_through_pipeline() {
        let configs = Arc::new(ConfigStore::new());
        configs
            .register_threshold(Threshold::new("t1", "driver-1", "speed_kmh", 100.0, 120.0))
            .unwrap();
        let store = Arc::new(MemoryAlertStore::new());
        let engine = engine_with(configs, Arc::clone(&store));

        engine
            .process_snapshot(MetricSnapshot::new("driver-1", 0).with_metric("speed_kmh", 130.0))
            .await
            .unwrap();
        engine.flush("driver-1").await.unwrap();

        let alerts = store.active_alerts(Some("driver-1"));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].triggered_by, "speed_kmh");
    }

    #[tokio::test]
    async fn test_stop_monitoring_rejects_unknown() {
        let engine = engine_with(
            Arc::new(ConfigStore::new()),
            Arc::new(MemoryAlertStore::new()),
        );
        assert!(!engine.stop_monitoring("ghost").await);
    }

    #[tokio::test]
    async fn test_stop_then_restart() {
        let configs = Arc::new(ConfigStore::new());
        let store = Arc::new(MemoryAlertStore::new());
        let engine = engine_with(configs, store);

        assert!(engine.start_monitoring("e1"));
        assert!(!engine.start_monitoring("e1"));
        assert!(engine.stop_monitoring("e1").await);
        assert!(!engine.is_monitored("e1"));
        assert!(engine.start_monitoring("e1"));
    }

    #[tokio::test]
    async fn test_entities_are_isolated() {
        let configs = Arc::new(ConfigStore::new());
        configs
            .register_threshold(Threshold::new("t1", "e1", "speed_kmh", 100.0, 120.0))
            .unwrap();
        let store = Arc::new(MemoryAlertStore::new());
        let engine = engine_with(configs, Arc::clone(&store));

        engine
            .process_snapshot(MetricSnapshot::new("e1", 0).with_metric("speed_kmh", 130.0))
            .await
            .unwrap();
        engine
            .process_snapshot(MetricSnapshot::new("e2", 0).with_metric("speed_kmh", 130.0))
            .await
            .unwrap();
        engine.flush("e1").await.unwrap();
        engine.flush("e2").await.unwrap();

        // Only e1 has a threshold configured
        assert_eq!(store.active_alerts(Some("e1")).len(), 1);
        assert!(store.active_alerts(Some("e2")).is_empty());
    }
}
