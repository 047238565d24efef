use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ConfigError, ConfigStore};
use crate::model::{
    Alert, AlertRule, MaintenanceWindow, MetricSnapshot, Recipient, Threshold,
};
use crate::monitor::{MonitorEngine, MonitorError};
use crate::store::{AlertStore, AlertSummary, StoreError};

/// Application state shared across handlers
pub struct AppState {
    pub engine: Arc<MonitorEngine>,
    pub store: Arc<dyn AlertStore>,
    pub configs: Arc<ConfigStore>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub monitored_entities: usize,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        monitored_entities: state.engine.monitored_entities().len(),
    })
}

// ============================================================================
// Ingest
// ============================================================================

#[derive(Deserialize)]
pub struct IngestRequest {
    pub entity_id: String,
    /// Unix millis; defaults to the server clock
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
    pub metrics: HashMap<String, f64>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub accepted: bool,
    pub entity_id: String,
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    if request.entity_id.is_empty() {
        return Err(ApiError::BadRequest("entity_id is empty".to_string()));
    }

    let timestamp_ms = request
        .timestamp_ms
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
    let mut snapshot = MetricSnapshot::new(&request.entity_id, timestamp_ms);
    snapshot.metrics = request.metrics;

    let entity_id = request.entity_id.clone();
    state.engine.process_snapshot(snapshot).await?;

    Ok(Json(IngestResponse {
        accepted: true,
        entity_id,
    }))
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Deserialize)]
pub struct AlertFilter {
    #[serde(default)]
    pub entity_id: Option<String>,
}

#[derive(Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
    pub count: usize,
}

pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<AlertFilter>,
) -> Json<AlertsResponse> {
    let mut alerts = state.store.active_alerts(filter.entity_id.as_deref());
    alerts.sort_by_key(|a| std::cmp::Reverse(a.triggered_at));
    Json(AlertsResponse {
        count: alerts.len(),
        alerts,
    })
}

pub async fn alert_summary(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<AlertFilter>,
) -> Json<AlertSummary> {
    Json(state.store.summary(filter.entity_id.as_deref()))
}

pub async fn get_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    state
        .store
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Alert '{}' not found", id)))
}

#[derive(Deserialize)]
pub struct AcknowledgeRequest {
    pub actor: String,
}

pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<AcknowledgeRequest>,
) -> Result<Json<Alert>, ApiError> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let alert = state.store.acknowledge(&id, &request.actor, now_ms)?;
    Ok(Json(alert))
}

#[derive(Deserialize, Default)]
pub struct ResolveRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<Alert>, ApiError> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let alert = state.store.resolve(&id, request.notes, now_ms)?;
    Ok(Json(alert))
}

pub async fn false_positive_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let alert = state.store.mark_false_positive(&id, now_ms)?;
    Ok(Json(alert))
}

// ============================================================================
// Entity Monitoring
// ============================================================================

#[derive(Serialize)]
pub struct EntitiesResponse {
    pub entities: Vec<String>,
}

pub async fn list_entities(State(state): State<Arc<AppState>>) -> Json<EntitiesResponse> {
    let mut entities = state.engine.monitored_entities();
    entities.sort();
    Json(EntitiesResponse { entities })
}

#[derive(Serialize)]
pub struct MonitoringResponse {
    pub entity_id: String,
    pub monitored: bool,
}

pub async fn start_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<MonitoringResponse> {
    state.engine.start_monitoring(&id);
    Json(MonitoringResponse {
        entity_id: id,
        monitored: true,
    })
}

pub async fn stop_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MonitoringResponse>, ApiError> {
    if !state.engine.stop_monitoring(&id).await {
        return Err(ApiError::NotFound(format!(
            "Entity '{}' is not monitored",
            id
        )));
    }
    Ok(Json(MonitoringResponse {
        entity_id: id,
        monitored: false,
    }))
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Serialize)]
pub struct ConfigResponse {
    pub id: String,
    pub registered: bool,
}

pub async fn register_threshold(
    State(state): State<Arc<AppState>>,
    Json(threshold): Json<Threshold>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let id = threshold.id.clone();
    state.configs.register_threshold(threshold)?;
    Ok(Json(ConfigResponse {
        id,
        registered: true,
    }))
}

pub async fn register_rule(
    State(state): State<Arc<AppState>>,
    Json(rule): Json<AlertRule>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let id = rule.id.clone();
    state.configs.register_rule(rule)?;
    Ok(Json(ConfigResponse {
        id,
        registered: true,
    }))
}

pub async fn register_recipient(
    State(state): State<Arc<AppState>>,
    Json(recipient): Json<Recipient>,
) -> Json<ConfigResponse> {
    let id = recipient.id.clone();
    state.configs.register_recipient(recipient);
    Json(ConfigResponse {
        id,
        registered: true,
    })
}

pub async fn add_maintenance_window(
    State(state): State<Arc<AppState>>,
    Json(window): Json<MaintenanceWindow>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let id = window.id.clone();
    state.configs.add_maintenance_window(window)?;
    Ok(Json(ConfigResponse {
        id,
        registered: true,
    }))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ApiError::NotFound(e.to_string()),
            StoreError::InvalidTransition { .. } => ApiError::Conflict(e.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::NotMonitored(_) => ApiError::NotFound(e.to_string()),
            MonitorError::WorkerGone(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
