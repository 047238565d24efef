use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    acknowledge_alert, add_maintenance_window, alert_summary, false_positive_alert, get_alert,
    health_check, ingest, list_alerts, list_entities, register_recipient, register_rule,
    register_threshold, resolve_alert, start_entity, stop_entity, AppState,
};
use crate::config::ConfigStore;
use crate::dispatch::{DispatchQueue, Dispatcher, HttpTransport, RetryPolicy};
use crate::monitor::{MonitorEngine, MonitorSettings};
use crate::store::MemoryAlertStore;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub dispatch_workers: usize,
    pub queue_capacity: usize,
    pub escalation_check_interval_secs: u64,
    pub monitor: MonitorSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            dispatch_workers: num_cpus::get().clamp(2, 8),
            queue_capacity: 1024,
            escalation_check_interval_secs: 30,
            monitor: MonitorSettings::default(),
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Ingest
        .route("/ingest", post(ingest))
        // Alerts
        .route("/alerts", get(list_alerts))
        .route("/alerts/summary", get(alert_summary))
        .route("/alerts/:id", get(get_alert))
        .route("/alerts/:id/acknowledge", post(acknowledge_alert))
        .route("/alerts/:id/resolve", post(resolve_alert))
        .route("/alerts/:id/false-positive", post(false_positive_alert))
        // Entity monitoring
        .route("/entities", get(list_entities))
        .route("/entities/:id/start", post(start_entity))
        .route("/entities/:id/stop", post(stop_entity))
        // Configuration
        .route("/config/thresholds", post(register_threshold))
        .route("/config/rules", post(register_rule))
        .route("/config/recipients", post(register_recipient))
        .route("/config/maintenance", post(add_maintenance_window))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let configs = Arc::new(ConfigStore::new());
    let store = Arc::new(MemoryAlertStore::new());
    let queue = Arc::new(DispatchQueue::new(config.queue_capacity));

    let engine = Arc::new(MonitorEngine::new(
        Arc::clone(&configs),
        Arc::clone(&store) as Arc<dyn crate::store::AlertStore>,
        None,
        Arc::clone(&queue),
        config.monitor.clone(),
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&queue),
        Arc::new(HttpTransport::new()),
        Arc::clone(&store) as Arc<dyn crate::store::AlertStore>,
        Arc::clone(&configs),
        RetryPolicy::default(),
    ));
    let dispatch_handles = dispatcher.start(
        config.dispatch_workers,
        Duration::from_secs(config.escalation_check_interval_secs),
    );
    tracing::info!(
        workers = config.dispatch_workers,
        "Dispatch worker pool started"
    );

    let state = Arc::new(AppState {
        engine: Arc::clone(&engine),
        store: Arc::clone(&store) as Arc<dyn crate::store::AlertStore>,
        configs,
    });

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting Fleetwatch server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(
            Arc::clone(&engine),
            Arc::clone(&dispatcher),
        ))
        .await?;

    // Workers exit once the queue drains after close
    for handle in dispatch_handles {
        handle.abort();
    }

    tracing::info!("Fleetwatch server stopped");
    Ok(())
}

async fn shutdown_signal(engine: Arc<MonitorEngine>, dispatcher: Arc<Dispatcher>) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");

    tracing::info!("Shutdown signal received, stopping workers...");
    engine.shutdown().await;
    dispatcher.stop();
}
