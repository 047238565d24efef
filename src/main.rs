//! Fleetwatch Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - FLEETWATCH_HOST: Bind address (default: 0.0.0.0)
//! - FLEETWATCH_PORT: Port number (default: 8080)
//! - FLEETWATCH_DISPATCH_WORKERS: Notification worker count (default: CPU count, 2-8)
//! - FLEETWATCH_QUEUE_CAPACITY: Dispatch queue bound (default: 1024)
//! - RUST_LOG: Log level (default: info)

use fleetwatch::api::{run_server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetwatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let defaults = ServerConfig::default();

    let host = std::env::var("FLEETWATCH_HOST").unwrap_or(defaults.host.clone());
    let port: u16 = std::env::var("FLEETWATCH_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults.port);
    let dispatch_workers = std::env::var("FLEETWATCH_DISPATCH_WORKERS")
        .ok()
        .and_then(|w| w.parse().ok())
        .unwrap_or(defaults.dispatch_workers);
    let queue_capacity = std::env::var("FLEETWATCH_QUEUE_CAPACITY")
        .ok()
        .and_then(|c| c.parse().ok())
        .unwrap_or(defaults.queue_capacity);

    let config = ServerConfig {
        host,
        port,
        dispatch_workers,
        queue_capacity,
        ..defaults
    };

    tracing::info!("Fleetwatch configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Dispatch workers: {}", config.dispatch_workers);
    tracing::info!("  Queue capacity: {}", config.queue_capacity);

    run_server(config).await
}
