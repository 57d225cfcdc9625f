//! Meridian Dispatch - shard fan-out sidecar
//!
//! This process:
//! - Maintains pooled HTTP connections to shard endpoints, swept for
//!   idleness by a background janitor
//! - Dispatches per-shard requests with shard-scoped parameter rewriting
//! - Exposes health/ready endpoints for Kubernetes
//! - Exports Prometheus metrics for observability

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use meridian_dispatch::api;
use meridian_dispatch::config::DispatchConfig;
use meridian_dispatch::dispatch::ShardRequestDispatcher;
use meridian_dispatch::health::{self, AppState};
use meridian_dispatch::janitor::PoolJanitor;
use meridian_dispatch::metrics::DispatchMetrics;
use meridian_dispatch::transport::{ConnectionPool, HttpTransport, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first to get log level
    let dispatch_config = DispatchConfig::from_env()?;

    // Initialize tracing with configured log level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(
                    format!("meridian_dispatch={}", dispatch_config.log_level).parse()?,
                )
                .add_directive("hyper_util=warn".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        idle_timeout_secs = dispatch_config.pool.idle_timeout.as_secs(),
        sweep_interval_secs = dispatch_config.pool.sweep_interval.as_secs(),
        "Starting Meridian dispatch"
    );

    // Initialize metrics
    let metrics = Arc::new(DispatchMetrics::new());
    info!("Prometheus metrics initialized");

    // Connection pool and transport
    let pool = Arc::new(ConnectionPool::new(dispatch_config.pool.clone()));
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(Arc::clone(&pool)));

    // Janitor owns the only background timer; stopped on the teardown path
    let janitor = Arc::new(PoolJanitor::new(
        Arc::clone(&transport),
        &dispatch_config.pool,
    ));
    janitor.start();

    let dispatcher = Arc::new(ShardRequestDispatcher::new(Arc::clone(&transport)));

    // HTTP surface: health/ready/metrics plus the fan-out ops endpoint
    let app_state = AppState {
        dispatcher,
        pool,
        janitor: Arc::clone(&janitor),
        metrics,
    };

    let router = health::router(app_state.clone()).merge(api::router(app_state));
    let addr: SocketAddr = ([0, 0, 0, 0], dispatch_config.http_port).into();

    info!(port = dispatch_config.http_port, "Starting HTTP server");

    let http_server = axum::serve(tokio::net::TcpListener::bind(addr).await?, router);

    tokio::select! {
        result = http_server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // Graceful shutdown
    info!("Shutting down dispatch...");
    janitor.stop().await;
    info!("Dispatch shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
