//! Request Shaper - host binary
//!
//! Constructs one instance of every shaping component and serves them over
//! HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use request_shaper::api::create_router;
use request_shaper::events::TracingSink;
use request_shaper::request::FlushedBatch;
use request_shaper::{spawn_batch_flush_task, spawn_cleanup_task, AppState, Config};

/// Main entry point for the request shaper host.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Construct the shaping components
/// 4. Start the expiry sweep and batch flush tasks
/// 5. Serve the HTTP API until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "request_shaper=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting request shaper");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_limit={}, layer_capacity={}, default_ttl={}ms, port={}",
        config.cache_limit, config.layer_capacity, config.default_ttl_ms, config.server_port
    );
    info!(
        "Intervals: sweep={}ms, batch_flush={}ms, upstream_timeout={}ms, allow_by_default={}",
        config.sweep_interval_ms,
        config.batch_flush_interval_ms,
        config.upstream_timeout_ms,
        config.rate_limit_allow_by_default
    );

    let state = AppState::from_config(&config, Arc::new(TracingSink))
        .context("failed to initialize shaping components")?;
    info!("Shaping components initialized");

    let cleanup_handle = spawn_cleanup_task(state.clone(), config.sweep_interval());

    let (flush_tx, flush_rx) = mpsc::unbounded_channel();
    let flush_handle =
        spawn_batch_flush_task(state.batcher.clone(), config.batch_flush_interval(), flush_tx);
    let consumer_handle = spawn_flush_logger(flush_rx);
    info!("Background tasks started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(vec![
            cleanup_handle,
            flush_handle,
            consumer_handle,
        ]))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Logs batches drained by the flush task. A real deployment would forward
/// them to the downstream service instead.
fn spawn_flush_logger(
    mut rx: mpsc::UnboundedReceiver<FlushedBatch<serde_json::Value>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(batch) = rx.recv().await {
            info!(
                "Batch {} ({}) timed out with {} requests",
                batch.batch_id,
                batch.name,
                batch.requests.len()
            );
        }
    })
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the
/// background tasks.
async fn shutdown_signal(tasks: Vec<JoinHandle<()>>) {
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for task in tasks {
        task.abort();
    }
    warn!("Background tasks aborted");
}
