//! Mini Cache - host process for the caching layer
//!
//! Builds the cache layer from environment configuration, runs its background
//! maintenance until shutdown, then reports the final hit rate.

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_cache::metrics::DEFAULT_AVERAGE_WINDOW;
use mini_cache::{CacheLayer, Config};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache layer and register metrics sources
/// 4. Purge stale durable records and start background tasks
/// 5. Wait for SIGINT/SIGTERM, then stop the tasks
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mini Cache");

    let config = Config::from_env();
    info!(
        "Configuration loaded: query_cache={}x{}s/{}, user_cache={}x{}s/{}, sweep_interval={}s",
        config.query_max_entries,
        config.query_default_ttl,
        config.query_policy,
        config.user_max_entries,
        config.user_default_ttl,
        config.user_policy,
        config.sweep_interval
    );

    let layer = CacheLayer::from_config(&config)
        .await
        .context("failed to build cache layer")?;
    info!("Cache layer initialized");

    let tasks = layer.start().await;
    info!("{} background tasks started", tasks.len());

    shutdown_signal().await?;

    tasks.shutdown();
    info!(
        "Average hit rate over the last {} snapshots: {:.1}%",
        DEFAULT_AVERAGE_WINDOW,
        layer.metrics.average_hit_rate(DEFAULT_AVERAGE_WINDOW).await
    );
    info!("Shutdown complete");

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() -> anyhow::Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .context("failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<anyhow::Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("Received Ctrl+C, initiating shutdown...");
        }
        result = terminate => {
            result?;
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    Ok(())
}
