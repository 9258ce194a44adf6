//! Config Cache demo service
//!
//! Keeps a simulated remote service configuration warm in the cache until
//! interrupted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config_cache::{
    spawn_flush_task, stop_channel, CacheConfig, CacheValue, ConfigCache, StopHandle,
};

/// Configuration document fetched from the remote admin API.
#[derive(Debug, Clone)]
struct ServiceConfig {
    service_id: String,
    version: u64,
}

/// Stand-in for the remote admin API; every fetch returns a newer version.
#[derive(Debug, Default)]
struct RemoteConfigSource {
    version: AtomicU64,
}

impl RemoteConfigSource {
    fn fetch(&self, service_id: &str) -> anyhow::Result<ServiceConfig> {
        Ok(ServiceConfig {
            service_id: service_id.to_string(),
            version: self.version.fetch_add(1, Ordering::Relaxed) + 1,
        })
    }
}

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache and seed it with a refreshable entry
/// 4. Start the refresh worker and the flush task
/// 5. Stop both on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "config_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: ttl={}s, refresh_interval={}s, flush_interval={}s, limit={}",
        config.ttl_secs, config.refresh_interval_secs, config.flush_interval_secs, config.limit
    );

    let cache = Arc::new(ConfigCache::<ServiceConfig>::from_config(&config));
    let source = Arc::new(RemoteConfigSource::default());

    let service_id = "2555417777820";
    let initial = source.fetch(service_id)?;
    let value = CacheValue::new(initial).refresh_with({
        let source = Arc::clone(&source);
        move || source.fetch(service_id)
    });
    cache.set(service_id, value)?;

    let (stop, signal) = stop_channel();
    let refresh_interval = config.refresh_interval();
    let refresh_handle = cache.start_refresh_worker(refresh_interval, stop.signal())?;
    let flush_interval = config.flush_interval();
    let flush_handle = spawn_flush_task(Arc::clone(&cache), flush_interval, signal)?;

    shutdown_signal(&stop).await;

    refresh_handle.await?;
    flush_handle.await?;

    if let Some(entry) = cache.get(service_id) {
        info!(
            "Final cached config for service {}: version {} (expires {})",
            entry.item().service_id,
            entry.item().version,
            entry.expires()
        );
    }
    info!("Cache stats: {:?}", cache.stats());
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops background tasks.
async fn shutdown_signal(stop: &StopHandle) {
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

    stop.stop();
    warn!("Background tasks signalled to stop");
}
