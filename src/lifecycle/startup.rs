//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the mapping store for the configured reload mode
//! - Start background tasks (snapshot refresher, file watcher, metrics)
//! - Bind the listener and serve until shutdown

use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::http::uri::InvalidUri;
use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::loader::LoadError;
use crate::config::schema::{MapperConfig, MapperSettings, ReloadMode};
use crate::config::watcher::MappingWatcher;
use crate::filter::IpMapper;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::mapping::{MappingFile, MappingSnapshot, MappingStore};
use crate::observability::metrics;

/// Fatal errors before or while serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] LoadError),

    #[error("invalid metrics address: {0}")]
    MetricsAddress(#[from] AddrParseError),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("invalid upstream address: {0}")]
    Upstream(#[from] InvalidUri),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Build the mapping store and start whatever keeps it fresh.
///
/// The returned watcher, if any, must be kept alive for as long as change
/// events should be observed.
pub fn build_store(
    settings: &MapperSettings,
    shutdown: &Shutdown,
) -> (MappingStore, Option<notify::RecommendedWatcher>) {
    let file = MappingFile::new(&settings.mapping_file);

    match settings.reload.mode {
        ReloadMode::PerRequest => {
            tracing::info!(path = %file.path().display(), "Mapping file read on every request");
            (MappingStore::PerRequest(file), None)
        }
        ReloadMode::Snapshot => {
            let snapshot = Arc::new(MappingSnapshot::load(file));
            Arc::clone(&snapshot).spawn_refresher(
                Duration::from_secs(settings.reload.refresh_secs),
                shutdown.subscribe(),
            );

            let watcher = if settings.reload.watch {
                match MappingWatcher::new(Arc::clone(&snapshot)).run() {
                    Ok(w) => Some(w),
                    Err(e) => {
                        tracing::error!(error = %e, "Mapping watcher unavailable, relying on periodic refresh");
                        None
                    }
                }
            } else {
                None
            };

            (MappingStore::Snapshot(snapshot), watcher)
        }
    }
}

/// Run the mapper proxy until `shutdown` fires.
pub async fn run(config: MapperConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        header_name = %config.mapper.header_name,
        reload_mode = ?config.mapper.reload.mode,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let (store, _watcher) = build_store(&config.mapper, &shutdown);
    let mapper = IpMapper::from_config(&config.mapper, store).map_err(LoadError::Validation)?;

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let server = HttpServer::new(config, Arc::new(mapper))?;
    server
        .run(listener, shutdown.subscribe())
        .await
        .map_err(StartupError::Server)?;

    // Stop the refresher even if the server exited on its own.
    shutdown.trigger();
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn per_request_mode_starts_nothing_in_background() {
        let settings = MapperSettings::default();
        let (store, watcher) = build_store(&settings, &Shutdown::new());
        assert!(store.reads_per_request());
        assert!(watcher.is_none());
    }

    #[tokio::test]
    async fn snapshot_mode_tolerates_missing_file() {
        let mut settings = MapperSettings::default();
        settings.mapping_file = "/nonexistent/ip-mapping.properties".into();
        settings.reload.mode = ReloadMode::Snapshot;
        settings.reload.watch = false;

        let shutdown = Shutdown::new();
        let (store, _) = build_store(&settings, &shutdown);
        assert!(!store.reads_per_request());
        assert!(store.current().is_err());
        shutdown.trigger();
    }
}
