//! Mapping table sources.
//!
//! # Responsibilities
//! - Read the mapping file in one scoped operation
//! - Per-request mode: re-read and re-parse on every call
//! - Snapshot mode: hold an immutable table behind `ArcSwap`, refreshed when
//!   the file changes
//!
//! # Design Decisions
//! - Readers never block: `current()` is a lock-free pointer load
//! - A failed refresh keeps the last good table; with no good table at all,
//!   callers get `ConfigError::Unavailable` and fail open

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::mapping::table::MappingTable;
use crate::mapping::ConfigError;
use crate::observability::metrics;

/// A mapping file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingFile {
    path: PathBuf,
}

impl MappingFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole file.
    pub fn load(&self) -> Result<MappingTable, ConfigError> {
        let start = Instant::now();
        let result = fs::read_to_string(&self.path)
            .map_err(|source| ConfigError::Io {
                path: self.path.clone(),
                source,
            })
            .and_then(|text| MappingTable::parse(&text));

        match &result {
            Ok(table) => {
                tracing::trace!(path = %self.path.display(), rules = table.len(), "Mapping file loaded");
                metrics::record_mapping_load("ok", start);
            }
            Err(e) => metrics::record_mapping_load(e.kind(), start),
        }
        result
    }

    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}

#[derive(Debug, Default)]
struct SnapshotState {
    table: Option<Arc<MappingTable>>,
    last_error: Option<String>,
    modified: Option<SystemTime>,
}

/// Immutable mapping table shared by all requests, swapped on refresh.
pub struct MappingSnapshot {
    file: MappingFile,
    state: ArcSwap<SnapshotState>,
}

impl MappingSnapshot {
    /// Create a snapshot and attempt the first load.
    ///
    /// A failed first load is recorded, not returned: requests fail open
    /// until a later refresh succeeds.
    pub fn load(file: MappingFile) -> Self {
        let snapshot = Self {
            file,
            state: ArcSwap::from_pointee(SnapshotState::default()),
        };
        snapshot.reload();
        snapshot
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// The table currently in effect.
    pub fn current(&self) -> Result<Arc<MappingTable>, ConfigError> {
        let state = self.state.load();
        match &state.table {
            Some(table) => Ok(Arc::clone(table)),
            None => Err(ConfigError::Unavailable(
                state
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "mapping not loaded".to_string()),
            )),
        }
    }

    /// Reload only if the file's modification time moved since the last
    /// attempt. Returns true if a new table was installed.
    pub fn refresh_if_changed(&self) -> bool {
        let modified = self.file.modified();
        if modified.is_some() && modified == self.state.load().modified {
            return false;
        }
        self.reload()
    }

    /// Unconditionally re-read the file. Returns true if a new table was
    /// installed.
    pub fn reload(&self) -> bool {
        let modified = self.file.modified();
        let previous = self.state.load_full();

        match self.file.load() {
            Ok(table) => {
                tracing::info!(
                    path = %self.file.path().display(),
                    rules = table.len(),
                    "Mapping snapshot installed"
                );
                self.state.store(Arc::new(SnapshotState {
                    table: Some(Arc::new(table)),
                    last_error: None,
                    modified,
                }));
                true
            }
            Err(e) => {
                if previous.table.is_some() {
                    tracing::error!(
                        path = %self.file.path().display(),
                        error = %e,
                        "Mapping reload failed, keeping last good mapping"
                    );
                } else {
                    tracing::error!(
                        path = %self.file.path().display(),
                        error = %e,
                        "Mapping load failed, requests pass through unannotated"
                    );
                }
                // Keep the old mtime so the next refresh retries.
                self.state.store(Arc::new(SnapshotState {
                    table: previous.table.clone(),
                    last_error: Some(e.to_string()),
                    modified: previous.modified,
                }));
                false
            }
        }
    }

    /// Poll the file on a fixed interval until shutdown.
    pub fn spawn_refresher(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                path = %self.file.path().display(),
                interval_secs = interval.as_secs(),
                "Mapping refresher starting"
            );

            let mut ticker = time::interval(interval);
            // The first tick completes immediately; the snapshot is already loaded.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.refresh_if_changed();
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Mapping refresher received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}

impl fmt::Debug for MappingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load();
        f.debug_struct("MappingSnapshot")
            .field("path", &self.file.path())
            .field("rules", &state.table.as_ref().map(|t| t.len()))
            .field("last_error", &state.last_error)
            .finish()
    }
}

/// Where the filter gets its table from.
#[derive(Debug, Clone)]
pub enum MappingStore {
    /// Re-read the file on every request.
    PerRequest(MappingFile),
    /// Serve a shared snapshot refreshed in the background.
    Snapshot(Arc<MappingSnapshot>),
}

impl MappingStore {
    pub fn current(&self) -> Result<Arc<MappingTable>, ConfigError> {
        match self {
            MappingStore::PerRequest(file) => file.load().map(Arc::new),
            MappingStore::Snapshot(snapshot) => snapshot.current(),
        }
    }

    /// True when `current()` performs file I/O.
    pub fn reads_per_request(&self) -> bool {
        matches!(self, MappingStore::PerRequest(_))
    }

    pub fn path(&self) -> &Path {
        match self {
            MappingStore::PerRequest(file) => file.path(),
            MappingStore::Snapshot(snapshot) => snapshot.path(),
        }
    }
}
