//! Mapping file watcher for hot reload.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::mapping::MappingSnapshot;

/// Reloads a mapping snapshot when its file changes on disk.
pub struct MappingWatcher {
    path: PathBuf,
    snapshot: Arc<MappingSnapshot>,
}

impl MappingWatcher {
    pub fn new(snapshot: Arc<MappingSnapshot>) -> Self {
        Self {
            path: absolute_target(snapshot.path()),
            snapshot,
        }
    }

    /// Start watching in notify's background thread.
    ///
    /// The parent directory is watched so that editors which replace the file
    /// by rename are still seen. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let target = self.path.clone();
        let snapshot = self.snapshot;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.paths.iter().any(|p| p == &target);
                    if relevant && (event.kind.is_modify() || event.kind.is_create()) {
                        tracing::info!(path = %target.display(), "Mapping file change detected, reloading");
                        snapshot.reload();
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(watch_dir(&self.path), RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Mapping watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Event paths are absolute, so resolve `./x` or `../conf/x` up front. Only
/// the directory is canonicalized: a symlinked mapping file keeps its name.
fn absolute_target(path: &Path) -> PathBuf {
    let dir = watch_dir(path);
    match (dir.canonicalize(), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingFile;

    #[test]
    fn watches_parent_directory() {
        assert_eq!(watch_dir(Path::new("/etc/ip-mapper/mapping.properties")), Path::new("/etc/ip-mapper"));
        assert_eq!(watch_dir(Path::new("mapping.properties")), Path::new("."));
    }

    #[test]
    fn relative_targets_become_absolute() {
        let cwd = env::current_dir().unwrap().canonicalize().unwrap();
        assert_eq!(absolute_target(Path::new("./mapping.properties")), cwd.join("mapping.properties"));
        assert_eq!(absolute_target(Path::new("mapping.properties")), cwd.join("mapping.properties"));

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("conf")).unwrap();
        let dotted = dir.path().join("conf/../conf/mapping.properties");
        assert_eq!(
            absolute_target(&dotted),
            dir.path().canonicalize().unwrap().join("conf/mapping.properties")
        );
    }

    #[test]
    fn missing_directory_falls_back_to_joined_path() {
        let target = absolute_target(Path::new("no-such-dir/mapping.properties"));
        assert!(target.is_absolute());
        assert!(target.ends_with("no-such-dir/mapping.properties"));
    }

    #[tokio::test]
    async fn reloads_snapshot_through_dotted_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("conf")).unwrap();
        let real = dir.path().join("conf/mapping.properties");
        std::fs::write(&real, "a=10.0.0.0/8\n").unwrap();

        let configured = dir.path().join("conf/../conf/mapping.properties");
        let snapshot = Arc::new(MappingSnapshot::load(MappingFile::new(&configured)));
        let _watcher = MappingWatcher::new(Arc::clone(&snapshot)).run().unwrap();

        std::fs::write(&real, "b=10.0.0.0/8\n").unwrap();
        let mut reloaded = false;
        for _ in 0..100 {
            let table = snapshot.current().unwrap();
            if table.iter().any(|r| r.label() == "b") {
                reloaded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(reloaded, "watcher should reload the edited mapping");
    }
}
