//! Filesystem event monitor (C8). Watches the `watch_path` of every active `FILE_CREATED` /
//! `FILE_MODIFIED` template with the `notify` crate and feeds matching events through the shared
//! dispatcher. Grounded on `examples/original_source/backend/app/services/file_watcher.py`
//! (per-template watch registration, debounce-free create/modify handling) for the event
//! semantics, and on `notify`'s own recommended-watcher-plus-channel pattern (see
//! `examples/spacedriveapp-spacedrive/crates/fs-watcher/Cargo.toml` for the dependency choice)
//! for the bridging-into-async shape. `notify = "7.0"` is grounded in
//! `examples/other_examples/manifests/t-yaakov-b2cli/Cargo.toml`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::{warn_overflow, EventDispatcher, IncomingEvent};
use crate::model::{EventType, TemplateSourceConfig};
use crate::store::Store;

/// Bound on the in-memory event queue between the notify callback thread and the async consumer
/// (§4.8: "bounded in-memory queue (max 1,000; drops and logs on overflow)").
const QUEUE_CAPACITY: usize = 1_000;

/// How often the watched-directory set is resynced against the template table.
const RESYNC_INTERVAL: Duration = Duration::from_secs(30);

pub struct FsWatcher {
    store: Arc<dyn Store>,
    dispatcher: Arc<EventDispatcher>,
    watched: RwLock<HashSet<PathBuf>>,
}

impl FsWatcher {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { store, dispatcher, watched: RwLock::new(HashSet::new()) }
    }

    /// Runs the watcher forever: starts a `notify` watcher on a background thread bridged into
    /// this async task via a bounded channel, periodically resyncing the watched directory set
    /// from the active templates and draining filesystem events into the dispatcher.
    pub async fn run(&self) {
        let (tx, mut rx) = mpsc::channel::<Event>(QUEUE_CAPACITY);

        let mut watcher = match RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if tx.try_send(event).is_err() {
                        warn_overflow("fs_watcher");
                    }
                }
                Err(e) => error!(error = %e, "notify watcher error"),
            },
            notify::Config::default(),
        ) {
            Ok(w) => w,
            Err(e) => {
                error!(error = %e, "failed to start filesystem watcher");
                return;
            }
        };

        if let Err(e) = self.resync_watched_paths(&mut watcher).await {
            error!(error = %e, "initial watch-path resync failed");
        }

        let mut resync = tokio::time::interval(RESYNC_INTERVAL);
        resync.tick().await;

        loop {
            tokio::select! {
                _ = resync.tick() => {
                    if let Err(e) = self.resync_watched_paths(&mut watcher).await {
                        error!(error = %e, "watch-path resync failed");
                    }
                }
                maybe_event = rx.recv() => {
                    let Some(event) = maybe_event else { break };
                    self.handle_event(event).await;
                }
            }
        }
    }

    async fn resync_watched_paths(&self, watcher: &mut RecommendedWatcher) -> anyhow::Result<()> {
        let templates = self.store.list_active_templates().await?;
        let desired: HashSet<PathBuf> = templates
            .iter()
            .filter(|t| matches!(t.event_type, EventType::FileCreated | EventType::FileModified))
            .filter_map(|t| match &t.source_config {
                TemplateSourceConfig::FileSystem { watch_path } => Some(PathBuf::from(watch_path)),
                _ => None,
            })
            .collect();

        let mut watched = self.watched.write().await;

        for path in desired.difference(&watched) {
            if let Err(e) = std::fs::create_dir_all(path) {
                warn!(path = %path.display(), error = %e, "failed to create watch directory");
                continue;
            }
            match watcher.watch(path, RecursiveMode::Recursive) {
                Ok(()) => info!(path = %path.display(), "watching directory"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to watch directory"),
            }
        }
        for path in watched.difference(&desired) {
            if let Err(e) = watcher.unwatch(path) {
                warn!(path = %path.display(), error = %e, "failed to unwatch directory");
            }
        }

        *watched = desired;
        Ok(())
    }

    async fn handle_event(&self, event: Event) {
        let event_type = match event.kind {
            EventKind::Create(_) => EventType::FileCreated,
            EventKind::Modify(_) => EventType::FileModified,
            _ => return,
        };

        for path in event.paths {
            if path_is_directory(&path) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            let file_size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

            let incoming = IncomingEvent {
                event_type,
                file_path: path.to_string_lossy().into_owned(),
                file_name: file_name.to_string(),
                file_size,
                bucket: None,
                key: None,
                event_time: Utc::now(),
            };

            if let Err(e) = self.dispatcher.dispatch(incoming).await {
                warn!(path = %path.display(), error = %e, "failed to dispatch filesystem event");
            }
        }
    }
}

fn path_is_directory(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_paths_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert!(path_is_directory(dir.path()));
        assert!(!path_is_directory(&dir.path().join("does-not-exist.txt")));
    }
}
