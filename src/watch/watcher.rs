// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Handle for the filesystem watcher.
///
/// Dropping this handle stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `roots` recursively and send batches of changed paths to
/// `changes_tx`.
///
/// A batch is sent once no new event arrived for `debounce`. Roots that do
/// not exist yet are skipped.
pub fn spawn_watcher(
    roots: impl IntoIterator<Item = PathBuf>,
    debounce: Duration,
    changes_tx: mpsc::Sender<Vec<PathBuf>>,
) -> Result<WatcherHandle> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("incbuild: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("incbuild: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    let mut watched = 0;
    for root in roots {
        if !root.is_dir() {
            debug!(root = ?root, "source root missing, not watching");
            continue;
        }
        watcher.watch(&root, RecursiveMode::Recursive)?;
        watched += 1;
    }
    info!(roots = watched, "file watcher started");

    tokio::spawn(async move {
        let mut pending: BTreeSet<PathBuf> = BTreeSet::new();
        loop {
            let next = if pending.is_empty() {
                event_rx.recv().await
            } else {
                match tokio::time::timeout(debounce, event_rx.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        let batch: Vec<PathBuf> =
                            std::mem::take(&mut pending).into_iter().collect();
                        debug!(paths = batch.len(), "forwarding debounced changes");
                        if changes_tx.send(batch).await.is_err() {
                            warn!("change receiver closed, stopping watcher loop");
                            return;
                        }
                        continue;
                    }
                }
            };

            let Some(event) = next else {
                break;
            };
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            pending.extend(event.paths);
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
