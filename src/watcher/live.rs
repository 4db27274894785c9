//! Live phase: bridges a `notify` watcher into an async event stream,
//! coalesces events into windowed batches (with backpressure flushing when
//! the batch fills before the window elapses), and applies each batch
//! transactionally.

use super::scan::now_ms;
use super::state::WatcherSettings;
use crate::config::WatcherConfig;
use crate::domain::file::{Category, FileData};
use crate::error::IndexResult;
use crate::store::{FolderUpdate, IndexStore};
use notify::{Event, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Owns the live `notify::Watcher` so it isn't dropped (which would stop
/// delivering events) while the watcher is active.
pub struct NotifyHandle {
    _watcher: Box<dyn Watcher + Send>,
}

pub fn start_watching(
    root: &str,
    follow_symlinks: bool,
    use_polling: bool,
    poll_interval_ms: u64,
) -> IndexResult<(NotifyHandle, mpsc::UnboundedReceiver<Event>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    };
    let _ = follow_symlinks; // notify follows the mode of the underlying OS watch; symlink
                             // targets are re-checked explicitly when a batch is applied.

    let mut watcher: Box<dyn Watcher + Send> = if use_polling {
        let config =
            notify::Config::default().with_poll_interval(Duration::from_millis(poll_interval_ms));
        Box::new(PollWatcher::new(callback, config)?)
    } else {
        let watcher: RecommendedWatcher = notify::recommended_watcher(callback)?;
        Box::new(watcher)
    };
    watcher.watch(Path::new(root), RecursiveMode::Recursive)?;

    Ok((NotifyHandle { _watcher: watcher }, rx))
}

/// Runs until `cancel` fires or the event channel closes (the watcher was
/// dropped). Applies each coalesced batch of touched paths to the Store.
pub async fn run_live_loop(
    store: Arc<IndexStore>,
    root: String,
    config: WatcherConfig,
    settings: Arc<StdMutex<WatcherSettings>>,
    follow_symlinks: bool,
    mut events: mpsc::UnboundedReceiver<Event>,
    mut cancel: tokio::sync::oneshot::Receiver<()>,
) -> IndexResult<()> {
    loop {
        let mut buffer: HashSet<PathBuf> = HashSet::new();

        let first = tokio::select! {
            _ = &mut cancel => return Ok(()),
            event = events.recv() => event,
        };
        let Some(event) = first else {
            return Ok(());
        };
        collect_paths(event, &mut buffer);

        let window = Duration::from_millis(config.batch_collect_time_ms);
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);

        loop {
            let batch_size = settings.lock().expect("watcher settings mutex poisoned").batch_size;
            if buffer.len() >= batch_size {
                break;
            }
            tokio::select! {
                _ = &mut cancel => {
                    apply_batch(&store, &root, buffer, follow_symlinks).await?;
                    return Ok(());
                }
                _ = &mut deadline => break,
                event = events.recv() => {
                    match event {
                        None => break,
                        Some(event) => collect_paths(event, &mut buffer),
                    }
                }
            }
        }

        apply_batch(&store, &root, buffer, follow_symlinks).await?;
    }
}

fn collect_paths(event: Event, buffer: &mut HashSet<PathBuf>) {
    use notify::EventKind;
    match event.kind {
        EventKind::Access(_) => {}
        _ => {
            for path in event.paths {
                buffer.insert(path);
            }
        }
    }
}

/// Re-checks each touched path's current disk state (rather than trusting
/// the notify event kind) so late-arriving stale events are naturally
/// no-ops: whatever is on disk when the batch commits is what gets indexed.
async fn apply_batch(
    store: &IndexStore,
    root: &str,
    paths: HashSet<PathBuf>,
    follow_symlinks: bool,
) -> IndexResult<()> {
    if paths.is_empty() {
        return Ok(());
    }
    debug!(root, count = paths.len(), "applying watcher batch");

    let mut upserts = Vec::new();
    let mut removals = Vec::new();
    let mut touched_folders: HashSet<String> = HashSet::new();
    let now = now_ms();

    for path in paths {
        let metadata = match tokio::fs::symlink_metadata(&path).await {
            Ok(m) => m,
            Err(_) => {
                removals.push(path.to_string_lossy().to_string());
                continue;
            }
        };

        if metadata.file_type().is_symlink() && !follow_symlinks {
            continue;
        }

        if metadata.is_dir() {
            let path_str = path.to_string_lossy().to_string();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path_str.clone());
            let parent = path.parent().map(|p| p.to_string_lossy().to_string());
            let modified_at = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(now);
            store
                .update_folder(
                    &path_str,
                    FolderUpdate {
                        name,
                        parent_path: parent.clone(),
                        modified_at,
                        indexed_at: now,
                        watched_folder_path: root.to_string(),
                    },
                )
                .await?;
            if let Some(parent) = parent {
                touched_folders.insert(parent);
            }
        } else if metadata.is_file() {
            let path_str = path.to_string_lossy().to_string();
            let folder_path = path
                .parent()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|| root.to_string());
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path_str.clone());
            let modified_at = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(now);

            let category = Category::guess(&path);
            let mime_type = mime_guess::from_path(&path).first().map(|m| m.to_string());

            let mut data = FileData::new();
            data.insert("name".into(), serde_json::json!(name));
            data.insert("folder_path".into(), serde_json::json!(folder_path.clone()));
            data.insert("size".into(), serde_json::json!(metadata.len() as i64));
            data.insert("modified_at".into(), serde_json::json!(modified_at));
            data.insert("indexed_at".into(), serde_json::json!(now));
            data.insert("category".into(), serde_json::json!(category.to_string()));
            if let Some(mime) = mime_type {
                data.insert("mime_type".into(), serde_json::json!(mime));
            }
            upserts.push((path_str, data));
            touched_folders.insert(folder_path);
        }
    }

    if !upserts.is_empty() {
        let (_, errors) = store.batch_upsert_files(upserts).await?;
        for (path, err) in errors {
            warn!(path, error = %err, "failed to apply watcher file update");
        }
    }
    if !removals.is_empty() {
        touched_folders.extend(
            removals
                .iter()
                .filter_map(|p| Path::new(p).parent())
                .map(|p| p.to_string_lossy().to_string()),
        );
        store.remove_paths(removals).await?;
    }
    for folder in touched_folders {
        if let Err(err) = store.update_folder_counts(&folder).await {
            warn!(folder, error = %err, "failed to recompute folder counts after batch");
        }
    }
    Ok(())
}
