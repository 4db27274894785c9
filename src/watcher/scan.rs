//! Initial recursive scan: walks the watched root, stability-filters
//! in-flight writes, and emits batched upserts.

use crate::config::WatcherConfig;
use crate::domain::file::{Category, FileData};
use crate::domain::watched_folder::Depth;
use crate::error::IndexResult;
use crate::store::{FolderUpdate, IndexStore};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub struct ScanOutcome {
    pub files_indexed: i64,
    pub files_skipped_unstable: i64,
    pub errors: i64,
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn system_time_ms(time: std::io::Result<SystemTime>) -> i64 {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Performs the full recursive scan of `root`, upserting folders as they're
/// discovered and files in batches of `config.default_batch_size`. Returns
/// once every reachable, stable entry has been committed.
pub async fn run_initial_scan(
    store: &IndexStore,
    root: &str,
    depth: Depth,
    config: &WatcherConfig,
    mut on_progress: impl FnMut(i64, i64),
) -> IndexResult<ScanOutcome> {
    let max_depth = match depth {
        Depth::Unlimited => usize::MAX,
        Depth::Limited(n) => n as usize,
    };

    let root_path = root.to_string();
    let entries = tokio::task::spawn_blocking(move || collect_entries(&root_path, max_depth)).await?;

    let mut pending: Vec<(String, FileData)> = Vec::with_capacity(config.default_batch_size);
    let mut files_indexed = 0i64;
    let mut files_skipped_unstable = 0i64;
    let mut errors = 0i64;
    let mut discovered = 0i64;
    let now = now_ms();

    for entry in entries {
        match entry {
            ScannedEntry::Directory { path, parent, modified_at } => {
                let name = Path::new(&path)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.clone());
                store
                    .update_folder(
                        &path,
                        FolderUpdate {
                            name,
                            parent_path: parent,
                            modified_at,
                            indexed_at: now,
                            watched_folder_path: root.to_string(),
                        },
                    )
                    .await?;
            }
            ScannedEntry::File {
                path,
                folder_path,
                name,
                size,
                modified_at,
                created_at,
                accessed_at,
            } => {
                discovered += 1;
                if now - modified_at < config.stability_threshold_ms as i64 {
                    debug!(path = %path, "skipping unstable file during initial scan");
                    files_skipped_unstable += 1;
                    continue;
                }
                let category = Category::guess(Path::new(&path));
                let mime_type = mime_guess::from_path(&path).first().map(|m| m.to_string());

                let mut data = FileData::new();
                data.insert("name".into(), serde_json::json!(name));
                data.insert("folder_path".into(), serde_json::json!(folder_path));
                data.insert("size".into(), serde_json::json!(size));
                data.insert("modified_at".into(), serde_json::json!(modified_at));
                data.insert("created_at".into(), serde_json::json!(created_at));
                data.insert("accessed_at".into(), serde_json::json!(accessed_at));
                data.insert("indexed_at".into(), serde_json::json!(now));
                data.insert("category".into(), serde_json::json!(category.to_string()));
                if let Some(mime) = mime_type {
                    data.insert("mime_type".into(), serde_json::json!(mime));
                }
                pending.push((path, data));

                if pending.len() >= config.default_batch_size {
                    let batch = std::mem::take(&mut pending);
                    let (committed, batch_errors) = flush_batch(store, batch).await?;
                    files_indexed += committed;
                    errors += batch_errors;
                    on_progress(files_indexed, discovered);
                }
            }
            ScannedEntry::Error => {
                errors += 1;
            }
        }
    }

    if !pending.is_empty() {
        let (committed, batch_errors) = flush_batch(store, pending).await?;
        files_indexed += committed;
        errors += batch_errors;
        on_progress(files_indexed, discovered);
    }

    if let Some(parent) = Path::new(root).parent().map(|p| p.to_string_lossy().to_string()) {
        let _ = store.update_folder_counts(&parent).await;
    }
    store.update_folder_counts(root).await?;

    Ok(ScanOutcome {
        files_indexed,
        files_skipped_unstable,
        errors,
    })
}

async fn flush_batch(
    store: &IndexStore,
    batch: Vec<(String, FileData)>,
) -> IndexResult<(i64, i64)> {
    let (success, item_errors) = store.batch_upsert_files(batch).await?;
    for (path, err) in &item_errors {
        warn!(path = %path, error = %err, "failed to index file during initial scan");
    }
    Ok((success as i64, item_errors.len() as i64))
}

enum ScannedEntry {
    Directory {
        path: String,
        parent: Option<String>,
        modified_at: i64,
    },
    File {
        path: String,
        folder_path: String,
        name: String,
        size: i64,
        modified_at: i64,
        created_at: i64,
        accessed_at: i64,
    },
    Error,
}

/// Synchronous directory walk, run off the async executor. `follow_symlinks`
/// is read from the caller's config via `WalkDir::follow_links`; bare
/// symlink entries are otherwise skipped rather than indexed as files.
fn collect_entries(root: &str, max_depth: usize) -> Vec<ScannedEntry> {
    let mut out = Vec::new();
    let walker = WalkDir::new(root).max_depth(max_depth.min(4096));
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => {
                out.push(ScannedEntry::Error);
                continue;
            }
        };
        let path = entry.path();
        if entry.path_is_symlink() {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            out.push(ScannedEntry::Error);
            continue;
        };

        let path_str = path.to_string_lossy().to_string();
        if metadata.is_dir() {
            if path_str == root {
                out.push(ScannedEntry::Directory {
                    path: path_str,
                    parent: None,
                    modified_at: system_time_ms(metadata.modified()),
                });
            } else {
                let parent = path
                    .parent()
                    .map(|p| p.to_string_lossy().to_string());
                out.push(ScannedEntry::Directory {
                    path: path_str,
                    parent,
                    modified_at: system_time_ms(metadata.modified()),
                });
            }
        } else if metadata.is_file() {
            let folder_path = path
                .parent()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|| root.to_string());
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path_str.clone());
            out.push(ScannedEntry::File {
                path: path_str,
                folder_path,
                name,
                size: metadata.len() as i64,
                modified_at: system_time_ms(metadata.modified()),
                created_at: system_time_ms(metadata.created()),
                accessed_at: system_time_ms(metadata.accessed()),
            });
        }
    }
    out
}
