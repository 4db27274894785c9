//! Folder Watcher / File Processor: owns one watched root's initial scan
//! and live incremental reconciliation with the Index Store.
//!
//! Grounded on the teacher's `services/location_watcher` (platform event
//! handler + debouncing), generalized from Linux-only inotify handling to
//! the cross-platform `notify` crate so one code path serves both the
//! native-backend and `use_polling` configurations in §6.

mod events;
mod live;
mod scan;
mod state;

pub use events::{state_is_active, WatcherEvent};
pub use state::{WatcherState, WatcherStats, WatcherStatus};

use crate::config::WatcherConfig;
use crate::domain::watched_folder::Depth;
use crate::error::IndexResult;
use crate::store::{IndexStore, WatchedFolderProgress};
use state::WatcherSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct LiveRun {
    handle: JoinHandle<()>,
    cancel: oneshot::Sender<()>,
    _notify: live::NotifyHandle,
}

pub struct FolderWatcher {
    root: String,
    depth: Depth,
    store: Arc<IndexStore>,
    config: WatcherConfig,
    state: StdMutex<WatcherState>,
    paused: AtomicBool,
    last_error: StdMutex<Option<String>>,
    stats: StdMutex<WatcherStats>,
    settings: Arc<StdMutex<WatcherSettings>>,
    events_tx: broadcast::Sender<WatcherEvent>,
    watched_folders_cache: StdMutex<Option<Vec<String>>>,
    live: StdMutex<Option<LiveRun>>,
}

impl FolderWatcher {
    pub fn new(root: impl Into<String>, depth: Depth, store: Arc<IndexStore>, config: WatcherConfig) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let default_delay = config.default_delay_ms;
        let default_batch = config.default_batch_size;
        let enable_batching = config.enable_batching;
        Arc::new(Self {
            root: root.into(),
            depth,
            store,
            config,
            state: StdMutex::new(WatcherState::Initializing),
            paused: AtomicBool::new(true),
            last_error: StdMutex::new(None),
            stats: StdMutex::new(WatcherStats::default()),
            settings: Arc::new(StdMutex::new(WatcherSettings {
                delay_ms: default_delay,
                batch_size: default_batch,
                enable_batching,
            })),
            events_tx,
            watched_folders_cache: StdMutex::new(None),
            live: StdMutex::new(None),
        })
    }

    pub fn path(&self) -> &str {
        &self.root
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatcherEvent> {
        self.events_tx.subscribe()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: WatcherState) {
        *self.state.lock().expect("watcher state mutex poisoned") = state;
        self.emit_status();
    }

    fn emit_status(&self) {
        let _ = self.events_tx.send(WatcherEvent::StatusUpdate(self.get_status()));
    }

    pub fn get_status(&self) -> WatcherStatus {
        WatcherStatus {
            path: self.root.clone(),
            state: *self.state.lock().expect("watcher state mutex poisoned"),
            is_paused: self.is_paused(),
            stats: *self.stats.lock().expect("watcher stats mutex poisoned"),
            last_error: self.last_error.lock().expect("watcher error mutex poisoned").clone(),
        }
    }

    /// Runs the initial scan (if this is the first initialization) then
    /// transitions into the live watching phase. Idempotent: calling this
    /// on an already-watching instance is a no-op.
    pub async fn initialize(self: &Arc<Self>) -> IndexResult<()> {
        if !matches!(
            *self.state.lock().expect("watcher state mutex poisoned"),
            WatcherState::Initializing
        ) {
            return Ok(());
        }

        self.paused.store(false, Ordering::SeqCst);
        self.set_state(WatcherState::Scanning);
        self.set_state(WatcherState::Indexing);

        let this = self.clone();
        let outcome = scan::run_initial_scan(
            &self.store,
            &self.root,
            self.depth,
            &self.config,
            move |processed, total| {
                let mut s = this.stats.lock().expect("watcher stats mutex poisoned");
                s.processed_files = processed;
                s.total_files = total;
            },
        )
        .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                self.enter_error(err.to_string());
                return Err(err);
            }
        };

        let progress = {
            let mut s = self.stats.lock().expect("watcher stats mutex poisoned");
            s.processed_files = outcome.files_indexed;
            s.total_files = outcome.files_indexed + outcome.files_skipped_unstable;
            s.last_indexed = Some(scan::now_ms());
            WatchedFolderProgress {
                total_files: s.total_files,
                processed_files: s.processed_files,
                last_indexed: s.last_indexed,
                last_modified: s.last_modified,
            }
        };
        self.store.update_watched_folder_progress(&self.root, progress).await?;

        let _ = self.events_tx.send(WatcherEvent::ProcessingComplete {
            path: self.root.clone(),
            files_indexed: outcome.files_indexed,
        });

        self.start_live_phase()?;
        let _ = self.events_tx.send(WatcherEvent::Ready {
            path: self.root.clone(),
        });
        Ok(())
    }

    fn start_live_phase(self: &Arc<Self>) -> IndexResult<()> {
        let (notify_handle, rx) = live::start_watching(
            &self.root,
            self.config.follow_symlinks,
            self.config.use_polling,
            self.config.poll_interval_ms,
        )?;
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let store = self.store.clone();
        let root = self.root.clone();
        let config = self.config.clone();
        let settings = self.settings.clone();
        let follow_symlinks = self.config.follow_symlinks;
        let this = self.clone();

        let handle = tokio::spawn(async move {
            if let Err(err) = live::run_live_loop(store, root, config, settings, follow_symlinks, rx, cancel_rx).await
            {
                error!(error = %err, "watcher live loop ended with error");
                this.enter_error(err.to_string());
            }
        });

        *self.live.lock().expect("watcher live mutex poisoned") = Some(LiveRun {
            handle,
            cancel: cancel_tx,
            _notify: notify_handle,
        });
        self.set_state(WatcherState::Watching);
        Ok(())
    }

    fn stop_live_phase(&self) {
        if let Some(run) = self.live.lock().expect("watcher live mutex poisoned").take() {
            let _ = run.cancel.send(());
            run.handle.abort();
        }
    }

    fn enter_error(&self, message: String) {
        warn!(path = %self.root, error = %message, "watcher entered error state");
        *self.last_error.lock().expect("watcher error mutex poisoned") = Some(message.clone());
        self.set_state(WatcherState::Error);
        let _ = self.events_tx.send(WatcherEvent::Error {
            path: self.root.clone(),
            message,
        });
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        self.stop_live_phase();
        let _ = self.events_tx.send(WatcherEvent::Paused {
            path: self.root.clone(),
        });
    }

    /// Resumes a paused watcher. If the initial scan never completed, this
    /// re-enters `initialize`; otherwise it restarts the live phase.
    pub async fn resume(self: &Arc<Self>) -> IndexResult<()> {
        if !self.is_paused() {
            return Ok(());
        }
        self.paused.store(false, Ordering::SeqCst);
        if matches!(
            *self.state.lock().expect("watcher state mutex poisoned"),
            WatcherState::Initializing
        ) {
            self.initialize().await?;
        } else {
            self.start_live_phase()?;
        }
        let _ = self.events_tx.send(WatcherEvent::Resumed {
            path: self.root.clone(),
        });
        Ok(())
    }

    /// Stops the live phase and drops any pending, un-started batch window.
    /// In-flight transactions are allowed to complete (the live loop task is
    /// aborted only after its current `await` point yields).
    pub fn cleanup(&self) {
        self.paused.store(true, Ordering::SeqCst);
        self.stop_live_phase();
    }

    pub fn set_processing_delay(&self, delay_ms: u64) {
        self.settings.lock().expect("watcher settings mutex poisoned").delay_ms = delay_ms;
    }

    pub fn set_batch_size(&self, batch_size: usize) {
        self.settings.lock().expect("watcher settings mutex poisoned").batch_size = batch_size.max(1);
    }

    pub fn set_enable_batching(&self, enabled: bool) {
        self.settings.lock().expect("watcher settings mutex poisoned").enable_batching = enabled;
    }

    /// Clears the cross-watcher "watched folders" cache; the Controller
    /// calls this on every live Watcher whenever the set of watched roots
    /// changes (`add_watch_path`/`remove_watch_path`).
    pub fn invalidate_watched_folders_cache(&self) {
        *self.watched_folders_cache.lock().expect("watched folders cache mutex poisoned") = None;
    }

    /// Lazily refreshed list of every watched root, used to recognize when a
    /// discovered subfolder now belongs to a more specific, separately
    /// watched root.
    pub async fn watched_folders(&self) -> IndexResult<Vec<String>> {
        {
            let cache = self.watched_folders_cache.lock().expect("watched folders cache mutex poisoned");
            if let Some(cached) = cache.as_ref() {
                return Ok(cached.clone());
            }
        }
        let folders = self
            .store
            .list_watched_folders()
            .await?
            .into_iter()
            .map(|f| f.path)
            .collect::<Vec<_>>();
        *self.watched_folders_cache.lock().expect("watched folders cache mutex poisoned") = Some(folders.clone());
        Ok(folders)
    }
}

impl std::fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderWatcher")
            .field("root", &self.root)
            .field("state", &*self.state.lock().expect("watcher state mutex poisoned"))
            .field("paused", &self.is_paused())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatcherConfig;
    use crate::store::IndexStore;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn initial_scan_indexes_existing_files_then_starts_watching() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"world").unwrap();

        // Backdate mtimes so the stability-threshold filter in the initial
        // scan doesn't treat them as still-in-flight writes.
        let old = std::time::SystemTime::now() - Duration::from_secs(5);
        filetime::set_file_mtime(dir.path().join("a.txt"), filetime::FileTime::from_system_time(old)).ok();
        filetime::set_file_mtime(dir.path().join("sub/b.txt"), filetime::FileTime::from_system_time(old)).ok();

        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        let mut config = WatcherConfig::default();
        config.stability_threshold_ms = 100;
        let watcher = FolderWatcher::new(
            dir.path().to_string_lossy().to_string(),
            Depth::Unlimited,
            store.clone(),
            config,
        );

        watcher.initialize().await.unwrap();
        assert!(matches!(watcher.get_status().state, WatcherState::Watching));

        let a = store
            .get_file(&dir.path().join("a.txt").to_string_lossy())
            .await
            .unwrap();
        assert!(a.is_some());
        watcher.cleanup();
    }
}
