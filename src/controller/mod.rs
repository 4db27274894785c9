//! Index Controller: supervises the set of per-root Watchers, serializes
//! initial scans behind the active-indexing-watcher invariant, resolves
//! overlap between watched roots, fans performance-manager settings out to
//! every watcher, and runs orphan cleanup.
//!
//! Modeled as a single-owner actor with an `mpsc` command channel and one
//! `run` loop mutating all shared state, the way the teacher's `JobManager`
//! centralizes `running_jobs` behind owned methods rather than exposing a
//! lock directly to callers — here taken one step further into explicit
//! message-passing per §9's "shared mutable state" design note, using the
//! same `tokio::sync::{mpsc, oneshot, broadcast}` combination the teacher
//! wires up for its job progress forwarding in `jobs/manager.rs`.

mod overlap;

pub use overlap::roots_overlap;

use crate::config::Config;
use crate::domain::watched_folder::Depth;
use crate::error::{IndexError, IndexResult};
use crate::performance::{LoadSnapshot, PerformanceEvent, PerformanceManager};
use crate::status::{AggregateStatus, GlobalState, StatusManager};
use crate::store::{IndexStore, WatchedFolderInsert};
use crate::watcher::{state_is_active, FolderWatcher, WatcherEvent, WatcherState, WatcherStatus};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Result of `add_watch_path`, mirroring the `{success, error?,
/// overlapping_folder?}` shape the IPC layer returns to the UI (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddWatchResult {
    pub success: bool,
    pub error: Option<String>,
    pub overlapping_folder: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrphanCleanupReport {
    pub checked_entries: usize,
    pub removed_entries: usize,
}

#[derive(Debug, Clone)]
pub struct ControllerStatus {
    pub folders: Vec<WatcherStatus>,
    pub total_files: i64,
    pub processed_files: i64,
    pub is_paused: bool,
    pub total_watchers: usize,
    pub active_indexing_watchers: usize,
    pub watching_watchers: usize,
    pub status: GlobalState,
}

enum ControllerCommand {
    Initialize(oneshot::Sender<IndexResult<()>>),
    AddWatchPath {
        path: String,
        depth: Depth,
        reply: oneshot::Sender<AddWatchResult>,
    },
    RemoveWatchPath {
        path: String,
        reply: oneshot::Sender<bool>,
    },
    PauseWatcher {
        path: String,
        reply: oneshot::Sender<IndexResult<()>>,
    },
    ResumeWatcher {
        path: String,
        force_immediate: bool,
        reply: oneshot::Sender<IndexResult<()>>,
    },
    PauseAll {
        reply: oneshot::Sender<()>,
    },
    ResumeAll {
        force_immediate: bool,
        reply: oneshot::Sender<()>,
    },
    RestartWatcher {
        path: String,
        reply: oneshot::Sender<IndexResult<()>>,
    },
    GetStatus(oneshot::Sender<ControllerStatus>),
    WatcherEvent(WatcherEvent),
    Shutdown(oneshot::Sender<()>),
}

fn channel_closed<T>(_: T) -> IndexError {
    IndexError::StoreError("controller actor is not running".to_string())
}

/// Per-process supervisor. All mutation of the watcher set and the
/// active-indexer queue happens inside the actor task spawned by `new`;
/// every public method is a thin request/reply over `cmd_tx`.
pub struct IndexController {
    store: Arc<IndexStore>,
    cmd_tx: mpsc::UnboundedSender<ControllerCommand>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl IndexController {
    pub fn new(store: Arc<IndexStore>, config: Config) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let actor = ControllerActor::new(store.clone(), config, cmd_tx.clone());
        let task = tokio::spawn(actor.run(cmd_rx));
        Self {
            store,
            cmd_tx,
            task: std::sync::Mutex::new(Some(task)),
        }
    }

    fn send(&self, cmd: ControllerCommand) -> IndexResult<()> {
        self.cmd_tx.send(cmd).map_err(channel_closed)
    }

    /// Loads the persisted watched-root set, drops roots whose path is no
    /// longer accessible, constructs each remaining watcher paused with a
    /// 500 ms spacing, and starts draining the queue. Schedules orphan
    /// cleanup to run once indexing settles.
    pub async fn initialize(&self) -> IndexResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerCommand::Initialize(tx))?;
        rx.await.map_err(channel_closed)?
    }

    pub async fn add_watch_path(&self, path: impl Into<String>, depth: Depth) -> IndexResult<AddWatchResult> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerCommand::AddWatchPath {
            path: path.into(),
            depth,
            reply: tx,
        })?;
        rx.await.map_err(channel_closed)
    }

    /// Stops the watcher and deletes its `watched_folders` row; files and
    /// folders under it CASCADE-delete in the store. Returns `false` if no
    /// such root was being watched.
    pub async fn remove_watch_path(&self, path: impl Into<String>) -> IndexResult<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerCommand::RemoveWatchPath {
            path: path.into(),
            reply: tx,
        })?;
        rx.await.map_err(channel_closed)
    }

    pub async fn pause_watcher(&self, path: impl Into<String>) -> IndexResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerCommand::PauseWatcher {
            path: path.into(),
            reply: tx,
        })?;
        rx.await.map_err(channel_closed)?
    }

    pub async fn resume_watcher(&self, path: impl Into<String>, force_immediate: bool) -> IndexResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerCommand::ResumeWatcher {
            path: path.into(),
            force_immediate,
            reply: tx,
        })?;
        rx.await.map_err(channel_closed)?
    }

    pub async fn pause_all(&self) -> IndexResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerCommand::PauseAll { reply: tx })?;
        rx.await.map_err(channel_closed)
    }

    pub async fn resume_all(&self, force_immediate: bool) -> IndexResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerCommand::ResumeAll {
            force_immediate,
            reply: tx,
        })?;
        rx.await.map_err(channel_closed)
    }

    /// Pause → 1 s sleep → resume(force_immediate=true), scheduled in the
    /// background so the actor loop stays responsive during the sleep.
    pub async fn restart_watcher(&self, path: impl Into<String>) -> IndexResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerCommand::RestartWatcher {
            path: path.into(),
            reply: tx,
        })?;
        rx.await.map_err(channel_closed)?
    }

    pub async fn get_status(&self) -> IndexResult<ControllerStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerCommand::GetStatus(tx))?;
        rx.await.map_err(channel_closed)
    }

    /// Iterates every indexed file path, partitioning into accessible and
    /// inaccessible in batches of 200 with a cooperative yield between
    /// batches, then deletes the inaccessible rows one transaction per row.
    /// Runs directly against the Store rather than through the actor so it
    /// never blocks command handling.
    pub async fn cleanup_orphaned_database_entries(&self) -> IndexResult<OrphanCleanupReport> {
        run_orphan_cleanup(&self.store).await
    }

    pub async fn shutdown(&self) -> IndexResult<()> {
        let (tx, rx) = oneshot::channel();
        if self.send(ControllerCommand::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
        let task = self.task.lock().expect("controller task mutex poisoned").take();
        if let Some(task) = task {
            let _ = task.await;
        }
        Ok(())
    }
}

const ORPHAN_BATCH_SIZE: usize = 200;

async fn run_orphan_cleanup(store: &IndexStore) -> IndexResult<OrphanCleanupReport> {
    let paths = store.list_file_paths().await?;
    let mut checked = 0usize;
    let mut removed = 0usize;

    for chunk in paths.chunks(ORPHAN_BATCH_SIZE) {
        for path in chunk {
            checked += 1;
            if tokio::fs::symlink_metadata(path).await.is_err() {
                store.remove_path(path).await?;
                removed += 1;
            }
        }
        tokio::task::yield_now().await;
    }

    info!(checked, removed, "orphan cleanup pass complete");
    Ok(OrphanCleanupReport {
        checked_entries: checked,
        removed_entries: removed,
    })
}

async fn orphan_cleanup_background(store: Arc<IndexStore>, cmd_tx: mpsc::UnboundedSender<ControllerCommand>) {
    tokio::time::sleep(Duration::from_secs(5)).await;
    loop {
        let (tx, rx) = oneshot::channel();
        if cmd_tx.send(ControllerCommand::GetStatus(tx)).is_err() {
            return;
        }
        let Ok(status) = rx.await else { return };
        if status.active_indexing_watchers == 0 {
            if let Err(err) = run_orphan_cleanup(&store).await {
                warn!(error = %err, "background orphan cleanup failed");
            }
            return;
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
}

struct ControllerActor {
    store: Arc<IndexStore>,
    config: Config,
    cmd_tx: mpsc::UnboundedSender<ControllerCommand>,
    watchers: HashMap<String, Arc<FolderWatcher>>,
    queue: VecDeque<String>,
    active_indexing_path: Option<String>,
    performance: PerformanceManager,
    status_manager: StatusManager,
    status_tx: broadcast::Sender<ControllerStatus>,
}

impl ControllerActor {
    fn new(store: Arc<IndexStore>, config: Config, cmd_tx: mpsc::UnboundedSender<ControllerCommand>) -> Self {
        let performance = PerformanceManager::new(config.performance.clone());
        let status_manager = StatusManager::new(config.status_update_interval_ms);
        let (status_tx, _) = broadcast::channel(64);
        Self {
            store,
            config,
            cmd_tx,
            watchers: HashMap::new(),
            queue: VecDeque::new(),
            active_indexing_path: None,
            performance,
            status_manager,
            status_tx,
        }
    }

    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<ControllerCommand>) {
        let mut status_tick = tokio::time::interval(Duration::from_millis(self.config.status_update_interval_ms));
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { return };
                    if self.handle(cmd).await {
                        return;
                    }
                }
                _ = status_tick.tick() => {
                    if self.status_manager.tick() {
                        self.broadcast_status();
                    }
                }
            }
        }
    }

    /// Returns `true` when the actor should stop.
    async fn handle(&mut self, cmd: ControllerCommand) -> bool {
        match cmd {
            ControllerCommand::Initialize(reply) => {
                let result = self.initialize().await;
                let _ = reply.send(result);
            }
            ControllerCommand::AddWatchPath { path, depth, reply } => {
                let result = self.add_watch_path(path, depth).await;
                let _ = reply.send(result);
            }
            ControllerCommand::RemoveWatchPath { path, reply } => {
                let result = self.remove_watch_path(&path).await;
                let _ = reply.send(result);
            }
            ControllerCommand::PauseWatcher { path, reply } => {
                let result = self.pause_watcher(&path);
                let _ = reply.send(result);
            }
            ControllerCommand::ResumeWatcher {
                path,
                force_immediate,
                reply,
            } => {
                let result = self.resume_watcher(&path, force_immediate);
                let _ = reply.send(result);
            }
            ControllerCommand::PauseAll { reply } => {
                self.pause_all();
                let _ = reply.send(());
            }
            ControllerCommand::ResumeAll { force_immediate, reply } => {
                self.resume_all(force_immediate);
                let _ = reply.send(());
            }
            ControllerCommand::RestartWatcher { path, reply } => {
                let result = self.restart_watcher(&path);
                let _ = reply.send(result);
            }
            ControllerCommand::GetStatus(reply) => {
                let _ = reply.send(self.compute_status());
            }
            ControllerCommand::WatcherEvent(event) => {
                self.on_watcher_event(event);
            }
            ControllerCommand::Shutdown(reply) => {
                for watcher in self.watchers.values() {
                    watcher.cleanup();
                }
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    async fn initialize(&mut self) -> IndexResult<()> {
        let persisted = self.store.list_watched_folders().await?;
        for folder in persisted {
            if tokio::fs::symlink_metadata(&folder.path).await.is_err() {
                warn!(path = %folder.path, "watched root no longer accessible, removing");
                self.store.remove_watched_folder(&folder.path).await?;
                continue;
            }
            let watcher = FolderWatcher::new(
                folder.path.clone(),
                folder.depth,
                self.store.clone(),
                self.config.watcher.clone(),
            );
            self.spawn_event_forwarder(&watcher);
            self.watchers.insert(folder.path.clone(), watcher);
            self.queue.push_back(folder.path.clone());
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        self.drain_queue();

        tokio::spawn(orphan_cleanup_background(self.store.clone(), self.cmd_tx.clone()));
        Ok(())
    }

    fn spawn_event_forwarder(&self, watcher: &Arc<FolderWatcher>) {
        let mut rx = watcher.subscribe();
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if cmd_tx.send(ControllerCommand::WatcherEvent(event)).is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
    }

    async fn add_watch_path(&mut self, path: String, depth: Depth) -> AddWatchResult {
        for (existing_path, watcher) in &self.watchers {
            if roots_overlap(existing_path, watcher.depth(), &path, depth) {
                return AddWatchResult {
                    success: false,
                    error: Some(
                        IndexError::OverlapDetected {
                            overlapping_folder: existing_path.clone(),
                        }
                        .to_string(),
                    ),
                    overlapping_folder: Some(existing_path.clone()),
                };
            }
        }

        let name = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.clone());

        if let Err(err) = self
            .store
            .upsert_watched_folder(WatchedFolderInsert {
                path: path.clone(),
                name,
                depth,
            })
            .await
        {
            return AddWatchResult {
                success: false,
                error: Some(err.to_string()),
                overlapping_folder: None,
            };
        }

        let watcher = FolderWatcher::new(path.clone(), depth, self.store.clone(), self.config.watcher.clone());
        self.spawn_event_forwarder(&watcher);
        self.watchers.insert(path.clone(), watcher);
        self.invalidate_all_caches();

        if self.active_indexing_path.is_none() && self.queue.is_empty() {
            self.start_watcher(path);
        } else {
            self.queue.push_back(path);
        }

        AddWatchResult {
            success: true,
            error: None,
            overlapping_folder: None,
        }
    }

    async fn remove_watch_path(&mut self, path: &str) -> bool {
        let Some(watcher) = self.watchers.remove(path) else {
            return false;
        };
        watcher.cleanup();
        self.queue.retain(|p| p != path);
        if self.active_indexing_path.as_deref() == Some(path) {
            self.active_indexing_path = None;
            self.drain_queue();
        }
        if let Err(err) = self.store.remove_watched_folder(path).await {
            warn!(path, error = %err, "failed to remove watched folder row");
        }
        self.invalidate_all_caches();
        true
    }

    fn pause_watcher(&mut self, path: &str) -> IndexResult<()> {
        let watcher = self
            .watchers
            .get(path)
            .ok_or_else(|| IndexError::NotFound(path.to_string()))?;
        watcher.pause();
        if self.active_indexing_path.as_deref() == Some(path) {
            self.active_indexing_path = None;
            self.drain_queue();
        }
        Ok(())
    }

    /// When `force_immediate` is false and another root is still running its
    /// initial scan, re-enqueues a watcher whose own scan never completed
    /// rather than resuming it now. A watcher past its initial scan resumes
    /// straight into `watching`, which never contends for the active-indexer
    /// slot, so it always resumes immediately regardless of the flag.
    fn resume_watcher(&mut self, path: &str, force_immediate: bool) -> IndexResult<()> {
        let watcher = self
            .watchers
            .get(path)
            .ok_or_else(|| IndexError::NotFound(path.to_string()))?
            .clone();
        if !watcher.is_paused() {
            return Ok(());
        }

        let still_scanning = matches!(watcher.get_status().state, WatcherState::Initializing);
        if still_scanning && !force_immediate && self.active_indexing_path.is_some() {
            self.queue.push_back(path.to_string());
            return Ok(());
        }

        if still_scanning {
            self.start_watcher(path.to_string());
        } else {
            tokio::spawn(async move {
                if let Err(err) = watcher.resume().await {
                    warn!(error = %err, "failed to resume watcher");
                }
            });
        }
        Ok(())
    }

    fn pause_all(&mut self) {
        let paths: Vec<String> = self.watchers.keys().cloned().collect();
        for path in paths {
            let _ = self.pause_watcher(&path);
        }
    }

    fn resume_all(&mut self, force_immediate: bool) {
        let paths: Vec<String> = self.watchers.keys().cloned().collect();
        for path in paths {
            let _ = self.resume_watcher(&path, force_immediate);
        }
    }

    fn restart_watcher(&mut self, path: &str) -> IndexResult<()> {
        let watcher = self
            .watchers
            .get(path)
            .ok_or_else(|| IndexError::NotFound(path.to_string()))?
            .clone();
        if self.active_indexing_path.as_deref() == Some(path) {
            self.active_indexing_path = None;
        }
        watcher.pause();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if let Err(err) = watcher.resume().await {
                warn!(error = %err, "restart resume failed");
            }
        });
        Ok(())
    }

    /// Starts the next queued path's initial scan, if any and if no other
    /// root currently holds the active-indexer slot.
    fn drain_queue(&mut self) {
        if self.active_indexing_path.is_some() {
            return;
        }
        if let Some(path) = self.queue.pop_front() {
            self.start_watcher(path);
        }
    }

    fn start_watcher(&mut self, path: String) {
        let Some(watcher) = self.watchers.get(&path).cloned() else {
            return;
        };
        self.active_indexing_path = Some(path);
        tokio::spawn(async move {
            if let Err(err) = watcher.initialize().await {
                warn!(error = %err, "watcher initialization failed");
            }
        });
    }

    fn invalidate_all_caches(&self) {
        for watcher in self.watchers.values() {
            watcher.invalidate_watched_folders_cache();
        }
    }

    fn on_watcher_event(&mut self, event: WatcherEvent) {
        match &event {
            WatcherEvent::Ready { path } => {
                if self.active_indexing_path.as_deref() == Some(path.as_str()) {
                    self.active_indexing_path = None;
                    self.drain_queue();
                }
            }
            WatcherEvent::Error { path, message } => {
                warn!(path, error = %message, "watcher reported an error");
                if self.active_indexing_path.as_deref() == Some(path.as_str()) {
                    self.active_indexing_path = None;
                    self.drain_queue();
                }
                let _ = self.restart_watcher(path);
            }
            _ => {}
        }
        self.recompute_performance();
        if self.status_manager.request_update() {
            self.broadcast_status();
        }
    }

    fn recompute_performance(&mut self) {
        let mut active_indexing_watchers = 0usize;
        let mut watching_watchers = 0usize;
        for watcher in self.watchers.values() {
            let status = watcher.get_status();
            if status.is_paused {
                continue;
            }
            if state_is_active(status.state) {
                active_indexing_watchers += 1;
            } else if matches!(status.state, WatcherState::Watching) {
                watching_watchers += 1;
            }
        }

        if let Some(PerformanceEvent::SettingsUpdated(settings)) = self.performance.update(LoadSnapshot {
            active_indexing_watchers,
            watching_watchers,
        }) {
            for watcher in self.watchers.values() {
                watcher.set_processing_delay(settings.delay_ms);
                watcher.set_batch_size(settings.batch_size);
                watcher.set_enable_batching(settings.enable_batching);
            }
        }
    }

    fn compute_status(&self) -> ControllerStatus {
        let mut folders = Vec::with_capacity(self.watchers.len());
        let mut total_files = 0i64;
        let mut processed_files = 0i64;
        let mut any_error = false;
        let mut any_scanning = false;
        let mut any_indexing = false;
        let mut any_initializing = false;
        let mut active_indexing_watchers = 0usize;
        let mut watching_watchers = 0usize;
        let mut all_paused = !self.watchers.is_empty();

        for watcher in self.watchers.values() {
            let status = watcher.get_status();
            total_files += status.stats.total_files;
            processed_files += status.stats.processed_files;
            if !status.is_paused {
                all_paused = false;
                match status.state {
                    WatcherState::Error => any_error = true,
                    WatcherState::Scanning => {
                        any_scanning = true;
                        active_indexing_watchers += 1;
                    }
                    WatcherState::Indexing => {
                        any_indexing = true;
                        active_indexing_watchers += 1;
                    }
                    WatcherState::Initializing => {
                        any_initializing = true;
                        active_indexing_watchers += 1;
                    }
                    WatcherState::Watching => watching_watchers += 1,
                }
            } else if status.state == WatcherState::Error {
                any_error = true;
            }
            folders.push(status);
        }

        let aggregate = AggregateStatus {
            total_watchers: self.watchers.len(),
            active_indexing_watchers,
            watching_watchers,
            total_files,
            processed_files,
            is_paused: all_paused,
        };
        let status = aggregate.classify(any_error, any_scanning, any_indexing, any_initializing);

        ControllerStatus {
            folders,
            total_files,
            processed_files,
            is_paused: all_paused,
            total_watchers: aggregate.total_watchers,
            active_indexing_watchers,
            watching_watchers,
            status,
        }
    }

    fn broadcast_status(&self) {
        let _ = self.status_tx.send(self.compute_status());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    async fn controller_with_store() -> (IndexController, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(IndexStore::open(&dir.path().join("index.sqlite3")).await.unwrap());
        let config = Config::default_with_dir(dir.path().to_path_buf());
        (IndexController::new(store, config), dir)
    }

    #[tokio::test]
    async fn add_watch_path_rejects_overlap() {
        let (controller, root) = controller_with_store().await;
        controller.initialize().await.unwrap();

        let base = root.path().join("docs");
        std::fs::create_dir_all(base.join("reports")).unwrap();

        let first = controller
            .add_watch_path(base.to_string_lossy().to_string(), Depth::Unlimited)
            .await
            .unwrap();
        assert!(first.success);

        let second = controller
            .add_watch_path(base.join("reports").to_string_lossy().to_string(), Depth::Unlimited)
            .await
            .unwrap();
        assert!(!second.success);
        assert_eq!(second.overlapping_folder, Some(base.to_string_lossy().to_string()));

        controller.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn second_watch_path_is_queued_behind_the_active_indexer() {
        let (controller, root) = controller_with_store().await;
        controller.initialize().await.unwrap();

        let a = root.path().join("a");
        let b = root.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();

        controller
            .add_watch_path(a.to_string_lossy().to_string(), Depth::Unlimited)
            .await
            .unwrap();
        controller
            .add_watch_path(b.to_string_lossy().to_string(), Depth::Unlimited)
            .await
            .unwrap();

        let status = controller.get_status().await.unwrap();
        assert!(status.active_indexing_watchers <= 1);

        controller.shutdown().await.unwrap();
    }
}
