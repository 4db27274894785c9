//! Events emitted by a `FolderWatcher`, one broadcast channel per watcher
//! that the Controller subscribes to once at creation (§9's "replace
//! on/off/emit with an explicit channel per event kind" design note).

use super::state::{WatcherState, WatcherStatus};

#[derive(Debug, Clone)]
pub enum WatcherEvent {
    StatusUpdate(WatcherStatus),
    Paused { path: String },
    Resumed { path: String },
    Ready { path: String },
    ProcessingComplete { path: String, files_indexed: i64 },
    Error { path: String, message: String },
}

impl WatcherEvent {
    pub fn path(&self) -> &str {
        match self {
            WatcherEvent::StatusUpdate(status) => &status.path,
            WatcherEvent::Paused { path }
            | WatcherEvent::Resumed { path }
            | WatcherEvent::Ready { path }
            | WatcherEvent::ProcessingComplete { path, .. }
            | WatcherEvent::Error { path, .. } => path,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, WatcherEvent::Error { .. })
    }
}

/// Convenience used by the Controller to decide which global-state bucket a
/// watcher's last known state falls into.
pub fn state_is_active(state: WatcherState) -> bool {
    matches!(
        state,
        WatcherState::Scanning | WatcherState::Indexing | WatcherState::Initializing
    )
}
