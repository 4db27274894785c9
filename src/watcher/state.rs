//! Per-watcher state machine and live counters.

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum WatcherState {
    Initializing,
    Scanning,
    Indexing,
    Watching,
    Error,
}

/// Live, in-memory progress counters for one watched root. Mirrored into the
/// `watched_folders` row periodically, not on every file.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatcherStats {
    pub total_files: i64,
    pub processed_files: i64,
    pub last_indexed: Option<i64>,
    pub last_modified: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
pub struct WatcherSettings {
    pub delay_ms: u64,
    pub batch_size: usize,
    pub enable_batching: bool,
}

/// Status snapshot returned by `get_status`, independent of the live/paused
/// split so the Controller can aggregate it uniformly.
#[derive(Debug, Clone)]
pub struct WatcherStatus {
    pub path: String,
    pub state: WatcherState,
    pub is_paused: bool,
    pub stats: WatcherStats,
    pub last_error: Option<String>,
}
