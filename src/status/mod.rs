//! Status Manager: throttles aggregate status snapshots to one per
//! `update_interval_ms`, coalescing bursts into a single trailing emission.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum GlobalState {
    Error,
    Scanning,
    Indexing,
    Initializing,
    Paused,
    Watching,
    Idle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStatus {
    pub total_watchers: usize,
    pub active_indexing_watchers: usize,
    pub watching_watchers: usize,
    pub total_files: i64,
    pub processed_files: i64,
    pub is_paused: bool,
}

impl AggregateStatus {
    /// Priority order from the spec: error > scanning/indexing/initializing
    /// (first non-empty) > paused (all) > watching > idle.
    pub fn classify(
        &self,
        any_error: bool,
        any_scanning: bool,
        any_indexing: bool,
        any_initializing: bool,
    ) -> GlobalState {
        if any_error {
            GlobalState::Error
        } else if any_scanning {
            GlobalState::Scanning
        } else if any_indexing {
            GlobalState::Indexing
        } else if any_initializing {
            GlobalState::Initializing
        } else if self.total_watchers > 0 && self.is_paused {
            GlobalState::Paused
        } else if self.watching_watchers > 0 {
            GlobalState::Watching
        } else {
            GlobalState::Idle
        }
    }
}

pub struct StatusManager {
    interval: Duration,
    last_emitted: Option<Instant>,
    pending: bool,
}

impl StatusManager {
    pub fn new(update_interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(update_interval_ms),
            last_emitted: None,
            pending: false,
        }
    }

    /// Called whenever status changes. Returns `true` if the caller should
    /// emit a snapshot now; otherwise the change is remembered and surfaces
    /// at the next `tick`.
    pub fn request_update(&mut self) -> bool {
        let should_emit = match self.last_emitted {
            None => true,
            Some(last) => last.elapsed() >= self.interval,
        };
        if should_emit {
            self.last_emitted = Some(Instant::now());
            self.pending = false;
            true
        } else {
            self.pending = true;
            false
        }
    }

    /// Called on the fixed cadence; emits if a request arrived during the
    /// throttle window.
    pub fn tick(&mut self) -> bool {
        if self.pending {
            self.last_emitted = Some(Instant::now());
            self.pending = false;
            true
        } else {
            false
        }
    }

    /// Bypasses throttling entirely and emits immediately.
    pub fn force_update(&mut self) -> bool {
        self.last_emitted = Some(Instant::now());
        self.pending = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn first_request_always_emits() {
        let mut mgr = StatusManager::new(1000);
        assert!(mgr.request_update());
    }

    #[test]
    fn burst_within_window_is_throttled_then_ticks() {
        let mut mgr = StatusManager::new(30);
        assert!(mgr.request_update());
        assert!(!mgr.request_update());
        sleep(Duration::from_millis(50));
        assert!(mgr.tick());
    }

    #[test]
    fn force_update_bypasses_throttle() {
        let mut mgr = StatusManager::new(10_000);
        assert!(mgr.request_update());
        assert!(!mgr.request_update());
        assert!(mgr.force_update());
    }

    #[test]
    fn classify_priority_order() {
        let status = AggregateStatus {
            total_watchers: 2,
            is_paused: true,
            ..Default::default()
        };
        assert_eq!(
            status.classify(true, true, true, true),
            GlobalState::Error
        );
        assert_eq!(
            status.classify(false, false, false, false),
            GlobalState::Paused
        );
    }
}
