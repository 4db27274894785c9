//! Adaptive Performance Manager: derives `(delay_ms, batch_size,
//! enable_batching)` from the Controller's aggregate watcher counts, with
//! hysteresis and a smoothing window so parameters don't oscillate every
//! tick.

use crate::config::PerformanceConfig;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfSettings {
    pub delay_ms: u64,
    pub batch_size: usize,
    pub enable_batching: bool,
}

/// What the manager reacts to: how many watchers are actively running their
/// initial scan/indexing pass versus quietly watching in steady state.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadSnapshot {
    pub active_indexing_watchers: usize,
    pub watching_watchers: usize,
}

/// One of the three events the source system emits on a parameter change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerformanceEvent {
    SettingsUpdated(PerfSettings),
    DelayUpdated(u64),
    ModeChanged(bool),
}

pub struct PerformanceManager {
    config: PerformanceConfig,
    auto_mode: bool,
    base_delay: u64,
    current_delay: u64,
    batch_size: usize,
    enable_batching: bool,
    delay_history: VecDeque<f64>,
    batch_size_history: VecDeque<f64>,
}

impl PerformanceManager {
    pub fn new(config: PerformanceConfig) -> Self {
        let base_delay = config.single_folder_delay_ms;
        let batch_size = config.single_folder_batch_size;
        Self {
            delay_history: VecDeque::with_capacity(config.smoothing_window),
            batch_size_history: VecDeque::with_capacity(config.smoothing_window),
            auto_mode: true,
            base_delay,
            current_delay: base_delay,
            batch_size,
            enable_batching: true,
            config,
        }
    }

    pub fn current(&self) -> PerfSettings {
        PerfSettings {
            delay_ms: self.current_delay,
            batch_size: self.batch_size,
            enable_batching: self.enable_batching,
        }
    }

    pub fn set_auto_mode(&mut self, auto: bool) -> PerformanceEvent {
        self.auto_mode = auto;
        PerformanceEvent::ModeChanged(auto)
    }

    /// Manual override. In manual mode both `base_delay` and `current_delay`
    /// move together; in auto mode only `base_delay` (the floor the auto
    /// policy computes from) is updated, leaving the live `current_delay` to
    /// the next `update` call.
    pub fn set_delay(&mut self, delay_ms: u64) {
        self.base_delay = delay_ms;
        if !self.auto_mode {
            self.current_delay = delay_ms;
        }
    }

    pub fn set_batch_size(&mut self, batch_size: usize) {
        if !self.auto_mode {
            self.batch_size = batch_size;
        }
    }

    pub fn set_enable_batching(&mut self, enabled: bool) {
        self.enable_batching = enabled;
    }

    /// Recompute `(delay, batch_size)` from the latest load snapshot. Returns
    /// `Some(event)` only when the hysteresis threshold is crossed (delay
    /// changes by more than 10ms, or batch size changes at all).
    pub fn update(&mut self, load: LoadSnapshot) -> Option<PerformanceEvent> {
        if !self.auto_mode {
            return None;
        }

        let (target_delay, target_batch) = self.compute_targets(load);

        push_bounded(&mut self.delay_history, target_delay as f64, self.config.smoothing_window);
        push_bounded(
            &mut self.batch_size_history,
            target_batch as f64,
            self.config.smoothing_window,
        );

        let smoothed_delay = weighted_average(&self.delay_history, self.config.smoothing_factor);
        let smoothed_batch = weighted_average(&self.batch_size_history, self.config.smoothing_factor);

        let new_delay = smoothed_delay
            .round()
            .clamp(self.config.min_delay_ms as f64, self.config.max_delay_ms as f64)
            as u64;
        let new_batch = smoothed_batch
            .round()
            .clamp(self.config.min_batch_size as f64, self.config.max_batch_size as f64)
            as usize;

        let delay_changed = new_delay.abs_diff(self.current_delay) > 10;
        let batch_changed = new_batch != self.batch_size;

        if !delay_changed && !batch_changed {
            return None;
        }

        self.current_delay = new_delay;
        self.batch_size = new_batch;
        debug!(delay = new_delay, batch = new_batch, "performance settings updated");
        Some(PerformanceEvent::SettingsUpdated(self.current()))
    }

    fn compute_targets(&self, load: LoadSnapshot) -> (u64, usize) {
        let cfg = &self.config;
        match load.active_indexing_watchers {
            0 if load.watching_watchers > 0 => {
                let delay = (cfg.min_delay_ms as f64 * cfg.watching_delay_factor).round() as u64;
                (delay, self.batch_size)
            }
            1 => (cfg.single_folder_delay_ms, cfg.single_folder_batch_size),
            active if active > 1 => {
                let n = (active - 1) as i32;
                let delay = (cfg.single_folder_delay_ms as f64
                    * cfg.multi_folder_delay_multiplier.powi(n))
                .round()
                .clamp(cfg.min_delay_ms as f64, cfg.max_delay_ms as f64) as u64;
                let batch = (cfg.single_folder_batch_size as f64
                    / cfg.multi_folder_batch_divisor.powi(n))
                .round()
                .clamp(cfg.min_batch_size as f64, cfg.max_batch_size as f64)
                    as usize;
                (delay, batch)
            }
            _ => (self.current_delay, self.batch_size),
        }
    }
}

fn push_bounded(history: &mut VecDeque<f64>, value: f64, window: usize) {
    if history.len() >= window.max(1) {
        history.pop_front();
    }
    history.push_back(value);
}

/// Weighted average over the smoothing window: newest sample has weight 1,
/// each older sample's weight decays by `(1 - smoothing_factor)` per step
/// back.
fn weighted_average(history: &VecDeque<f64>, smoothing_factor: f64) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let mut weight = 1.0;
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for value in history.iter().rev() {
        weighted_sum += value * weight;
        weight_sum += weight;
        weight *= 1.0 - smoothing_factor;
    }
    weighted_sum / weight_sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PerformanceConfig {
        PerformanceConfig {
            min_delay_ms: 20,
            max_delay_ms: 2000,
            single_folder_delay_ms: 50,
            multi_folder_delay_multiplier: 1.5,
            watching_delay_factor: 4.0,
            min_batch_size: 1,
            max_batch_size: 200,
            single_folder_batch_size: 50,
            multi_folder_batch_divisor: 1.5,
            smoothing_window: 3,
            smoothing_factor: 0.3,
        }
    }

    #[test]
    fn single_active_watcher_is_aggressive() {
        let mut manager = PerformanceManager::new(cfg());
        let event = manager.update(LoadSnapshot {
            active_indexing_watchers: 1,
            watching_watchers: 0,
        });
        assert!(event.is_some());
        assert_eq!(manager.current().batch_size, 50);
    }

    #[test]
    fn idle_with_watchers_uses_responsive_delay() {
        let mut manager = PerformanceManager::new(cfg());
        manager.update(LoadSnapshot {
            active_indexing_watchers: 0,
            watching_watchers: 2,
        });
        assert_eq!(manager.current().delay_ms, 80);
    }

    #[test]
    fn manual_mode_ignores_load_updates() {
        let mut manager = PerformanceManager::new(cfg());
        manager.set_auto_mode(false);
        manager.set_delay(123);
        assert!(manager
            .update(LoadSnapshot {
                active_indexing_watchers: 5,
                watching_watchers: 0,
            })
            .is_none());
        assert_eq!(manager.current().delay_ms, 123);
    }

    #[test]
    fn hysteresis_suppresses_small_delay_changes() {
        let mut manager = PerformanceManager::new(cfg());
        manager.update(LoadSnapshot {
            active_indexing_watchers: 1,
            watching_watchers: 0,
        });
        // Same load again: smoothing should converge, not emit a new event
        // once the delay settles within the 10ms hysteresis band.
        manager.update(LoadSnapshot {
            active_indexing_watchers: 1,
            watching_watchers: 0,
        });
        let third = manager.update(LoadSnapshot {
            active_indexing_watchers: 1,
            watching_watchers: 0,
        });
        assert!(third.is_none());
    }
}
