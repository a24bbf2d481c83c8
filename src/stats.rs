//! Per-key render statistics
//!
//! An aggregation pass folds a buffer of timing events into one [`KeyStats`]
//! per key. Means are maintained with the incremental update
//!
//! ```text
//! mean' = mean * (n' - 1) / n' + x / n'
//! ```
//!
//! so a pass never materializes the per-key duration history. Every pass
//! starts from an empty table and walks the whole buffer, which makes passes
//! idempotent: the same buffer always yields the same statistics.

use crate::timing_event::{RenderPhase, TimingEvent};
use serde::Serialize;
use std::collections::HashMap;

/// Aggregated statistics for one observed key
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeyStats {
    /// Number of events folded for this key
    pub sample_count: u64,
    /// Running mean of `actual_duration` (ms)
    pub mean_actual_duration: f64,
    /// Running mean of `base_duration` (ms)
    pub mean_base_duration: f64,
    /// Running mean of per-event `actual / base` ratios
    pub mean_ratio: f64,
    /// Observations seen; tracked separately from `sample_count`
    pub total_observations: u64,
    pub mount_count: u64,
    pub update_count: u64,
    pub cascaded_update_count: u64,
    /// Wall-clock time of the pass that last touched this entry (ms since epoch)
    pub last_updated_at: u64,
}

impl KeyStats {
    /// Fold one event into the running statistics
    pub fn observe(&mut self, event: &TimingEvent, now: u64) {
        let n = self.sample_count + 1;
        let old_weight = (n - 1) as f64 / n as f64;
        let new_weight = 1.0 / n as f64;

        self.mean_actual_duration =
            self.mean_actual_duration * old_weight + event.actual_duration * new_weight;
        self.mean_base_duration =
            self.mean_base_duration * old_weight + event.base_duration * new_weight;
        self.mean_ratio = self.mean_ratio * old_weight + event.ratio() * new_weight;

        match event.phase {
            RenderPhase::Initial => self.mount_count += 1,
            RenderPhase::Updated => self.update_count += 1,
            RenderPhase::CascadedUpdate => self.cascaded_update_count += 1,
        }

        self.sample_count = n;
        self.total_observations += 1;
        self.last_updated_at = now;
    }

    /// Sum of the phase counters; always equals `sample_count`
    pub fn phase_total(&self) -> u64 {
        self.mount_count + self.update_count + self.cascaded_update_count
    }

    /// Whether renders took longer than their reference on average
    pub fn is_slow(&self) -> bool {
        self.mean_ratio > 1.0
    }
}

/// Published result of one aggregation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Map from key to statistics
    pub stats: HashMap<String, KeyStats>,
    /// Number of buffered events the pass folded
    pub events_folded: usize,
    /// Wall-clock time of the pass (ms since epoch), 0 for the empty snapshot
    pub computed_at: u64,
}

impl StatsSnapshot {
    /// Snapshot with no statistics, published at start-up and after reset
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&KeyStats> {
        self.stats.get(key)
    }

    /// Entries sorted by render count (descending), then by key
    pub fn sorted(&self) -> Vec<(&String, &KeyStats)> {
        let mut sorted: Vec<_> = self.stats.iter().collect();
        sorted.sort_by(|a, b| {
            b.1.sample_count
                .cmp(&a.1.sample_count)
                .then_with(|| a.0.cmp(b.0))
        });
        sorted
    }
}

/// Run one aggregation pass over `events`
pub fn aggregate(events: &[TimingEvent], now: u64) -> StatsSnapshot {
    let mut stats: HashMap<String, KeyStats> = HashMap::new();
    for event in events {
        stats
            .entry(event.key.clone())
            .or_default()
            .observe(event, now);
    }

    StatsSnapshot {
        stats,
        events_folded: events.len(),
        computed_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(key: &str, phase: RenderPhase, actual: f64, base: f64) -> TimingEvent {
        TimingEvent::new(key, phase, actual, base, 0.0, actual)
    }

    #[test]
    fn test_key_stats_default() {
        let stats = KeyStats::default();
        assert_eq!(stats.sample_count, 0);
        assert_eq!(stats.mean_actual_duration, 0.0);
        assert_eq!(stats.phase_total(), 0);
    }

    #[test]
    fn test_incremental_mean_matches_arithmetic_mean() {
        let events: Vec<_> = [10.0, 20.0, 30.0]
            .iter()
            .map(|&d| event("Widget", RenderPhase::Updated, d, d))
            .collect();
        let snapshot = aggregate(&events, 1);
        let stats = snapshot.get("Widget").unwrap();
        assert!((stats.mean_actual_duration - 20.0).abs() < 1e-9);
        assert!((stats.mean_base_duration - 20.0).abs() < 1e-9);
        assert!((stats.mean_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_base_contributes_zero_ratio() {
        let events = vec![
            event("Widget", RenderPhase::Updated, 5.0, 0.0),
            event("Widget", RenderPhase::Updated, 4.0, 2.0),
        ];
        let snapshot = aggregate(&events, 1);
        let stats = snapshot.get("Widget").unwrap();
        assert!(stats.mean_ratio.is_finite());
        assert!((stats.mean_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_subnormal_base_keeps_mean_ratio_finite() {
        let events = vec![
            event("Widget", RenderPhase::Updated, 1e10, 1e-310),
            event("Widget", RenderPhase::Updated, 4.0, 2.0),
        ];
        let snapshot = aggregate(&events, 1);
        let stats = snapshot.get("Widget").unwrap();
        assert!(stats.mean_ratio.is_finite());
        assert!((stats.mean_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_phase_counters_partition_samples() {
        let events = vec![
            event("A", RenderPhase::Initial, 1.0, 1.0),
            event("A", RenderPhase::Updated, 1.0, 1.0),
            event("A", RenderPhase::CascadedUpdate, 1.0, 1.0),
            event("B", RenderPhase::Initial, 1.0, 1.0),
        ];
        let snapshot = aggregate(&events, 7);
        let a = snapshot.get("A").unwrap();
        assert_eq!(a.sample_count, 3);
        assert_eq!(a.mount_count, 1);
        assert_eq!(a.update_count, 1);
        assert_eq!(a.cascaded_update_count, 1);
        assert_eq!(a.phase_total(), a.sample_count);
        assert_eq!(a.total_observations, 3);
        assert_eq!(a.last_updated_at, 7);
        assert_eq!(snapshot.get("B").unwrap().sample_count, 1);
        assert_eq!(snapshot.events_folded, 4);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let events = vec![
            event("A", RenderPhase::Initial, 3.0, 4.0),
            event("A", RenderPhase::Updated, 1.0, 4.0),
        ];
        assert_eq!(aggregate(&events, 5), aggregate(&events, 5));
    }

    #[test]
    fn test_empty_buffer_yields_empty_snapshot() {
        let snapshot = aggregate(&[], 9);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.events_folded, 0);
    }

    #[test]
    fn test_sorted_by_render_count() {
        let events = vec![
            event("rare", RenderPhase::Initial, 1.0, 1.0),
            event("common", RenderPhase::Initial, 1.0, 1.0),
            event("common", RenderPhase::Updated, 1.0, 1.0),
        ];
        let snapshot = aggregate(&events, 1);
        let keys: Vec<&str> = snapshot.sorted().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["common", "rare"]);
    }

    #[test]
    fn test_is_slow_threshold() {
        let slow = aggregate(&[event("A", RenderPhase::Updated, 3.0, 2.0)], 1);
        assert!(slow.get("A").unwrap().is_slow());
        let fast = aggregate(&[event("A", RenderPhase::Updated, 1.0, 2.0)], 1);
        assert!(!fast.get("A").unwrap().is_slow());
    }
}
