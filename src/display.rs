//! Display surface for published statistics
//!
//! Renders a [`StatsSnapshot`] as a text table (with an optional legend) or
//! as JSON. Rendering only reads the snapshot it is given.

use crate::capture_gate::CaptureState;
use crate::sample_buffer::BufferStats;
use crate::stats::StatsSnapshot;
use serde::Serialize;

const RULE_WIDTH: usize = 96;

/// Render the statistics table
///
/// Rows are sorted by render count. The ratio column is flagged `slow` when
/// renders took longer than their reference duration on average.
pub fn render_table(snapshot: &StatsSnapshot) -> String {
    if snapshot.is_empty() {
        return "No render statistics collected yet.\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<24} {:>8} {:>12} {:>12} {:>12} {:>6} {:>7} {:>9}\n",
        "Component", "Renders", "Avg (ms)", "Base (ms)", "Ratio", "Mount", "Update", "Cascaded"
    ));
    out.push_str(&"─".repeat(RULE_WIDTH));
    out.push('\n');

    for (key, stats) in snapshot.sorted() {
        let flag = if stats.is_slow() { "slow" } else { "ok" };
        out.push_str(&format!(
            "{:<24} {:>8} {:>12.3} {:>12.3} {:>7.3} {:<4} {:>6} {:>7} {:>9}\n",
            truncate(key, 24),
            stats.total_observations,
            stats.mean_actual_duration,
            stats.mean_base_duration,
            stats.mean_ratio,
            flag,
            stats.mount_count,
            stats.update_count,
            stats.cascaded_update_count,
        ));
    }

    out.push_str(&"─".repeat(RULE_WIDTH));
    out.push('\n');
    out
}

/// One-line summary of the capture pipeline
pub fn render_buffer_line(state: CaptureState, buffer: &BufferStats) -> String {
    let state = match state {
        CaptureState::Collecting => "collecting",
        CaptureState::Stopped => "stopped",
    };
    format!(
        "Samples: {}/{} ({}), dropped {} ({:.1}%)\n",
        buffer.current_size,
        buffer.capacity,
        state,
        buffer.total_dropped,
        buffer.drop_rate() * 100.0
    )
}

/// Explanation of each column
pub fn render_legend(max_samples: usize) -> String {
    let entries = [
        ("Component", "Key of the observed unit."),
        ("Renders", "Number of sampled renders of the unit."),
        (
            "Avg (ms)",
            "Mean measured render time (actual duration).",
        ),
        (
            "Base (ms)",
            "Mean reference render time without memoization (base duration).",
        ),
        (
            "Ratio",
            "Mean of actual / base. Above 1 (slow): renders took longer than the reference; \
             below 1 (ok): memoization is paying off.",
        ),
        ("Mount", "Renders that created the unit."),
        ("Update", "Re-renders caused by the unit's own props or state."),
        (
            "Cascaded",
            "Re-renders caused by an ancestor re-rendering.",
        ),
    ];

    let mut out = String::from("Legend:\n");
    for (term, text) in entries {
        out.push_str(&format!("  {:<10} {}\n", term, text));
    }
    out.push_str(&format!(
        "\nCapture stops after {} samples; reset to collect again.\n",
        max_samples
    ));
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    capture_state: CaptureState,
    buffer: &'a BufferStats,
    statistics: &'a StatsSnapshot,
}

/// Render snapshot plus pipeline state as pretty-printed JSON
pub fn render_json(
    snapshot: &StatsSnapshot,
    state: CaptureState,
    buffer: &BufferStats,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        capture_state: state,
        buffer,
        statistics: snapshot,
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::aggregate;
    use crate::timing_event::{RenderPhase, TimingEvent};

    fn snapshot() -> StatsSnapshot {
        aggregate(
            &[
                TimingEvent::new("Form", RenderPhase::Initial, 3.0, 2.0, 0.0, 3.0),
                TimingEvent::new("Field", RenderPhase::Initial, 1.0, 2.0, 0.0, 1.0),
                TimingEvent::new("Field", RenderPhase::CascadedUpdate, 1.0, 2.0, 1.0, 2.0),
            ],
            42,
        )
    }

    #[test]
    fn test_empty_table() {
        let out = render_table(&StatsSnapshot::empty());
        assert!(out.contains("No render statistics"));
    }

    #[test]
    fn test_table_rows_and_flags() {
        let out = render_table(&snapshot());
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("Component"));
        assert!(lines[2].starts_with("Field"));
        assert!(lines[2].contains("ok"));
        assert!(lines[3].starts_with("Form"));
        assert!(lines[3].contains("slow"));
        assert!(lines[3].contains("1.500"));
    }

    #[test]
    fn test_long_keys_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }

    #[test]
    fn test_buffer_line() {
        let stats = BufferStats {
            total_pushed: 7,
            total_dropped: 2,
            current_size: 5,
            capacity: 5,
        };
        let line = render_buffer_line(CaptureState::Stopped, &stats);
        assert!(line.contains("5/5 (stopped)"));
        assert!(line.contains("dropped 2"));
    }

    #[test]
    fn test_legend_mentions_limit() {
        let legend = render_legend(5);
        assert!(legend.contains("Cascaded"));
        assert!(legend.contains("after 5 samples"));
    }

    #[test]
    fn test_json_report() {
        let stats = BufferStats {
            total_pushed: 3,
            total_dropped: 0,
            current_size: 3,
            capacity: 5,
        };
        let json = render_json(&snapshot(), CaptureState::Collecting, &stats).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["capture_state"], "collecting");
        assert_eq!(value["statistics"]["stats"]["Field"]["sample_count"], 2);
        assert_eq!(
            value["statistics"]["stats"]["Field"]["cascaded_update_count"],
            1
        );
        assert_eq!(value["buffer"]["capacity"], 5);
    }
}
