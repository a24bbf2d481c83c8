//! Timing events produced by completed renders
//!
//! A [`TimingEvent`] is one completed render observation. Events are created by
//! the emitter (or from a host-supplied [`RenderReport`]), handed to the capture
//! gate, and never mutated afterwards.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Why a render happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderPhase {
    /// First render of the observed unit (mount)
    #[serde(alias = "mount")]
    Initial,
    /// Re-render caused by the unit's own props or state
    #[serde(alias = "update")]
    Updated,
    /// Re-render caused by an ancestor re-rendering
    #[serde(alias = "nested-update", alias = "cascaded")]
    CascadedUpdate,
}

impl RenderPhase {
    /// Short label used by the display surface
    pub fn label(&self) -> &'static str {
        match self {
            RenderPhase::Initial => "mount",
            RenderPhase::Updated => "update",
            RenderPhase::CascadedUpdate => "cascaded",
        }
    }
}

/// One completed render observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingEvent {
    /// Identity of the observed unit
    pub key: String,
    /// Why the render occurred
    pub phase: RenderPhase,
    /// Measured render time (milliseconds)
    pub actual_duration: f64,
    /// Reference render time without memoization (milliseconds)
    pub base_duration: f64,
    /// Render start on the monotonic clock (milliseconds since profiler origin)
    pub start_time: f64,
    /// Commit time on the monotonic clock (milliseconds since profiler origin)
    pub commit_time: f64,
    /// Wall-clock capture time (milliseconds since UNIX epoch)
    pub captured_at: u64,
}

impl TimingEvent {
    /// Create an event stamped with the current wall-clock time
    pub fn new(
        key: impl Into<String>,
        phase: RenderPhase,
        actual_duration: f64,
        base_duration: f64,
        start_time: f64,
        commit_time: f64,
    ) -> Self {
        TimingEvent {
            key: key.into(),
            phase,
            actual_duration: sanitize(actual_duration),
            base_duration: sanitize(base_duration),
            start_time: sanitize(start_time),
            commit_time: sanitize(commit_time),
            captured_at: wall_clock_ms(),
        }
    }

    /// `actual_duration / base_duration`, defined as 0 when the base is 0 or
    /// the quotient overflows
    pub fn ratio(&self) -> f64 {
        if self.base_duration == 0.0 {
            return 0.0;
        }
        let ratio = self.actual_duration / self.base_duration;
        if ratio.is_finite() {
            ratio
        } else {
            0.0
        }
    }
}

/// Wall-clock milliseconds since the UNIX epoch (0 if the clock is before it)
pub fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// Negative or non-finite timings read as 0
fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Errors parsing host-supplied render reports
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid render report on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Render notification as supplied by a host with its own instrumentation
///
/// Every field is optional. Numeric fields that are missing or not numbers
/// read as 0, a missing phase reads as [`RenderPhase::Updated`], and unknown
/// fields (interactions, lanes, ...) are ignored. Fields may be spelled in
/// snake_case or camelCase (`id` for `key`); when both spellings are present
/// the snake_case one wins.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "WireReport")]
pub struct RenderReport {
    pub key: Option<String>,
    pub phase: Option<RenderPhase>,
    pub actual_duration: Option<f64>,
    pub base_duration: Option<f64>,
    pub start_time: Option<f64>,
    pub commit_time: Option<f64>,
}

/// Both spellings of every field, kept apart so neither is a duplicate
#[derive(Deserialize)]
struct WireReport {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_phase")]
    phase: Option<RenderPhase>,
    #[serde(default, deserialize_with = "lenient_f64")]
    actual_duration: Option<f64>,
    #[serde(default, rename = "actualDuration", deserialize_with = "lenient_f64")]
    actual_duration_camel: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    base_duration: Option<f64>,
    #[serde(default, rename = "baseDuration", deserialize_with = "lenient_f64")]
    base_duration_camel: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    start_time: Option<f64>,
    #[serde(default, rename = "startTime", deserialize_with = "lenient_f64")]
    start_time_camel: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    commit_time: Option<f64>,
    #[serde(default, rename = "commitTime", deserialize_with = "lenient_f64")]
    commit_time_camel: Option<f64>,
}

impl From<WireReport> for RenderReport {
    fn from(wire: WireReport) -> Self {
        RenderReport {
            key: wire.key.or(wire.id),
            phase: wire.phase,
            actual_duration: wire.actual_duration.or(wire.actual_duration_camel),
            base_duration: wire.base_duration.or(wire.base_duration_camel),
            start_time: wire.start_time.or(wire.start_time_camel),
            commit_time: wire.commit_time.or(wire.commit_time_camel),
        }
    }
}

impl RenderReport {
    /// Parse a single JSON object
    pub fn from_json(input: &str) -> Result<Self, ReportError> {
        serde_json::from_str(input).map_err(|source| ReportError::Json { line: 1, source })
    }

    /// Parse JSON lines, skipping blank lines
    pub fn parse_lines(input: &str) -> Result<Vec<Self>, ReportError> {
        input
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line).map_err(|source| ReportError::Json {
                    line: idx + 1,
                    source,
                })
            })
            .collect()
    }

    /// Convert into a timing event, filling gaps with defaults
    pub fn into_event(self, default_key: &str) -> TimingEvent {
        TimingEvent::new(
            self.key.unwrap_or_else(|| default_key.to_string()),
            self.phase.unwrap_or(RenderPhase::Updated),
            self.actual_duration.unwrap_or(0.0),
            self.base_duration.unwrap_or(0.0),
            self.start_time.unwrap_or(0.0),
            self.commit_time.unwrap_or(0.0),
        )
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn lenient_phase<'de, D>(deserializer: D) -> Result<Option<RenderPhase>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_zero_base_is_zero() {
        let event = TimingEvent::new("Widget", RenderPhase::Updated, 4.0, 0.0, 0.0, 4.0);
        assert_eq!(event.ratio(), 0.0);
    }

    #[test]
    fn test_ratio_overflow_is_zero() {
        let event = TimingEvent::new("Widget", RenderPhase::Updated, 1e10, 1e-310, 0.0, 0.0);
        assert!(event.base_duration > 0.0);
        assert_eq!(event.ratio(), 0.0);
    }

    #[test]
    fn test_report_prefers_key_over_id() {
        let report =
            RenderReport::from_json(r#"{"key":"Form","id":"Legacy","phase":"update"}"#).unwrap();
        assert_eq!(report.key.as_deref(), Some("Form"));

        let report = RenderReport::from_json(r#"{"id":"Legacy"}"#).unwrap();
        assert_eq!(report.key.as_deref(), Some("Legacy"));
    }

    #[test]
    fn test_report_accepts_both_duration_spellings() {
        let report =
            RenderReport::from_json(r#"{"actual_duration":2.0,"actualDuration":9.0,"baseDuration":4.0}"#)
                .unwrap();
        assert_eq!(report.actual_duration, Some(2.0));
        assert_eq!(report.base_duration, Some(4.0));
    }

    #[test]
    fn test_ratio_regular() {
        let event = TimingEvent::new("Widget", RenderPhase::Updated, 2.0, 8.0, 0.0, 2.0);
        assert_eq!(event.ratio(), 0.25);
    }

    #[test]
    fn test_negative_and_nan_timings_read_as_zero() {
        let event = TimingEvent::new("w", RenderPhase::Initial, -1.0, f64::NAN, 0.0, 0.0);
        assert_eq!(event.actual_duration, 0.0);
        assert_eq!(event.base_duration, 0.0);
    }

    #[test]
    fn test_report_accepts_profiler_shape_and_ignores_extras() {
        let report = RenderReport::from_json(
            r#"{"id":"Form","phase":"nested-update","actualDuration":1.5,
                "baseDuration":3.0,"startTime":10,"commitTime":12,"interactions":[]}"#,
        )
        .unwrap();
        assert_eq!(report.key.as_deref(), Some("Form"));
        assert_eq!(report.phase, Some(RenderPhase::CascadedUpdate));
        assert_eq!(report.actual_duration, Some(1.5));
        assert_eq!(report.commit_time, Some(12.0));
    }

    #[test]
    fn test_report_non_numeric_fields_become_zero() {
        let report =
            RenderReport::from_json(r#"{"key":"A","actual_duration":"fast","base_duration":null}"#)
                .unwrap();
        let event = report.into_event("fallback");
        assert_eq!(event.key, "A");
        assert_eq!(event.actual_duration, 0.0);
        assert_eq!(event.base_duration, 0.0);
        assert_eq!(event.phase, RenderPhase::Updated);
    }

    #[test]
    fn test_report_missing_key_uses_default() {
        let event = RenderReport::from_json(r#"{"phase":"mount"}"#)
            .unwrap()
            .into_event("ComponentUnderTest");
        assert_eq!(event.key, "ComponentUnderTest");
        assert_eq!(event.phase, RenderPhase::Initial);
    }

    #[test]
    fn test_report_unknown_phase_falls_back() {
        let report = RenderReport::from_json(r#"{"phase":"hydrate"}"#).unwrap();
        assert_eq!(report.phase, None);
    }

    #[test]
    fn test_parse_lines_reports_line_number() {
        let input = "{\"key\":\"a\"}\n\n{not json}\n";
        let err = RenderReport::parse_lines(input).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_phase_serializes_kebab_case() {
        let json = serde_json::to_string(&RenderPhase::CascadedUpdate).unwrap();
        assert_eq!(json, "\"cascaded-update\"");
    }
}
