//! Capture gate: bounded, latching admission of timing events
//!
//! The gate owns the sample buffer and a two-state machine:
//!
//! | State        | Incoming event                   | Leaves via          |
//! |--------------|----------------------------------|---------------------|
//! | `Collecting` | appended to the buffer           | buffer reaches max  |
//! | `Stopped`    | discarded silently (drop counted)| `reset()` only      |
//!
//! Once stopped, the gate stays stopped even if the buffer is later observed
//! non-full; only an explicit reset reopens it.

use crate::sample_buffer::{BufferStats, SampleBuffer};
use crate::timing_event::TimingEvent;
use serde::Serialize;
use tracing::{debug, info};

/// Collection state of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Collecting,
    Stopped,
}

/// What happened to an event offered to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Appended; the gate is still collecting
    Appended,
    /// Appended, and the buffer reached its limit: the gate is now stopped
    Latched,
    /// Discarded because the gate was already stopped
    Dropped,
    /// Not offered at all: the instrumentation is disabled
    Ignored,
}

/// Latching admission filter in front of the sample buffer
#[derive(Debug, Clone)]
pub struct CaptureGate {
    state: CaptureState,
    max_samples: usize,
    buffer: SampleBuffer,
}

impl CaptureGate {
    /// Create a collecting gate that latches after `max_samples` events
    ///
    /// # Panics
    ///
    /// Panics if `max_samples` is 0 (rejected earlier by config validation).
    pub fn new(max_samples: usize) -> Self {
        CaptureGate {
            state: CaptureState::Collecting,
            max_samples,
            buffer: SampleBuffer::new(max_samples),
        }
    }

    /// Offer an event to the gate
    pub fn admit(&mut self, event: TimingEvent) -> CaptureOutcome {
        if self.state == CaptureState::Stopped {
            self.buffer.record_drop();
            debug!(key = %event.key, "capture gate stopped, event dropped");
            return CaptureOutcome::Dropped;
        }

        self.buffer.push(event);

        if self.buffer.len() >= self.max_samples {
            self.state = CaptureState::Stopped;
            info!(
                max_samples = self.max_samples,
                "sample limit reached, capture stopped until reset"
            );
            CaptureOutcome::Latched
        } else {
            CaptureOutcome::Appended
        }
    }

    /// Empty the buffer and reopen the gate
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = CaptureState::Collecting;
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }
}
