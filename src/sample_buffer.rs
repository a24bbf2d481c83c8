//! Bounded sample buffer for timing events
//!
//! The buffer is the write-fast side of the pipeline: appends never notify
//! anyone. The published statistics are recomputed from it on a timer by the
//! aggregation engine, so a burst of renders costs one `Vec::push` each.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ RENDER PATH (hot)                            │
//! │   render() → gate.admit() → buffer.push()    │
//! └──────────────────────────────────────────────┘
//!                     │  snapshot() every period
//!                     ▼
//! ┌──────────────────────────────────────────────┐
//! │ AGGREGATION PASS (cold)                      │
//! │   aggregate(snapshot) → publish(stats)       │
//! └──────────────────────────────────────────────┘
//! ```

use crate::timing_event::TimingEvent;

/// Ordered, capacity-capped sequence of timing events (oldest first)
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    events: Vec<TimingEvent>,
    capacity: usize,
    total_pushed: u64,
    total_dropped: u64,
}

impl SampleBuffer {
    /// Create a buffer holding at most `capacity` events
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Sample buffer capacity must be > 0");
        SampleBuffer {
            events: Vec::with_capacity(capacity),
            capacity,
            total_pushed: 0,
            total_dropped: 0,
        }
    }

    /// Append an event
    ///
    /// Returns `false` (and counts a drop) when the buffer is already full.
    pub fn push(&mut self, event: TimingEvent) -> bool {
        self.total_pushed += 1;
        if self.events.len() >= self.capacity {
            self.total_dropped += 1;
            return false;
        }
        self.events.push(event);
        true
    }

    /// Count an event that was rejected before reaching the buffer
    pub fn record_drop(&mut self) {
        self.total_pushed += 1;
        self.total_dropped += 1;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events in insertion order
    pub fn events(&self) -> &[TimingEvent] {
        &self.events
    }

    /// Copy of the current contents, for a pass that runs without the lock
    pub fn snapshot(&self) -> Vec<TimingEvent> {
        self.events.clone()
    }

    /// Remove all events and reset counters
    pub fn clear(&mut self) {
        self.events.clear();
        self.total_pushed = 0;
        self.total_dropped = 0;
    }

    /// Get buffer statistics
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            total_pushed: self.total_pushed,
            total_dropped: self.total_dropped,
            current_size: self.events.len(),
            capacity: self.capacity,
        }
    }
}

/// Sample buffer statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BufferStats {
    pub total_pushed: u64,
    pub total_dropped: u64,
    pub current_size: usize,
    pub capacity: usize,
}

impl BufferStats {
    /// Calculate drop rate (0.0 to 1.0)
    pub fn drop_rate(&self) -> f64 {
        if self.total_pushed == 0 {
            0.0
        } else {
            self.total_dropped as f64 / self.total_pushed as f64
        }
    }

    /// Calculate buffer utilization (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.current_size as f64 / self.capacity as f64
        }
    }
}
