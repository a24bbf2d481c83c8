//! Instrumentation scope: capture, periodic aggregation, reset
//!
//! [`Instrumentation`] ties the pipeline together. State is split in two:
//!
//! - the capture gate and its sample buffer, written on every render and
//!   never observed directly;
//! - the published [`StatsSnapshot`], replaced wholesale by each aggregation
//!   pass and handed to readers through a `tokio::sync::watch` channel.
//!
//! Only three operations mutate anything: [`capture`](Instrumentation::capture),
//! [`aggregate_tick`](Instrumentation::aggregate_tick) and
//! [`reset`](Instrumentation::reset).
//!
//! # Example
//!
//! ```
//! use renderscope::config::ProfilerConfig;
//! use renderscope::engine::Instrumentation;
//! use renderscope::timing_event::{RenderPhase, TimingEvent};
//!
//! let scope = Instrumentation::new(ProfilerConfig::default()).unwrap();
//! scope.capture(TimingEvent::new("Form", RenderPhase::Initial, 2.0, 2.0, 0.0, 2.0));
//! scope.aggregate_tick();
//!
//! let snapshot = scope.snapshot();
//! assert_eq!(snapshot.get("Form").unwrap().mount_count, 1);
//! ```

use crate::capture_gate::{CaptureGate, CaptureOutcome, CaptureState};
use crate::config::{ConfigError, ProfilerConfig};
use crate::emitter::RenderObserver;
use crate::sample_buffer::BufferStats;
use crate::stats::{aggregate, StatsSnapshot};
use crate::timing_event::{wall_clock_ms, RenderReport, TimingEvent};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Result of one aggregation trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Statistics recomputed from this many events and published
    Published(usize),
    /// Buffer was empty; nothing published
    SkippedEmpty,
    /// Another pass was still running; this trigger is dropped
    SkippedInFlight,
    /// A reset happened mid-pass; the stale result was thrown away
    Discarded,
    /// Instrumentation is disabled
    Disabled,
}

struct Shared {
    config: ProfilerConfig,
    gate: Mutex<CaptureGate>,
    /// Bumped by every reset so an in-progress pass can tell its input is stale
    generation: AtomicU64,
    in_flight: AtomicBool,
    passes: AtomicU64,
    published: watch::Sender<Arc<StatsSnapshot>>,
}

/// Handle to one instrumentation scope
///
/// Cloning is cheap and every clone refers to the same scope.
#[derive(Clone)]
pub struct Instrumentation {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentation")
            .field("config", &self.shared.config)
            .field("capture_state", &self.capture_state())
            .field("buffer_len", &self.buffer_len())
            .finish()
    }
}

impl Instrumentation {
    /// Create a scope from a validated configuration
    pub fn new(config: ProfilerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (published, _) = watch::channel(Arc::new(StatsSnapshot::empty()));

        if !config.enabled {
            debug!("instrumentation disabled, scope is inert");
        }

        Ok(Self {
            shared: Arc::new(Shared {
                gate: Mutex::new(CaptureGate::new(config.max_samples)),
                config,
                generation: AtomicU64::new(0),
                in_flight: AtomicBool::new(false),
                passes: AtomicU64::new(0),
                published,
            }),
        })
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.shared.config
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.config.enabled
    }

    /// Offer a timing event to the capture gate
    pub fn capture(&self, event: TimingEvent) -> CaptureOutcome {
        if !self.is_enabled() {
            return CaptureOutcome::Ignored;
        }
        self.lock_gate().admit(event)
    }

    /// Capture a host-supplied report, keyed by `observed_key` when unnamed
    pub fn capture_report(&self, report: RenderReport) -> CaptureOutcome {
        let event = report.into_event(&self.shared.config.observed_key);
        self.capture(event)
    }

    /// Run one aggregation pass if there is work and no pass is in flight
    pub fn aggregate_tick(&self) -> PassOutcome {
        if !self.is_enabled() {
            return PassOutcome::Disabled;
        }

        let Some(_guard) = InFlightGuard::acquire(&self.shared.in_flight) else {
            debug!("aggregation pass already in flight, skipping trigger");
            return PassOutcome::SkippedInFlight;
        };

        match self.begin_pass() {
            Ok(pass) => self.finish_pass(pass),
            Err(outcome) => outcome,
        }
    }

    /// Copy the buffer and note the reset generation it belongs to
    fn begin_pass(&self) -> Result<PendingPass, PassOutcome> {
        let gate = self.lock_gate();
        if gate.buffer().is_empty() {
            return Err(PassOutcome::SkippedEmpty);
        }
        Ok(PendingPass {
            events: gate.buffer().snapshot(),
            generation: self.shared.generation.load(Ordering::SeqCst),
        })
    }

    /// Fold the copied events and publish unless a reset happened meanwhile
    fn finish_pass(&self, pass: PendingPass) -> PassOutcome {
        let snapshot = aggregate(&pass.events, wall_clock_ms());

        // Publish under the gate lock so a concurrent reset cannot interleave
        let _gate = self.lock_gate();
        if self.shared.generation.load(Ordering::SeqCst) != pass.generation {
            debug!("reset during aggregation pass, discarding result");
            return PassOutcome::Discarded;
        }
        self.shared.published.send_replace(Arc::new(snapshot));
        self.shared.passes.fetch_add(1, Ordering::Relaxed);
        debug!(events = pass.events.len(), "aggregation pass published");

        PassOutcome::Published(pass.events.len())
    }

    /// Clear buffer, reopen the gate and publish an empty snapshot
    pub fn reset(&self) {
        let mut gate = self.lock_gate();
        gate.reset();
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared
            .published
            .send_replace(Arc::new(StatsSnapshot::empty()));
        info!("instrumentation reset");
    }

    /// Latest published statistics
    pub fn snapshot(&self) -> Arc<StatsSnapshot> {
        self.shared.published.borrow().clone()
    }

    /// Receiver notified whenever a pass or reset publishes
    pub fn subscribe(&self) -> watch::Receiver<Arc<StatsSnapshot>> {
        self.shared.published.subscribe()
    }

    pub fn buffer_len(&self) -> usize {
        self.lock_gate().buffer().len()
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.lock_gate().buffer_stats()
    }

    pub fn capture_state(&self) -> CaptureState {
        self.lock_gate().state()
    }

    /// Buffered events in capture order
    pub fn buffered_events(&self) -> Vec<TimingEvent> {
        self.lock_gate().buffer().snapshot()
    }

    /// Number of passes that published statistics
    pub fn passes_published(&self) -> u64 {
        self.shared.passes.load(Ordering::Relaxed)
    }

    /// Spawn the periodic aggregation loop on the current tokio runtime
    ///
    /// The first pass runs one period after start. The loop lives as long as
    /// the returned [`AggregationTask`]; dropping it stops the loop.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start_aggregation(&self) -> AggregationTask {
        if !self.is_enabled() {
            return AggregationTask { handle: None };
        }

        let scope = self.clone();
        let period = self.shared.config.aggregation_period();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                scope.aggregate_tick();
            }
        });
        debug!(period_ms = period.as_millis() as u64, "aggregation loop started");

        AggregationTask {
            handle: Some(handle),
        }
    }

    // Poisoning only means a panic elsewhere; the gate itself stays consistent
    fn lock_gate(&self) -> MutexGuard<'_, CaptureGate> {
        self.shared.gate.lock().unwrap_or_else(|poisoned| {
            warn!("capture gate lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl RenderObserver for Instrumentation {
    fn on_render(&self, event: TimingEvent) {
        self.capture(event);
    }
}

/// Buffer contents taken by a pass, tagged with the reset generation
struct PendingPass {
    events: Vec<TimingEvent>,
    generation: u64,
}

/// Clears the in-flight flag on every exit path of a pass
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Owner of the periodic aggregation loop
///
/// The loop is aborted when this guard is shut down or dropped.
#[derive(Debug)]
pub struct AggregationTask {
    handle: Option<JoinHandle<()>>,
}

impl AggregationTask {
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and wait until it has been torn down
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
            debug!("aggregation loop stopped");
        }
    }
}

impl Drop for AggregationTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
