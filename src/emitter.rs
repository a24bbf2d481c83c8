//! Render emitter hook
//!
//! [`RenderProfiler`] wraps render closures of an observed subtree and hands
//! one [`TimingEvent`] per completed render to a [`RenderObserver`]. It runs
//! on the render thread and keeps its bookkeeping in `Cell`/`RefCell`, so
//! nested renders can call back into the same profiler through `&self`.
//!
//! Phase rules:
//! - first render of a key (or first after [`unmount`](RenderProfiler::unmount)): `Initial`
//! - a render running inside another profiled render: `CascadedUpdate`
//! - any other render: `Updated`
//!
//! Base duration is the cost of the subtree without memoization:
//! - a render marked memoized reports the reference of the last full render;
//! - any other render reports its own duration plus the recorded cost of the
//!   parts it reused ([`credit_reused`](RenderContext::credit_reused)), and
//!   that sum becomes the new reference for the key.

use crate::config::DEFAULT_OBSERVED_KEY;
use crate::timing_event::{RenderPhase, RenderReport, TimingEvent};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Instant;

/// Receiver of completed-render notifications
///
/// Implementations must not panic; measurement must never break the
/// measured workload.
pub trait RenderObserver {
    fn on_render(&self, event: TimingEvent);
}

impl<F> RenderObserver for F
where
    F: Fn(TimingEvent),
{
    fn on_render(&self, event: TimingEvent) {
        self(event)
    }
}

/// Per-render handle passed to the profiled closure
#[derive(Debug, Default)]
pub struct RenderContext {
    memoized: bool,
    reused_ms: f64,
}

impl RenderContext {
    /// Mark this render as having reused its whole cached output
    pub fn mark_memoized(&mut self) {
        self.memoized = true;
    }

    pub fn is_memoized(&self) -> bool {
        self.memoized
    }

    /// Add the last full cost (ms) of a part this render reused instead of redoing
    ///
    /// Negative or non-finite costs are ignored.
    pub fn credit_reused(&mut self, cost_ms: f64) {
        if cost_ms.is_finite() && cost_ms > 0.0 {
            self.reused_ms += cost_ms;
        }
    }

    /// Total reused cost credited so far (ms)
    pub fn reused_ms(&self) -> f64 {
        self.reused_ms
    }
}

/// Times renders and notifies an observer once per completed render
pub struct RenderProfiler<O: RenderObserver> {
    observer: O,
    observed_key: String,
    origin: Instant,
    /// Last full (non-memoized) render duration per mounted key
    mounted: RefCell<HashMap<String, f64>>,
    depth: Cell<usize>,
}

impl<O: RenderObserver> std::fmt::Debug for RenderProfiler<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderProfiler")
            .field("observed_key", &self.observed_key)
            .field("mounted", &self.mounted.borrow().len())
            .field("depth", &self.depth.get())
            .finish()
    }
}

impl<O: RenderObserver> RenderProfiler<O> {
    pub fn new(observer: O) -> Self {
        Self::with_key(observer, DEFAULT_OBSERVED_KEY)
    }

    /// Profiler whose host reports default to `observed_key`
    pub fn with_key(observer: O, observed_key: impl Into<String>) -> Self {
        RenderProfiler {
            observer,
            observed_key: observed_key.into(),
            origin: Instant::now(),
            mounted: RefCell::new(HashMap::new()),
            depth: Cell::new(0),
        }
    }

    pub fn observed_key(&self) -> &str {
        &self.observed_key
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Render `key` through `render`, emitting one event when it completes
    ///
    /// If `render` panics no event is emitted and the panic continues to
    /// unwind; the profiler's nesting state is restored either way.
    pub fn profile<R, F>(&self, key: &str, render: F) -> R
    where
        F: FnOnce(&mut RenderContext) -> R,
    {
        let phase = self.phase_for(key);
        let mut ctx = RenderContext::default();

        let start = Instant::now();
        let start_time = self.ms_since_origin(start);
        let result = {
            let _nesting = NestingGuard::enter(&self.depth);
            render(&mut ctx)
        };
        let end = Instant::now();
        let actual_duration = end.duration_since(start).as_secs_f64() * 1000.0;

        let base_duration = {
            let mut mounted = self.mounted.borrow_mut();
            let full_cost = actual_duration + ctx.reused_ms();
            let reference = mounted.entry(key.to_string()).or_insert(full_cost);
            if !ctx.is_memoized() {
                *reference = full_cost;
            }
            *reference
        };

        self.observer.on_render(TimingEvent::new(
            key,
            phase,
            actual_duration,
            base_duration,
            start_time,
            self.ms_since_origin(end),
        ));

        result
    }

    /// Forward a render measured by the host's own instrumentation
    pub fn report(&self, report: RenderReport) {
        self.observer
            .on_render(report.into_event(&self.observed_key));
    }

    /// Forget `key` so its next render counts as a mount
    pub fn unmount(&self, key: &str) {
        self.mounted.borrow_mut().remove(key);
    }

    pub fn is_mounted(&self, key: &str) -> bool {
        self.mounted.borrow().contains_key(key)
    }

    fn phase_for(&self, key: &str) -> RenderPhase {
        if !self.is_mounted(key) {
            RenderPhase::Initial
        } else if self.depth.get() > 0 {
            RenderPhase::CascadedUpdate
        } else {
            RenderPhase::Updated
        }
    }

    fn ms_since_origin(&self, at: Instant) -> f64 {
        at.duration_since(self.origin).as_secs_f64() * 1000.0
    }
}

struct NestingGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> NestingGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        NestingGuard { depth }
    }
}

impl Drop for NestingGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}
