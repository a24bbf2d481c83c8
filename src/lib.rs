//! Renderscope - render-timing instrumentation for UI subtrees
//!
//! This library captures one timing event per completed render of an
//! observed subtree, keeps a bounded latching sample buffer, and periodically
//! aggregates the buffer into per-component statistics for display.

pub mod capture_gate;
pub mod cli;
pub mod config;
pub mod display;
pub mod emitter;
pub mod engine;
pub mod sample_buffer;
pub mod stats;
pub mod timing_event;
pub mod workload;
