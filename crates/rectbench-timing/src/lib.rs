//! Pipeline stage profiler for the rectbench suite.
//!
//! This crate measures how long each stage of a fixed per-frame rendering
//! pipeline takes, correlating three independent clock domains:
//!
//! - monotonic wall-clock time (microseconds)
//! - process CPU time, kernel + user (microseconds)
//! - GPU hardware timestamps, read back asynchronously (nanoseconds)
//!
//! The profiler works with *checkpoints* (named instants in the per-frame
//! stage sequence) and *deltas* (named intervals between two checkpoints).
//! Each delta also carries an independently measured GPU elapsed time from a
//! dedicated begin/end query bracket, since the GPU's output for a bracket
//! already is a time delta and excludes idle gaps that separate two
//! timestamps.
//!
//! GPU queries are issued without blocking and resolved in a single batch at
//! frame end: the profiler waits on the last-issued timestamp only, which
//! guarantees every earlier query of the frame has completed (queries finish
//! in submission order), bounding the pipeline stall to one per frame.
//!
//! # Usage
//!
//! ```ignore
//! let mut profiler = StageProfiler::new(
//!     SystemClock::new(),
//!     NullTimers,
//!     Reporter::stdio(),
//!     ProfilerConfig::default(),
//! )?;
//!
//! profiler.set_scenario("opaque");
//! profiler.begin_approach("simple_vbo");
//! for _ in 0..frame_count {
//!     profiler.begin_frame();
//!     // ... build vertex data ...
//!     profiler.gen_buffers_done();
//!     // ... upload / clear / draw / present, each followed by its call ...
//!     profiler.end_frame()?;
//! }
//! profiler.end_approach()?;
//! ```

pub mod checkpoint;
pub mod clock;
pub mod delta;
pub mod gpu;
pub mod mock;
pub mod profiler;
pub mod report;
pub mod sequencer;

pub use checkpoint::{CheckpointId, CheckpointSample, CheckpointTable};
pub use clock::{HostClock, SystemClock};
pub use delta::{DeltaTable, StageDelta, StageId};
pub use gpu::{GpuTimers, NullTimers};
pub use profiler::{ProfilerConfig, SnapshotRequest, StageProfiler};
pub use report::Reporter;
pub use sequencer::StageSequencer;

use thiserror::Error;

/// Errors from the timing engine.
///
/// Sequencing violations are deliberately *not* represented here: a stage
/// triggered out of order is a bug in the caller and panics immediately,
/// because any recovery would silently corrupt the timing data.
#[derive(Error, Debug)]
pub enum TimingError {
    /// Writing a report row failed.
    #[error("I/O error writing report: {0}")]
    Io(#[from] std::io::Error),

    /// A GPU query was polled before the batched resolution point covered it.
    /// Indicates the resolution protocol was bypassed.
    #[error("GPU query '{0}' polled before its result was available")]
    QueryUnavailable(&'static str),

    /// The GPU timer backend failed.
    #[error("GPU timer backend error: {0}")]
    Backend(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, TimingError>;
