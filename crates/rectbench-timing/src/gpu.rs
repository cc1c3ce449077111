//! The accelerator timer seam.

use crate::checkpoint::CheckpointId;
use crate::delta::StageId;
use crate::Result;

/// Asynchronous GPU timer queries, keyed by checkpoint and stage.
///
/// Implementations own a fixed pool of query objects created once: one
/// timestamp query per checkpoint and one elapsed-time bracket per stage.
/// Issue operations must never block. Resolution relies on queries completing
/// in submission order: after a waited read of the last-issued query, every
/// earlier query of the same frame must be readable without waiting. A
/// backend on top of an API without that ordering guarantee must wait on each
/// query individually instead.
pub trait GpuTimers {
    /// Issue an asynchronous timestamp query for a checkpoint, overwriting
    /// any previous query in that slot.
    fn issue_timestamp(&mut self, checkpoint: CheckpointId);

    /// Open the elapsed-time bracket for a stage. At most one bracket is open
    /// at any time; the profiler closes it before opening the next.
    fn begin_elapsed(&mut self, stage: StageId);

    /// Close the currently open elapsed-time bracket.
    fn end_elapsed(&mut self);

    /// Make every issued query visible to resolution, submitting pending
    /// command work if the backend batches it. Called once per frame cycle,
    /// after the final trigger and before the batched readback.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Read back a checkpoint's timestamp in nanoseconds.
    ///
    /// With `wait` the call may stall until the GPU has processed the query;
    /// without it the result must already be available or
    /// [`TimingError::QueryUnavailable`](crate::TimingError::QueryUnavailable)
    /// is returned.
    fn resolve_timestamp_ns(&mut self, checkpoint: CheckpointId, wait: bool) -> Result<u64>;

    /// Read back a stage's bracket elapsed time in nanoseconds. Only called
    /// after the frame's last timestamp has been waited on, so the result
    /// must be available.
    fn resolve_elapsed_ns(&mut self, stage: StageId) -> Result<u64>;
}

/// No accelerator present: issues nothing and resolves everything to zero.
///
/// Used for CPU-only runs; wall and CPU columns stay meaningful while every
/// GPU column reports zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTimers;

impl GpuTimers for NullTimers {
    fn issue_timestamp(&mut self, _checkpoint: CheckpointId) {}

    fn begin_elapsed(&mut self, _stage: StageId) {}

    fn end_elapsed(&mut self) {}

    fn resolve_timestamp_ns(&mut self, _checkpoint: CheckpointId, _wait: bool) -> Result<u64> {
        Ok(0)
    }

    fn resolve_elapsed_ns(&mut self, _stage: StageId) -> Result<u64> {
        Ok(0)
    }
}
