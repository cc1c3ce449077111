//! Deltas: named stage intervals between two checkpoints, with running
//! accumulators across the frames of one approach.

use crate::checkpoint::{CheckpointId, CheckpointTable};

/// The fixed set of stage intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum StageId {
    Approach = 0,
    Frame = 1,
    GenBuffers = 2,
    Upload = 3,
    Clear = 4,
    Draw = 5,
    Present = 6,
}

impl StageId {
    /// Number of stages.
    pub const COUNT: usize = 7;

    /// The five sub-frame stages, in pipeline order.
    pub const SUB_FRAME: [Self; 5] = [
        Self::GenBuffers,
        Self::Upload,
        Self::Clear,
        Self::Draw,
        Self::Present,
    ];

    /// Position in the delta table.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The (from, to) checkpoint pair defining this interval.
    #[must_use]
    pub const fn endpoints(self) -> (CheckpointId, CheckpointId) {
        match self {
            Self::Approach => (CheckpointId::ApproachStart, CheckpointId::ApproachEnd),
            Self::Frame => (CheckpointId::FrameStart, CheckpointId::FrameEnd),
            Self::GenBuffers => (CheckpointId::FrameStart, CheckpointId::GenBuffersDone),
            Self::Upload => (CheckpointId::GenBuffersDone, CheckpointId::UploadDone),
            Self::Clear => (CheckpointId::UploadDone, CheckpointId::ClearDone),
            Self::Draw => (CheckpointId::ClearDone, CheckpointId::DrawDone),
            Self::Present => (CheckpointId::DrawDone, CheckpointId::FrameEnd),
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Approach => "approach",
            Self::Frame => "frame",
            Self::GenBuffers => "gen_buffers",
            Self::Upload => "upload",
            Self::Clear => "clear",
            Self::Draw => "draw",
            Self::Present => "present",
        }
    }
}

/// One stage interval: the per-frame differences plus running sums.
///
/// `gpu_elapsed_ns` is never derived from timestamp subtraction; it always
/// comes from the stage's own begin/end bracket (consecutive timestamps may
/// straddle GPU idle or overlap periods that a bracket excludes).
#[derive(Debug, Clone, Copy, Default)]
pub struct StageDelta {
    /// Wall-clock difference, microseconds.
    pub wall_us: u64,
    /// Process CPU difference, microseconds.
    pub cpu_us: u64,
    /// GPU timestamp difference, nanoseconds.
    pub gpu_timestamp_ns: u64,
    /// GPU elapsed time from the dedicated bracket, nanoseconds.
    pub gpu_elapsed_ns: u64,

    /// Running wall sum across the approach's frames.
    pub accu_wall_us: u64,
    /// Running CPU sum.
    pub accu_cpu_us: u64,
    /// Running GPU timestamp-delta sum.
    pub accu_gpu_timestamp_ns: u64,
    /// Running GPU elapsed sum.
    pub accu_gpu_elapsed_ns: u64,
}

/// Fixed table of one delta per stage.
#[derive(Debug, Default)]
pub struct DeltaTable {
    deltas: [StageDelta; StageId::COUNT],
}

impl DeltaTable {
    /// Create an all-zero table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every delta and accumulator. Called when a new approach starts.
    pub fn reset(&mut self) {
        self.deltas = [StageDelta::default(); StageId::COUNT];
    }

    /// Get the delta for a stage.
    #[must_use]
    pub fn get(&self, stage: StageId) -> &StageDelta {
        &self.deltas[stage.index()]
    }

    /// Store the resolved GPU elapsed time for a stage's bracket.
    ///
    /// Must run before [`Self::update`] for the same stage so the value is
    /// picked up by the accumulator.
    pub fn set_gpu_elapsed(&mut self, stage: StageId, elapsed_ns: u64) {
        self.deltas[stage.index()].gpu_elapsed_ns = elapsed_ns;
    }

    /// Compute the per-frame differences for `stage` from two checkpoints and
    /// add all four values into the running accumulators.
    ///
    /// `gpu_elapsed_ns` is not touched here; it already holds the value from
    /// the stage's independent begin/end bracket.
    pub fn update(
        &mut self,
        stage: StageId,
        from: CheckpointId,
        to: CheckpointId,
        checkpoints: &CheckpointTable,
    ) {
        let from = checkpoints.get(from);
        let to = checkpoints.get(to);

        let delta = &mut self.deltas[stage.index()];
        delta.wall_us = to.wall_us.saturating_sub(from.wall_us);
        delta.cpu_us = to.cpu_us.saturating_sub(from.cpu_us);
        delta.gpu_timestamp_ns = to.gpu_timestamp_ns.saturating_sub(from.gpu_timestamp_ns);

        delta.accu_wall_us += delta.wall_us;
        delta.accu_cpu_us += delta.cpu_us;
        delta.accu_gpu_timestamp_ns += delta.gpu_timestamp_ns;
        delta.accu_gpu_elapsed_ns += delta.gpu_elapsed_ns;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_subtracts_and_accumulates() {
        let mut checkpoints = CheckpointTable::new();
        checkpoints.record_host(CheckpointId::FrameStart, 1000, 400);
        checkpoints.record_host(CheckpointId::FrameEnd, 6000, 2400);
        checkpoints.set_gpu_timestamp(CheckpointId::FrameStart, 10_000);
        checkpoints.set_gpu_timestamp(CheckpointId::FrameEnd, 50_000);

        let mut deltas = DeltaTable::new();
        deltas.update(
            StageId::Frame,
            CheckpointId::FrameStart,
            CheckpointId::FrameEnd,
            &checkpoints,
        );

        let frame = deltas.get(StageId::Frame);
        assert_eq!(frame.wall_us, 5000);
        assert_eq!(frame.cpu_us, 2000);
        assert_eq!(frame.gpu_timestamp_ns, 40_000);
        assert_eq!(frame.accu_wall_us, 5000);

        // Second frame with the same checkpoints accumulates again.
        deltas.update(
            StageId::Frame,
            CheckpointId::FrameStart,
            CheckpointId::FrameEnd,
            &checkpoints,
        );
        assert_eq!(deltas.get(StageId::Frame).accu_wall_us, 10_000);
        assert_eq!(deltas.get(StageId::Frame).accu_gpu_timestamp_ns, 80_000);
    }

    #[test]
    fn gpu_elapsed_comes_only_from_its_bracket() {
        let mut checkpoints = CheckpointTable::new();
        checkpoints.record_host(CheckpointId::UploadDone, 100, 100);
        checkpoints.record_host(CheckpointId::ClearDone, 200, 200);
        checkpoints.set_gpu_timestamp(CheckpointId::UploadDone, 1_000_000);
        checkpoints.set_gpu_timestamp(CheckpointId::ClearDone, 9_000_000);

        let mut deltas = DeltaTable::new();
        deltas.set_gpu_elapsed(StageId::Clear, 2_500);
        deltas.update(
            StageId::Clear,
            CheckpointId::UploadDone,
            CheckpointId::ClearDone,
            &checkpoints,
        );

        let clear = deltas.get(StageId::Clear);
        // Timestamp delta and bracket elapsed are distinct metrics.
        assert_eq!(clear.gpu_timestamp_ns, 8_000_000);
        assert_eq!(clear.gpu_elapsed_ns, 2_500);
        assert_eq!(clear.accu_gpu_elapsed_ns, 2_500);
    }

    #[test]
    fn endpoints_chain_the_frame_cycle() {
        // Sub-frame stages tile FrameStart..FrameEnd without gaps.
        let mut expected_from = CheckpointId::FrameStart;
        for stage in StageId::SUB_FRAME {
            let (from, to) = stage.endpoints();
            assert_eq!(from, expected_from, "gap before {}", stage.name());
            expected_from = to;
        }
        assert_eq!(expected_from, CheckpointId::FrameEnd);
    }

    #[test]
    fn reset_zeroes_accumulators() {
        let mut deltas = DeltaTable::new();
        deltas.set_gpu_elapsed(StageId::Draw, 99);
        deltas.update(
            StageId::Draw,
            CheckpointId::ClearDone,
            CheckpointId::DrawDone,
            &CheckpointTable::new(),
        );
        assert_eq!(deltas.get(StageId::Draw).accu_gpu_elapsed_ns, 99);

        deltas.reset();
        assert_eq!(deltas.get(StageId::Draw).accu_gpu_elapsed_ns, 0);
        assert_eq!(deltas.get(StageId::Draw).gpu_elapsed_ns, 0);
    }
}
