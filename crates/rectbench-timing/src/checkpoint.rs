//! Checkpoints: named instants within one approach/frame lifecycle.

/// The fixed, ordered set of checkpoints in one measurement cycle.
///
/// `ApproachStart`/`ApproachEnd` bracket a whole strategy run and fire exactly
/// once; `FrameStart..=FrameEnd` repeat once per rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum CheckpointId {
    ApproachStart = 0,
    FrameStart = 1,
    GenBuffersDone = 2,
    UploadDone = 3,
    ClearDone = 4,
    DrawDone = 5,
    FrameEnd = 6,
    ApproachEnd = 7,
}

impl CheckpointId {
    /// Number of checkpoints.
    pub const COUNT: usize = 8;

    /// All checkpoints in trigger order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::ApproachStart,
        Self::FrameStart,
        Self::GenBuffersDone,
        Self::UploadDone,
        Self::ClearDone,
        Self::DrawDone,
        Self::FrameEnd,
        Self::ApproachEnd,
    ];

    /// The checkpoints inside the frame cycle that are resolved without
    /// waiting once the `FrameEnd` timestamp has been waited on.
    pub const FRAME_INTERIOR: [Self; 5] = [
        Self::FrameStart,
        Self::GenBuffersDone,
        Self::UploadDone,
        Self::ClearDone,
        Self::DrawDone,
    ];

    /// Position in the trigger order.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The checkpoint that must follow this one within a cycle.
    #[must_use]
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::ApproachStart => Some(Self::FrameStart),
            Self::FrameStart => Some(Self::GenBuffersDone),
            Self::GenBuffersDone => Some(Self::UploadDone),
            Self::UploadDone => Some(Self::ClearDone),
            Self::ClearDone => Some(Self::DrawDone),
            Self::DrawDone => Some(Self::FrameEnd),
            Self::FrameEnd => Some(Self::ApproachEnd),
            Self::ApproachEnd => None,
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ApproachStart => "approach_start",
            Self::FrameStart => "frame_start",
            Self::GenBuffersDone => "gen_buffers_done",
            Self::UploadDone => "upload_done",
            Self::ClearDone => "clear_done",
            Self::DrawDone => "draw_done",
            Self::FrameEnd => "frame_end",
            Self::ApproachEnd => "approach_end",
        }
    }
}

/// One recorded instant: synchronized wall/CPU samples plus the GPU timestamp
/// once the in-flight query for this checkpoint has been resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckpointSample {
    /// Monotonic wall-clock microseconds.
    pub wall_us: u64,
    /// Process CPU microseconds (kernel + user).
    pub cpu_us: u64,
    /// GPU hardware timestamp in nanoseconds; stays 0 until resolved.
    pub gpu_timestamp_ns: u64,
}

/// Fixed table of one sample per checkpoint, overwritten each cycle.
#[derive(Debug, Default)]
pub struct CheckpointTable {
    samples: [CheckpointSample; CheckpointId::COUNT],
}

impl CheckpointTable {
    /// Create an all-zero table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every sample.
    pub fn reset(&mut self) {
        self.samples = [CheckpointSample::default(); CheckpointId::COUNT];
    }

    /// Get the sample for a checkpoint.
    #[must_use]
    pub fn get(&self, checkpoint: CheckpointId) -> &CheckpointSample {
        &self.samples[checkpoint.index()]
    }

    /// Record the host-side clocks for a checkpoint.
    pub fn record_host(&mut self, checkpoint: CheckpointId, wall_us: u64, cpu_us: u64) {
        let sample = &mut self.samples[checkpoint.index()];
        sample.wall_us = wall_us;
        sample.cpu_us = cpu_us;
    }

    /// Store a resolved GPU timestamp for a checkpoint.
    pub fn set_gpu_timestamp(&mut self, checkpoint: CheckpointId, timestamp_ns: u64) {
        self.samples[checkpoint.index()].gpu_timestamp_ns = timestamp_ns;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_chain_covers_all_checkpoints() {
        let mut current = CheckpointId::ApproachStart;
        let mut visited = vec![current];
        while let Some(next) = current.successor() {
            assert_eq!(next.index(), current.index() + 1);
            visited.push(next);
            current = next;
        }
        assert_eq!(visited, CheckpointId::ALL);
    }

    #[test]
    fn record_and_reset() {
        let mut table = CheckpointTable::new();
        table.record_host(CheckpointId::FrameStart, 100, 50);
        table.set_gpu_timestamp(CheckpointId::FrameStart, 12345);

        let sample = table.get(CheckpointId::FrameStart);
        assert_eq!(sample.wall_us, 100);
        assert_eq!(sample.cpu_us, 50);
        assert_eq!(sample.gpu_timestamp_ns, 12345);

        table.reset();
        assert_eq!(table.get(CheckpointId::FrameStart).wall_us, 0);
    }
}
