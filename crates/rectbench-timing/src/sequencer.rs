//! Strict ordering of checkpoint triggers.

use crate::checkpoint::CheckpointId;

/// State machine enforcing the total order of checkpoint triggers.
///
/// Holds the single checkpoint that may legally fire next. Advancing with any
/// other checkpoint panics: an out-of-order trigger means a rendering
/// strategy skipped a stage, and continuing would corrupt every delta derived
/// from the affected checkpoints.
#[derive(Debug)]
pub struct StageSequencer {
    expected: CheckpointId,
}

impl Default for StageSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl StageSequencer {
    /// Create a sequencer expecting `ApproachStart`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            expected: CheckpointId::ApproachStart,
        }
    }

    /// The checkpoint that must fire next.
    #[must_use]
    pub const fn expected(&self) -> CheckpointId {
        self.expected
    }

    /// Re-arm for a new approach cycle.
    pub fn rearm_approach(&mut self) {
        self.expected = CheckpointId::ApproachStart;
    }

    /// Re-arm for the next frame cycle. Permits indefinite repetition of the
    /// inner `FrameStart..=FrameEnd` sequence within one approach.
    pub fn rearm_frame(&mut self) {
        self.expected = CheckpointId::FrameStart;
    }

    /// Record that `checkpoint` fired.
    ///
    /// # Panics
    /// If `checkpoint` is not the expected next state.
    pub fn advance(&mut self, checkpoint: CheckpointId) {
        assert_eq!(
            checkpoint,
            self.expected,
            "checkpoint '{}' fired out of order, expected '{}'",
            checkpoint.name(),
            self.expected.name(),
        );
        // After ApproachEnd only a re-arm makes the sequencer live again;
        // parking on ApproachStart keeps any further trigger illegal until
        // begin_approach or begin_frame resets the state.
        self.expected = checkpoint
            .successor()
            .unwrap_or(CheckpointId::ApproachStart);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle_in_order() {
        let mut seq = StageSequencer::new();
        for checkpoint in CheckpointId::ALL {
            seq.advance(checkpoint);
        }
    }

    #[test]
    fn rearm_frame_repeats_inner_cycle() {
        let mut seq = StageSequencer::new();
        seq.advance(CheckpointId::ApproachStart);
        for _ in 0..3 {
            seq.rearm_frame();
            seq.advance(CheckpointId::FrameStart);
            seq.advance(CheckpointId::GenBuffersDone);
            seq.advance(CheckpointId::UploadDone);
            seq.advance(CheckpointId::ClearDone);
            seq.advance(CheckpointId::DrawDone);
            seq.advance(CheckpointId::FrameEnd);
        }
        seq.advance(CheckpointId::ApproachEnd);
    }

    #[test]
    #[should_panic(expected = "fired out of order")]
    fn skipping_a_stage_is_fatal() {
        let mut seq = StageSequencer::new();
        seq.advance(CheckpointId::ApproachStart);
        seq.rearm_frame();
        seq.advance(CheckpointId::FrameStart);
        seq.advance(CheckpointId::GenBuffersDone);
        // Skips UploadDone and ClearDone.
        seq.advance(CheckpointId::DrawDone);
    }

    #[test]
    #[should_panic(expected = "fired out of order")]
    fn double_trigger_is_fatal() {
        let mut seq = StageSequencer::new();
        seq.advance(CheckpointId::ApproachStart);
        seq.advance(CheckpointId::ApproachStart);
    }

    #[test]
    #[should_panic(expected = "fired out of order")]
    fn trigger_after_approach_end_is_fatal() {
        let mut seq = StageSequencer::new();
        for checkpoint in CheckpointId::ALL {
            seq.advance(checkpoint);
        }
        seq.advance(CheckpointId::FrameStart);
    }
}
