//! Test doubles for driving the profiler without real hardware.
//!
//! [`ScriptedClock`] replays deterministic host clock sequences and
//! [`MockTimers`] models a GPU whose queries complete strictly in submission
//! order, so the batched resolution protocol can be verified on the CPU.

use crate::checkpoint::CheckpointId;
use crate::clock::HostClock;
use crate::delta::StageId;
use crate::gpu::GpuTimers;
use crate::{Result, TimingError};

/// Host clock that advances by a fixed increment on every read.
///
/// With `wall_step_us = 1000`, consecutive checkpoints within a frame are
/// exactly 1000 µs apart, which makes expected delta values trivial to state
/// in tests.
#[derive(Debug)]
pub struct ScriptedClock {
    wall_us: u64,
    cpu_us: u64,
    wall_step_us: u64,
    cpu_step_us: u64,
}

impl ScriptedClock {
    /// Create a clock starting at zero with the given per-read increments.
    #[must_use]
    pub const fn new(wall_step_us: u64, cpu_step_us: u64) -> Self {
        Self {
            wall_us: 0,
            cpu_us: 0,
            wall_step_us,
            cpu_step_us,
        }
    }
}

impl HostClock for ScriptedClock {
    fn wall_us(&mut self) -> u64 {
        let now = self.wall_us;
        self.wall_us += self.wall_step_us;
        now
    }

    fn cpu_us(&mut self) -> u64 {
        let now = self.cpu_us;
        self.cpu_us += self.cpu_step_us;
        now
    }
}

/// Mock GPU clock with in-order query completion.
///
/// Every issued command advances the mock GPU clock by a fixed step and gets
/// a submission sequence number. A waited read moves the completion watermark
/// up to that query's sequence number; a non-waiting read of a query above
/// the watermark fails with `QueryUnavailable`, which is exactly the protocol
/// violation the resolution rule is designed to rule out.
#[derive(Debug)]
pub struct MockTimers {
    now_ns: u64,
    step_ns: u64,
    next_seq: u64,
    /// Queries with a sequence number below this have completed.
    completed_seq: u64,
    timestamps: [Option<IssuedQuery>; CheckpointId::COUNT],
    elapsed: [Option<IssuedQuery>; StageId::COUNT],
    open_bracket: Option<(StageId, u64)>,
}

#[derive(Debug, Clone, Copy)]
struct IssuedQuery {
    seq: u64,
    value_ns: u64,
}

impl MockTimers {
    /// Create a mock GPU whose clock advances `step_ns` per issued command.
    #[must_use]
    pub const fn new(step_ns: u64) -> Self {
        Self {
            now_ns: 0,
            step_ns,
            next_seq: 0,
            completed_seq: 0,
            timestamps: [None; CheckpointId::COUNT],
            elapsed: [None; StageId::COUNT],
            open_bracket: None,
        }
    }

    /// Current mock GPU clock value.
    #[must_use]
    pub const fn now_ns(&self) -> u64 {
        self.now_ns
    }

    /// Insert extra GPU-side idle time before the next command. Lets tests
    /// make bracket elapsed values diverge from timestamp deltas.
    pub fn skip_idle(&mut self, idle_ns: u64) {
        self.now_ns += idle_ns;
    }

    fn issue(&mut self) -> (u64, u64) {
        self.now_ns += self.step_ns;
        let seq = self.next_seq;
        self.next_seq += 1;
        (seq, self.now_ns)
    }
}

impl GpuTimers for MockTimers {
    fn issue_timestamp(&mut self, checkpoint: CheckpointId) {
        let (seq, value_ns) = self.issue();
        self.timestamps[checkpoint.index()] = Some(IssuedQuery { seq, value_ns });
    }

    fn begin_elapsed(&mut self, stage: StageId) {
        assert!(
            self.open_bracket.is_none(),
            "elapsed bracket opened while another is open"
        );
        let (_, value_ns) = self.issue();
        self.open_bracket = Some((stage, value_ns));
    }

    fn end_elapsed(&mut self) {
        let (stage, begin_ns) = self
            .open_bracket
            .take()
            .expect("elapsed bracket closed without being open");
        let (seq, end_ns) = self.issue();
        self.elapsed[stage.index()] = Some(IssuedQuery {
            seq,
            value_ns: end_ns - begin_ns,
        });
    }

    fn resolve_timestamp_ns(&mut self, checkpoint: CheckpointId, wait: bool) -> Result<u64> {
        let query = self.timestamps[checkpoint.index()]
            .ok_or(TimingError::QueryUnavailable(checkpoint.name()))?;
        if wait {
            self.completed_seq = self.completed_seq.max(query.seq + 1);
        } else if query.seq >= self.completed_seq {
            return Err(TimingError::QueryUnavailable(checkpoint.name()));
        }
        Ok(query.value_ns)
    }

    fn resolve_elapsed_ns(&mut self, stage: StageId) -> Result<u64> {
        let query =
            self.elapsed[stage.index()].ok_or(TimingError::QueryUnavailable(stage.name()))?;
        if query.seq >= self.completed_seq {
            return Err(TimingError::QueryUnavailable(stage.name()));
        }
        Ok(query.value_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_clock_steps_per_read() {
        let mut clock = ScriptedClock::new(1000, 10);
        assert_eq!(clock.wall_us(), 0);
        assert_eq!(clock.wall_us(), 1000);
        assert_eq!(clock.cpu_us(), 0);
        assert_eq!(clock.cpu_us(), 10);
        assert_eq!(clock.wall_us(), 2000);
    }

    #[test]
    fn waited_read_completes_all_earlier_queries() {
        let mut gpu = MockTimers::new(100);
        gpu.issue_timestamp(CheckpointId::FrameStart);
        gpu.issue_timestamp(CheckpointId::GenBuffersDone);
        gpu.issue_timestamp(CheckpointId::FrameEnd);

        // Reading an earlier query without the wait is a protocol violation.
        assert!(matches!(
            gpu.resolve_timestamp_ns(CheckpointId::FrameStart, false),
            Err(TimingError::QueryUnavailable(_))
        ));

        // After waiting on the last query the earlier ones read cleanly.
        gpu.resolve_timestamp_ns(CheckpointId::FrameEnd, true).unwrap();
        assert_eq!(
            gpu.resolve_timestamp_ns(CheckpointId::FrameStart, false)
                .unwrap(),
            100
        );
        assert_eq!(
            gpu.resolve_timestamp_ns(CheckpointId::GenBuffersDone, false)
                .unwrap(),
            200
        );
    }

    #[test]
    fn bracket_measures_only_its_own_interval() {
        let mut gpu = MockTimers::new(100);
        gpu.begin_elapsed(StageId::Draw);
        gpu.skip_idle(5000);
        gpu.end_elapsed();
        gpu.issue_timestamp(CheckpointId::FrameEnd);
        gpu.resolve_timestamp_ns(CheckpointId::FrameEnd, true).unwrap();

        // begin at 100, idle 5000, end command at 5200.
        assert_eq!(gpu.resolve_elapsed_ns(StageId::Draw).unwrap(), 5100);
    }
}
