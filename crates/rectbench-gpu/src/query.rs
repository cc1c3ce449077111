//! Timer query pools implementing the profiler's GPU clock.
//!
//! Two `TIMESTAMP` pools are created once per run: one slot per checkpoint,
//! and one begin/end slot pair per stage for the elapsed brackets (Vulkan has
//! no elapsed query type, so a bracket is its own timestamp pair; that still
//! keeps bracket values independent of the checkpoint timestamps). Slots are
//! host-reset between frames, except the approach start/end slots which live
//! for the whole run.
//!
//! Readback relies on Vulkan's guarantee that queries on a single queue
//! become available in submission order: one waited read of the last-issued
//! timestamp makes every earlier slot of the frame readable with a plain
//! non-waiting read.

use std::sync::Arc;

use ash::vk;
use tracing::trace;

use rectbench_timing::{CheckpointId, GpuTimers, StageId, TimingError};

use crate::error::Result as GpuResult;

const TIMESTAMP_SLOTS: u32 = CheckpointId::COUNT as u32;
const ELAPSED_SLOTS: u32 = StageId::COUNT as u32 * 2;

/// Index of a checkpoint's slot in the timestamp pool.
const fn timestamp_slot(checkpoint: CheckpointId) -> u32 {
    checkpoint.index() as u32
}

/// Index of a stage's begin slot in the elapsed pool; end is the next slot.
const fn elapsed_begin_slot(stage: StageId) -> u32 {
    stage.index() as u32 * 2
}

/// Scale raw timestamp ticks to nanoseconds, masking off invalid high bits.
fn ticks_to_ns(ticks: u64, valid_bits: u32, period_ns: f32) -> u64 {
    (mask_ticks(ticks, valid_bits) as f64 * f64::from(period_ns)).round() as u64
}

/// Tick difference honoring counter wraparound within the valid bit width.
fn tick_delta_to_ns(begin: u64, end: u64, valid_bits: u32, period_ns: f32) -> u64 {
    let delta = mask_ticks(end.wrapping_sub(begin), valid_bits);
    (delta as f64 * f64::from(period_ns)).round() as u64
}

const fn mask_ticks(ticks: u64, valid_bits: u32) -> u64 {
    if valid_bits >= 64 {
        ticks
    } else {
        ticks & ((1 << valid_bits) - 1)
    }
}

/// Vulkan timer query pools bound to one graphics queue.
///
/// The pools also own frame submission: `flush` ends the bound command
/// buffer and submits it to the queue, which is what makes the frame's
/// queries resolvable in the first place.
pub struct TimerQueryPools {
    device: Arc<ash::Device>,
    queue: vk::Queue,
    timestamp_pool: vk::QueryPool,
    elapsed_pool: vk::QueryPool,
    period_ns: f32,
    valid_bits: u32,
    /// Command buffer queries are recorded into; set once per frame.
    cmd: vk::CommandBuffer,
    /// Stage whose begin slot was written and whose end slot is pending.
    open_bracket: Option<StageId>,
}

impl TimerQueryPools {
    /// Create the two query pools and reset every slot.
    pub fn new(
        device: Arc<ash::Device>,
        queue: vk::Queue,
        period_ns: f32,
        valid_bits: u32,
    ) -> GpuResult<Self> {
        let timestamp_info = vk::QueryPoolCreateInfo::default()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(TIMESTAMP_SLOTS);
        let elapsed_info = vk::QueryPoolCreateInfo::default()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(ELAPSED_SLOTS);

        let (timestamp_pool, elapsed_pool) = unsafe {
            let timestamp_pool = device.create_query_pool(&timestamp_info, None)?;
            let elapsed_pool = match device.create_query_pool(&elapsed_info, None) {
                Ok(pool) => pool,
                Err(e) => {
                    device.destroy_query_pool(timestamp_pool, None);
                    return Err(e.into());
                }
            };
            (timestamp_pool, elapsed_pool)
        };

        let pools = Self {
            device,
            queue,
            timestamp_pool,
            elapsed_pool,
            period_ns,
            valid_bits,
            cmd: vk::CommandBuffer::null(),
            open_bracket: None,
        };
        pools.reset_approach_slots();
        trace!(period_ns, valid_bits, "timer query pools created");
        Ok(pools)
    }

    /// Point query recording at the frame's command buffer. Must be called
    /// after the command buffer begins recording and before any trigger.
    pub fn set_command_buffer(&mut self, cmd: vk::CommandBuffer) {
        self.cmd = cmd;
    }

    /// Host-reset every slot. Called when a new approach run starts.
    pub fn reset_approach_slots(&self) {
        unsafe {
            self.device
                .reset_query_pool(self.timestamp_pool, 0, TIMESTAMP_SLOTS);
            self.device.reset_query_pool(self.elapsed_pool, 0, ELAPSED_SLOTS);
        }
    }

    /// Host-reset the per-frame slots, leaving the approach start/end
    /// timestamps untouched so they survive until the run's final readback.
    pub fn reset_frame_slots(&self) {
        let first_frame_slot = timestamp_slot(CheckpointId::FrameStart);
        let frame_slot_count =
            timestamp_slot(CheckpointId::FrameEnd) - first_frame_slot + 1;
        unsafe {
            self.device
                .reset_query_pool(self.timestamp_pool, first_frame_slot, frame_slot_count);
            // All elapsed brackets are frame-scoped.
            self.device.reset_query_pool(self.elapsed_pool, 0, ELAPSED_SLOTS);
        }
    }

    fn read_slot(
        &self,
        pool: vk::QueryPool,
        slot: u32,
        wait: bool,
        label: &'static str,
    ) -> rectbench_timing::Result<u64> {
        let mut data = [0_u64];
        let mut flags = vk::QueryResultFlags::TYPE_64;
        if wait {
            flags |= vk::QueryResultFlags::WAIT;
        }
        let result =
            unsafe { self.device.get_query_pool_results(pool, slot, &mut data, flags) };
        match result {
            Ok(()) => Ok(data[0]),
            Err(vk::Result::NOT_READY) => Err(TimingError::QueryUnavailable(label)),
            Err(e) => Err(TimingError::Backend(e.to_string())),
        }
    }

    fn assert_recording(&self) {
        assert!(
            self.cmd != vk::CommandBuffer::null(),
            "timer query issued with no command buffer bound"
        );
    }
}

impl Drop for TimerQueryPools {
    fn drop(&mut self) {
        unsafe {
            // flush leaves the queue idle, so the pools are unreferenced.
            self.device.destroy_query_pool(self.timestamp_pool, None);
            self.device.destroy_query_pool(self.elapsed_pool, None);
        }
    }
}

impl GpuTimers for TimerQueryPools {
    fn issue_timestamp(&mut self, checkpoint: CheckpointId) {
        self.assert_recording();
        unsafe {
            self.device.cmd_write_timestamp(
                self.cmd,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                self.timestamp_pool,
                timestamp_slot(checkpoint),
            );
        }
    }

    fn begin_elapsed(&mut self, stage: StageId) {
        self.assert_recording();
        assert!(
            self.open_bracket.is_none(),
            "elapsed bracket opened while another is open"
        );
        unsafe {
            self.device.cmd_write_timestamp(
                self.cmd,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                self.elapsed_pool,
                elapsed_begin_slot(stage),
            );
        }
        self.open_bracket = Some(stage);
    }

    fn end_elapsed(&mut self) {
        self.assert_recording();
        let stage = self
            .open_bracket
            .take()
            .expect("elapsed bracket closed without being open");
        unsafe {
            self.device.cmd_write_timestamp(
                self.cmd,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                self.elapsed_pool,
                elapsed_begin_slot(stage) + 1,
            );
        }
    }

    fn flush(&mut self) -> rectbench_timing::Result<()> {
        if self.cmd == vk::CommandBuffer::null() {
            return Ok(());
        }
        assert!(
            self.open_bracket.is_none(),
            "flush with an elapsed bracket still open"
        );
        let cmd = self.cmd;
        self.cmd = vk::CommandBuffer::null();
        let backend_err = |e: vk::Result| TimingError::Backend(e.to_string());
        unsafe {
            self.device.end_command_buffer(cmd).map_err(backend_err)?;
            let cmd_buffers = [cmd];
            let submit_info = vk::SubmitInfo::default().command_buffers(&cmd_buffers);
            self.device
                .queue_submit(self.queue, &[submit_info], vk::Fence::null())
                .map_err(backend_err)?;
            self.device.queue_wait_idle(self.queue).map_err(backend_err)?;
        }
        Ok(())
    }

    fn resolve_timestamp_ns(
        &mut self,
        checkpoint: CheckpointId,
        wait: bool,
    ) -> rectbench_timing::Result<u64> {
        let ticks = self.read_slot(
            self.timestamp_pool,
            timestamp_slot(checkpoint),
            wait,
            checkpoint.name(),
        )?;
        Ok(ticks_to_ns(ticks, self.valid_bits, self.period_ns))
    }

    fn resolve_elapsed_ns(&mut self, stage: StageId) -> rectbench_timing::Result<u64> {
        let begin_slot = elapsed_begin_slot(stage);
        let begin = self.read_slot(self.elapsed_pool, begin_slot, false, stage.name())?;
        let end = self.read_slot(self.elapsed_pool, begin_slot + 1, false, stage.name())?;
        Ok(tick_delta_to_ns(begin, end, self.valid_bits, self.period_ns))
    }
}
