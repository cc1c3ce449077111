//! The stage profiler: checkpoint triggers, batched query resolution and
//! report emission for one approach/frame lifecycle at a time.

use tracing::debug;

use crate::checkpoint::{CheckpointId, CheckpointTable};
use crate::clock::HostClock;
use crate::delta::{DeltaTable, StageId};
use crate::gpu::GpuTimers;
use crate::report::Reporter;
use crate::sequencer::StageSequencer;
use crate::Result;

/// Profiler behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct ProfilerConfig {
    /// Write a header row to each output stream on construction.
    pub csv_headers: bool,
    /// Have `end_approach` request an image capture of the final output.
    pub capture_approach_output: bool,
    /// Resolve GPU queries at frame end. Disabled, every GPU column reports
    /// zero and the per-frame pipeline stall disappears entirely, which
    /// isolates the host-side cost of an approach.
    pub resolve_gpu_queries: bool,
    /// Emit one row per frame to the diagnostic stream.
    pub per_frame_rows: bool,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            csv_headers: true,
            capture_approach_output: false,
            resolve_gpu_queries: true,
            per_frame_rows: true,
        }
    }
}

/// Asks the caller to capture the approach's final rendered output.
///
/// The profiler has no access to framebuffer contents, so it only names the
/// artifact; the renderer reads the pixels and writes the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    /// 1-based index of the approach run within this process.
    pub run_index: u32,
    pub scenario: String,
    pub approach: String,
}

impl SnapshotRequest {
    /// Suggested file name for the captured image.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{:02}-{}-{}.png", self.run_index, self.scenario, self.approach)
    }
}

/// Measures the fixed per-frame stage pipeline across three clock domains.
///
/// The profiler is driven by one call per checkpoint, in the fixed order
/// `begin_approach`, then per frame `begin_frame`, `gen_buffers_done`,
/// `upload_done`, `clear_done`, `draw_done`, `end_frame`, and finally
/// `end_approach`. Triggering a checkpoint out of that order panics.
///
/// Every trigger is cheap: it samples the two host clocks, issues one
/// asynchronous GPU timestamp, and closes/opens the stage elapsed bracket.
/// All GPU readback is deferred to `end_frame`, which waits on the
/// last-issued timestamp only and then drains the rest of the frame's
/// queries without further stalls.
pub struct StageProfiler<C: HostClock, G: GpuTimers> {
    clock: C,
    gpu: G,
    reporter: Reporter,
    config: ProfilerConfig,

    checkpoints: CheckpointTable,
    deltas: DeltaTable,
    sequencer: StageSequencer,

    scenario: String,
    approach: String,
    run_counter: u32,
    frame_count: u32,

    /// Stage whose elapsed bracket is currently open on the GPU timeline.
    open_elapsed: Option<StageId>,
    /// Stages bracketed this frame, resolved together at `end_frame`.
    bracketed: Vec<StageId>,

    last_frame_start_wall_us: u64,
    accu_dt_us: u64,
}

impl<C: HostClock, G: GpuTimers> StageProfiler<C, G> {
    /// Create a profiler and, if configured, write the CSV headers.
    pub fn new(clock: C, gpu: G, mut reporter: Reporter, config: ProfilerConfig) -> Result<Self> {
        if config.csv_headers {
            reporter.write_approach_header()?;
            if config.per_frame_rows {
                reporter.write_frame_header()?;
            }
        }
        Ok(Self {
            clock,
            gpu,
            reporter,
            config,
            checkpoints: CheckpointTable::new(),
            deltas: DeltaTable::new(),
            sequencer: StageSequencer::new(),
            scenario: String::new(),
            approach: String::new(),
            run_counter: 0,
            frame_count: 0,
            open_elapsed: None,
            bracketed: Vec::with_capacity(StageId::SUB_FRAME.len()),
            last_frame_start_wall_us: 0,
            accu_dt_us: 0,
        })
    }

    /// Name the scenario carried in every report row.
    pub fn set_scenario(&mut self, name: &str) {
        self.scenario.clear();
        self.scenario.push_str(name);
    }

    /// Frames completed in the current approach.
    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Read access to the latest deltas, valid after `end_frame`.
    #[must_use]
    pub const fn deltas(&self) -> &DeltaTable {
        &self.deltas
    }

    /// Mutable access to the GPU timer backend, for per-frame backend setup
    /// such as pointing it at the frame's command buffer.
    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    /// Start a new approach run: reset all tables and fire `ApproachStart`.
    pub fn begin_approach(&mut self, name: &str) {
        self.approach.clear();
        self.approach.push_str(name);
        self.run_counter += 1;
        self.frame_count = 0;
        self.accu_dt_us = 0;
        self.checkpoints.reset();
        self.deltas.reset();
        self.bracketed.clear();
        self.sequencer.rearm_approach();
        debug!(scenario = %self.scenario, approach = name, "approach started");

        self.trigger(CheckpointId::ApproachStart, None);
        // The first frame's dt is measured against the approach start.
        self.last_frame_start_wall_us = self.checkpoints.get(CheckpointId::ApproachStart).wall_us;
    }

    /// Fire `FrameStart`. No elapsed bracket opens here: buffer generation is
    /// pure host work, so its GPU elapsed column stays zero.
    pub fn begin_frame(&mut self) {
        self.sequencer.rearm_frame();
        self.bracketed.clear();
        self.trigger(CheckpointId::FrameStart, None);
    }

    /// Fire `GenBuffersDone` and open the upload bracket.
    pub fn gen_buffers_done(&mut self) {
        self.trigger(CheckpointId::GenBuffersDone, Some(StageId::Upload));
    }

    /// Fire `UploadDone` and open the clear bracket.
    pub fn upload_done(&mut self) {
        self.trigger(CheckpointId::UploadDone, Some(StageId::Clear));
    }

    /// Fire `ClearDone` and open the draw bracket.
    pub fn clear_done(&mut self) {
        self.trigger(CheckpointId::ClearDone, Some(StageId::Draw));
    }

    /// Fire `DrawDone` and open the present bracket.
    pub fn draw_done(&mut self) {
        self.trigger(CheckpointId::DrawDone, Some(StageId::Present));
    }

    /// Fire `FrameEnd`, resolve the frame's GPU queries in one batch, update
    /// every frame-cycle delta and emit the per-frame row.
    pub fn end_frame(&mut self) -> Result<()> {
        self.trigger(CheckpointId::FrameEnd, None);
        self.gpu.flush()?;

        if self.config.resolve_gpu_queries {
            // One stall per frame: wait on the last-issued timestamp. Queries
            // complete in submission order, so everything issued earlier this
            // frame is now readable without waiting.
            let last = self
                .gpu
                .resolve_timestamp_ns(CheckpointId::FrameEnd, true)?;
            self.checkpoints
                .set_gpu_timestamp(CheckpointId::FrameEnd, last);
            for checkpoint in CheckpointId::FRAME_INTERIOR {
                let ts = self.gpu.resolve_timestamp_ns(checkpoint, false)?;
                self.checkpoints.set_gpu_timestamp(checkpoint, ts);
            }
            for stage in std::mem::take(&mut self.bracketed) {
                let elapsed = self.gpu.resolve_elapsed_ns(stage)?;
                self.deltas.set_gpu_elapsed(stage, elapsed);
            }
        } else {
            self.bracketed.clear();
        }

        let (from, to) = StageId::Frame.endpoints();
        self.deltas.update(StageId::Frame, from, to, &self.checkpoints);
        for stage in StageId::SUB_FRAME {
            let (from, to) = stage.endpoints();
            self.deltas.update(stage, from, to, &self.checkpoints);
        }

        let frame_start_wall = self.checkpoints.get(CheckpointId::FrameStart).wall_us;
        let dt_us = frame_start_wall.saturating_sub(self.last_frame_start_wall_us);
        self.last_frame_start_wall_us = frame_start_wall;
        self.accu_dt_us += dt_us;

        self.frame_count += 1;
        if self.config.per_frame_rows {
            // Rows carry 1-based frame ordinals.
            self.reporter.frame_row(
                &self.scenario,
                &self.approach,
                self.frame_count,
                &self.deltas,
                dt_us,
            )?;
        }
        Ok(())
    }

    /// Fire `ApproachEnd`, compute the whole-run delta and emit the approach
    /// row. Returns a capture request when configured to snapshot the run's
    /// final output.
    pub fn end_approach(&mut self) -> Result<Option<SnapshotRequest>> {
        self.trigger(CheckpointId::ApproachEnd, None);
        self.gpu.flush()?;

        if self.config.resolve_gpu_queries {
            let last = self
                .gpu
                .resolve_timestamp_ns(CheckpointId::ApproachEnd, true)?;
            self.checkpoints
                .set_gpu_timestamp(CheckpointId::ApproachEnd, last);
            // ApproachStart was issued before every frame of the run; the
            // wait above covers it.
            let first = self
                .gpu
                .resolve_timestamp_ns(CheckpointId::ApproachStart, false)?;
            self.checkpoints
                .set_gpu_timestamp(CheckpointId::ApproachStart, first);
        }

        let (from, to) = StageId::Approach.endpoints();
        self.deltas
            .update(StageId::Approach, from, to, &self.checkpoints);

        self.reporter
            .approach_row(&self.scenario, &self.approach, &self.deltas, self.accu_dt_us)?;
        debug!(
            scenario = %self.scenario,
            approach = %self.approach,
            frames = self.frame_count,
            "approach finished"
        );

        if self.config.capture_approach_output {
            Ok(Some(SnapshotRequest {
                run_index: self.run_counter,
                scenario: self.scenario.clone(),
                approach: self.approach.clone(),
            }))
        } else {
            Ok(None)
        }
    }

    /// Core trigger path, identical for every checkpoint: enforce ordering,
    /// close the open elapsed bracket, issue the timestamp, sample the host
    /// clocks, open the next bracket.
    ///
    /// The bracket close and the timestamp issue sit adjacent on the GPU
    /// timeline, so the bracket boundary and the checkpoint coincide.
    fn trigger(&mut self, checkpoint: CheckpointId, next_elapsed: Option<StageId>) {
        self.sequencer.advance(checkpoint);

        if let Some(open) = self.open_elapsed.take() {
            self.gpu.end_elapsed();
            self.bracketed.push(open);
        }
        self.gpu.issue_timestamp(checkpoint);

        let wall_us = self.clock.wall_us();
        let cpu_us = self.clock.cpu_us();
        self.checkpoints.record_host(checkpoint, wall_us, cpu_us);

        if let Some(stage) = next_elapsed {
            self.gpu.begin_elapsed(stage);
            self.open_elapsed = Some(stage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTimers, ScriptedClock};
    use crate::gpu::NullTimers;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn silent_config() -> ProfilerConfig {
        ProfilerConfig {
            csv_headers: false,
            ..ProfilerConfig::default()
        }
    }

    fn reporter_into(approach: &SharedBuf, frame: &SharedBuf) -> Reporter {
        Reporter::new(Box::new(approach.clone()), Box::new(frame.clone()))
    }

    fn run_one_frame<G: GpuTimers>(profiler: &mut StageProfiler<ScriptedClock, G>) {
        profiler.begin_frame();
        profiler.gen_buffers_done();
        profiler.upload_done();
        profiler.clear_done();
        profiler.draw_done();
        profiler.end_frame().unwrap();
    }

    #[test]
    fn synthetic_frame_yields_exact_deltas() {
        let approach_buf = SharedBuf::default();
        let frame_buf = SharedBuf::default();
        let mut profiler = StageProfiler::new(
            ScriptedClock::new(1000, 10),
            MockTimers::new(100),
            reporter_into(&approach_buf, &frame_buf),
            silent_config(),
        )
        .unwrap();

        profiler.set_scenario("opaque");
        profiler.begin_approach("simple_vbo");
        run_one_frame(&mut profiler);

        // Each checkpoint reads the wall clock once, 1000 us apart: the frame
        // spans five stage intervals of exactly 1000 us / 10 us CPU.
        let frame = profiler.deltas().get(StageId::Frame);
        assert_eq!(frame.wall_us, 5000);
        assert_eq!(frame.cpu_us, 50);
        for stage in StageId::SUB_FRAME {
            let d = profiler.deltas().get(stage);
            assert_eq!(d.wall_us, 1000, "wall delta for {}", stage.name());
            assert_eq!(d.cpu_us, 10, "cpu delta for {}", stage.name());
        }
    }

    #[test]
    fn gpu_timestamps_and_brackets_resolve_in_one_batch() {
        let approach_buf = SharedBuf::default();
        let frame_buf = SharedBuf::default();
        let mut profiler = StageProfiler::new(
            ScriptedClock::new(1000, 10),
            MockTimers::new(100),
            reporter_into(&approach_buf, &frame_buf),
            silent_config(),
        )
        .unwrap();

        profiler.set_scenario("opaque");
        profiler.begin_approach("one_ssbo");
        run_one_frame(&mut profiler);

        // Mock GPU clock advances 100 ns per command. Command sequence:
        // ts(approach_start)=100, ts(frame_start)=200, ts(gen)=300,
        // begin(upload)=400, end(upload)=500, ts(upload)=600, ... so every
        // bracketed stage's elapsed is 100 ns while its timestamp delta
        // includes the neighboring query commands.
        let deltas = profiler.deltas();
        assert_eq!(deltas.get(StageId::Frame).gpu_timestamp_ns, 1300);
        let gen = deltas.get(StageId::GenBuffers);
        assert_eq!(gen.gpu_timestamp_ns, 100);
        assert_eq!(gen.gpu_elapsed_ns, 0);
        for stage in [StageId::Upload, StageId::Clear, StageId::Draw, StageId::Present] {
            let d = deltas.get(stage);
            assert_eq!(d.gpu_elapsed_ns, 100, "bracket for {}", stage.name());
            assert_eq!(d.gpu_timestamp_ns, 300, "timestamp delta for {}", stage.name());
        }
    }

    #[test]
    fn accumulators_sum_across_frames() {
        let approach_buf = SharedBuf::default();
        let frame_buf = SharedBuf::default();
        let mut profiler = StageProfiler::new(
            ScriptedClock::new(1000, 10),
            MockTimers::new(100),
            reporter_into(&approach_buf, &frame_buf),
            silent_config(),
        )
        .unwrap();

        profiler.set_scenario("opaque");
        profiler.begin_approach("complete_vbo");
        for _ in 0..3 {
            run_one_frame(&mut profiler);
        }
        profiler.end_approach().unwrap();

        assert_eq!(profiler.frame_count(), 3);
        let frame = profiler.deltas().get(StageId::Frame);
        assert_eq!(frame.accu_wall_us, 15_000);
        assert_eq!(frame.accu_cpu_us, 150);
        for stage in StageId::SUB_FRAME {
            let d = profiler.deltas().get(stage);
            assert_eq!(d.accu_wall_us, 3000, "wall sum for {}", stage.name());
            assert_eq!(d.accu_cpu_us, 30, "cpu sum for {}", stage.name());
        }
        assert_eq!(
            profiler.deltas().get(StageId::Upload).accu_gpu_elapsed_ns,
            300
        );
        // Approach spans from before the first frame to after the last.
        let approach = profiler.deltas().get(StageId::Approach);
        assert!(approach.wall_us > frame.accu_wall_us);
    }

    #[test]
    fn frame_rows_count_from_one() {
        let approach_buf = SharedBuf::default();
        let frame_buf = SharedBuf::default();
        let mut profiler = StageProfiler::new(
            ScriptedClock::new(1000, 10),
            MockTimers::new(100),
            reporter_into(&approach_buf, &frame_buf),
            silent_config(),
        )
        .unwrap();

        profiler.set_scenario("opaque");
        profiler.begin_approach("simple_vbo");
        run_one_frame(&mut profiler);
        run_one_frame(&mut profiler);

        let out = frame_buf.contents();
        let ordinals: Vec<&str> = out
            .lines()
            .map(|line| line.split(" , ").nth(2).unwrap().trim())
            .collect();
        assert_eq!(ordinals, ["1", "2"]);
    }

    #[test]
    fn approach_row_written_once_with_frames_suppressed() {
        let approach_buf = SharedBuf::default();
        let frame_buf = SharedBuf::default();
        let config = ProfilerConfig {
            csv_headers: false,
            per_frame_rows: false,
            ..ProfilerConfig::default()
        };
        let mut profiler = StageProfiler::new(
            ScriptedClock::new(1000, 10),
            MockTimers::new(100),
            reporter_into(&approach_buf, &frame_buf),
            config,
        )
        .unwrap();

        profiler.set_scenario("transparent");
        profiler.begin_approach("inst_div");
        run_one_frame(&mut profiler);
        profiler.end_approach().unwrap();

        assert!(frame_buf.contents().is_empty());
        let out = approach_buf.contents();
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("inst_div"));
    }

    #[test]
    fn disabled_resolution_reports_zero_gpu_columns() {
        let approach_buf = SharedBuf::default();
        let frame_buf = SharedBuf::default();
        let config = ProfilerConfig {
            csv_headers: false,
            resolve_gpu_queries: false,
            ..ProfilerConfig::default()
        };
        let mut profiler = StageProfiler::new(
            ScriptedClock::new(1000, 10),
            MockTimers::new(100),
            reporter_into(&approach_buf, &frame_buf),
            config,
        )
        .unwrap();

        profiler.set_scenario("opaque");
        profiler.begin_approach("one_rect_per_draw");
        run_one_frame(&mut profiler);
        profiler.end_approach().unwrap();

        let deltas = profiler.deltas();
        for stage in StageId::SUB_FRAME {
            assert_eq!(deltas.get(stage).gpu_timestamp_ns, 0);
            assert_eq!(deltas.get(stage).gpu_elapsed_ns, 0);
        }
        // Host columns still carry real values.
        assert_eq!(deltas.get(StageId::Frame).wall_us, 5000);
    }

    #[test]
    fn headers_written_on_construction() {
        let approach_buf = SharedBuf::default();
        let frame_buf = SharedBuf::default();
        let _profiler = StageProfiler::new(
            ScriptedClock::new(1, 1),
            NullTimers,
            reporter_into(&approach_buf, &frame_buf),
            ProfilerConfig::default(),
        )
        .unwrap();

        assert!(approach_buf.contents().starts_with("scenario"));
        assert!(frame_buf.contents().contains("frame_gt"));
    }

    #[test]
    fn snapshot_requested_when_capture_enabled() {
        let approach_buf = SharedBuf::default();
        let frame_buf = SharedBuf::default();
        let config = ProfilerConfig {
            csv_headers: false,
            capture_approach_output: true,
            ..ProfilerConfig::default()
        };
        let mut profiler = StageProfiler::new(
            ScriptedClock::new(1000, 10),
            MockTimers::new(100),
            reporter_into(&approach_buf, &frame_buf),
            config,
        )
        .unwrap();

        profiler.set_scenario("opaque");
        profiler.begin_approach("simple_vbo");
        run_one_frame(&mut profiler);
        let request = profiler.end_approach().unwrap().unwrap();
        assert_eq!(request.file_name(), "01-opaque-simple_vbo.png");

        profiler.begin_approach("complete_vbo");
        run_one_frame(&mut profiler);
        let request = profiler.end_approach().unwrap().unwrap();
        assert_eq!(request.file_name(), "02-opaque-complete_vbo.png");
    }

    #[test]
    fn approaches_can_run_back_to_back() {
        let approach_buf = SharedBuf::default();
        let frame_buf = SharedBuf::default();
        let mut profiler = StageProfiler::new(
            ScriptedClock::new(1000, 10),
            MockTimers::new(100),
            reporter_into(&approach_buf, &frame_buf),
            silent_config(),
        )
        .unwrap();

        profiler.set_scenario("opaque");
        for approach in ["one_rect_per_draw", "simple_vbo"] {
            profiler.begin_approach(approach);
            run_one_frame(&mut profiler);
            profiler.end_approach().unwrap();
            // Accumulators restart with each approach.
            assert_eq!(profiler.deltas().get(StageId::Frame).accu_wall_us, 5000);
        }
        assert_eq!(approach_buf.contents().lines().count(), 2);
    }

    #[test]
    #[should_panic(expected = "fired out of order")]
    fn skipping_a_stage_panics() {
        let mut profiler = StageProfiler::new(
            ScriptedClock::new(1000, 10),
            NullTimers,
            reporter_into(&SharedBuf::default(), &SharedBuf::default()),
            silent_config(),
        )
        .unwrap();

        profiler.begin_approach("simple_vbo");
        profiler.begin_frame();
        profiler.gen_buffers_done();
        // Upload and clear never fired.
        profiler.draw_done();
    }

    #[test]
    #[should_panic(expected = "fired out of order")]
    fn frame_after_approach_end_panics() {
        let mut profiler = StageProfiler::new(
            ScriptedClock::new(1000, 10),
            NullTimers,
            reporter_into(&SharedBuf::default(), &SharedBuf::default()),
            silent_config(),
        )
        .unwrap();

        profiler.begin_approach("simple_vbo");
        run_one_frame(&mut profiler);
        profiler.end_approach().unwrap();
        // No begin_approach: the sequencer is parked.
        profiler.gen_buffers_done();
    }
}
