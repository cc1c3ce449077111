//! The benchmark loop: scenarios, approaches and the per-frame stage cycle.

use anyhow::{Context, Result};
use tracing::info;

use rectbench_core::{generate_random_rects, scenario_stats, Color, ScenarioOpts};
use rectbench_gpu::save_snapshot;
use rectbench_timing::{HostClock, StageProfiler};

use crate::approaches::{all_approaches, RenderApproach};
use crate::backend::{composite_rects, FrameBackend, FRAME_HEIGHT, FRAME_WIDTH};

/// Background color every frame clears to.
pub const CLEAR_COLOR: Color = Color::opaque(30, 30, 46);

/// Knobs of one benchmark run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Frames measured per approach.
    pub frames: u32,
    /// Rectangles per scenario.
    pub rects: usize,
    /// Log rect count and average pixel area per scenario.
    pub print_scenario_stats: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            frames: 60,
            rects: 1000,
            print_scenario_stats: false,
        }
    }
}

struct Scenario {
    name: &'static str,
    opts: ScenarioOpts,
}

fn scenarios() -> [Scenario; 2] {
    [
        Scenario {
            name: "opaque",
            opts: ScenarioOpts::default(),
        },
        Scenario {
            name: "transparent",
            opts: ScenarioOpts {
                transparent_bg_color: true,
            },
        },
    ]
}

/// Run every scenario against every approach.
pub fn run<C, B>(
    profiler: &mut StageProfiler<C, B::Timers>,
    backend: &mut B,
    options: &RunOptions,
) -> Result<()>
where
    C: HostClock,
    B: FrameBackend,
{
    for scenario in scenarios() {
        let rects = generate_random_rects(options.rects, scenario.opts);
        if options.print_scenario_stats {
            let (count, avg_area) = scenario_stats(&rects);
            info!(scenario = scenario.name, count, avg_area, "scenario stats");
        }

        let composite = composite_rects(&rects, CLEAR_COLOR);
        backend
            .load_composite(&composite)
            .with_context(|| format!("loading composite for scenario '{}'", scenario.name))?;
        profiler.set_scenario(scenario.name);

        for approach in all_approaches() {
            run_approach(profiler, backend, approach.as_ref(), &rects, options)
                .with_context(|| format!("approach '{}'", approach.name()))?;
        }
    }
    Ok(())
}

fn run_approach<C, B>(
    profiler: &mut StageProfiler<C, B::Timers>,
    backend: &mut B,
    approach: &dyn RenderApproach,
    rects: &[rectbench_core::Rect],
    options: &RunOptions,
) -> Result<()>
where
    C: HostClock,
    B: FrameBackend,
{
    backend.begin_approach(profiler.gpu_mut())?;
    profiler.begin_approach(approach.name());

    for _ in 0..options.frames {
        backend.begin_frame(profiler.gpu_mut())?;
        profiler.begin_frame();

        let encoding = approach.encode(rects);
        profiler.gen_buffers_done();

        backend.upload(&encoding.vertex_bytes)?;
        profiler.upload_done();

        backend.clear(CLEAR_COLOR)?;
        profiler.clear_done();

        backend.draw(encoding.draw_batches)?;
        profiler.draw_done();

        backend.present()?;
        // Submits the frame's command work and resolves its queries.
        profiler.end_frame()?;
        backend.frame_submitted();
    }

    // The last frame's submission consumed the command buffer; the final
    // checkpoint needs a fresh one.
    backend.ensure_recording(profiler.gpu_mut())?;
    let snapshot = profiler.end_approach()?;
    backend.frame_submitted();

    if let Some(request) = snapshot {
        let pixels = backend.read_output()?;
        let file_name = request.file_name();
        save_snapshot(pixels, FRAME_WIDTH, FRAME_HEIGHT, &file_name)
            .with_context(|| format!("writing snapshot '{file_name}'"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuFrame;
    use rectbench_timing::{NullTimers, ProfilerConfig, Reporter, SystemClock};
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

    #[test]
    fn full_cpu_run_emits_every_row() {
        let approach_buf = SharedBuf::default();
        let frame_buf = SharedBuf::default();
        let config = ProfilerConfig {
            csv_headers: false,
            ..ProfilerConfig::default()
        };
        let mut profiler = StageProfiler::new(
            SystemClock::new(),
            NullTimers,
            Reporter::new(Box::new(approach_buf.clone()), Box::new(frame_buf.clone())),
            config,
        )
        .unwrap();
        let mut backend = CpuFrame::new();

        let options = RunOptions {
            frames: 2,
            rects: 5,
            print_scenario_stats: false,
        };
        run(&mut profiler, &mut backend, &options).unwrap();

        // 2 scenarios x 5 approaches, one summary row each.
        let approach_rows = approach_buf.contents();
        assert_eq!(approach_rows.lines().count(), 10);
        assert!(approach_rows.contains("opaque"));
        assert!(approach_rows.contains("transparent"));
        assert!(approach_rows.contains("one_rect_per_draw"));

        // 2 frames per approach run.
        assert_eq!(frame_buf.contents().lines().count(), 20);
        assert_eq!(profiler.frame_count(), 2);
    }

    #[test]
    fn cpu_run_presents_the_composite() {
        let mut profiler = StageProfiler::new(
            SystemClock::new(),
            NullTimers,
            Reporter::new(Box::new(std::io::sink()), Box::new(std::io::sink())),
            ProfilerConfig {
                csv_headers: false,
                per_frame_rows: false,
                ..ProfilerConfig::default()
            },
        )
        .unwrap();
        let mut backend = CpuFrame::new();

        let options = RunOptions {
            frames: 1,
            rects: 20,
            print_scenario_stats: false,
        };
        run(&mut profiler, &mut backend, &options).unwrap();

        // The transparent scenario ran last; its composite is what remains.
        let rects = generate_random_rects(
            20,
            ScenarioOpts {
                transparent_bg_color: true,
            },
        );
        let expected = composite_rects(&rects, CLEAR_COLOR);
        assert_eq!(backend.read_output().unwrap(), expected);
    }
}
