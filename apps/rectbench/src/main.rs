//! Rectangle rendering benchmark.
//!
//! Measures five buffer-encoding strategies across two scenarios, reporting
//! wall-clock, process-CPU and GPU time for every stage of the frame
//! pipeline. Per-approach summary rows go to stdout, per-frame diagnostic
//! rows to stderr, so `rectbench > results.csv` captures a clean summary.

mod approaches;
mod backend;
mod runner;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rectbench_gpu::GpuContextBuilder;
use rectbench_timing::{NullTimers, ProfilerConfig, Reporter, StageProfiler, SystemClock};

use crate::approaches::max_encoding_bytes;
use crate::backend::{CpuFrame, GpuFrame};
use crate::runner::RunOptions;

const GPU_INFO_FILE: &str = "gpuinfo.txt";

#[derive(Debug, Clone)]
struct Options {
    csv_headers: bool,
    capture_last_frames: bool,
    timer_queries: bool,
    per_frame_data: bool,
    print_scenario_stats: bool,
    write_gpu_info: bool,
    cpu_only: bool,
    help: bool,
    frames: u32,
    rects: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            csv_headers: true,
            capture_last_frames: false,
            timer_queries: true,
            per_frame_data: true,
            print_scenario_stats: false,
            write_gpu_info: false,
            cpu_only: false,
            help: false,
            frames: 60,
            rects: 1000,
        }
    }
}

impl Options {
    fn profiler_config(&self) -> ProfilerConfig {
        ProfilerConfig {
            csv_headers: self.csv_headers,
            capture_approach_output: self.capture_last_frames,
            resolve_gpu_queries: self.timer_queries,
            per_frame_rows: self.per_frame_data,
        }
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            frames: self.frames,
            rects: self.rects,
            print_scenario_stats: self.print_scenario_stats,
        }
    }
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Options> {
    let mut options = Options::default();
    let mut args = args;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dont-output-csv-headers" => options.csv_headers = false,
            "--capture-last-frames" => options.capture_last_frames = true,
            "--disable-timer-queries" => options.timer_queries = false,
            "--disable-per-frame-data" => options.per_frame_data = false,
            "--only-one-frame" => options.frames = 1,
            "--print-scenario-stats" => options.print_scenario_stats = true,
            "--write-gpu-info" => options.write_gpu_info = true,
            "--cpu-only" => options.cpu_only = true,
            "-h" | "--help" => options.help = true,
            "--frames" => {
                let value = args.next().context("--frames expects a number")?;
                options.frames = value
                    .parse()
                    .with_context(|| format!("invalid frame count '{value}'"))?;
                if options.frames == 0 {
                    bail!("--frames must be at least 1");
                }
            }
            "--rects" => {
                let value = args.next().context("--rects expects a number")?;
                options.rects = value
                    .parse()
                    .with_context(|| format!("invalid rect count '{value}'"))?;
                if options.rects == 0 {
                    bail!("--rects must be at least 1");
                }
            }
            other => bail!("unknown argument '{other}' (try --help)"),
        }
    }
    Ok(options)
}

fn print_help() {
    println!(
        "\
rectbench - rectangle rendering benchmark

Measures five buffer-encoding strategies over two scenarios (opaque and
transparent rectangles), timing every stage of the frame pipeline in three
clock domains. Summary CSV on stdout, per-frame CSV on stderr.

USAGE:
    rectbench [OPTIONS]

OPTIONS:
    --frames <N>                frames per approach (default 60)
    --rects <N>                 rectangles per scenario (default 1000)
    --only-one-frame            shorthand for --frames 1
    --dont-output-csv-headers   omit the CSV header rows
    --disable-per-frame-data    omit the per-frame rows on stderr
    --disable-timer-queries     skip GPU query resolution (zero GPU columns,
                                no per-frame pipeline stall)
    --capture-last-frames       save each approach's final frame as a PNG
    --print-scenario-stats      log rect count and average area per scenario
    --write-gpu-info            write device details to {GPU_INFO_FILE}
    --cpu-only                  skip GPU setup, host-side stage work only
    -h, --help                  print this help"
    );
}

fn run_cpu(options: &Options) -> Result<()> {
    let mut backend = CpuFrame::new();
    let mut profiler = StageProfiler::new(
        SystemClock::new(),
        NullTimers,
        Reporter::stdio(),
        options.profiler_config(),
    )?;
    runner::run(&mut profiler, &mut backend, &options.run_options())
}

fn build_gpu_backend(options: &Options) -> Result<GpuFrame> {
    let context = GpuContextBuilder::new().build()?;
    if options.write_gpu_info {
        std::fs::write(GPU_INFO_FILE, context.capabilities().report())
            .with_context(|| format!("writing {GPU_INFO_FILE}"))?;
        info!("device info written to {GPU_INFO_FILE}");
    }
    GpuFrame::new(context, max_encoding_bytes(options.rects) as u64)
}

fn run_gpu(mut backend: GpuFrame, options: &Options) -> Result<()> {
    let timers = backend.create_timers()?;
    // Declared after the backend so the query pools drop before the device.
    let mut profiler = StageProfiler::new(
        SystemClock::new(),
        timers,
        Reporter::stdio(),
        options.profiler_config(),
    )?;
    runner::run(&mut profiler, &mut backend, &options.run_options())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args(std::env::args().skip(1))?;
    if options.help {
        print_help();
        return Ok(());
    }

    if options.cpu_only {
        return run_cpu(&options);
    }

    match build_gpu_backend(&options) {
        Ok(backend) => run_gpu(backend, &options),
        Err(e) => {
            warn!("no usable GPU ({e:#}), falling back to host-side stage work");
            run_cpu(&options)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options> {
        parse_args(args.iter().map(ToString::to_string))
    }

    #[test]
    fn defaults_without_arguments() {
        let options = parse(&[]).unwrap();
        assert!(options.csv_headers);
        assert!(options.timer_queries);
        assert!(options.per_frame_data);
        assert!(!options.capture_last_frames);
        assert!(!options.cpu_only);
        assert_eq!(options.frames, 60);
        assert_eq!(options.rects, 1000);
    }

    #[test]
    fn negative_flags_disable_output() {
        let options = parse(&[
            "--dont-output-csv-headers",
            "--disable-per-frame-data",
            "--disable-timer-queries",
        ])
        .unwrap();
        assert!(!options.csv_headers);
        assert!(!options.per_frame_data);
        assert!(!options.timer_queries);

        let config = options.profiler_config();
        assert!(!config.csv_headers);
        assert!(!config.per_frame_rows);
        assert!(!config.resolve_gpu_queries);
    }

    #[test]
    fn frame_and_rect_counts_parse() {
        let options = parse(&["--frames", "5", "--rects", "250"]).unwrap();
        assert_eq!(options.frames, 5);
        assert_eq!(options.rects, 250);

        assert_eq!(parse(&["--only-one-frame"]).unwrap().frames, 1);
    }

    #[test]
    fn missing_and_invalid_values_fail() {
        assert!(parse(&["--frames"]).is_err());
        assert!(parse(&["--frames", "many"]).is_err());
        assert!(parse(&["--rects", "-3"]).is_err());
    }

    // An approach run must fire at least one frame cycle, so zero counts are
    // usage errors rather than something the frame loop has to survive.
    #[test]
    fn zero_counts_are_rejected() {
        assert!(parse(&["--frames", "0"]).is_err());
        assert!(parse(&["--rects", "0"]).is_err());
    }

    #[test]
    fn unknown_arguments_fail() {
        assert!(parse(&["--write-gl-info"]).is_err());
    }

    #[test]
    fn capture_flag_reaches_the_profiler_config() {
        let options = parse(&["--capture-last-frames"]).unwrap();
        assert!(options.profiler_config().capture_approach_output);
    }
}
