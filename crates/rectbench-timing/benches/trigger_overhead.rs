//! Measures the host-side cost of a full frame's worth of checkpoint
//! triggers with GPU timers stubbed out, i.e. the overhead the profiler
//! itself adds to every measured frame.

use criterion::{criterion_group, criterion_main, Criterion};

use rectbench_timing::{NullTimers, ProfilerConfig, Reporter, StageProfiler, SystemClock};

fn frame_cycle(c: &mut Criterion) {
    let config = ProfilerConfig {
        csv_headers: false,
        per_frame_rows: false,
        ..ProfilerConfig::default()
    };
    let reporter = Reporter::new(Box::new(std::io::sink()), Box::new(std::io::sink()));
    let mut profiler = StageProfiler::new(SystemClock::new(), NullTimers, reporter, config)
        .expect("profiler construction");
    profiler.set_scenario("bench");
    profiler.begin_approach("null_frame");

    c.bench_function("full_frame_cycle", |b| {
        b.iter(|| {
            profiler.begin_frame();
            profiler.gen_buffers_done();
            profiler.upload_done();
            profiler.clear_done();
            profiler.draw_done();
            profiler.end_frame().expect("end_frame");
        });
    });
}

criterion_group!(benches, frame_cycle);
criterion_main!(benches);
