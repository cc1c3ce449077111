//! CSV-ish report rendering.
//!
//! The reporter owns the output formatting and nothing else: it reads the
//! delta table and writes rows, never mutating measurement state. Per-frame
//! rows go to the diagnostic stream (microseconds), per-approach rows to the
//! primary stream (milliseconds, accumulated over all frames of the run).

use std::io::Write;

use crate::delta::{DeltaTable, StageId};
use crate::Result;

/// Short column-prefix for a sub-frame stage, as used in the CSV headers.
const fn column_prefix(stage: StageId) -> &'static str {
    match stage {
        StageId::GenBuffers => "buffer",
        StageId::Upload => "upload",
        StageId::Clear => "clear",
        StageId::Draw => "draw",
        StageId::Present => "pres",
        StageId::Approach | StageId::Frame => "",
    }
}

fn ns_to_us(ns: u64) -> f64 {
    ns as f64 / 1000.0
}

fn ns_to_ms(ns: u64) -> f64 {
    ns as f64 / 1_000_000.0
}

fn us_to_ms(us: u64) -> f64 {
    us as f64 / 1000.0
}

/// Renders per-frame and per-approach records to two injected streams.
pub struct Reporter {
    approach_out: Box<dyn Write>,
    frame_out: Box<dyn Write>,
}

impl Reporter {
    /// Create a reporter over two output streams.
    #[must_use]
    pub fn new(approach_out: Box<dyn Write>, frame_out: Box<dyn Write>) -> Self {
        Self {
            approach_out,
            frame_out,
        }
    }

    /// Convenience: per-approach rows to stdout, per-frame rows to stderr.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()))
    }

    /// Write the header row for the per-frame stream.
    pub fn write_frame_header(&mut self) -> Result<()> {
        write!(
            self.frame_out,
            "{:<15} , {:<25} , frame ,   frame_wt ,   frame_ct ,   frame_gt ,         dt",
            "scenario", "approach"
        )?;
        for stage in StageId::SUB_FRAME {
            let p = column_prefix(stage);
            write!(
                self.frame_out,
                " , {p:>7}_wt , {p:>7}_ct , {p:>7}_gt , {p:>7}_ge"
            )?;
        }
        writeln!(self.frame_out)?;
        Ok(())
    }

    /// Write the header row for the per-approach stream.
    pub fn write_approach_header(&mut self) -> Result<()> {
        write!(
            self.approach_out,
            "{:<15} , {:<25} , approach_wt , approach_ct , approach_gt ,   frame_wt ,   frame_ct ,   frame_gt ,         dt",
            "scenario", "approach"
        )?;
        for stage in StageId::SUB_FRAME {
            let p = column_prefix(stage);
            write!(
                self.approach_out,
                " , {p:>7}_wt , {p:>7}_ct , {p:>7}_gt , {p:>7}_ge"
            )?;
        }
        writeln!(self.approach_out)?;
        Ok(())
    }

    /// Emit one per-frame record. All times in microseconds; GPU values may
    /// be fractional.
    pub fn frame_row(
        &mut self,
        scenario: &str,
        approach: &str,
        frame: u32,
        deltas: &DeltaTable,
        dt_us: u64,
    ) -> Result<()> {
        let f = deltas.get(StageId::Frame);
        write!(
            self.frame_out,
            "{scenario:<15} , {approach:<25} , {frame:>5} , {:>8}us , {:>8}us , {:>8.3}us , {:>8}us",
            f.wall_us,
            f.cpu_us,
            ns_to_us(f.gpu_timestamp_ns),
            dt_us,
        )?;
        for stage in StageId::SUB_FRAME {
            let d = deltas.get(stage);
            write!(
                self.frame_out,
                " , {:>8}us , {:>8}us , {:>8.3}us , {:>8.3}us",
                d.wall_us,
                d.cpu_us,
                ns_to_us(d.gpu_timestamp_ns),
                ns_to_us(d.gpu_elapsed_ns),
            )?;
        }
        writeln!(self.frame_out)?;
        Ok(())
    }

    /// Emit one per-approach record. All times in milliseconds; the stage
    /// values are sums across all frames of the run.
    pub fn approach_row(
        &mut self,
        scenario: &str,
        approach: &str,
        deltas: &DeltaTable,
        accu_dt_us: u64,
    ) -> Result<()> {
        let a = deltas.get(StageId::Approach);
        let f = deltas.get(StageId::Frame);
        write!(
            self.approach_out,
            "{scenario:<15} , {approach:<25} , {:>8.3}ms , {:>8.3}ms , {:>8.3}ms , {:>8.3}ms , {:>8.3}ms , {:>8.3}ms , {:>8.3}ms",
            us_to_ms(a.wall_us),
            us_to_ms(a.cpu_us),
            ns_to_ms(a.gpu_timestamp_ns),
            us_to_ms(f.accu_wall_us),
            us_to_ms(f.accu_cpu_us),
            ns_to_ms(f.accu_gpu_timestamp_ns),
            us_to_ms(accu_dt_us),
        )?;
        for stage in StageId::SUB_FRAME {
            let d = deltas.get(stage);
            write!(
                self.approach_out,
                " , {:>8.3}ms , {:>8.3}ms , {:>8.3}ms , {:>8.3}ms",
                us_to_ms(d.accu_wall_us),
                us_to_ms(d.accu_cpu_us),
                ns_to_ms(d.accu_gpu_timestamp_ns),
                ns_to_ms(d.accu_gpu_elapsed_ns),
            )?;
        }
        writeln!(self.approach_out)?;
        self.approach_out.flush()?;
        Ok(())
    }
}
