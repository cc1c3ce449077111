//! Host-side clock sources: monotonic wall time and process CPU time.

use std::time::Instant;

use cpu_time::ProcessTime;

/// The two host clock domains sampled synchronously at every checkpoint.
///
/// Both reads are effectively free compared to the pipeline stages being
/// measured; only the GPU timestamp is deferred.
pub trait HostClock {
    /// Monotonic wall-clock microseconds since an arbitrary epoch.
    fn wall_us(&mut self) -> u64;

    /// Process CPU microseconds, kernel + user, since process start.
    fn cpu_us(&mut self) -> u64;
}

/// Real clocks: `Instant` for wall time, `CLOCK_PROCESS_CPUTIME_ID` (or the
/// platform equivalent) for CPU time.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Create a clock with its wall epoch at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl HostClock for SystemClock {
    fn wall_us(&mut self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn cpu_us(&mut self) -> u64 {
        ProcessTime::now().as_duration().as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_is_monotonic() {
        let mut clock = SystemClock::new();
        let a = clock.wall_us();
        let b = clock.wall_us();
        assert!(b >= a);
    }

    #[test]
    fn cpu_clock_advances_under_load() {
        let mut clock = SystemClock::new();
        let before = clock.cpu_us();
        // Burn a little CPU; volatile-ish sum the optimizer keeps.
        let mut acc = 0_u64;
        for i in 0..2_000_000_u64 {
            acc = acc.wrapping_add(i ^ (i << 7));
        }
        std::hint::black_box(acc);
        assert!(clock.cpu_us() >= before);
    }
}
