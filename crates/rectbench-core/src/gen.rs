//! Deterministic rectangle generation for benchmark scenarios.
//!
//! Every approach within a scenario must see the exact same rectangles, so
//! generation runs on a small seeded PRNG rather than OS entropy.

use crate::rect::{Color, PixelRect, Rect};

/// LCG-64 with random shift, the basic form of PCG.
///
/// Reference: "PCG: A Family of Better Random Number Generators"
/// by Melissa O'Neill of Harvey Mudd College.
#[derive(Clone, Debug)]
pub struct Lcg64Shift {
    state: u64,
}

impl Lcg64Shift {
    /// Create a generator from a seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next raw 32-bit value.
    pub fn next_u32(&mut self) -> u32 {
        self.state = 2_862_933_555_777_941_757_u64
            .wrapping_mul(self.state)
            .wrapping_add(3_037_000_493);
        let shift = 29 - (self.state >> 61) as u32;
        (self.state >> shift) as u32
    }

    /// Uniform-ish value in `min..max` (uses `%`, like the original generator).
    pub fn next_in(&mut self, min: u32, max: u32) -> u32 {
        min + (self.next_u32() % (max - min))
    }
}

/// Options controlling random scenario generation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScenarioOpts {
    /// Generate semi-transparent background colors (alpha 64..255).
    pub transparent_bg_color: bool,
}

/// Generate `count` random rectangles within a 900x600 layout area.
///
/// The generator is seeded with a fixed value so every approach benchmarks
/// the identical batch.
#[must_use]
pub fn generate_random_rects(count: usize, opts: ScenarioOpts) -> Vec<Rect> {
    let mut rng = Lcg64Shift::new(1);
    let mut rects = Vec::with_capacity(count);

    for _ in 0..count {
        let x = i64::from(rng.next_in(0, 900));
        let y = i64::from(rng.next_in(0, 600));
        let w = i64::from(rng.next_in(10, 400));
        let h = i64::from(rng.next_in(10, 400));

        let r = rng.next_in(0, 255) as u8;
        let g = rng.next_in(0, 255) as u8;
        let b = rng.next_in(0, 255) as u8;
        let a = if opts.transparent_bg_color {
            rng.next_in(64, 255) as u8
        } else {
            255
        };

        rects.push(Rect {
            pos: PixelRect::from_pos_size(x, y, w, h),
            background_color: Color::rgba(r, g, b, a),
            ..Rect::default()
        });
    }

    rects
}

/// Summary statistics for a scenario batch: rect count and average pixel area.
#[must_use]
pub fn scenario_stats(rects: &[Rect]) -> (usize, f64) {
    let total_area: i64 = rects.iter().map(|r| r.pos.area()).sum();
    let avg_area = if rects.is_empty() {
        0.0
    } else {
        total_area as f64 / rects.len() as f64
    };
    (rects.len(), avg_area)
}
