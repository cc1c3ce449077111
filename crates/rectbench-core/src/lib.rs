//! Core types and scenario generation for the rectbench suite.
//!
//! This crate provides the foundational types used throughout the benchmark:
//! - Rectangle geometry and styling ([`Rect`], [`PixelRect`], [`Color`])
//! - Deterministic rectangle generation for benchmark scenarios

pub mod gen;
pub mod rect;

pub use gen::{generate_random_rects, scenario_stats, Lcg64Shift, ScenarioOpts};
pub use rect::{Color, PixelRect, Rect, UvRect};
