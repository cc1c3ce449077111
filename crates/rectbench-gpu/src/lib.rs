//! Headless Vulkan backend for the rectbench suite.
//!
//! This crate provides:
//! - Vulkan instance and device management (no surface, offscreen only)
//! - GPU capability detection, including timestamp support
//! - Memory allocation via gpu-allocator
//! - Command buffer management
//! - Timer query pools implementing the profiler's GPU clock

pub mod capabilities;
pub mod command;
pub mod context;
pub mod error;
pub mod instance;
pub mod memory;
pub mod query;
pub mod snapshot;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use command::{begin_command_buffer, CommandPool};
pub use context::{GpuContext, GpuContextBuilder};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer};
pub use query::TimerQueryPools;
pub use snapshot::save_snapshot;
