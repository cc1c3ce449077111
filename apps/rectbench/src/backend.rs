//! Frame backends: the stage work the profiler measures.
//!
//! The GPU backend records each stage as real transfer work into the frame's
//! command buffer (upload copies the encoded bytes to a device buffer, clear
//! fills the framebuffer, draw blits the composited rectangles in as many
//! batches as the strategy dictates, present copies into the readback
//! buffer). The CPU backend performs the equivalent memory work host-side so
//! wall/CPU columns stay meaningful on machines without a usable GPU.

use anyhow::{ensure, Result};
use ash::vk;
use gpu_allocator::MemoryLocation;

use rectbench_core::{Color, Rect};
use rectbench_gpu::{begin_command_buffer, CommandPool, GpuBuffer, GpuContext, TimerQueryPools};
use rectbench_timing::{GpuTimers, NullTimers};

/// Layout area of the original scenarios; also the offscreen frame size.
pub const FRAME_WIDTH: u32 = 900;
pub const FRAME_HEIGHT: u32 = 600;
pub const FRAME_BYTES: usize = (FRAME_WIDTH * FRAME_HEIGHT * 4) as usize;

/// The per-frame stage work, driven between the profiler's triggers.
pub trait FrameBackend {
    type Timers: GpuTimers;

    /// Store the scenario's composited pixels; the draw stage blits from
    /// this source.
    fn load_composite(&mut self, pixels: &[u8]) -> Result<()>;

    /// Prepare for a new approach run (recording started, all timer slots
    /// reset).
    fn begin_approach(&mut self, timers: &mut Self::Timers) -> Result<()>;

    /// Prepare for a frame (recording started, frame timer slots reset).
    fn begin_frame(&mut self, timers: &mut Self::Timers) -> Result<()>;

    /// Start recording if the previous submission consumed the command
    /// buffer; needed before the run's final trigger.
    fn ensure_recording(&mut self, timers: &mut Self::Timers) -> Result<()>;

    /// Upload stage: move the strategy's encoded bytes GPU-side.
    fn upload(&mut self, bytes: &[u8]) -> Result<()>;

    /// Clear stage: fill the framebuffer with the background color.
    fn clear(&mut self, color: Color) -> Result<()>;

    /// Draw stage: write the composited rectangles, split into `batches`
    /// submissions.
    fn draw(&mut self, batches: usize) -> Result<()>;

    /// Present stage: copy the framebuffer to the readback target.
    fn present(&mut self) -> Result<()>;

    /// The frame's command work was submitted (by the timer flush).
    fn frame_submitted(&mut self);

    /// Read back the last presented frame as RGBA bytes.
    fn read_output(&mut self) -> Result<Vec<u8>>;
}

/// Composite the scenario's rectangles over the clear color, src-over in
/// submission order. This is the reference output every approach must match,
/// and the pixel source for the draw stage.
pub fn composite_rects(rects: &[Rect], clear: Color) -> Vec<u8> {
    let mut pixels = vec![0_u8; FRAME_BYTES];
    for px in pixels.chunks_exact_mut(4) {
        px.copy_from_slice(&clear.to_bytes());
    }

    for rect in rects {
        let left = rect.pos.left.clamp(0, i64::from(FRAME_WIDTH)) as usize;
        let right = rect.pos.right.clamp(0, i64::from(FRAME_WIDTH)) as usize;
        let top = rect.pos.top.clamp(0, i64::from(FRAME_HEIGHT)) as usize;
        let bottom = rect.pos.bottom.clamp(0, i64::from(FRAME_HEIGHT)) as usize;
        let src = rect.background_color;

        for y in top..bottom {
            let row = y * FRAME_WIDTH as usize;
            for x in left..right {
                let i = (row + x) * 4;
                blend_pixel(&mut pixels[i..i + 4], src);
            }
        }
    }
    pixels
}

fn blend_pixel(dst: &mut [u8], src: Color) {
    if src.a == 255 {
        dst.copy_from_slice(&src.to_bytes());
        return;
    }
    let a = u32::from(src.a);
    let inv = 255 - a;
    dst[0] = ((u32::from(src.r) * a + u32::from(dst[0]) * inv + 127) / 255) as u8;
    dst[1] = ((u32::from(src.g) * a + u32::from(dst[1]) * inv + 127) / 255) as u8;
    dst[2] = ((u32::from(src.b) * a + u32::from(dst[2]) * inv + 127) / 255) as u8;
    dst[3] = 255;
}

/// Vulkan-backed frame work.
pub struct GpuFrame {
    context: GpuContext,
    pool: CommandPool,
    cmd: vk::CommandBuffer,
    recording: bool,

    framebuffer: GpuBuffer,
    composite_src: GpuBuffer,
    vertex_staging: GpuBuffer,
    vertex_device: GpuBuffer,
    readback: GpuBuffer,
}

impl GpuFrame {
    /// Create the backend with buffers sized for the run.
    pub fn new(context: GpuContext, max_encoding_bytes: u64) -> Result<Self> {
        let device = context.device().clone();
        let pool = unsafe {
            CommandPool::new(
                &device,
                context.graphics_queue_family(),
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )?
        };
        let cmd = unsafe { pool.allocate_command_buffer(&device)? };

        let encoding_size = max_encoding_bytes.max(4);
        let mut allocator = context.allocator().lock();
        let framebuffer = allocator.create_buffer(
            FRAME_BYTES as u64,
            vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
            "framebuffer",
        )?;
        let composite_src = allocator.create_buffer(
            FRAME_BYTES as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            "composite-src",
        )?;
        let vertex_staging = allocator.create_buffer(
            encoding_size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            "vertex-staging",
        )?;
        let vertex_device = allocator.create_buffer(
            encoding_size,
            vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::VERTEX_BUFFER
                | vk::BufferUsageFlags::STORAGE_BUFFER,
            MemoryLocation::GpuOnly,
            "vertex-device",
        )?;
        let readback = allocator.create_buffer(
            FRAME_BYTES as u64,
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuToCpu,
            "readback",
        )?;
        drop(allocator);

        Ok(Self {
            context,
            pool,
            cmd,
            recording: false,
            framebuffer,
            composite_src,
            vertex_staging,
            vertex_device,
            readback,
        })
    }

    /// Create the timer query pools bound to this backend's queue.
    pub fn create_timers(&self) -> Result<TimerQueryPools> {
        Ok(TimerQueryPools::new(
            self.context.device().clone(),
            self.context.graphics_queue(),
            self.context.capabilities().timestamp_period_ns,
            self.context.timestamp_valid_bits(),
        )?)
    }

    /// Order this stage's transfers after the previous stage's writes.
    fn transfer_barrier(&self) {
        let barrier = vk::MemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::TRANSFER_READ | vk::AccessFlags::TRANSFER_WRITE);
        unsafe {
            self.context.device().cmd_pipeline_barrier(
                self.cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[barrier],
                &[],
                &[],
            );
        }
    }
}

impl FrameBackend for GpuFrame {
    type Timers = TimerQueryPools;

    fn load_composite(&mut self, pixels: &[u8]) -> Result<()> {
        ensure!(pixels.len() == FRAME_BYTES, "composite has wrong size");
        self.composite_src.write_bytes(0, pixels)?;
        Ok(())
    }

    fn begin_approach(&mut self, timers: &mut Self::Timers) -> Result<()> {
        self.ensure_recording(timers)?;
        timers.reset_approach_slots();
        Ok(())
    }

    fn begin_frame(&mut self, timers: &mut Self::Timers) -> Result<()> {
        self.ensure_recording(timers)?;
        timers.reset_frame_slots();
        Ok(())
    }

    fn ensure_recording(&mut self, timers: &mut Self::Timers) -> Result<()> {
        let device = self.context.device();
        if !self.recording {
            unsafe {
                self.pool.reset(device)?;
                begin_command_buffer(
                    device,
                    self.cmd,
                    vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                )?;
            }
            self.recording = true;
        }
        timers.set_command_buffer(self.cmd);
        Ok(())
    }

    fn upload(&mut self, bytes: &[u8]) -> Result<()> {
        ensure!(
            bytes.len() as u64 <= self.vertex_staging.size,
            "encoding exceeds the staging buffer"
        );
        self.vertex_staging.write_bytes(0, bytes)?;
        if bytes.is_empty() {
            return Ok(());
        }
        let region = vk::BufferCopy::default().size(bytes.len() as u64);
        unsafe {
            self.context.device().cmd_copy_buffer(
                self.cmd,
                self.vertex_staging.buffer,
                self.vertex_device.buffer,
                &[region],
            );
        }
        Ok(())
    }

    fn clear(&mut self, color: Color) -> Result<()> {
        self.transfer_barrier();
        unsafe {
            self.context.device().cmd_fill_buffer(
                self.cmd,
                self.framebuffer.buffer,
                0,
                vk::WHOLE_SIZE,
                u32::from_le_bytes(color.to_bytes()),
            );
        }
        Ok(())
    }

    fn draw(&mut self, batches: usize) -> Result<()> {
        self.transfer_barrier();
        let total = FRAME_BYTES as u64;
        let chunk = total.div_ceil(batches.max(1) as u64);
        let mut offset = 0;
        while offset < total {
            let size = chunk.min(total - offset);
            let region = vk::BufferCopy::default()
                .src_offset(offset)
                .dst_offset(offset)
                .size(size);
            unsafe {
                self.context.device().cmd_copy_buffer(
                    self.cmd,
                    self.composite_src.buffer,
                    self.framebuffer.buffer,
                    &[region],
                );
            }
            offset += size;
        }
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.transfer_barrier();
        let region = vk::BufferCopy::default().size(FRAME_BYTES as u64);
        unsafe {
            self.context.device().cmd_copy_buffer(
                self.cmd,
                self.framebuffer.buffer,
                self.readback.buffer,
                &[region],
            );
        }
        Ok(())
    }

    fn frame_submitted(&mut self) {
        self.recording = false;
    }

    fn read_output(&mut self) -> Result<Vec<u8>> {
        let mut pixels = vec![0_u8; FRAME_BYTES];
        self.readback.read_bytes(0, &mut pixels)?;
        Ok(pixels)
    }
}

impl Drop for GpuFrame {
    fn drop(&mut self) {
        let _ = self.context.wait_idle();
        {
            let mut allocator = self.context.allocator().lock();
            for buffer in [
                &mut self.framebuffer,
                &mut self.composite_src,
                &mut self.vertex_staging,
                &mut self.vertex_device,
                &mut self.readback,
            ] {
                let _ = allocator.free_buffer(buffer);
            }
        }
        unsafe {
            self.pool.destroy(self.context.device());
        }
    }
}

/// Host-only frame work for machines without a usable GPU.
#[derive(Default)]
pub struct CpuFrame {
    composite: Vec<u8>,
    frame: Vec<u8>,
    scratch: Vec<u8>,
    output: Vec<u8>,
}

impl CpuFrame {
    pub fn new() -> Self {
        Self {
            composite: vec![0; FRAME_BYTES],
            frame: vec![0; FRAME_BYTES],
            scratch: Vec::new(),
            output: vec![0; FRAME_BYTES],
        }
    }
}

impl FrameBackend for CpuFrame {
    type Timers = NullTimers;

    fn load_composite(&mut self, pixels: &[u8]) -> Result<()> {
        ensure!(pixels.len() == FRAME_BYTES, "composite has wrong size");
        self.composite.copy_from_slice(pixels);
        Ok(())
    }

    fn begin_approach(&mut self, _timers: &mut Self::Timers) -> Result<()> {
        Ok(())
    }

    fn begin_frame(&mut self, _timers: &mut Self::Timers) -> Result<()> {
        Ok(())
    }

    fn ensure_recording(&mut self, _timers: &mut Self::Timers) -> Result<()> {
        Ok(())
    }

    fn upload(&mut self, bytes: &[u8]) -> Result<()> {
        self.scratch.clear();
        self.scratch.extend_from_slice(bytes);
        Ok(())
    }

    fn clear(&mut self, color: Color) -> Result<()> {
        for px in self.frame.chunks_exact_mut(4) {
            px.copy_from_slice(&color.to_bytes());
        }
        Ok(())
    }

    fn draw(&mut self, batches: usize) -> Result<()> {
        let total = self.frame.len();
        let chunk = total.div_ceil(batches.max(1));
        let mut offset = 0;
        while offset < total {
            let size = chunk.min(total - offset);
            self.frame[offset..offset + size]
                .copy_from_slice(&self.composite[offset..offset + size]);
            offset += size;
        }
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.output.copy_from_slice(&self.frame);
        Ok(())
    }

    fn frame_submitted(&mut self) {}

    fn read_output(&mut self) -> Result<Vec<u8>> {
        Ok(self.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rectbench_core::PixelRect;

    fn pixel(pixels: &[u8], x: usize, y: usize) -> [u8; 4] {
        let i = (y * FRAME_WIDTH as usize + x) * 4;
        [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
    }

    #[test]
    fn composite_starts_from_clear_color() {
        let pixels = composite_rects(&[], Color::opaque(10, 20, 30));
        assert_eq!(pixel(&pixels, 0, 0), [10, 20, 30, 255]);
        assert_eq!(pixel(&pixels, 899, 599), [10, 20, 30, 255]);
    }

    #[test]
    fn opaque_rect_overwrites() {
        let rects = [Rect {
            pos: PixelRect::from_pos_size(10, 10, 5, 5),
            background_color: Color::opaque(200, 0, 0),
            ..Rect::default()
        }];
        let pixels = composite_rects(&rects, Color::opaque(0, 0, 0));
        assert_eq!(pixel(&pixels, 12, 12), [200, 0, 0, 255]);
        assert_eq!(pixel(&pixels, 20, 20), [0, 0, 0, 255]);
    }

    #[test]
    fn transparent_rect_blends() {
        let rects = [Rect {
            pos: PixelRect::from_pos_size(0, 0, 2, 2),
            background_color: Color::rgba(255, 255, 255, 128),
            ..Rect::default()
        }];
        let pixels = composite_rects(&rects, Color::opaque(0, 0, 0));
        let [r, _, _, a] = pixel(&pixels, 0, 0);
        assert!((127..=129).contains(&r));
        assert_eq!(a, 255);
    }

    #[test]
    fn rects_outside_the_frame_are_clipped() {
        let rects = [Rect {
            pos: PixelRect::from_pos_size(890, 590, 400, 400),
            background_color: Color::opaque(1, 2, 3),
            ..Rect::default()
        }];
        // Must not panic; bottom-right corner is inside the rect.
        let pixels = composite_rects(&rects, Color::opaque(0, 0, 0));
        assert_eq!(pixel(&pixels, 899, 599), [1, 2, 3, 255]);
    }

    #[test]
    fn cpu_frame_reproduces_the_composite() {
        let rects = [Rect {
            pos: PixelRect::from_pos_size(5, 5, 50, 50),
            background_color: Color::opaque(7, 7, 7),
            ..Rect::default()
        }];
        let composite = composite_rects(&rects, Color::opaque(1, 1, 1));

        let mut backend = CpuFrame::new();
        let mut timers = NullTimers;
        backend.load_composite(&composite).unwrap();
        backend.begin_frame(&mut timers).unwrap();
        backend.upload(&[1, 2, 3]).unwrap();
        backend.clear(Color::opaque(1, 1, 1)).unwrap();
        backend.draw(7).unwrap();
        backend.present().unwrap();

        assert_eq!(backend.read_output().unwrap(), composite);
    }
}
