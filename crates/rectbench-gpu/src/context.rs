//! GPU context management.

use crate::capabilities::GpuCapabilities;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, select_physical_device};
use crate::memory::GpuAllocator;
use ash::vk;
use parking_lot::Mutex;
use std::sync::Arc;

/// Main GPU context holding Vulkan resources.
///
/// The benchmark only ever records and submits on one graphics queue, so no
/// dedicated compute or transfer queues are created.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) capabilities: GpuCapabilities,
    pub(crate) allocator: Mutex<GpuAllocator>,

    pub(crate) graphics_queue_family: u32,
    pub(crate) graphics_queue: vk::Queue,
    /// Valid bits in timestamps written on the graphics queue.
    pub(crate) timestamp_valid_bits: u32,
}

impl GpuContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &Arc<ash::Device> {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get GPU capabilities.
    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Valid bits in graphics-queue timestamps.
    pub fn timestamp_valid_bits(&self) -> u32 {
        self.timestamp_valid_bits
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Allocator shutdown frees all VkDeviceMemory before the device
            // goes away.
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "rectbench".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the GPU context.
    pub fn build(self) -> Result<GpuContext> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Other(format!("Failed to load Vulkan: {e}")))?;

        let instance = unsafe { create_instance(&entry, &self.app_name, self.enable_validation) }?;

        let physical_device = unsafe { select_physical_device(&instance) }?;

        let capabilities = unsafe { GpuCapabilities::query(&instance, physical_device) };

        if !capabilities.meets_requirements() {
            return Err(GpuError::NoSuitableDevice);
        }

        tracing::info!("Selected GPU: {}", capabilities.summary());

        let (graphics_family, timestamp_valid_bits) =
            unsafe { find_graphics_queue_family(&instance, physical_device) }?;

        let (device, graphics_queue) =
            unsafe { create_device(&instance, physical_device, graphics_family)? };

        let device = Arc::new(device);

        let allocator = unsafe { GpuAllocator::new(&instance, device.clone(), physical_device) }?;

        Ok(GpuContext {
            entry,
            instance,
            physical_device,
            device,
            capabilities,
            allocator: Mutex::new(allocator),
            graphics_queue_family: graphics_family,
            graphics_queue,
            timestamp_valid_bits,
        })
    }
}

/// Find a graphics queue family that can write timestamps.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn find_graphics_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<(u32, u32)> {
    let queue_families = instance.get_physical_device_queue_family_properties(physical_device);

    let mut graphics_without_timestamps = false;

    for (i, family) in queue_families.iter().enumerate() {
        if !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            continue;
        }
        if family.timestamp_valid_bits > 0 {
            return Ok((i as u32, family.timestamp_valid_bits));
        }
        graphics_without_timestamps = true;
    }

    if graphics_without_timestamps {
        Err(GpuError::TimestampsUnsupported)
    } else {
        Err(GpuError::NoSuitableDevice)
    }
}

/// Create the logical device and retrieve the graphics queue.
///
/// Host query reset (core in Vulkan 1.2) is required so the timer query
/// slots can be reset between frames without recording reset commands.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
) -> Result<(ash::Device, vk::Queue)> {
    let queue_priority = 1.0_f32;
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(graphics_family)
        .queue_priorities(std::slice::from_ref(&queue_priority))];

    let mut vulkan_1_2_features =
        vk::PhysicalDeviceVulkan12Features::default().host_query_reset(true);

    let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut vulkan_1_2_features);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .push_next(&mut features2);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(GpuError::from)?;

    let graphics_queue = device.get_device_queue(graphics_family, 0);

    Ok((device, graphics_queue))
}
