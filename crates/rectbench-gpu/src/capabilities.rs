//! GPU capability detection.

use ash::vk;
use std::ffi::CStr;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    #[must_use]
    pub const fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Detected GPU capabilities.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    /// GPU vendor
    pub vendor: GpuVendor,
    /// Device name
    pub device_name: String,
    /// Vulkan API version
    pub api_version: u32,
    /// Driver version
    pub driver_version: u32,

    /// Nanoseconds represented by one timestamp tick.
    pub timestamp_period_ns: f32,
    /// Whether all graphics and compute queues support timestamps.
    pub timestamp_compute_and_graphics: bool,

    /// Device-local memory in MB
    pub device_local_memory_mb: u64,
}

impl GpuCapabilities {
    /// Query capabilities from a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let properties = instance.get_physical_device_properties(physical_device);
        let memory_properties = instance.get_physical_device_memory_properties(physical_device);

        let vendor = GpuVendor::from_vendor_id(properties.vendor_id);
        let device_name = CStr::from_ptr(properties.device_name.as_ptr())
            .to_string_lossy()
            .into_owned();

        let device_local_memory_mb: u64 = memory_properties
            .memory_heaps
            .iter()
            .take(memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size / (1024 * 1024))
            .sum();

        Self {
            vendor,
            device_name,
            api_version: properties.api_version,
            driver_version: properties.driver_version,
            timestamp_period_ns: properties.limits.timestamp_period,
            timestamp_compute_and_graphics: properties.limits.timestamp_compute_and_graphics
                == vk::TRUE,
            device_local_memory_mb,
        }
    }

    /// Check if the GPU meets the benchmark's requirements: Vulkan 1.2 for
    /// host query reset and a meaningful timestamp period.
    #[must_use]
    pub fn meets_requirements(&self) -> bool {
        let api_major = vk::api_version_major(self.api_version);
        let api_minor = vk::api_version_minor(self.api_version);

        if api_major < 1 || (api_major == 1 && api_minor < 2) {
            return false;
        }

        self.timestamp_period_ns > 0.0
    }

    /// Get a human-readable one-line summary of capabilities.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}) - Vulkan {}.{}.{} - {} MB VRAM",
            self.device_name,
            self.vendor,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.device_local_memory_mb,
        )
    }

    /// Full multi-line device report, written to a file on request so runs
    /// on different machines can be told apart afterwards.
    #[must_use]
    pub fn report(&self) -> String {
        format!(
            "device: {}\nvendor: {:?}\napi_version: {}.{}.{}\ndriver_version: {}\n\
             timestamp_period_ns: {}\ntimestamp_all_queues: {}\ndevice_local_memory_mb: {}\n",
            self.device_name,
            self.vendor,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.driver_version,
            self.timestamp_period_ns,
            self.timestamp_compute_and_graphics,
            self.device_local_memory_mb,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_vendor_id(0x1234), GpuVendor::Other(0x1234));
    }

    #[test]
    fn requirements_reject_zero_timestamp_period() {
        let caps = GpuCapabilities {
            vendor: GpuVendor::Other(0),
            device_name: "test".to_string(),
            api_version: vk::API_VERSION_1_3,
            driver_version: 0,
            timestamp_period_ns: 0.0,
            timestamp_compute_and_graphics: false,
            device_local_memory_mb: 4096,
        };
        assert!(!caps.meets_requirements());
    }

    #[test]
    fn report_names_the_device() {
        let caps = GpuCapabilities {
            vendor: GpuVendor::Nvidia,
            device_name: "test-gpu".to_string(),
            api_version: vk::API_VERSION_1_3,
            driver_version: 1,
            timestamp_period_ns: 1.0,
            timestamp_compute_and_graphics: true,
            device_local_memory_mb: 4096,
        };
        let report = caps.report();
        assert!(report.contains("device: test-gpu"));
        assert!(report.contains("timestamp_period_ns: 1"));
    }
}
