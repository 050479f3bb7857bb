// Logical device - the GPU interface we actually submit to
//
// Responsibilities:
// - One queue per distinct queue family (graphics and presentation)
// - Device extensions (swapchain) and the instance's layers
// - Destroying the device before the instance it came from

use ash::vk;
use std::ffi::CStr;

use super::handle::ScopedHandle;
use super::instance::{as_ptrs, Instance};
use super::physical::{QueueFamilies, SelectedDevice};
use crate::error::{InitResult, VkResultExt};

static QUEUE_PRIORITY: [f32; 1] = [1.0];

/// Owned logical device and the queues retrieved from it
pub struct LogicalDevice {
    // Dropped first: destroys the device through its own clone of `raw`.
    handle: ScopedHandle<vk::Device>,
    raw: ash::Device,

    pub physical_device: vk::PhysicalDevice,
    pub families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

/// One create-info per distinct family, each with a single queue.
pub fn queue_create_infos(families: &QueueFamilies) -> Vec<vk::DeviceQueueCreateInfo> {
    families
        .distinct()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&QUEUE_PRIORITY)
                .build()
        })
        .collect()
}

impl LogicalDevice {
    pub fn create(
        instance: &Instance,
        selected: &SelectedDevice,
        extensions: &[&CStr],
        layers: &[&CStr],
    ) -> InitResult<Self> {
        let queue_infos = queue_create_infos(&selected.families);
        let extension_names = as_ptrs(extensions);
        let layer_names = as_ptrs(layers);
        let features = vk::PhysicalDeviceFeatures::default();

        // Device layers are deprecated but older loaders still read them.
        #[allow(deprecated)]
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .enabled_features(&features);

        let raw = unsafe {
            instance
                .raw()
                .create_device(selected.physical_device, &create_info, None)
        }
        .or_creation_failed("logical device")?;

        let mut handle = ScopedHandle::with_owner(raw.clone(), |device: &ash::Device, _: vk::Device| {
            log::debug!("Destroying logical device");
            unsafe { device.destroy_device(None) };
        });
        handle.assign(raw.handle());

        let graphics_queue = unsafe { raw.get_device_queue(selected.families.graphics, 0) };
        let present_queue = unsafe { raw.get_device_queue(selected.families.present, 0) };

        log::info!(
            "Created logical device with {} queue(s) (graphics family {}, present family {})",
            queue_infos.len(),
            selected.families.graphics,
            selected.families.present
        );

        Ok(Self {
            handle,
            raw,
            physical_device: selected.physical_device,
            families: selected.families,
            graphics_queue,
            present_queue,
        })
    }

    pub fn raw(&self) -> &ash::Device {
        &self.raw
    }

    pub fn handle(&self) -> vk::Device {
        self.handle.get()
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> InitResult<()> {
        unsafe { self.raw.device_wait_idle() }.or_query_failed("vkDeviceWaitIdle")
    }
}
