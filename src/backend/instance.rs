// Vulkan instance - the top-level driver context
//
// Created once the required instance extensions have been negotiated.
// Requested layers are validated here, right before creation.

use ash::{vk, Entry};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use super::capabilities;
use super::handle::ScopedHandle;
use crate::error::{CapabilityKind, InitResult, VkResultExt};

pub const ENGINE_NAME: &CStr = c"No Engine";
pub const APPLICATION_VERSION: u32 = vk::make_api_version(0, 1, 0, 0);
pub const ENGINE_VERSION: u32 = vk::make_api_version(0, 1, 0, 0);
pub const TARGET_API_VERSION: u32 = vk::API_VERSION_1_0;

/// Owned instance: the handle plus the function table that drives it.
pub struct Instance {
    // Dropped first: destroys the instance through its own clone of `raw`.
    handle: ScopedHandle<vk::Instance>,
    raw: ash::Instance,
}

impl Instance {
    /// Create the instance with the given extensions and layers enabled.
    ///
    /// Layers are only ever requested with diagnostics on; each one must be
    /// in the driver's global layer list or creation is refused.
    pub fn create(
        entry: &Entry,
        application_name: &str,
        extensions: &[&CStr],
        layers: &[&CStr],
    ) -> InitResult<Self> {
        log::info!("Creating Vulkan instance: {}", application_name);

        if !layers.is_empty() {
            let available = capabilities::available_layers(entry)?;
            capabilities::require_all(CapabilityKind::Layer, layers, &available)?;
        }

        // Interior NULs in a configured title are dropped rather than rejected.
        let app_name = CString::new(application_name.replace('\0', "")).unwrap_or_default();

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(APPLICATION_VERSION)
            .engine_name(ENGINE_NAME)
            .engine_version(ENGINE_VERSION)
            .api_version(TARGET_API_VERSION);

        let extension_names = as_ptrs(extensions);
        let layer_names = as_ptrs(layers);

        for name in extensions {
            log::debug!("Enabling instance extension {}", name.to_string_lossy());
        }
        for name in layers {
            log::debug!("Enabling layer {}", name.to_string_lossy());
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names);

        let raw = unsafe { entry.create_instance(&create_info, None) }
            .or_creation_failed("Vulkan instance")?;

        let mut handle = ScopedHandle::with_owner(raw.clone(), |instance: &ash::Instance, _: vk::Instance| {
            log::debug!("Destroying Vulkan instance");
            unsafe { instance.destroy_instance(None) };
        });
        handle.assign(raw.handle());

        Ok(Self { handle, raw })
    }

    pub fn raw(&self) -> &ash::Instance {
        &self.raw
    }

    pub fn handle(&self) -> vk::Instance {
        self.handle.get()
    }
}

pub(crate) fn as_ptrs(names: &[&CStr]) -> Vec<*const c_char> {
    names.iter().map(|name| name.as_ptr()).collect()
}
