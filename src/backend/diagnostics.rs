// Diagnostics hook - debug-utils messenger for development builds
//
// The messenger entry points belong to VK_EXT_debug_utils, so they are
// looked up from the instance at runtime. If the driver does not expose them
// the hook stays inert and startup carries on.

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use std::ffi::CStr;

use super::handle::ScopedHandle;
use super::instance::Instance;
use crate::error::{InitResult, VkResultExt};

const CREATE_MESSENGER: &CStr = c"vkCreateDebugUtilsMessengerEXT";
const DESTROY_MESSENGER: &CStr = c"vkDestroyDebugUtilsMessengerEXT";

pub struct DiagnosticsHook {
    messenger: Option<ScopedHandle<vk::DebugUtilsMessengerEXT>>,
}

impl DiagnosticsHook {
    /// A hook that does nothing (diagnostics off, or entry points missing).
    pub fn inert() -> Self {
        Self { messenger: None }
    }

    /// Register the debug callback on `instance`.
    pub fn install(entry: &Entry, instance: &Instance) -> InitResult<Self> {
        let resolved = |name: &CStr| unsafe {
            entry
                .get_instance_proc_addr(instance.handle(), name.as_ptr())
                .is_some()
        };

        if !(resolved(CREATE_MESSENGER) && resolved(DESTROY_MESSENGER)) {
            log::debug!("Debug utils messenger entry points unavailable, diagnostics hook disabled");
            return Ok(Self::inert());
        }

        let debug_utils = DebugUtils::new(entry, instance.raw());

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let mut messenger = ScopedHandle::with_owner(debug_utils.clone(), |loader: &DebugUtils, messenger| {
            unsafe { loader.destroy_debug_utils_messenger(messenger, None) };
        });
        *messenger.replace() = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .or_creation_failed("debug utils messenger")?;

        log::info!("Diagnostics hook installed");
        Ok(Self {
            messenger: Some(messenger),
        })
    }

    pub fn is_active(&self) -> bool {
        self.messenger.is_some()
    }
}

/// Log level a driver message is forwarded at.
pub fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::Level::Info
    } else {
        log::Level::Debug
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let (message, object_type) = match p_callback_data.as_ref() {
        Some(data) => {
            let message = if data.p_message.is_null() {
                "<no message>".into()
            } else {
                CStr::from_ptr(data.p_message).to_string_lossy()
            };
            let object_type = if data.object_count > 0 && !data.p_objects.is_null() {
                (*data.p_objects).object_type
            } else {
                vk::ObjectType::UNKNOWN
            };
            (message, object_type)
        }
        None => ("<no callback data>".into(), vk::ObjectType::UNKNOWN),
    };

    log::log!(
        target: "vulkan",
        severity_level(message_severity),
        "[{:?}/{:?}] {}",
        message_type,
        object_type,
        message
    );

    // Never abort the call that triggered the message.
    vk::FALSE
}
