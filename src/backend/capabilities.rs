// Capability negotiation - extension and layer availability
//
// The driver is the source of truth: every list here is queried fresh and
// never cached. Required-vs-available checks are plain exact-name matches.

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::error::{CapabilityKind, InitError, InitResult, VkResultExt};

/// Validation layer enabled when diagnostics are on
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// An extension or layer as reported by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    pub name: CString,
    pub version: u32,
}

impl CapabilityDescriptor {
    pub fn new(name: impl Into<Vec<u8>>, version: u32) -> Self {
        // Interior NULs cannot come from the driver; keep the prefix if they do.
        let mut bytes = name.into();
        if let Some(nul) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(nul);
        }
        Self {
            name: CString::new(bytes).unwrap_or_default(),
            version,
        }
    }

    pub fn from_extension(properties: &vk::ExtensionProperties) -> Self {
        Self::new(fixed_str(&properties.extension_name), properties.spec_version)
    }

    pub fn from_layer(properties: &vk::LayerProperties) -> Self {
        Self::new(fixed_str(&properties.layer_name), properties.implementation_version)
    }
}

/// Bytes of a fixed-size, NUL-terminated driver string.
fn fixed_str(raw: &[c_char]) -> Vec<u8> {
    raw.iter()
        .map(|&c| c as u8)
        .take_while(|&b| b != 0)
        .collect()
}

pub fn available_instance_extensions(entry: &Entry) -> InitResult<Vec<CapabilityDescriptor>> {
    let properties = entry
        .enumerate_instance_extension_properties(None)
        .or_query_failed("vkEnumerateInstanceExtensionProperties")?;
    Ok(properties.iter().map(CapabilityDescriptor::from_extension).collect())
}

pub fn available_layers(entry: &Entry) -> InitResult<Vec<CapabilityDescriptor>> {
    let properties = entry
        .enumerate_instance_layer_properties()
        .or_query_failed("vkEnumerateInstanceLayerProperties")?;
    Ok(properties.iter().map(CapabilityDescriptor::from_layer).collect())
}

pub fn available_device_extensions(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> InitResult<Vec<CapabilityDescriptor>> {
    let properties = unsafe { instance.enumerate_device_extension_properties(device) }
        .or_query_failed("vkEnumerateDeviceExtensionProperties")?;
    Ok(properties.iter().map(CapabilityDescriptor::from_extension).collect())
}

pub fn is_available(available: &[CapabilityDescriptor], name: &CStr) -> bool {
    available.iter().any(|descriptor| descriptor.name.as_c_str() == name)
}

/// Presentation extensions from the surface provider, plus debug utils when
/// diagnostics are wanted.
pub fn required_instance_extensions(
    surface_extensions: &[&'static CStr],
    want_diagnostics: bool,
) -> Vec<&'static CStr> {
    let mut required = surface_extensions.to_vec();
    if want_diagnostics && !required.contains(&DebugUtils::name()) {
        required.push(DebugUtils::name());
    }
    required
}

pub fn required_layers(want_diagnostics: bool) -> Vec<&'static CStr> {
    if want_diagnostics {
        vec![VALIDATION_LAYER]
    } else {
        Vec::new()
    }
}

/// True iff every required name is in `available`.
pub fn check_all_available<R: AsRef<CStr>>(required: &[R], available: &[CapabilityDescriptor]) -> bool {
    first_missing(required, available).is_none()
}

pub fn first_missing<'r, R: AsRef<CStr>>(
    required: &'r [R],
    available: &[CapabilityDescriptor],
) -> Option<&'r CStr> {
    required
        .iter()
        .map(|name| name.as_ref())
        .find(|name| !is_available(available, name))
}

/// Fails with `MissingCapability` naming the first required entry that is absent.
pub fn require_all<R: AsRef<CStr>>(
    kind: CapabilityKind,
    required: &[R],
    available: &[CapabilityDescriptor],
) -> InitResult<()> {
    match first_missing(required, available) {
        Some(name) => Err(InitError::missing(kind, name.to_string_lossy())),
        None => Ok(()),
    }
}
