// Physical device selection
//
// Candidates are checked in the order the driver reports them and the first
// suitable one wins. There is no scoring: a discrete GPU listed after a
// suitable integrated one is never considered.

use ash::extensions::khr;
use ash::vk;
use std::ffi::CStr;
use std::ops::ControlFlow;

use super::capabilities::{self, CapabilityDescriptor};
use super::surface::Surface;
use super::swapchain::SwapChainSupport;
use crate::error::{InitError, InitResult, VkResultExt};

/// Device extensions every candidate must offer.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![khr::Swapchain::name()]
}

/// Queue family roles found so far on one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyResolution {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyResolution {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn complete(self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// A complete resolution; both roles may share one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Each family index once, graphics first.
    pub fn distinct(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// The driver queries device selection depends on.
pub trait DeviceQuery {
    fn enumerate_candidates(&self) -> InitResult<Vec<vk::PhysicalDevice>>;

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;

    fn presentation_supported(
        &self,
        device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> InitResult<bool>;

    fn device_extensions(&self, device: vk::PhysicalDevice) -> InitResult<Vec<CapabilityDescriptor>>;

    fn swap_chain_support(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> InitResult<SwapChainSupport>;
}

/// `DeviceQuery` backed by the live instance and surface loader.
pub struct DriverQueries<'a> {
    instance: &'a ash::Instance,
    surface_loader: &'a khr::Surface,
}

impl<'a> DriverQueries<'a> {
    pub fn new(instance: &'a ash::Instance, surface: &'a Surface) -> Self {
        Self {
            instance,
            surface_loader: surface.loader(),
        }
    }
}

impl DeviceQuery for DriverQueries<'_> {
    fn enumerate_candidates(&self) -> InitResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance.enumerate_physical_devices() }
            .or_query_failed("vkEnumeratePhysicalDevices")
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe { self.instance.get_physical_device_queue_family_properties(device) }
    }

    fn presentation_supported(
        &self,
        device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> InitResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(device, queue_family, surface)
        }
        .or_query_failed("vkGetPhysicalDeviceSurfaceSupportKHR")
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> InitResult<Vec<CapabilityDescriptor>> {
        capabilities::available_device_extensions(self.instance, device)
    }

    fn swap_chain_support(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> InitResult<SwapChainSupport> {
        SwapChainSupport::query(self.surface_loader, device, surface)
    }
}

/// Scan queue families in index order until both roles are filled.
///
/// Families with no queues are skipped. While the resolution is incomplete a
/// later graphics-capable family replaces an earlier one, and the scan stops
/// at the first index where both roles are set; nothing after that index is
/// queried. This reproduces the established selection and is not a
/// lowest-index-per-role search.
pub fn resolve_queue_families<F>(
    families: &[vk::QueueFamilyProperties],
    mut presentation_supported: F,
) -> InitResult<QueueFamilyResolution>
where
    F: FnMut(u32) -> InitResult<bool>,
{
    let scan = (0u32..)
        .zip(families)
        .filter(|(_, family)| family.queue_count > 0)
        .try_fold(QueueFamilyResolution::default(), |mut resolution, (index, family)| {
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                resolution.graphics = Some(index);
            }
            match presentation_supported(index) {
                Ok(true) => resolution.present = Some(index),
                Ok(false) => {}
                Err(err) => return ControlFlow::Break(Err(err)),
            }
            if resolution.is_complete() {
                ControlFlow::Break(Ok(resolution))
            } else {
                ControlFlow::Continue(resolution)
            }
        });

    match scan {
        ControlFlow::Break(result) => result,
        ControlFlow::Continue(partial) => Ok(partial),
    }
}

/// Queue families of `device` if it is suitable, `None` otherwise.
fn suitability(
    query: &dyn DeviceQuery,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> InitResult<Option<QueueFamilies>> {
    let resolution = resolve_queue_families(&query.queue_families(device), |index| {
        query.presentation_supported(device, index, surface)
    })?;

    let extensions = query.device_extensions(device)?;
    let extensions_supported =
        capabilities::check_all_available(&required_device_extensions(), &extensions);

    // Surface support is only meaningful once the swapchain extension exists.
    let swap_chain_adequate =
        extensions_supported && query.swap_chain_support(device, surface)?.is_adequate();

    log::debug!(
        "Device {:?}: queues {:?}, extensions {}, swapchain {}",
        device,
        resolution,
        extensions_supported,
        swap_chain_adequate
    );

    Ok(resolution.complete().filter(|_| extensions_supported && swap_chain_adequate))
}

pub fn is_suitable(
    query: &dyn DeviceQuery,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> InitResult<bool> {
    Ok(suitability(query, device, surface)?.is_some())
}

/// The chosen GPU and the queue families resolved on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedDevice {
    pub physical_device: vk::PhysicalDevice,
    pub families: QueueFamilies,
}

/// First suitable candidate, in enumeration order.
pub fn select(
    query: &dyn DeviceQuery,
    candidates: &[vk::PhysicalDevice],
    surface: vk::SurfaceKHR,
) -> InitResult<SelectedDevice> {
    candidates
        .iter()
        .find_map(|&device| match suitability(query, device, surface) {
            Ok(Some(families)) => Some(Ok(SelectedDevice {
                physical_device: device,
                families,
            })),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        })
        .unwrap_or(Err(InitError::NoSuitableDevice {
            candidates: candidates.len(),
        }))
}

/// Name and API version of a device, for logging.
pub fn describe(instance: &ash::Instance, device: vk::PhysicalDevice) -> String {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();
    format!(
        "{} ({:?}, API {}.{}.{})",
        name,
        properties.device_type,
        vk::api_version_major(properties.api_version),
        vk::api_version_minor(properties.api_version),
        vk::api_version_patch(properties.api_version)
    )
}
