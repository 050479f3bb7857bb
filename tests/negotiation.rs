// End-to-end negotiation scenarios against a fake driver. No GPU needed.

use ash::extensions::khr;
use ash::vk::{self, Handle};
use std::ffi::CStr;

use vk_bringup::backend::capabilities::{self, CapabilityDescriptor};
use vk_bringup::backend::physical::{self, DeviceQuery, QueueFamilies};
use vk_bringup::backend::swapchain::{
    choose_extent, choose_present_mode, choose_surface_format, SwapChainSupport, SwapchainConfig,
};
use vk_bringup::{CapabilityKind, InitError, InitResult};

struct Gpu {
    families: Vec<vk::QueueFamilyProperties>,
    presenting: Vec<u32>,
    extensions: Vec<&'static CStr>,
    support: SwapChainSupport,
}

/// Candidates in enumeration order.
struct FakeDriver {
    gpus: Vec<(vk::PhysicalDevice, Gpu)>,
}

impl FakeDriver {
    fn new(gpus: Vec<Gpu>) -> Self {
        Self {
            gpus: (1u64..)
                .zip(gpus)
                .map(|(raw, gpu)| (vk::PhysicalDevice::from_raw(raw), gpu))
                .collect(),
        }
    }

    fn gpu(&self, device: vk::PhysicalDevice) -> &Gpu {
        self.gpus
            .iter()
            .find(|(candidate, _)| *candidate == device)
            .map(|(_, gpu)| gpu)
            .expect("device was not enumerated by this driver")
    }
}

impl DeviceQuery for FakeDriver {
    fn enumerate_candidates(&self) -> InitResult<Vec<vk::PhysicalDevice>> {
        Ok(self.gpus.iter().map(|(device, _)| *device).collect())
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.gpu(device).families.clone()
    }

    fn presentation_supported(
        &self,
        device: vk::PhysicalDevice,
        queue_family: u32,
        _surface: vk::SurfaceKHR,
    ) -> InitResult<bool> {
        Ok(self.gpu(device).presenting.contains(&queue_family))
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> InitResult<Vec<CapabilityDescriptor>> {
        Ok(self
            .gpu(device)
            .extensions
            .iter()
            .map(|name| CapabilityDescriptor::new(name.to_bytes(), 70))
            .collect())
    }

    fn swap_chain_support(
        &self,
        device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> InitResult<SwapChainSupport> {
        Ok(self.gpu(device).support.clone())
    }
}

fn graphics_family() -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
        queue_flags: vk::QueueFlags::GRAPHICS,
        queue_count: 1,
        ..Default::default()
    }
}

fn usable_support() -> SwapChainSupport {
    SwapChainSupport {
        capabilities: vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 4,
            current_extent: vk::Extent2D { width: 1280, height: 720 },
            ..Default::default()
        },
        formats: vec![vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }],
        present_modes: vec![vk::PresentModeKHR::FIFO],
    }
}

fn available(names: &[&CStr]) -> Vec<CapabilityDescriptor> {
    names
        .iter()
        .map(|name| CapabilityDescriptor::new(name.to_bytes(), 1))
        .collect()
}

#[test]
fn scenario_1_all_required_extensions_available() {
    let available = available(&[c"A", c"B"]);
    assert!(capabilities::check_all_available(&[c"A", c"B"], &available));
    assert!(capabilities::require_all(CapabilityKind::InstanceExtension, &[c"A", c"B"], &available).is_ok());
}

#[test]
fn scenario_2_missing_extension_is_named() {
    let available = available(&[c"A"]);
    assert!(!capabilities::check_all_available(&[c"A", c"B"], &available));
    match capabilities::require_all(CapabilityKind::InstanceExtension, &[c"A", c"B"], &available) {
        Err(InitError::MissingCapability { kind, name }) => {
            assert_eq!(kind, CapabilityKind::InstanceExtension);
            assert_eq!(name, "B");
        }
        other => panic!("expected MissingCapability, got {other:?}"),
    }
}

#[test]
fn scenario_3_incomplete_device_is_passed_over() {
    let d1 = Gpu {
        families: vec![graphics_family()],
        presenting: vec![],
        extensions: vec![khr::Swapchain::name()],
        support: usable_support(),
    };
    let d2 = Gpu {
        families: vec![graphics_family()],
        presenting: vec![0],
        extensions: vec![khr::Swapchain::name()],
        support: usable_support(),
    };
    let driver = FakeDriver::new(vec![d1, d2]);
    let candidates = driver.enumerate_candidates().unwrap();
    let surface = vk::SurfaceKHR::from_raw(99);

    let selected = physical::select(&driver, &candidates, surface).unwrap();
    assert_eq!(selected.physical_device, candidates[1]);
    assert_eq!(selected.families, QueueFamilies { graphics: 0, present: 0 });
}

#[test]
fn scenario_3b_nothing_suitable() {
    let unusable = Gpu {
        families: vec![graphics_family()],
        presenting: vec![0],
        extensions: vec![],
        support: usable_support(),
    };
    let driver = FakeDriver::new(vec![unusable]);
    let candidates = driver.enumerate_candidates().unwrap();

    assert!(matches!(
        physical::select(&driver, &candidates, vk::SurfaceKHR::null()),
        Err(InitError::NoSuitableDevice { candidates: 1 })
    ));
}

#[test]
fn scenario_4_undefined_format_uses_default() {
    let formats = [vk::SurfaceFormatKHR {
        format: vk::Format::UNDEFINED,
        color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
    }];
    let chosen = choose_surface_format(&formats).unwrap();
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
    assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
}

#[test]
fn scenario_5_fifo_without_mailbox() {
    assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO]), vk::PresentModeKHR::FIFO);
}

#[test]
fn scenario_6_extent_clamping() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
        current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
        min_image_extent: vk::Extent2D { width: 400, height: 300 },
        max_image_extent: vk::Extent2D { width: 1920, height: 1080 },
        ..Default::default()
    };

    let within = choose_extent(&capabilities, vk::Extent2D { width: 800, height: 600 });
    assert_eq!((within.width, within.height), (800, 600));

    let clamped = choose_extent(&capabilities, vk::Extent2D { width: 3000, height: 3000 });
    assert_eq!((clamped.width, clamped.height), (1920, 1080));
}

#[test]
fn selected_device_support_negotiates_a_config() {
    let driver = FakeDriver::new(vec![Gpu {
        families: vec![graphics_family()],
        presenting: vec![0],
        extensions: vec![khr::Swapchain::name()],
        support: usable_support(),
    }]);
    let candidates = driver.enumerate_candidates().unwrap();
    let surface = vk::SurfaceKHR::from_raw(1);
    let selected = physical::select(&driver, &candidates, surface).unwrap();

    let support = driver.swap_chain_support(selected.physical_device, surface).unwrap();
    let config = SwapchainConfig::negotiate(&support, vk::Extent2D { width: 640, height: 480 }).unwrap();

    // Fixed current extent wins over the request.
    assert_eq!((config.extent.width, config.extent.height), (1280, 720));
    assert_eq!(config.image_count, 3);
    assert_eq!(config.present_mode, vk::PresentModeKHR::FIFO);
    assert_eq!(config.surface_format.format, vk::Format::B8G8R8A8_SRGB);
}
