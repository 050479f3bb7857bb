// Swapchain - window presentation
//
// Manages the chain of images we render to and present to the screen.
// Surface support is queried fresh every time; the choose_* functions below
// are the whole selection policy and never score or rank.

use ash::extensions::khr;
use ash::vk;

use super::device::LogicalDevice;
use super::handle::ScopedHandle;
use super::instance::Instance;
use super::physical::QueueFamilies;
use super::surface::Surface;
use crate::error::{InitError, InitResult, VkResultExt};

/// Used when the surface reports a single UNDEFINED format (no preference).
pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Picked from the reported list whenever it is offered.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::R8G8B8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Surface support of one device, captured in a single query.
#[derive(Debug, Clone, Default)]
pub struct SwapChainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapChainSupport {
    pub fn query(
        loader: &khr::Surface,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> InitResult<Self> {
        unsafe {
            Ok(Self {
                capabilities: loader
                    .get_physical_device_surface_capabilities(device, surface)
                    .or_query_failed("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?,
                formats: loader
                    .get_physical_device_surface_formats(device, surface)
                    .or_query_failed("vkGetPhysicalDeviceSurfaceFormatsKHR")?,
                present_modes: loader
                    .get_physical_device_surface_present_modes(device, surface)
                    .or_query_failed("vkGetPhysicalDeviceSurfacePresentModesKHR")?,
            })
        }
    }

    /// At least one format and one present mode.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// `None` only for an empty list.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    match formats {
        [only] if only.format == vk::Format::UNDEFINED => Some(DEFAULT_SURFACE_FORMAT),
        _ => formats
            .iter()
            .copied()
            .find(|f| {
                f.format == PREFERRED_SURFACE_FORMAT.format
                    && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
            })
            .or_else(|| formats.first().copied()),
    }
}

// MAILBOX: No vsync, no tearing, triple buffered
// FIFO: Vsync enabled, guaranteed available
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface's current extent, unless it reports `u32::MAX` (size decided
/// by the swapchain), in which case the request is clamped into bounds.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: requested.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: requested.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 means no cap).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        image_count
    }
}

/// Concurrent across both families when they differ, exclusive otherwise.
pub fn image_sharing(families: &QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.is_shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, families.distinct())
    }
}

/// The parameters a swapchain gets created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

impl SwapchainConfig {
    pub fn negotiate(support: &SwapChainSupport, requested: vk::Extent2D) -> InitResult<Self> {
        let surface_format =
            choose_surface_format(&support.formats).ok_or(InitError::ResourceCreationFailed {
                resource: "swapchain",
                result: vk::Result::ERROR_FORMAT_NOT_SUPPORTED,
            })?;

        Ok(Self {
            surface_format,
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(&support.capabilities, requested),
            image_count: choose_image_count(&support.capabilities),
        })
    }
}

pub struct Swapchain {
    // Views go before the chain that owns their images.
    image_views: Vec<ScopedHandle<vk::ImageView>>,
    handle: ScopedHandle<vk::SwapchainKHR>,
    loader: khr::Swapchain,
    /// Owned by the swapchain; never destroyed individually.
    images: Vec<vk::Image>,
    config: SwapchainConfig,
}

impl Swapchain {
    pub fn create(
        instance: &Instance,
        device: &LogicalDevice,
        surface: &Surface,
        requested: vk::Extent2D,
    ) -> InitResult<Self> {
        let loader = khr::Swapchain::new(instance.raw(), device.raw());
        let handle = ScopedHandle::with_owner(loader.clone(), |loader: &khr::Swapchain, swapchain| {
            unsafe { loader.destroy_swapchain(swapchain, None) };
        });

        let mut swapchain = Self {
            image_views: Vec::new(),
            handle,
            loader,
            images: Vec::new(),
            config: SwapchainConfig {
                surface_format: DEFAULT_SURFACE_FORMAT,
                present_mode: vk::PresentModeKHR::FIFO,
                extent: requested,
                image_count: 0,
            },
        };
        swapchain.rebuild(device, surface, requested)?;
        Ok(swapchain)
    }

    /// Recreate the chain and its views in place, e.g. after a resize.
    ///
    /// Views are released first, then the old chain, then the new one is
    /// created into the same slot. On failure the swapchain is left empty.
    pub fn rebuild(&mut self, device: &LogicalDevice, surface: &Surface, requested: vk::Extent2D) -> InitResult<()> {
        self.image_views.clear();
        self.images.clear();
        self.handle.release();

        let support = SwapChainSupport::query(surface.loader(), device.physical_device, surface.handle())?;
        let config = SwapchainConfig::negotiate(&support, requested)?;
        let (sharing_mode, queue_family_indices) = image_sharing(&device.families);

        log::info!(
            "Creating swapchain: {}x{}, {:?}/{:?}, {:?}, {} image(s) requested",
            config.extent.width,
            config.extent.height,
            config.surface_format.format,
            config.surface_format.color_space,
            config.present_mode,
            config.image_count
        );

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(config.image_count)
            .image_format(config.surface_format.format)
            .image_color_space(config.surface_format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true);

        *self.handle.replace() = unsafe { self.loader.create_swapchain(&create_info, None) }
            .or_creation_failed("swapchain")?;

        // The driver has the final say on the image count.
        self.images = unsafe { self.loader.get_swapchain_images(self.handle.get()) }
            .or_query_failed("vkGetSwapchainImagesKHR")?;

        self.image_views = self
            .images
            .iter()
            .map(|&image| create_image_view(device, image, config.surface_format.format))
            .collect::<InitResult<Vec<_>>>()?;

        log::info!("Created swapchain with {} images", self.images.len());
        self.config = config;
        Ok(())
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle.get()
    }

    pub fn loader(&self) -> &khr::Swapchain {
        &self.loader
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> Vec<vk::ImageView> {
        self.image_views.iter().map(|view| view.get()).collect()
    }

    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }

    pub fn format(&self) -> vk::Format {
        self.config.surface_format.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }
}

fn create_image_view(
    device: &LogicalDevice,
    image: vk::Image,
    format: vk::Format,
) -> InitResult<ScopedHandle<vk::ImageView>> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    let mut view = ScopedHandle::with_owner(device.raw().clone(), |device: &ash::Device, view| {
        unsafe { device.destroy_image_view(view, None) };
    });
    *view.replace() = unsafe { device.raw().create_image_view(&create_info, None) }
        .or_creation_failed("swapchain image view")?;
    Ok(view)
}
