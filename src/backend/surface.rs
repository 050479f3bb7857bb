// Surface - the platform presentation target
//
// Window creation lives outside the context. Whatever owns the window
// implements `SurfaceProvider`; the context only asks it for the
// presentation extensions and for one surface handle, which it then owns.

use ash::extensions::khr;
use ash::{vk, Entry};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::CStr;

use super::handle::ScopedHandle;
use super::instance::Instance;
use crate::error::{InitResult, VkResultExt};

/// Supplies a platform-native presentation target.
pub trait SurfaceProvider {
    /// Instance extensions the platform needs for presentation.
    fn required_extensions(&self) -> InitResult<Vec<&'static CStr>>;

    /// Create a surface for this window. Ownership passes to the caller.
    fn create_surface(&self, entry: &Entry, instance: &ash::Instance) -> InitResult<vk::SurfaceKHR>;

    /// Current drawable size in pixels.
    fn framebuffer_extent(&self) -> vk::Extent2D;
}

impl SurfaceProvider for winit::window::Window {
    fn required_extensions(&self) -> InitResult<Vec<&'static CStr>> {
        let names = ash_window::enumerate_required_extensions(self.raw_display_handle())
            .or_query_failed("required surface extensions")?;
        // ash-window hands out pointers to static, NUL-terminated names.
        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) })
            .collect())
    }

    fn create_surface(&self, entry: &Entry, instance: &ash::Instance) -> InitResult<vk::SurfaceKHR> {
        unsafe {
            ash_window::create_surface(
                entry,
                instance,
                self.raw_display_handle(),
                self.raw_window_handle(),
                None,
            )
        }
        .or_creation_failed("window surface")
    }

    fn framebuffer_extent(&self) -> vk::Extent2D {
        let size = self.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }
}

/// Owned surface plus the loader needed to query and destroy it.
pub struct Surface {
    handle: ScopedHandle<vk::SurfaceKHR>,
    loader: khr::Surface,
}

impl Surface {
    pub fn create(entry: &Entry, instance: &Instance, provider: &dyn SurfaceProvider) -> InitResult<Self> {
        let loader = khr::Surface::new(entry, instance.raw());

        let mut handle = ScopedHandle::with_owner(loader.clone(), |loader: &khr::Surface, surface| {
            unsafe { loader.destroy_surface(surface, None) };
        });
        *handle.replace() = provider.create_surface(entry, instance.raw())?;

        log::info!("Created window surface");
        Ok(Self { handle, loader })
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle.get()
    }

    pub fn loader(&self) -> &khr::Surface {
        &self.loader
    }
}
