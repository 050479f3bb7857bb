// Render context - the whole bring-up pipeline
//
// negotiate -> instance -> diagnostics hook -> surface -> physical device
//           -> logical device -> swapchain + image views
//
// IMPORTANT: Field order matters for Drop! Fields are dropped top to bottom,
// which is the reverse of creation order. If a stage fails inside `new`,
// the locals created so far are dropped in the same reverse order.

use ash::{vk, Entry};

use super::capabilities;
use super::device::LogicalDevice;
use super::diagnostics::DiagnosticsHook;
use super::instance::Instance;
use super::physical::{self, DeviceQuery, DriverQueries};
use super::surface::{Surface, SurfaceProvider};
use super::swapchain::Swapchain;
use crate::config::Config;
use crate::error::{CapabilityKind, InitResult};

/// Startup inputs, resolved once before the pipeline runs.
#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub application_name: String,
    /// Validation layers + diagnostics hook.
    pub diagnostics: bool,
}

impl ContextSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            application_name: config.window.title.clone(),
            diagnostics: config.diagnostics_enabled(),
        }
    }
}

pub struct RenderContext {
    swapchain: Swapchain,
    device: LogicalDevice,
    surface: Surface,
    diagnostics: DiagnosticsHook,
    instance: Instance,
    _entry: Entry,
}

impl RenderContext {
    pub fn new(settings: &ContextSettings, provider: &dyn SurfaceProvider) -> InitResult<Self> {
        log::info!(
            "Initializing Vulkan for '{}' (diagnostics {})",
            settings.application_name,
            if settings.diagnostics { "on" } else { "off" }
        );

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }?;

        // Step 2: Negotiate instance extensions
        let extensions =
            capabilities::required_instance_extensions(&provider.required_extensions()?, settings.diagnostics);
        let available = capabilities::available_instance_extensions(&entry)?;
        capabilities::require_all(CapabilityKind::InstanceExtension, &extensions, &available)?;
        let layers = capabilities::required_layers(settings.diagnostics);

        // Step 3: Create instance
        let instance = Instance::create(&entry, &settings.application_name, &extensions, &layers)?;

        // Step 4: Diagnostics hook
        let diagnostics = if settings.diagnostics {
            DiagnosticsHook::install(&entry, &instance)?
        } else {
            DiagnosticsHook::inert()
        };

        // Step 5: Surface from the window
        let surface = Surface::create(&entry, &instance, provider)?;

        // Step 6: Pick physical device (GPU)
        let selected = {
            let queries = DriverQueries::new(instance.raw(), &surface);
            let candidates = queries.enumerate_candidates()?;
            log::info!("Found {} Vulkan device(s)", candidates.len());
            physical::select(&queries, &candidates, surface.handle())?
        };
        log::info!(
            "Selected GPU: {}",
            physical::describe(instance.raw(), selected.physical_device)
        );

        // Step 7: Create logical device
        let device = LogicalDevice::create(
            &instance,
            &selected,
            &physical::required_device_extensions(),
            &layers,
        )?;

        // Step 8: Swapchain and image views
        let swapchain = Swapchain::create(&instance, &device, &surface, provider.framebuffer_extent())?;

        log::info!("Vulkan initialized successfully!");
        Ok(Self {
            swapchain,
            device,
            surface,
            diagnostics,
            instance,
            _entry: entry,
        })
    }

    /// Rebuild the swapchain for a new drawable size.
    ///
    /// A zero-sized extent (minimised window) is skipped.
    pub fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> InitResult<()> {
        if extent.width == 0 || extent.height == 0 {
            log::debug!("Skipping swapchain rebuild for zero-sized extent");
            return Ok(());
        }

        self.device.wait_idle()?;
        self.swapchain.rebuild(&self.device, &self.surface, extent)
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn diagnostics_active(&self) -> bool {
        self.diagnostics.is_active()
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan context...");

        // Wait for device to finish; fields are released after this returns.
        if let Err(e) = self.device.wait_idle() {
            log::warn!("Device did not go idle before teardown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::handle::ScopedHandle;
    use crate::error::InitError;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn acquire(log: &Log, name: &'static str) -> ScopedHandle<u64> {
        let sink = Rc::clone(log);
        let mut handle = ScopedHandle::new(move |_: u64| sink.borrow_mut().push(name));
        handle.assign(1);
        handle
    }

    /// Mirrors `RenderContext` and `Swapchain` field order.
    struct Stages {
        _image_views: Vec<ScopedHandle<u64>>,
        _swapchain: ScopedHandle<u64>,
        _device: ScopedHandle<u64>,
        _surface: ScopedHandle<u64>,
        _diagnostics: ScopedHandle<u64>,
        _instance: ScopedHandle<u64>,
    }

    fn build(log: &Log, fail_after: Option<&'static str>) -> InitResult<Stages> {
        let step = |name: &'static str| -> InitResult<ScopedHandle<u64>> {
            let handle = acquire(log, name);
            if fail_after == Some(name) {
                return Err(InitError::ResourceCreationFailed {
                    resource: "next stage",
                    result: vk::Result::ERROR_INITIALIZATION_FAILED,
                });
            }
            Ok(handle)
        };

        // Same acquisition order as `RenderContext::new`.
        let instance = step("instance")?;
        let diagnostics = step("diagnostics")?;
        let surface = step("surface")?;
        let device = step("device")?;
        let swapchain = step("swapchain")?;
        let image_views = vec![step("image view")?, step("image view")?];

        Ok(Stages {
            _image_views: image_views,
            _swapchain: swapchain,
            _device: device,
            _surface: surface,
            _diagnostics: diagnostics,
            _instance: instance,
        })
    }

    #[test]
    fn teardown_runs_in_reverse_creation_order() {
        let log = Log::default();
        let stages = build(&log, None).unwrap();
        assert!(log.borrow().is_empty());

        drop(stages);
        assert_eq!(
            *log.borrow(),
            vec!["image view", "image view", "swapchain", "device", "surface", "diagnostics", "instance"]
        );
    }

    #[test]
    fn failed_stage_releases_only_what_was_acquired() {
        let log = Log::default();
        let result = build(&log, Some("surface"));

        // The failing step's own handle goes first, then earlier stages in reverse.
        assert!(matches!(result, Err(InitError::ResourceCreationFailed { .. })));
        assert_eq!(*log.borrow(), vec!["surface", "diagnostics", "instance"]);
    }

    #[test]
    fn failure_at_first_stage_releases_just_that_stage() {
        let log = Log::default();
        assert!(build(&log, Some("instance")).is_err());
        assert_eq!(*log.borrow(), vec!["instance"]);
    }
}
