// Backend module - Vulkan bring-up layer
//
// Design: Thin wrapper around ash; every owned handle is a ScopedHandle
// Order: capabilities -> instance -> diagnostics -> surface -> physical
//        -> device -> swapchain, all driven by context

pub mod capabilities;
pub mod context;
pub mod device;
pub mod diagnostics;
pub mod handle;
pub mod instance;
pub mod physical;
pub mod surface;
pub mod swapchain;

pub use context::{ContextSettings, RenderContext};
pub use handle::ScopedHandle;
pub use surface::SurfaceProvider;
