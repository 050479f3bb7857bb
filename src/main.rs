// =============================================================================
// VULKAN BRING-UP - window, negotiation pipeline, presentable swapchain
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  winit event loop (window = surface provider)                   │
// │    └── RenderContext                                            │
// │          └── Instance → Surface → Device → Swapchain            │
// └─────────────────────────────────────────────────────────────────┘
//
// The window is created first; the context is built from it and torn down
// before it. Any initialization failure ends the process with a non-zero
// exit status after everything acquired so far has been released.
//
// =============================================================================

use anyhow::Result;
use vk_bringup::backend::{ContextSettings, RenderContext, SurfaceProvider};
use vk_bringup::config::Config;
use vk_bringup::InitError;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    // Initialize logging
    init_logging(&config);
    log::info!("Starting Vulkan bring-up");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.resizable { "resizable" } else { "fixed" }
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Initialize logging; RUST_LOG overrides the configured level
fn init_logging(config: &Config) {
    env_logger::Builder::new()
        .filter_level(config.log_level_filter())
        .parse_default_env()
        .init();
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: Field order matters for Drop! The context holds a surface
/// created from the window, so it must go first.
struct App {
    context: Option<RenderContext>,
    window: Option<Window>,
    config: Config,
    settings: ContextSettings,
    /// Set when initialization fails; reported from `main`
    failure: Option<InitError>,
}

impl App {
    fn new(config: Config) -> Self {
        // Resolved once: build mode + config switch
        let settings = ContextSettings::from_config(&config);
        Self {
            context: None,
            window: None,
            config,
            settings,
            failure: None,
        }
    }

    fn handle_resize(&mut self) {
        let (Some(context), Some(window)) = (self.context.as_mut(), self.window.as_ref()) else {
            return;
        };
        if let Err(e) = context.recreate_swapchain(window.framebuffer_extent()) {
            log::error!("Failed to recreate swapchain: {}", e);
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(self.config.window.resizable);

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        match RenderContext::new(&self.settings, &window) {
            Ok(context) => {
                log::info!(
                    "Swapchain ready: {} image(s), {:?}",
                    context.swapchain().images().len(),
                    context.swapchain().extent()
                );
                self.context = Some(context);
            }
            Err(e) => {
                log::error!("Failed to initialize Vulkan: {}", e);
                self.failure = Some(e);
                event_loop.exit();
            }
        }

        self.window = Some(window);
    }

    /// Handle window events.
    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.handle_resize();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    log::info!("ESC pressed, exiting...");
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    /// Tear the context down while the window still exists.
    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.context = None;
        log::info!("Cleanup complete");
    }
}
