// Host window
//
// A winit window driven by pumping the event loop from the render loop, so
// the caller keeps a plain `while !window.should_close()` loop and owns every
// GPU object on its own stack.

use ash::{vk, Entry};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::c_char;
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::backend::device::SurfaceProvider;
use crate::config::WindowConfig;
use crate::error::{RenderError, RenderResult};

/// How long `open` keeps pumping while waiting for the window to appear
const OPEN_PUMP_ATTEMPTS: u32 = 200;

/// Event handler state: creates the window on resume, records close requests
struct WindowState {
    attributes: Option<WindowAttributes>,
    window: Option<Window>,
    close_requested: bool,
    error: Option<String>,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.attributes.take() else {
            return;
        };

        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(window),
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.close_requested = true;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.close_requested = true;
                }
            }
            _ => {}
        }
    }
}

pub struct HostWindow {
    window: Window,
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl HostWindow {
    /// Create a fixed-size window and wait until the platform has shown it
    pub fn open(config: &WindowConfig) -> RenderResult<Self> {
        let mut event_loop = EventLoop::new().map_err(|e| RenderError::Window(e.to_string()))?;

        let attributes = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(config.width, config.height))
            .with_resizable(false);

        let mut state = WindowState {
            attributes: Some(attributes),
            window: None,
            close_requested: false,
            error: None,
        };

        for _ in 0..OPEN_PUMP_ATTEMPTS {
            let status = event_loop.pump_app_events(Some(Duration::from_millis(5)), &mut state);

            if let Some(error) = state.error.take() {
                return Err(RenderError::Window(error));
            }
            if let PumpStatus::Exit(code) = status {
                return Err(RenderError::Window(format!(
                    "event loop exited with code {code} before the window opened"
                )));
            }
            if state.window.is_some() {
                break;
            }
        }

        let window = state
            .window
            .take()
            .ok_or_else(|| RenderError::Window("window was never created".to_string()))?;

        let size = window.inner_size();
        log::info!("Window: {}x{} ({})", size.width, size.height, config.title);

        Ok(Self {
            window,
            state,
            event_loop,
        })
    }

    /// Process pending platform events without blocking
    pub fn poll_events(&mut self) {
        if let PumpStatus::Exit(_) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            self.state.close_requested = true;
        }
    }

    /// Close button or Escape
    pub fn should_close(&self) -> bool {
        self.state.close_requested
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }
}

impl SurfaceProvider for HostWindow {
    fn required_instance_extensions(&self) -> RenderResult<Vec<*const c_char>> {
        let extensions = ash_window::enumerate_required_extensions(self.window.raw_display_handle())?;
        Ok(extensions.to_vec())
    }

    fn create_surface(&self, entry: &Entry, instance: &ash::Instance) -> RenderResult<vk::SurfaceKHR> {
        let surface = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                self.window.raw_display_handle(),
                self.window.raw_window_handle(),
                None,
            )
        }?;
        log::debug!("Created window surface");
        Ok(surface)
    }

    fn drawable_extent(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }
}
