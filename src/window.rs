// Window - platform glue over winit
//
// The device only needs four things from the window: the instance
// extensions the platform requires, a surface bound to the native handle,
// the inner size, and show/hide. Event polling stays with the winit event
// loop that owns the window.

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::c_char;
use std::sync::Arc;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::WindowAttributes;

use crate::backend::error::{DeviceError, Result, VkContext};

/// Shared handle to a native window.
#[derive(Clone)]
pub struct Window {
    inner: Arc<winit::window::Window>,
}

impl Window {
    /// Open a window on the running event loop.
    pub fn create(
        event_loop: &ActiveEventLoop,
        title: &str,
        width: u32,
        height: u32,
        visible: bool,
    ) -> Result<Self> {
        let attributes = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_visible(visible);

        let window = event_loop
            .create_window(attributes)
            .map_err(|e| DeviceError::Platform(e.to_string()))?;

        Ok(Self::from_winit(Arc::new(window)))
    }

    pub fn from_winit(window: Arc<winit::window::Window>) -> Self {
        Self { inner: window }
    }

    /// Instance extensions this platform needs to present to the window.
    pub fn required_extensions(&self) -> Result<&'static [*const c_char]> {
        let display = self
            .inner
            .display_handle()
            .map_err(|e| DeviceError::Platform(e.to_string()))?;

        ash_window::enumerate_required_extensions(display.as_raw())
            .map_err(|e| DeviceError::Platform(format!("Failed to query surface extensions: {e}")))
    }

    /// Create a presentation surface bound to this window.
    ///
    /// # Safety
    /// `instance` must have been created from `entry` with the extensions
    /// returned by [`required_extensions`](Self::required_extensions).
    pub(crate) unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        let display = self
            .inner
            .display_handle()
            .map_err(|e| DeviceError::Platform(e.to_string()))?;
        let window = self
            .inner
            .window_handle()
            .map_err(|e| DeviceError::Platform(e.to_string()))?;

        ash_window::create_surface(entry, instance, display.as_raw(), window.as_raw(), None)
            .vk_context("vkCreateSurfaceKHR")
    }

    /// Current drawable size in pixels.
    pub fn inner_extent(&self) -> vk::Extent2D {
        let size = self.inner.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    pub fn show(&self) {
        self.inner.set_visible(true);
    }

    pub fn hide(&self) {
        self.inner.set_visible(false);
    }

    pub fn request_redraw(&self) {
        self.inner.request_redraw();
    }
}
