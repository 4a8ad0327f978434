// =============================================================================
// CLEARFRAME DEMO - open a window and clear it every frame
// =============================================================================
//
// FRAME FLOW:
// 1. winit asks for a redraw
// 2. Device::clear_and_present: acquire -> wait fence -> record -> submit -> present
// 3. Request the next redraw
//
// Resizes and suboptimal presents mark the swapchain for recreation, which
// happens at the start of the next frame.
// =============================================================================

use anyhow::{Context, Result};
use clearframe::{app_info, logging, Config, Device, DeviceDesc, DeviceError, Window};
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::WindowId,
};

fn main() -> Result<()> {
    let config = Config::load();
    logging::init(&config);

    let info = config.app_info()?;
    log::info!("Starting {} {}", info.name, info.version);
    app_info::init(info);

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

/// Field order matters for Drop: the device goes before the window it
/// presents to.
struct App {
    device: Option<Device>,
    window: Option<Window>,
    config: Config,

    /// Set by resize events and suboptimal presents.
    needs_recreate: bool,
    /// Window has a zero-sized client area; skip frames.
    is_minimized: bool,
    started: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            device: None,
            window: None,
            config,
            needs_recreate: false,
            is_minimized: false,
            started: Instant::now(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        // Hidden until the device has a complete presentation chain.
        let window = Window::create(
            event_loop,
            &self.config.window.title,
            self.config.window.width,
            self.config.window.height,
            false,
        )?;

        let desc = DeviceDesc {
            enable_validation: self.config.debug.validation_layers,
        };
        let device = Device::new(&desc, Some(window.clone()))?;

        if let Some(info) = device.presentation_info() {
            log::info!(
                "Presenting {} image(s) at {}x{} on {}",
                info.image_count,
                info.extent.width,
                info.extent.height,
                device.adapter_name()
            );
        }

        self.device = Some(device);
        self.window = Some(window);
        Ok(())
    }

    fn clear_color(&self) -> [f32; 3] {
        if !self.config.graphics.cycle_colors {
            return self.config.graphics.clear_color;
        }
        let hue = (self.started.elapsed().as_secs_f32() * 0.1).fract();
        hue_to_rgb(hue)
    }

    fn render_frame(&mut self) -> Result<()> {
        if self.is_minimized {
            return Ok(());
        }
        let [r, g, b] = self.clear_color();
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };

        if self.needs_recreate {
            device.recreate_swapchain()?;
            self.needs_recreate = false;
        }

        match device.clear_and_present(r, g, b) {
            Ok(suboptimal) => {
                self.needs_recreate |= suboptimal;
                Ok(())
            }
            Err(DeviceError::Vulkan {
                result: ash::vk::Result::ERROR_OUT_OF_DATE_KHR,
                ..
            }) => {
                self.needs_recreate = true;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Fully saturated color for a hue in [0, 1).
fn hue_to_rgb(hue: f32) -> [f32; 3] {
    let h = hue * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    match h as u32 {
        0 => [1.0, x, 0.0],
        1 => [x, 1.0, 0.0],
        2 => [0.0, 1.0, x],
        3 => [0.0, x, 1.0],
        4 => [x, 0.0, 1.0],
        _ => [1.0, 0.0, x],
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.device.is_some() {
            return;
        }

        if let Err(e) = self.init(event_loop) {
            log::error!("Failed to initialize device: {:#}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                if let Some(device) = &self.device {
                    if let Err(e) = device.wait_idle() {
                        log::error!("wait_idle failed: {e}");
                    }
                }
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.is_minimized = size.width == 0 || size.height == 0;
                if !self.is_minimized {
                    self.needs_recreate = true;
                }
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render_frame() {
                    log::error!("Render error: {:#}", e);
                    event_loop.exit();
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hue_wheel_hits_primaries() {
        assert_eq!(hue_to_rgb(0.0), [1.0, 0.0, 0.0]);
        assert_eq!(hue_to_rgb(0.25), [0.5, 1.0, 0.0]);
        assert_eq!(hue_to_rgb(0.5), [0.0, 1.0, 1.0]);
    }
}
