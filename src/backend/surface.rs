// Presentation surface bound to the window

use ash::vk;

use super::error::{DeviceError, Result, VkContext};
use super::instance::InstanceContext;
use crate::window::Window;

pub(crate) struct Surface {
    loader: ash::khr::surface::Instance,
    handle: vk::SurfaceKHR,
}

impl Surface {
    pub fn new(context: &InstanceContext, window: &Window) -> Result<Self> {
        let handle = unsafe { window.create_surface(&context.entry, &context.instance) }?;
        let loader = ash::khr::surface::Instance::new(&context.entry, &context.instance);
        Ok(Self { loader, handle })
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }

    pub fn capabilities(&self, physical: vk::PhysicalDevice) -> Result<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical, self.handle)
        }
        .vk_context("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")
    }

    /// The first format the surface reports. No ranking of alternatives.
    pub fn first_format(&self, physical: vk::PhysicalDevice) -> Result<vk::SurfaceFormatKHR> {
        let formats = unsafe {
            self.loader
                .get_physical_device_surface_formats(physical, self.handle)
        }
        .vk_context("vkGetPhysicalDeviceSurfaceFormatsKHR")?;

        formats
            .first()
            .copied()
            .ok_or_else(|| DeviceError::Platform("Surface reports no formats".into()))
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}
