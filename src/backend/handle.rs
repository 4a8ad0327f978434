// Owning guards for device-child handles
//
// Each guard destroys its handle when dropped. Structs that hold several
// guards declare them in reverse creation order, so field drop order is the
// reverse-dependency release order, and a `?` halfway through construction
// releases exactly what was already built.

use ash::vk;
use std::sync::Arc;

/// A Vulkan handle owned by a logical device.
pub(crate) trait DeviceChild: Copy {
    /// # Safety
    /// `device` must be the device that created the handle, and the handle
    /// must not be in use by the GPU.
    unsafe fn destroy(self, device: &ash::Device);
}

macro_rules! device_child {
    ($($handle:ty => $destroy:ident),* $(,)?) => {
        $(
            impl DeviceChild for $handle {
                unsafe fn destroy(self, device: &ash::Device) {
                    device.$destroy(self, None);
                }
            }
        )*
    };
}

device_child! {
    vk::Framebuffer => destroy_framebuffer,
    vk::RenderPass => destroy_render_pass,
    vk::ImageView => destroy_image_view,
    vk::Image => destroy_image,
    vk::DeviceMemory => free_memory,
    vk::Fence => destroy_fence,
    vk::Semaphore => destroy_semaphore,
    vk::CommandPool => destroy_command_pool,
}

/// Destroys the wrapped handle on drop.
pub(crate) struct Owned<H: DeviceChild> {
    device: Arc<ash::Device>,
    handle: H,
}

impl<H: DeviceChild> Owned<H> {
    /// Take ownership of a freshly created handle.
    pub fn new(device: &Arc<ash::Device>, handle: H) -> Self {
        Self {
            device: Arc::clone(device),
            handle,
        }
    }

    pub fn handle(&self) -> H {
        self.handle
    }
}

impl<H: DeviceChild> Drop for Owned<H> {
    fn drop(&mut self) {
        unsafe { self.handle.destroy(&self.device) }
    }
}
