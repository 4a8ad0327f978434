// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen.
// Vsync-locked (FIFO), which every implementation supports.

use ash::vk;
use std::sync::Arc;

use super::error::{Result, VkContext};
use super::surface::Surface;

/// Image count asked for before clamping to what the surface allows.
pub const PREFERRED_IMAGE_COUNT: u32 = 2;

/// `clamp(2, min, max)`, where a reported max of 0 means "no limit".
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let max = match caps.max_image_count {
        0 => u32::MAX,
        max => max.max(caps.min_image_count),
    };
    PREFERRED_IMAGE_COUNT.clamp(caps.min_image_count, max)
}

/// The surface's current extent, or the window size clamped to the
/// surface limits when the surface leaves it to the swapchain.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: window
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: window
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

fn choose_composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::INHERIT,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    ]
    .into_iter()
    .find(|&mode| supported.contains(mode))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

pub(crate) struct Swapchain {
    loader: ash::khr::swapchain::Device,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    pub fn new(
        instance: &ash::Instance,
        device: &Arc<ash::Device>,
        physical: vk::PhysicalDevice,
        surface: &Surface,
        window_extent: vk::Extent2D,
    ) -> Result<Self> {
        let caps = surface.capabilities(physical)?;
        let format = surface.first_format(physical)?;
        let image_count = choose_image_count(&caps);
        let extent = choose_extent(&caps, window_extent);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(caps.supported_usage_flags)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(choose_composite_alpha(caps.supported_composite_alpha))
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true);

        let loader = ash::khr::swapchain::Device::new(instance, device);
        let handle = unsafe { loader.create_swapchain(&create_info, None) }
            .vk_context("vkCreateSwapchainKHR")?;

        let images = match unsafe { loader.get_swapchain_images(handle) } {
            Ok(images) => images,
            Err(result) => {
                unsafe { loader.destroy_swapchain(handle, None) };
                return Err(result).vk_context("vkGetSwapchainImagesKHR");
            }
        };

        log::info!(
            "Created swapchain: {} image(s) (asked for {}), {:?}/{:?}, {}x{}",
            images.len(),
            image_count,
            format.format,
            format.color_space,
            extent.width,
            extent.height
        );

        Ok(Self {
            loader,
            handle,
            images,
            format,
            extent,
        })
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Next presentable image; `signal` fires once the engine releases it.
    /// Blocks without a timeout.
    pub fn acquire_next_image(&self, signal: vk::Semaphore) -> Result<u32> {
        let (index, suboptimal) = unsafe {
            self.loader
                .acquire_next_image(self.handle, u64::MAX, signal, vk::Fence::null())
        }
        .vk_context("vkAcquireNextImageKHR")?;

        if suboptimal {
            log::debug!("Acquired image {index} from a suboptimal swapchain");
        }
        Ok(index)
    }

    /// Queue `image_index` for presentation after `wait` is signaled.
    ///
    /// Returns true when the swapchain no longer matches the surface and
    /// should be recreated.
    pub fn present(&self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> Result<bool> {
        let wait_semaphores = [wait];
        let swapchains = [self.handle];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(result) => Err(result).vk_context("vkQueuePresentKHR"),
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_swapchain(self.handle, None) };
    }
}
