// Presentation pipeline
//
// Everything between the surface and the frame loop, built as a strict
// chain: swapchain -> depth/stencil image -> image views -> render pass ->
// framebuffers. Fields are declared in reverse of that order so dropping
// the struct (or bailing out of `new` halfway) releases in reverse
// dependency order.

use ash::vk;
use std::sync::Arc;

use super::error::{DeviceError, Result, VkContext};
use super::handle::Owned;
use super::surface::Surface;
use super::swapchain::Swapchain;
use super::sync::FrameLayout;

/// Combined 32-bit float depth and 8-bit stencil.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT_S8_UINT;

/// First memory type allowed by `type_bits` that is device-local.
/// Linear scan, first match wins.
pub fn find_device_local_type(memory: &vk::PhysicalDeviceMemoryProperties, type_bits: u32) -> Option<u32> {
    memory
        .memory_types
        .iter()
        .take(memory.memory_type_count as usize)
        .enumerate()
        .find(|(i, ty)| {
            type_bits & (1 << i) != 0
                && ty.property_flags.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL)
        })
        .map(|(i, _)| i as u32)
}

/// Depth/stencil image shared by every framebuffer.
struct DepthStencil {
    image: Owned<vk::Image>,
    _memory: Owned<vk::DeviceMemory>,
}

impl DepthStencil {
    fn new(
        device: &Arc<ash::Device>,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.create_image(&image_info, None) }
            .vk_context("vkCreateImage (depth/stencil)")?;
        let image = Owned::new(device, image);

        let requirements = unsafe { device.get_image_memory_requirements(image.handle()) };
        let memory_type_index =
            find_device_local_type(memory_properties, requirements.memory_type_bits)
                .ok_or(DeviceError::NoMemoryType)?;

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.allocate_memory(&alloc_info, None) }
            .vk_context("vkAllocateMemory (depth/stencil)")?;
        let memory = Owned::new(device, memory);

        unsafe { device.bind_image_memory(image.handle(), memory.handle(), 0) }
            .vk_context("vkBindImageMemory (depth/stencil)")?;

        Ok(Self {
            image,
            _memory: memory,
        })
    }
}

fn create_view(
    device: &Arc<ash::Device>,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> Result<Owned<vk::ImageView>> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    let view = unsafe { device.create_image_view(&create_info, None) }
        .vk_context("vkCreateImageView")?;
    Ok(Owned::new(device, view))
}

/// One subpass: color at attachment 0, depth/stencil at attachment 1.
fn create_render_pass(device: &Arc<ash::Device>, color_format: vk::Format) -> Result<Owned<vk::RenderPass>> {
    let color_attachment = vk::AttachmentDescription::default()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let depth_attachment = vk::AttachmentDescription::default()
        .format(DEPTH_FORMAT)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };

    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref);

    // The acquire semaphore is waited on at color-attachment output; make
    // the layout transition wait for it too.
    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        );

    let attachments = [color_attachment, depth_attachment];
    let subpasses = [subpass];
    let dependencies = [dependency];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    let render_pass = unsafe { device.create_render_pass(&create_info, None) }
        .vk_context("vkCreateRenderPass")?;
    Ok(Owned::new(device, render_pass))
}

/// One framebuffer per color view, each paired with the shared depth view.
fn create_framebuffers(
    device: &Arc<ash::Device>,
    color_views: &[Owned<vk::ImageView>],
    depth_view: vk::ImageView,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
) -> Result<Vec<Owned<vk::Framebuffer>>> {
    color_views
        .iter()
        .map(|color_view| {
            let attachments = [color_view.handle(), depth_view];
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = unsafe { device.create_framebuffer(&create_info, None) }
                .vk_context("vkCreateFramebuffer")?;
            Ok(Owned::new(device, framebuffer))
        })
        .collect()
}

pub(crate) struct PresentationPipeline {
    framebuffers: Vec<Owned<vk::Framebuffer>>,
    render_pass: Owned<vk::RenderPass>,
    _depth_view: Owned<vk::ImageView>,
    _color_views: Vec<Owned<vk::ImageView>>,
    _depth: DepthStencil,
    swapchain: Swapchain,
}

impl PresentationPipeline {
    pub fn new(
        instance: &ash::Instance,
        device: &Arc<ash::Device>,
        physical: vk::PhysicalDevice,
        surface: &Surface,
        window_extent: vk::Extent2D,
    ) -> Result<Self> {
        let swapchain = Swapchain::new(instance, device, physical, surface, window_extent)?;
        let extent = swapchain.extent();
        let format = swapchain.format().format;

        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical) };
        let depth = DepthStencil::new(device, &memory_properties, extent)?;

        let color_views = swapchain
            .images()
            .iter()
            .map(|&image| create_view(device, image, format, vk::ImageAspectFlags::COLOR))
            .collect::<Result<Vec<_>>>()?;
        let depth_view = create_view(
            device,
            depth.image.handle(),
            DEPTH_FORMAT,
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        )?;

        let render_pass = create_render_pass(device, format)?;
        let framebuffers = create_framebuffers(
            device,
            &color_views,
            depth_view.handle(),
            render_pass.handle(),
            extent,
        )?;

        log::debug!(
            "Presentation pipeline ready: {} framebuffer(s)",
            framebuffers.len()
        );

        Ok(Self {
            framebuffers,
            render_pass,
            _depth_view: depth_view,
            _color_views: color_views,
            _depth: depth,
            swapchain,
        })
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    pub fn framebuffer(&self, image_index: usize) -> vk::Framebuffer {
        self.framebuffers[image_index].handle()
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Number of swapchain images (N).
    pub fn image_count(&self) -> usize {
        self.swapchain.images().len()
    }

    /// Frame resource counts for this pipeline's images.
    pub fn layout(&self) -> FrameLayout {
        FrameLayout::for_images(self.image_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, &flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = flags;
        }
        props
    }

    const LOCAL: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_VISIBLE;

    #[test]
    fn first_allowed_device_local_type_wins() {
        let props = memory(&[HOST, LOCAL, LOCAL | HOST, LOCAL]);
        assert_eq!(find_device_local_type(&props, 0b1111), Some(1));
        assert_eq!(find_device_local_type(&props, 0b1100), Some(2));
        assert_eq!(find_device_local_type(&props, 0b1000), Some(3));
    }

    #[test]
    fn disallowed_or_host_only_types_are_skipped() {
        let props = memory(&[HOST, HOST | vk::MemoryPropertyFlags::HOST_COHERENT]);
        assert_eq!(find_device_local_type(&props, 0b11), None);

        let props = memory(&[LOCAL]);
        assert_eq!(find_device_local_type(&props, 0b10), None);
    }

    #[test]
    fn types_past_the_reported_count_are_ignored() {
        let mut props = memory(&[HOST]);
        props.memory_types[1].property_flags = LOCAL;
        assert_eq!(find_device_local_type(&props, u32::MAX), None);
    }
}
