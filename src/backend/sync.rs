// Per-image frame resources
//
// Command buffers for every role, one fence per swapchain image, and the two
// semaphores shared by every frame. Sized to the image count of the
// presentation pipeline they were built for; rebuilt whenever it is.

use ash::vk;
use std::sync::Arc;

use super::error::{Result, VkContext};
use super::handle::Owned;
use super::queues::{LogicalDevice, QueueRole};

/// How many of each per-frame object a swapchain of N images needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub image_count: usize,
    pub framebuffers: usize,
    pub fences: usize,
    /// Per role; there are three roles.
    pub command_buffers_per_role: usize,
    pub semaphores: usize,
}

impl FrameLayout {
    pub fn for_images(image_count: usize) -> Self {
        Self {
            image_count,
            framebuffers: image_count,
            fences: image_count,
            command_buffers_per_role: image_count,
            semaphores: SEMAPHORE_COUNT,
        }
    }

    pub fn command_buffers(&self) -> usize {
        self.command_buffers_per_role * QueueRole::ALL.len()
    }
}

const SEMAPHORE_COUNT: usize = 2;
const PRESENT_COMPLETED: usize = 0;
const RENDER_COMPLETED: usize = 1;

/// N primary command buffers from one pool, freed back to it on drop.
struct CommandBuffers {
    device: Arc<ash::Device>,
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandBuffers {
    fn allocate(device: &Arc<ash::Device>, pool: vk::CommandPool, count: usize) -> Result<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);

        let buffers = unsafe { device.allocate_command_buffers(&alloc_info) }
            .vk_context("vkAllocateCommandBuffers")?;

        Ok(Self {
            device: Arc::clone(device),
            pool,
            buffers,
        })
    }
}

impl Drop for CommandBuffers {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            unsafe { self.device.free_command_buffers(self.pool, &self.buffers) };
        }
    }
}

pub(crate) struct FrameResources {
    /// Present-completed (signaled by acquire, waited on by the submit),
    /// then render-completed (signaled by the submit, waited on by present).
    semaphores: [Owned<vk::Semaphore>; SEMAPHORE_COUNT],
    fences: Vec<Owned<vk::Fence>>,
    graphics: CommandBuffers,
    compute: CommandBuffers,
    transfer: CommandBuffers,
}

impl FrameResources {
    pub fn new(logical: &LogicalDevice, layout: FrameLayout) -> Result<Self> {
        let device = logical.device();
        let per_role = layout.command_buffers_per_role;

        let graphics = CommandBuffers::allocate(device, logical.pool(QueueRole::Graphics), per_role)?;
        let compute = CommandBuffers::allocate(device, logical.pool(QueueRole::Compute), per_role)?;
        let transfer = CommandBuffers::allocate(device, logical.pool(QueueRole::Transfer), per_role)?;

        // Signaled so the first wait on each image index returns at once.
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let fences = (0..layout.fences)
            .map(|_| {
                let fence = unsafe { device.create_fence(&fence_info, None) }
                    .vk_context("vkCreateFence")?;
                Ok(Owned::new(device, fence))
            })
            .collect::<Result<Vec<_>>>()?;

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let create_semaphore = || -> Result<Owned<vk::Semaphore>> {
            let semaphore = unsafe { device.create_semaphore(&semaphore_info, None) }
                .vk_context("vkCreateSemaphore")?;
            Ok(Owned::new(device, semaphore))
        };
        let present_completed = create_semaphore()?;
        let render_completed = create_semaphore()?;

        Ok(Self {
            semaphores: [present_completed, render_completed],
            fences,
            graphics,
            compute,
            transfer,
        })
    }

    pub fn present_completed(&self) -> vk::Semaphore {
        self.semaphores[PRESENT_COMPLETED].handle()
    }

    pub fn render_completed(&self) -> vk::Semaphore {
        self.semaphores[RENDER_COMPLETED].handle()
    }

    pub fn command_buffer(&self, role: QueueRole, image_index: usize) -> vk::CommandBuffer {
        self.role(role).buffers[image_index]
    }

    pub fn fence(&self, image_index: usize) -> vk::Fence {
        self.fences[image_index].handle()
    }

    pub fn fence_count(&self) -> usize {
        self.fences.len()
    }

    /// Total across all three roles.
    pub fn command_buffer_count(&self) -> usize {
        QueueRole::ALL
            .iter()
            .map(|&role| self.role(role).buffers.len())
            .sum()
    }

    pub fn semaphore_count(&self) -> usize {
        self.semaphores.len()
    }

    fn role(&self, role: QueueRole) -> &CommandBuffers {
        match role {
            QueueRole::Graphics => &self.graphics,
            QueueRole::Compute => &self.compute,
            QueueRole::Transfer => &self.transfer,
        }
    }
}
