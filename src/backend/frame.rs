// Frame cycle
//
// acquire -> wait on the image's fence -> record a clear-only render pass
// -> reset fence and submit -> present
//
// Strictly sequential. How far the CPU can run ahead is bounded by the
// per-image fences alone.

use ash::vk;

use super::error::{DeviceError, Result, VkContext};
use super::pipeline::PresentationPipeline;
use super::queues::{LogicalDevice, QueueRole};
use super::sync::FrameResources;

/// Step of the frame cycle a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameStage {
    Acquire,
    Wait,
    Record,
    ResetFence,
    Submit,
    Present,
}

impl FrameStage {
    /// Whether a failure here can leave the image's fence unsignaled with
    /// no submission pending to signal it. The next wait on that fence
    /// would never return.
    pub fn strands_fence(self) -> bool {
        matches!(self, Self::ResetFence | Self::Submit)
    }

    fn fail(self) -> impl FnOnce(DeviceError) -> FrameFailure {
        move |error| FrameFailure { stage: self, error }
    }
}

#[derive(Debug)]
pub(crate) struct FrameFailure {
    pub stage: FrameStage,
    pub error: DeviceError,
}

/// Color attachment clear (alpha fixed at 1.0), then depth 1.0 / stencil 0.
pub fn clear_values(r: f32, g: f32, b: f32) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [r, g, b, 1.0],
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ]
}

/// Run one full frame. Returns true when presentation reported the
/// swapchain as suboptimal or out of date.
pub(crate) fn clear_and_present(
    logical: &LogicalDevice,
    pipeline: &PresentationPipeline,
    frame: &FrameResources,
    rgb: [f32; 3],
) -> std::result::Result<bool, FrameFailure> {
    let device = logical.device();
    let swapchain = pipeline.swapchain();

    let image_index = swapchain
        .acquire_next_image(frame.present_completed())
        .map_err(FrameStage::Acquire.fail())?;
    let index = image_index as usize;

    let fence = frame.fence(index);
    unsafe { device.wait_for_fences(&[fence], true, u64::MAX) }
        .vk_context("vkWaitForFences")
        .map_err(FrameStage::Wait.fail())?;

    let cmd = frame.command_buffer(QueueRole::Graphics, index);
    let [r, g, b] = rgb;
    record_clear(device, pipeline, cmd, index, clear_values(r, g, b))
        .map_err(FrameStage::Record.fail())?;

    let wait_semaphores = [frame.present_completed()];
    let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
    let signal_semaphores = [frame.render_completed()];
    let command_buffers = [cmd];

    let submit_info = vk::SubmitInfo::default()
        .wait_semaphores(&wait_semaphores)
        .wait_dst_stage_mask(&wait_stages)
        .command_buffers(&command_buffers)
        .signal_semaphores(&signal_semaphores);

    let graphics_queue = logical.queue(QueueRole::Graphics);
    unsafe { device.reset_fences(&[fence]) }
        .vk_context("vkResetFences")
        .map_err(FrameStage::ResetFence.fail())?;
    unsafe { device.queue_submit(graphics_queue, &[submit_info], fence) }
        .vk_context("vkQueueSubmit")
        .map_err(FrameStage::Submit.fail())?;

    swapchain
        .present(graphics_queue, image_index, frame.render_completed())
        .map_err(FrameStage::Present.fail())
}

fn record_clear(
    device: &ash::Device,
    pipeline: &PresentationPipeline,
    cmd: vk::CommandBuffer,
    index: usize,
    clear_values: [vk::ClearValue; 2],
) -> Result<()> {
    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: pipeline.swapchain().extent(),
    };

    unsafe {
        device
            .begin_command_buffer(cmd, &vk::CommandBufferBeginInfo::default())
            .vk_context("vkBeginCommandBuffer")?;

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(pipeline.render_pass())
            .framebuffer(pipeline.framebuffer(index))
            .render_area(render_area)
            .clear_values(&clear_values);
        device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
        device.cmd_end_render_pass(cmd);

        device
            .end_command_buffer(cmd)
            .vk_context("vkEndCommandBuffer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_values_fix_alpha_depth_and_stencil() {
        let [color, depth] = clear_values(0.25, 0.5, 0.75);
        unsafe {
            assert_eq!(color.color.float32, [0.25, 0.5, 0.75, 1.0]);
            assert_eq!(depth.depth_stencil.depth, 1.0);
            assert_eq!(depth.depth_stencil.stencil, 0);
        }
    }

    #[test]
    fn only_failures_between_reset_and_submit_strand_the_fence() {
        use FrameStage::*;

        for stage in [Acquire, Wait, Record, Present] {
            assert!(!stage.strands_fence(), "{stage:?}");
        }
        for stage in [ResetFence, Submit] {
            assert!(stage.strands_fence(), "{stage:?}");
        }
    }

    #[test]
    fn failure_keeps_stage_and_error() {
        let failure = FrameStage::Submit.fail()(DeviceError::Vulkan {
            context: "vkQueueSubmit",
            result: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
        });
        assert_eq!(failure.stage, FrameStage::Submit);
        assert!(matches!(
            failure.error,
            DeviceError::Vulkan {
                result: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
                ..
            }
        ));
    }
}
