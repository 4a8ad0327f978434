// Device - the public handle over every GPU resource
//
// Construction order:
//   instance -> surface -> physical device -> logical device + queues + pools
//   -> presentation pipeline -> frame resources -> show window
//
// Field order is the teardown order. A `?` anywhere in `new` drops the
// locals built so far in reverse, so a failed construction leaves nothing
// behind.

use ash::vk;

use super::error::{DeviceError, Result};
use super::frame::{self, FrameFailure};
use super::instance::InstanceContext;
use super::pipeline::PresentationPipeline;
use super::queues::{LogicalDevice, QueuePlan};
use super::selector::{self, Candidate};
use super::surface::Surface;
use super::sync::FrameResources;
use crate::window::Window;

/// Options for [`Device::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceDesc {
    /// Request the Khronos validation layer. Ignored in release builds.
    pub enable_validation: bool,
}

/// Counts and formats of a windowed device's presentation resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationInfo {
    pub image_count: usize,
    pub framebuffer_count: usize,
    pub fence_count: usize,
    /// Graphics, compute and transfer buffers together.
    pub command_buffer_count: usize,
    pub semaphore_count: usize,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

/// A logical GPU device, optionally presenting to a window.
pub struct Device {
    frame: Option<FrameResources>,
    pipeline: Option<PresentationPipeline>,
    surface: Option<Surface>,
    logical: LogicalDevice,
    adapter: Candidate,
    instance: InstanceContext,
    window: Option<Window>,
}

impl Device {
    /// Create a device. Without a window the device is headless: it has
    /// queues and pools but no surface, swapchain or frame resources.
    pub fn new(desc: &DeviceDesc, window: Option<Window>) -> Result<Self> {
        let enable_validation = cfg!(debug_assertions) && desc.enable_validation;
        let instance = InstanceContext::new(window.as_ref(), enable_validation)?;

        let surface = window
            .as_ref()
            .map(|window| Surface::new(&instance, window))
            .transpose()?;
        let windowed = surface.is_some();

        let candidates = selector::enumerate(
            &instance.instance,
            surface.as_ref().map(|s| (s.loader(), s.handle())),
        )?;
        log::debug!("Enumerated {} physical device(s)", candidates.len());
        let adapter = selector::pick_best(candidates, windowed)?;

        log::info!(
            "Selected GPU: {} ({:?}, API {}.{}.{})",
            adapter.name,
            adapter.rank,
            vk::api_version_major(adapter.api_version),
            vk::api_version_minor(adapter.api_version),
            vk::api_version_patch(adapter.api_version)
        );

        let logical = LogicalDevice::new(&instance.instance, &adapter, windowed)?;

        let (pipeline, frame) = match (&surface, &window) {
            (Some(surface), Some(window)) => {
                let (pipeline, frame) = build_presentation(
                    &instance,
                    &logical,
                    adapter.handle,
                    surface,
                    window.inner_extent(),
                )?;
                (Some(pipeline), Some(frame))
            }
            _ => (None, None),
        };

        if let Some(window) = &window {
            window.show();
        }

        Ok(Self {
            frame,
            pipeline,
            surface,
            logical,
            adapter,
            instance,
            window,
        })
    }

    /// Shorthand for a device with no window.
    pub fn headless(desc: &DeviceDesc) -> Result<Self> {
        Self::new(desc, None)
    }

    /// Acquire, clear to `(r, g, b, 1.0)`, submit and present one frame.
    ///
    /// Blocks until a swapchain image is available and its previous
    /// submission has finished. Returns true when the swapchain should be
    /// recreated before the next frame.
    pub fn clear_and_present(&mut self, r: f32, g: f32, b: f32) -> Result<bool> {
        let (Some(pipeline), Some(frame)) = (&self.pipeline, &self.frame) else {
            return Err(missing_presentation(self.is_headless()));
        };

        match frame::clear_and_present(&self.logical, pipeline, frame, [r, g, b]) {
            Ok(suboptimal) => Ok(suboptimal),
            Err(FrameFailure { stage, error }) => {
                // A reset fence with nothing submitted would block the next
                // frame forever; drop the chain so the caller has to recreate.
                if stage.strands_fence() {
                    log::error!("Frame failed at {stage:?}: {error}; presentation released");
                    self.release_presentation();
                }
                Err(error)
            }
        }
    }

    /// Rebuild the swapchain and everything sized by it against the
    /// surface's current state.
    pub fn recreate_swapchain(&mut self) -> Result<()> {
        let (Some(surface), Some(window)) = (&self.surface, &self.window) else {
            return Err(DeviceError::Headless);
        };

        let extent = window.inner_extent();
        if extent.width == 0 || extent.height == 0 {
            return Err(DeviceError::InvalidState(
                "cannot recreate the swapchain for a zero-sized window".into(),
            ));
        }

        self.logical.wait_idle()?;

        // Only one swapchain may exist per surface, so the old chain goes
        // before the new one is built.
        self.frame = None;
        self.pipeline = None;

        let (pipeline, frame) = build_presentation(
            &self.instance,
            &self.logical,
            self.adapter.handle,
            surface,
            extent,
        )?;
        self.pipeline = Some(pipeline);
        self.frame = Some(frame);

        log::info!("Swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(())
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.logical.wait_idle()
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter.name
    }

    pub fn is_headless(&self) -> bool {
        self.window.is_none()
    }

    /// `None` for headless devices and after a failed recreation.
    pub fn presentation_info(&self) -> Option<PresentationInfo> {
        let pipeline = self.pipeline.as_ref()?;
        let frame = self.frame.as_ref()?;
        let swapchain = pipeline.swapchain();

        Some(PresentationInfo {
            image_count: pipeline.image_count(),
            framebuffer_count: pipeline.framebuffer_count(),
            fence_count: frame.fence_count(),
            command_buffer_count: frame.command_buffer_count(),
            semaphore_count: frame.semaphore_count(),
            format: swapchain.format().format,
            extent: swapchain.extent(),
        })
    }

    /// Queue assignment the logical device was created with.
    pub fn queue_plan(&self) -> &QueuePlan {
        self.logical.plan()
    }

    /// Wait for the GPU, then drop frame resources and the pipeline.
    fn release_presentation(&mut self) {
        if let Err(e) = self.logical.wait_idle() {
            log::warn!("wait_idle before releasing presentation failed: {e}");
        }
        self.frame = None;
        self.pipeline = None;
    }
}

fn missing_presentation(headless: bool) -> DeviceError {
    if headless {
        DeviceError::Headless
    } else {
        DeviceError::InvalidState("presentation resources are missing; recreate the swapchain".into())
    }
}

fn build_presentation(
    instance: &InstanceContext,
    logical: &LogicalDevice,
    physical: vk::PhysicalDevice,
    surface: &Surface,
    window_extent: vk::Extent2D,
) -> Result<(PresentationPipeline, FrameResources)> {
    let pipeline = PresentationPipeline::new(
        &instance.instance,
        logical.device(),
        physical,
        surface,
        window_extent,
    )?;
    let frame = FrameResources::new(logical, pipeline.layout())?;
    Ok((pipeline, frame))
}

impl Drop for Device {
    fn drop(&mut self) {
        log::info!("Destroying device ({})", self.adapter.name);
        if let Err(e) = self.logical.wait_idle() {
            log::error!("Failed to wait for device idle during teardown: {e}");
        }
    }
}
