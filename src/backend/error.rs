// Device errors
//
// Every failure during device construction or the frame cycle surfaces
// synchronously as one of these. Nothing is retried internally.

use ash::vk;
use thiserror::Error;

use super::queues::QueueRole;

/// Errors raised by [`Device`](super::Device) construction and frame operations.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The Vulkan loader library could not be loaded.
    #[error("Failed to load Vulkan library: {0}")]
    Loader(String),

    /// Windowing or platform query failure, carrying the platform's own text.
    #[error("Platform error: {0}")]
    Platform(String),

    /// No enumerated accelerator passed the capability filter.
    #[error("No suitable physical device found")]
    NoSuitableDevice,

    /// More queues were requested from a family than it reports.
    #[error(
        "Requested {requested} queue(s) from family {family}, but the hardware supports {available}"
    )]
    QueueOversubscribed {
        family: u32,
        requested: u32,
        available: u32,
    },

    /// A queue role found no family advertising its capability.
    #[error("No queue family supports the {0:?} role")]
    MissingQueueRole(QueueRole),

    /// A Vulkan call failed.
    #[error("{context} failed: {result}")]
    Vulkan {
        context: &'static str,
        result: vk::Result,
    },

    /// No device-local memory type matches an image's requirements.
    #[error("No device-local memory type matches the requirements")]
    NoMemoryType,

    /// A presentation operation was called on a device created without a window.
    #[error("Device is headless: no swapchain exists")]
    Headless,

    /// The device is not in a state that allows the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, DeviceError>;

/// Attach the name of the failing call to a raw `vk::Result`.
pub(crate) trait VkContext<T> {
    fn vk_context(self, context: &'static str) -> Result<T>;
}

impl<T> VkContext<T> for std::result::Result<T, vk::Result> {
    fn vk_context(self, context: &'static str) -> Result<T> {
        self.map_err(|result| DeviceError::Vulkan { context, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vk_context_names_the_failing_call() {
        let failed: std::result::Result<(), vk::Result> =
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let err = failed.vk_context("vkAllocateMemory").unwrap_err();

        assert!(matches!(
            err,
            DeviceError::Vulkan {
                context: "vkAllocateMemory",
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            }
        ));
        assert!(err.to_string().starts_with("vkAllocateMemory failed"));
    }

    #[test]
    fn oversubscription_message_mentions_family_and_counts() {
        let err = DeviceError::QueueOversubscribed {
            family: 2,
            requested: 3,
            available: 1,
        };
        let text = err.to_string();
        assert!(text.contains("family 2"));
        assert!(text.contains('3'));
        assert!(text.contains('1'));
    }
}
