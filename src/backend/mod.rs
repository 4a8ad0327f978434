// Backend - Vulkan device and presentation layer
//
// Everything under here is crate-private except the `Device` handle, its
// error type, and the pure selection/planning types that tests and callers
// may inspect.

pub mod capability;
pub mod device;
pub mod error;
mod frame;
mod handle;
mod instance;
pub mod pipeline;
pub mod queues;
pub mod selector;
mod surface;
pub mod swapchain;
mod sync;

pub use device::{Device, DeviceDesc, PresentationInfo};
pub use error::{DeviceError, Result};
pub use queues::{QueuePlan, QueueRole, QueueSlot};
pub use selector::{Candidate, DeviceRank, QueueFamilyInfo};
pub use sync::FrameLayout;
