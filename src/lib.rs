//! GPU device and swapchain lifecycle management over Vulkan.
//!
//! [`Device`] selects a physical accelerator, creates the logical device,
//! its queues and command pools and, when given a [`Window`], the whole
//! presentation chain. [`Device::clear_and_present`] runs one frame.

pub mod app_info;
pub mod backend;
pub mod config;
pub mod logging;
pub mod window;

pub use app_info::{AppInfo, AppInfoError, AppVersion};
pub use backend::{Device, DeviceDesc, DeviceError, PresentationInfo};
pub use config::Config;
pub use window::Window;
