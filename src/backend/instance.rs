// Vulkan instance
//
// Responsibilities:
// - Load the Vulkan library
// - Fill the driver's application-info record from the process app info
// - Enable the validation layer and route its messages into `log`

use ash::vk;
use std::ffi::{c_char, CStr, CString};

use super::capability::{self, VALIDATION_LAYER};
use super::error::{DeviceError, Result, VkContext};
use crate::app_info::{self, ENGINE_VERSION};
use crate::window::Window;

/// Engine name reported to the driver.
pub const ENGINE_NAME: &CStr = c"clearframe";

/// Severities the validation messenger subscribes to. Verbose loader
/// chatter is left out.
const MESSENGER_SEVERITIES: vk::DebugUtilsMessageSeverityFlagsEXT =
    vk::DebugUtilsMessageSeverityFlagsEXT::from_raw(
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR.as_raw()
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING.as_raw()
            | vk::DebugUtilsMessageSeverityFlagsEXT::INFO.as_raw(),
    );

/// Loaded library, instance and optional validation messenger.
pub(crate) struct InstanceContext {
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    pub instance: ash::Instance,
    pub entry: ash::Entry,
}

impl InstanceContext {
    pub fn new(window: Option<&Window>, enable_validation: bool) -> Result<Self> {
        let entry =
            unsafe { ash::Entry::load() }.map_err(|e| DeviceError::Loader(e.to_string()))?;

        let layers = capability::instance_layers(&entry, enable_validation)?;
        let mut extensions = capability::instance_extensions(window)?;
        let validation = layers.contains(&VALIDATION_LAYER);
        if validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let info = app_info::get();
        let app_name = CString::new(info.name.as_str())
            .map_err(|_| DeviceError::InvalidState("application name contains a NUL byte".into()))?;

        let app = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(info.version.packed())
            .engine_name(ENGINE_NAME)
            .engine_version(ENGINE_VERSION.packed())
            .api_version(vk::API_VERSION_1_3);

        let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extensions);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .vk_context("vkCreateInstance")?;

        log::info!(
            "Created Vulkan instance for {} {} ({} layer(s), {} extension(s))",
            info.name,
            info.version,
            layer_names.len(),
            extensions.len()
        );

        let mut context = Self {
            debug_utils: None,
            instance,
            entry,
        };

        if validation {
            context.debug_utils = Some(context.setup_debug_messenger()?);
        }

        Ok(context)
    }

    fn setup_debug_messenger(
        &self,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(&self.entry, &self.instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(MESSENGER_SEVERITIES)
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .vk_context("vkCreateDebugUtilsMessengerEXT")?;

        Ok((debug_utils, messenger))
    }
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("Vulkan instance destroyed");
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    log::log!(log_level(message_severity), "[Vulkan] {message}");

    vk::FALSE
}

/// Validation messages are forwarded as error, warn or debug.
fn log_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else {
        log::Level::Debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_map_to_log_levels() {
        assert_eq!(log_level(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR), log::Level::Error);
        assert_eq!(log_level(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING), log::Level::Warn);
        assert_eq!(log_level(vk::DebugUtilsMessageSeverityFlagsEXT::INFO), log::Level::Debug);
    }

    #[test]
    fn every_subscribed_severity_has_a_level() {
        let levels: Vec<log::Level> = [
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
            vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        ]
        .into_iter()
        .filter(|&severity| MESSENGER_SEVERITIES.contains(severity))
        .map(log_level)
        .collect();

        assert_eq!(levels, [log::Level::Error, log::Level::Warn, log::Level::Debug]);
    }
}
