// Capability query
//
// Works out which instance layers and extensions to request. Pure query:
// nothing is created here.

use ash::vk;
use std::ffi::{c_char, CStr};

use super::error::{Result, VkContext};
use crate::window::Window;

/// The Khronos validation layer, enabled when validation is requested and installed.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Choose the layers to enable from the names installed on the host.
///
/// Only the validation layer is ever requested, and only if it is present.
pub fn select_layers<'a, I>(installed: I, validation: bool) -> Vec<&'static CStr>
where
    I: IntoIterator<Item = &'a CStr>,
{
    if validation && installed.into_iter().any(|name| name == VALIDATION_LAYER) {
        vec![VALIDATION_LAYER]
    } else {
        Vec::new()
    }
}

/// Scan the host's installed layers.
pub fn instance_layers(entry: &ash::Entry, validation: bool) -> Result<Vec<&'static CStr>> {
    if !validation {
        return Ok(Vec::new());
    }

    let properties: Vec<vk::LayerProperties> = unsafe { entry.enumerate_instance_layer_properties() }
        .vk_context("vkEnumerateInstanceLayerProperties")?;

    let layers = select_layers(
        properties
            .iter()
            .map(|p| unsafe { CStr::from_ptr(p.layer_name.as_ptr()) }),
        true,
    );

    if layers.is_empty() {
        log::warn!(
            "Validation requested but {} is not installed",
            VALIDATION_LAYER.to_string_lossy()
        );
    }

    Ok(layers)
}

/// Instance extensions the windowing platform needs for presentation.
///
/// Headless mode needs none. A platform that cannot report its extensions
/// is a fatal configuration error.
pub fn instance_extensions(window: Option<&Window>) -> Result<Vec<*const c_char>> {
    match window {
        Some(window) => Ok(window.required_extensions()?.to_vec()),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_layer_selected_only_when_installed() {
        let installed = [c"VK_LAYER_MESA_device_select", VALIDATION_LAYER];
        assert_eq!(select_layers(installed, true), vec![VALIDATION_LAYER]);

        let missing = [c"VK_LAYER_MESA_device_select"];
        assert!(select_layers(missing, true).is_empty());
    }

    #[test]
    fn no_layers_when_validation_disabled() {
        assert!(select_layers([VALIDATION_LAYER], false).is_empty());
    }

    #[test]
    fn headless_needs_no_extensions() {
        assert!(instance_extensions(None).unwrap().is_empty());
    }
}
