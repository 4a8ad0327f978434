// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every section is optional; missing keys take their defaults and a missing
// or unreadable file falls back to `Config::default()`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::app_info::{AppInfo, AppVersion};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
}

/// Application identity reported to the driver
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "clearframe".to_string(),
            major: 0,
            minor: 1,
            patch: 0,
        }
    }
}

/// Window settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "clearframe".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Graphics settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphicsConfig {
    /// RGB in 0-1; alpha is always 1.0.
    pub clear_color: [f32; 3],
    /// Demo only: drift the hue over time instead of a fixed color.
    pub cycle_colors: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.1, 0.2, 0.8],
            cycle_colors: false,
        }
    }
}

/// Debug settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Only honored in debug builds.
    pub validation_layers: bool,
    /// env_logger filter; RUST_LOG overrides it.
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// The `[app]` section as an [`AppInfo`], with the version range-checked.
    pub fn app_info(&self) -> Result<AppInfo> {
        let version = AppVersion::new(self.app.major, self.app.minor, self.app.patch)
            .context("Invalid [app] version")?;
        Ok(AppInfo {
            name: self.app.name.clone(),
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.debug.log_level, "info");
        assert_eq!(config.window.width, 1280);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_toml_str(
            r#"
            [app]
            name = "demo"
            major = 2

            [graphics]
            clear_color = [1.0, 0.0, 0.5]
            "#,
        )
        .unwrap();

        assert_eq!(config.app.name, "demo");
        assert_eq!(config.app.major, 2);
        assert_eq!(config.app.minor, 1);
        assert_eq!(config.graphics.clear_color, [1.0, 0.0, 0.5]);
        assert!(!config.graphics.cycle_colors);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(Config::from_toml_str("[window]\nwidth = \"wide\"").is_err());
        assert!(Config::from_toml_str("[graphics]\nclear_color = [1.0, 0.0]").is_err());
    }

    #[test]
    fn app_section_becomes_app_info() {
        let config = Config::from_toml_str(
            r#"
            [app]
            name = "viewer"
            major = 1
            minor = 1023
            patch = 4095
            "#,
        )
        .unwrap();

        let info = config.app_info().unwrap();
        assert_eq!(info.name, "viewer");
        assert_eq!(info.version.major(), 1);
        assert_eq!(info.version.minor(), 1023);
        assert_eq!(info.version.patch(), 4095);
    }

    #[test]
    fn out_of_range_version_is_rejected() {
        let config = Config::from_toml_str("[app]\npatch = 4096").unwrap();
        assert!(config.app_info().is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_from_path("this/path/does/not/exist.toml").unwrap();
        assert_eq!(config, Config::default());
    }
}
