//! Configuration file management
//!
//! Loads the TOML configuration file and provides the subsystem settings.
//! Default config path: ~/.config/bbx-input/config.toml

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::input::{CapabilityFilter, KeymapSpec, SubsystemOptions, Viewport};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which device categories to connect
    pub input: InputConfig,
    /// Hardware keyboard keymap
    pub hw_keyboard: HwKeyboardConfig,
    /// Display geometry for pointer coordinates
    pub display: DisplayConfig,
}

/// Device category switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub keyboard: bool,
    pub pointer: bool,
    pub touchscreen: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            keyboard: true,
            pointer: true,
            touchscreen: true,
        }
    }
}

/// Hardware keyboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HwKeyboardConfig {
    /// Translate key presses to text (false = navigation keys only)
    pub enabled: bool,
    /// XKB rules (empty = default)
    pub rules: String,
    /// XKB keyboard model (empty = default)
    pub model: String,
    /// XKB keyboard layout (e.g., "us", "de", empty = default)
    pub layout: String,
    /// XKB keyboard variant (empty = default)
    pub variant: String,
    /// XKB keyboard options (e.g., "ctrl:nocaps", empty = default)
    pub options: String,
}

impl Default for HwKeyboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: String::new(),
            model: String::new(),
            layout: String::new(),
            variant: String::new(),
            options: String::new(),
        }
    }
}

/// Display geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Logical resolution
    pub width: i32,
    pub height: i32,
    /// Physical resolution (0 = same as logical)
    pub physical_width: i32,
    pub physical_height: i32,
    /// Offset of the logical area inside the physical one
    pub offset_x: i32,
    pub offset_y: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            physical_width: 0,
            physical_height: 0,
            offset_x: 0,
            offset_y: 0,
        }
    }
}

impl DisplayConfig {
    pub fn viewport(&self) -> Viewport {
        let mut viewport = Viewport::new(self.width.max(1), self.height.max(1));
        if self.physical_width > 0 {
            viewport.physical_hor_res = self.physical_width;
        }
        if self.physical_height > 0 {
            viewport.physical_ver_res = self.physical_height;
        }
        viewport.offset_x = self.offset_x;
        viewport.offset_y = self.offset_y;
        viewport
    }
}

impl Config {
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/bbx-input/config.toml";

    /// Get the path that would be used for loading config
    /// Returns None if using built-in defaults
    pub fn config_path() -> Option<PathBuf> {
        // 1. BBX_INPUT_CONFIG environment variable
        if let Ok(path) = std::env::var("BBX_INPUT_CONFIG") {
            let p = Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }

        // 2. User config: ~/.config/bbx-input/config.toml
        if let Some(config_path) = default_config_path() {
            if config_path.exists() {
                return Some(config_path);
            }
        }

        // 3. System config: /etc/bbx-input/config.toml
        let system_config = Path::new(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load configuration with priority:
    /// 1. BBX_INPUT_CONFIG environment variable
    /// 2. ~/.config/bbx-input/config.toml (user config)
    /// 3. /etc/bbx-input/config.toml (system config)
    /// 4. Built-in defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_or_default(&path),
            None => {
                info!("Using built-in default config");
                Self::default()
            }
        }
    }

    /// Load a specific file, falling back to defaults if it is unusable
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from_file(path) {
            Ok(config) => {
                info!("Loaded config: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load config {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load settings from specified path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn filter(&self) -> CapabilityFilter {
        CapabilityFilter::from_switches(
            self.input.keyboard,
            self.input.pointer,
            self.input.touchscreen,
        )
    }

    /// Keymap to compile, None when text translation is disabled
    pub fn keymap_spec(&self) -> Option<KeymapSpec> {
        let kb = &self.hw_keyboard;
        kb.enabled.then(|| KeymapSpec {
            rules: kb.rules.clone(),
            model: kb.model.clone(),
            layout: kb.layout.clone(),
            variant: kb.variant.clone(),
            options: kb.options.clone(),
        })
    }

    pub fn subsystem_options(&self) -> SubsystemOptions {
        SubsystemOptions {
            filter: self.filter(),
            keymap: self.keymap_spec(),
        }
    }
}

/// Get default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bbx-input").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.filter(), CapabilityFilter::all());
        assert!(config.keymap_spec().is_some());
        assert_eq!(config.display.width, 800);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [input]
            touchscreen = false

            [hw_keyboard]
            layout = "de"
            options = "ctrl:nocaps"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.filter(),
            CapabilityFilter::KEYBOARD | CapabilityFilter::POINTER
        );
        let spec = config.keymap_spec().unwrap();
        assert_eq!(spec.layout, "de");
        assert_eq!(spec.options, "ctrl:nocaps");
        assert!(spec.rules.is_empty());
    }

    #[test]
    fn test_keyboard_translation_disabled() {
        let config = Config::parse("[hw_keyboard]\nenabled = false\n").unwrap();
        assert!(config.keymap_spec().is_none());
        assert!(config.subsystem_options().keymap.is_none());
    }

    #[test]
    fn test_viewport_from_display() {
        let config = Config::parse(
            "[display]\nwidth = 720\nheight = 1440\nphysical_width = 1080\noffset_x = 180\n",
        )
        .unwrap();
        let viewport = config.display.viewport();
        assert_eq!(viewport.hor_res, 720);
        assert_eq!(viewport.physical_hor_res, 1080);
        assert_eq!(viewport.physical_ver_res, 1440);
        assert_eq!(viewport.offset_x, 180);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        assert!(Config::parse("[input]\nkeyboard = \"yes\"\n").is_err());
    }
}
