//! Configuration file support for the label viewer.
//!
//! This module provides serialization and deserialization of viewer settings
//! and hotkeys, stored as JSON in the user's config directory. Web hosts
//! persist the JSON from [`AppConfig::to_json`] themselves.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HIDE_LABELS_WHEN_ZOOMING_COUNT, DEFAULT_KEEP_IN_VIEW, DEFAULT_SAVE_DEBOUNCE,
    DEFAULT_WHEEL_ZOOM_FACTOR,
};
use crate::keybindings::KeyBindings;
use crate::label_overlay::OverlayConfig;
use crate::movable_area::MovableAreaConfig;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Get the display name for this log level.
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
            LogLevel::Trace => "Trace",
        }
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Application configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Application name (for identification)
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Viewer preferences
    #[serde(default)]
    pub preferences: ViewerPreferences,

    /// Hotkey configuration
    #[serde(default)]
    pub keybindings: KeyBindings,
}

fn default_app_name() -> String {
    "labelview".to_string()
}

/// Preferences section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerPreferences {
    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Hide labels during zoom gestures above this many labels
    #[serde(default = "default_hide_labels_when_zooming_count")]
    pub hide_labels_when_zooming_count: usize,

    /// Treat this device as a slow renderer
    #[serde(default)]
    pub throttle_rendering: bool,

    /// Idle time before a text edit is saved, in milliseconds
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// Keep part of the image inside the viewport after panning
    #[serde(default = "default_limit_in_area")]
    pub limit_in_area: bool,

    /// Fraction of the image that must stay visible when `limit_in_area` is on
    #[serde(default = "default_keep_in_view")]
    pub keep_in_view: f32,

    /// Zoom factor per wheel notch
    #[serde(default = "default_wheel_zoom_factor")]
    pub wheel_zoom_factor: f32,
}

fn default_hide_labels_when_zooming_count() -> usize {
    DEFAULT_HIDE_LABELS_WHEN_ZOOMING_COUNT
}

fn default_save_debounce_ms() -> u64 {
    DEFAULT_SAVE_DEBOUNCE.as_millis() as u64
}

fn default_limit_in_area() -> bool {
    true
}

fn default_keep_in_view() -> f32 {
    DEFAULT_KEEP_IN_VIEW
}

fn default_wheel_zoom_factor() -> f32 {
    DEFAULT_WHEEL_ZOOM_FACTOR
}

impl Default for ViewerPreferences {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            hide_labels_when_zooming_count: default_hide_labels_when_zooming_count(),
            throttle_rendering: false,
            save_debounce_ms: default_save_debounce_ms(),
            limit_in_area: default_limit_in_area(),
            keep_in_view: default_keep_in_view(),
            wheel_zoom_factor: default_wheel_zoom_factor(),
        }
    }
}

impl ViewerPreferences {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn area_config(&self) -> MovableAreaConfig {
        MovableAreaConfig {
            limit_in_area: self.limit_in_area,
            keep_in_view: self.keep_in_view.clamp(0.0, 1.0),
        }
    }

    pub fn overlay_config(&self) -> OverlayConfig {
        OverlayConfig {
            hide_labels_when_zooming_count: self.hide_labels_when_zooming_count,
        }
    }
}

impl AppConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            app_name: default_app_name(),
            preferences: ViewerPreferences::default(),
            keybindings: KeyBindings::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Get the default filename for config export.
    pub fn default_filename() -> &'static str {
        "labelview-config.json"
    }

    /// Read configuration from an explicit file.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path for auto-load/save.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<std::path::PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("labelview").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("labelview")
                    .join(Self::default_filename())
            })
        }
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load_from_path(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Write configuration to a file, creating missing parent directories.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Save configuration to the default path and return that path.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_default_path(&self) -> Result<std::path::PathBuf, ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save_to_path(&path)?;
        Ok(path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
