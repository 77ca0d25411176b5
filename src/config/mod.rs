//! Configuration management for wayshim
//!
//! Loads, validates and saves the TOML file describing the window to create
//! and how to present it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LogLevel;
use crate::present::{BackendKind, ChannelLayout};
use crate::shell::Geometry;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ShimConfig {
    /// Window identity and initial geometry
    #[serde(default)]
    pub window: WindowConfig,

    /// Presentation backend selection
    #[serde(default)]
    pub presentation: PresentationConfig,

    /// Decoration preferences
    #[serde(default)]
    pub decoration: DecorationConfig,

    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Toplevel title
    pub title: String,

    /// Application id (class on the legacy shell)
    pub app_id: String,

    /// Initial width in surface coordinates
    pub width: i32,

    /// Initial height in surface coordinates
    pub height: i32,

    /// Buffer attach offset
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PresentationConfig {
    /// `shm` or `gpu`
    pub backend: BackendKind,

    /// Wait for vertical sync on swap (GPU only)
    pub vsync: bool,

    /// Byte lane of each channel in a shm pixel
    pub channels: ChannelLayout,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecorationConfig {
    /// Ask the compositor to draw window chrome when it can
    pub prefer_server_side: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Debug logging
    pub debug: bool,

    /// Default log level by name; takes precedence over `debug`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Frame cap for the render loop, 0 = unlimited
    pub max_fps: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "wayshim".to_string(),
            app_id: "wayshim".to_string(),
            width: 320,
            height: 200,
            x: 0,
            y: 0,
        }
    }
}

impl WindowConfig {
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.width, self.height)
    }

    pub fn origin(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Shm,
            vsync: true,
            channels: ChannelLayout::default(),
        }
    }
}

impl Default for DecorationConfig {
    fn default() -> Self {
        Self {
            prefer_server_side: true,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: None,
            max_fps: 60,
        }
    }
}

impl GeneralConfig {
    /// `log_level` if it names a level, otherwise derived from `debug`
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::from_str)
            .unwrap_or_else(|| LogLevel::for_debug(self.debug))
    }
}

/// Resolve a leading `~` against `$HOME`
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Ok(Path::new(&home).join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

impl ShimConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_home(path.as_ref())?;

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: ShimConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.window.title.trim().is_empty() {
            anyhow::bail!("Invalid window title: must not be empty");
        }

        if self.window.width <= 0 || self.window.height <= 0 {
            anyhow::bail!(
                "Invalid window size {}x{}: both dimensions must be positive",
                self.window.width,
                self.window.height
            );
        }

        // Keep one buffer addressable by a single i32-sized pool
        if self.window.geometry().byte_len() > i32::MAX as usize {
            anyhow::bail!(
                "Invalid window size {}x{}: buffer would exceed 2 GiB",
                self.window.width,
                self.window.height
            );
        }

        if !self.presentation.channels.is_valid() {
            anyhow::bail!(
                "Invalid channel layout {:?}: offsets must be a permutation of 0..=3",
                self.presentation.channels
            );
        }

        if let Some(level) = &self.general.log_level {
            if LogLevel::from_str(level).is_none() {
                anyhow::bail!(
                    "Invalid log level '{}': expected trace, debug, info, warn or error",
                    level
                );
            }
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}
