//! Configuration: one TOML document, parsed once at startup.
//!
//! Every key is optional. Missing keys fall back to the defaults below, so an
//! empty file is a valid configuration for the 2.13" panel.
//!
//! ```toml
//! [display]
//! width = 250
//! height = 122
//! mode = "auto"
//!
//! [display.image_processing]
//! contrast_enhancement = 1.2
//!
//! [display.power_management]
//! full_clear_interval = 10
//! sleep_between_updates = true
//!
//! [frame]
//! photo_directory = "/home/pi/pictures"
//! refresh_interval = 300
//! random_order = true
//! supported_formats = [".jpg", ".jpeg", ".png"]
//!
//! [logging]
//! file = "picture_frame.log"
//! level = "INFO"
//! ```

use crate::DisplayGeometry;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Errors ─────────────────────────────────────────────────────────

/// Reasons a configuration file can be rejected. All of them are fatal.
#[derive(Debug)]
pub enum ConfigError {
    /// The file does not exist.
    NotFound(PathBuf),
    /// The file exists but could not be read.
    Io(PathBuf, std::io::Error),
    /// The file is not valid TOML or has a key of the wrong type.
    Parse(PathBuf, toml::de::Error),
    /// The values parse but make no sense together.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "config file not found: {}", path.display()),
            Self::Io(path, e) => write!(f, "failed to read config {}: {e}", path.display()),
            Self::Parse(path, e) => write!(f, "failed to parse config {}: {e}", path.display()),
            Self::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(_, e) => Some(e),
            Self::Parse(_, e) => Some(e),
            _ => None,
        }
    }
}

// ── Sections ───────────────────────────────────────────────────────

/// How the display adapter picks its panel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Try the hardware panel, fall back to simulation if it can't be opened.
    #[default]
    Auto,
    /// Hardware panel only; failing to open it is fatal.
    Hardware,
    /// Never touch hardware, write frames to disk.
    Simulation,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImageProcessingConfig {
    /// Contrast multiplier applied before dithering (1.0 = unchanged).
    pub contrast_enhancement: f32,
    /// Draw a black frame around every photo.
    pub border: bool,
    /// Border thickness in pixels, inset from the canvas edge.
    pub border_width: u32,
    /// Preferred font for status messages, e.g. "10x20" or "9x15_bold".
    pub font: String,
}

impl Default for ImageProcessingConfig {
    fn default() -> Self {
        Self {
            contrast_enhancement: 1.2,
            border: true,
            border_width: 1,
            font: "10x20".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PowerManagementConfig {
    /// Every Nth refresh is a full clear-and-redraw.
    pub full_clear_interval: u64,
    /// Put the panel into deep sleep after each update.
    pub sleep_between_updates: bool,
}

impl Default for PowerManagementConfig {
    fn default() -> Self {
        Self {
            full_clear_interval: 10,
            sleep_between_updates: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub mode: DisplayMode,
    /// Where the simulated panel writes its numbered frames.
    pub simulation_output: PathBuf,
    pub image_processing: ImageProcessingConfig,
    pub power_management: PowerManagementConfig,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let geometry = DisplayGeometry::default();
        Self {
            width: geometry.width,
            height: geometry.height,
            mode: DisplayMode::default(),
            simulation_output: PathBuf::from("test_output"),
            image_processing: ImageProcessingConfig::default(),
            power_management: PowerManagementConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlideshowConfig {
    pub photo_directory: PathBuf,
    /// Seconds between refreshes.
    pub refresh_interval: u64,
    pub random_order: bool,
    /// Extensions to pick up, matched case-insensitively. The leading dot is optional.
    pub supported_formats: Vec<String>,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            photo_directory: PathBuf::from("/home/pi/pictures"),
            refresh_interval: 300,
            random_order: true,
            supported_formats: vec![".jpg".into(), ".jpeg".into(), ".png".into()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: PathBuf,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("picture_frame.log"),
            level: "INFO".to_string(),
        }
    }
}

// ── Top level ──────────────────────────────────────────────────────

/// The whole configuration, built once in `main` and passed by reference.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub display: DisplayConfig,
    pub frame: SlideshowConfig,
    pub logging: LoggingConfig,
}

impl FrameConfig {
    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the rest of the program can't work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.geometry().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "display size must be non-zero, got {}x{}",
                self.display.width, self.display.height
            )));
        }
        if self.display.power_management.full_clear_interval == 0 {
            return Err(ConfigError::Invalid(
                "full_clear_interval must be at least 1".to_string(),
            ));
        }
        let contrast = self.display.image_processing.contrast_enhancement;
        if !contrast.is_finite() || contrast < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "contrast_enhancement must be a non-negative number, got {contrast}"
            )));
        }
        Ok(())
    }

    pub fn geometry(&self) -> DisplayGeometry {
        DisplayGeometry::new(self.display.width, self.display.height)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.frame.refresh_interval)
    }
}
