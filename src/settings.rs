//! Daemon settings and TOML parsing.
//!
//! Everything is optional. Example with the defaults:
//!
//! ```toml
//! log_level = "info"
//! log_file = "/var/log/inputcal.log"
//! grab_devices = true
//!
//! [output]
//! name = "inputcal virtual input"
//! width = 1920
//! height = 1080
//! axis_scale = 1000.0
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {message}")]
    ParseError { path: PathBuf, message: String },
}

/// Root of the TOML settings file.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    log_level: Option<String>,
    log_file: Option<String>,
    grab_devices: Option<bool>,
    #[serde(default)]
    output: RawOutput,
}

/// The `[output]` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawOutput {
    name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    axis_scale: Option<f32>,
}

/// Virtual output device parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Multiplier applied to slider values before they are sent as integers.
    pub axis_scale: f32,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            name: "inputcal virtual input".to_string(),
            width: 1920,
            height: 1080,
            axis_scale: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_level: String,
    pub log_file: Option<String>,
    /// Take exclusive access to the source devices.
    pub grab_devices: bool,
    pub output: OutputSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
            grab_devices: true,
            output: OutputSettings::default(),
        }
    }
}

/// Parse a TOML settings file, filling in defaults for absent keys.
pub fn parse_settings_file(path: &Path) -> Result<Settings, SettingsError> {
    let raw: RawSettings =
        toml::from_str(
            &fs::read_to_string(path).map_err(|e| SettingsError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })?,
        )
        .map_err(|e| SettingsError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let defaults = Settings::default();
    let output = OutputSettings {
        name: raw.output.name.unwrap_or(defaults.output.name),
        width: raw.output.width.unwrap_or(defaults.output.width),
        height: raw.output.height.unwrap_or(defaults.output.height),
        axis_scale: raw.output.axis_scale.unwrap_or(defaults.output.axis_scale),
    };
    if output.width == 0 || output.height == 0 {
        return Err(SettingsError::ParseError {
            path: path.to_path_buf(),
            message: "output width and height must be non-zero".to_string(),
        });
    }

    Ok(Settings {
        log_level: raw.log_level.unwrap_or(defaults.log_level),
        log_file: raw.log_file,
        grab_devices: raw.grab_devices.unwrap_or(defaults.grab_devices),
        output,
    })
}
