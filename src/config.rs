//! Region configuration data structures and line-oriented parsing.
//!
//! The config file is a sequence of `key: value` lines. Example:
//!
//! ```text
//! device name: eGalax Inc. USB TouchController
//! calibration file: calibration.txt
//! subdivisions:
//! - type: button
//!   name: volume up
//!   id: 1
//!   top left x: 0
//!   top left y: 0
//!   bottom right x: 100
//!   bottom right y: 100
//!   key code: KEY_VOLUMEUP
//!   minimum repetition interval: 250
//! - type: slider
//!   name: fan speed
//!   id: 2
//!   top left x: 100
//!   top left y: 0
//!   bottom right x: 300
//!   bottom right y: 100
//!   orientation: horizontal
//!   minimum value: 0
//!   maximum value: 10
//! - type: touch
//!   name: display
//!   id: 3
//!   top left x: 0
//!   top left y: 100
//!   bottom right x: 800
//!   bottom right y: 480
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::calibration::CalibrationTransform;
use crate::keys::parse_key_code;
use crate::region::{ButtonRegion, Rect, Region, RegionKind, SliderRegion, TouchRegion};

/// Errors raised while loading the region or calibration config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed config file {path} (line {line}): {message}")]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn malformed(path: &Path, line: usize, message: impl Into<String>) -> Self {
        ConfigError::Malformed {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }
}

/// Fully parsed configuration. Region definitions never change after
/// parsing; only their press state does.
#[derive(Debug)]
pub struct ConfigModel {
    pub path: PathBuf,
    pub device_names: Vec<String>,
    pub regions: Vec<Region>,
    pub calibration: CalibrationTransform,
}

/// Region type named by a `- type:` list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RegionType {
    Touch,
    Button,
    Slider,
}

// -- Line handling --------------------------------------------

/// Cursor over the lines of a config document with one line of lookahead.
///
/// Blank lines are skipped transparently. `line_number` is the 1-based
/// number of the line most recently consumed.
pub struct LineCursor<'a> {
    lines: std::iter::Peekable<std::iter::Enumerate<std::str::Lines<'a>>>,
    line_number: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate().peekable(),
            line_number: 0,
        }
    }

    fn skip_blank(&mut self) {
        while self
            .lines
            .next_if(|(_, line)| line.trim().is_empty())
            .is_some()
        {}
    }

    /// Look at the next non-blank line without consuming it.
    pub fn peek_line(&mut self) -> Option<&'a str> {
        self.skip_blank();
        self.lines.peek().map(|(_, line)| *line)
    }

    /// Consume and return the next non-blank line.
    pub fn consume_line(&mut self) -> Option<&'a str> {
        self.skip_blank();
        let (index, line) = self.lines.next()?;
        self.line_number = index + 1;
        Some(line)
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

/// Split `key: value` at the first colon, trimming both halves.
///
/// Returns a message describing the problem when there is no colon or
/// when either half is blank.
pub fn split_line(line: &str) -> Result<(&str, &str), String> {
    let Some((key, value)) = line.split_once(':') else {
        return Err(format!("line '{}' has no ':'", line.trim()));
    };
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() {
        return Err(format!("line '{}' has an empty key", line.trim()));
    }
    if value.is_empty() {
        return Err(format!("key '{key}' has a blank value"));
    }
    Ok((key, value))
}

/// Parse `value` into `T`, describing the field on failure.
fn parse_field<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("cannot convert '{value}' for '{key}'"))
}

// -- Region fields --------------------------------------------

/// Shared fields every region accepts. `Ok(false)` means the key is not a
/// shared field.
fn parse_shared_field(
    name: &mut String,
    id: &mut u32,
    rect: &mut Rect,
    key: &str,
    value: &str,
) -> Result<bool, String> {
    match key {
        "name" => *name = value.to_string(),
        "id" => *id = parse_field(key, value)?,
        "top left x" => rect.top_left_x = parse_field(key, value)?,
        "top left y" => rect.top_left_y = parse_field(key, value)?,
        "bottom right x" => rect.bottom_right_x = parse_field(key, value)?,
        "bottom right y" => rect.bottom_right_y = parse_field(key, value)?,
        _ => return Ok(false),
    }
    Ok(true)
}

/// Type-specific fields. `Ok(false)` means the key is unknown for the type.
fn parse_kind_field(kind: &mut RegionKind, key: &str, value: &str) -> Result<bool, String> {
    match kind {
        RegionKind::Button(button) => match key {
            "key code" => {
                button.key_code = parse_key_code(value)
                    .ok_or_else(|| format!("'{value}' is not a valid key code"))?;
            }
            "minimum repetition interval" => {
                button.minimum_repetition_interval = parse_field(key, value)?;
            }
            _ => return Ok(false),
        },
        RegionKind::Slider(slider) => match key {
            "orientation" => {
                slider.orientation = value
                    .parse()
                    .map_err(|_| format!("unexpected slider orientation '{value}'"))?;
            }
            "minimum value" => slider.minimum_value = parse_field(key, value)?,
            "maximum value" => slider.maximum_value = parse_field(key, value)?,
            _ => return Ok(false),
        },
        RegionKind::Touch(touch) => match key {
            "display offset x" => touch.display_offset_x = parse_field(key, value)?,
            "display offset y" => touch.display_offset_y = parse_field(key, value)?,
            _ => return Ok(false),
        },
    }
    Ok(true)
}

fn empty_kind(region_type: RegionType) -> RegionKind {
    match region_type {
        RegionType::Touch => RegionKind::Touch(TouchRegion::default()),
        RegionType::Button => RegionKind::Button(ButtonRegion::default()),
        RegionType::Slider => RegionKind::Slider(SliderRegion::default()),
    }
}

/// Read the fields of one region up to the next list entry or end of input.
fn parse_region(
    path: &Path,
    cursor: &mut LineCursor<'_>,
    region_type: RegionType,
) -> Result<Region, ConfigError> {
    let start_line = cursor.line_number();
    let mut name = String::new();
    let mut id = 0;
    let mut rect = Rect::default();
    let mut kind = empty_kind(region_type);

    while let Some(next) = cursor.peek_line() {
        if next.trim_start().starts_with('-') {
            break;
        }
        let line = cursor.consume_line().unwrap_or(next);
        let at = cursor.line_number();
        let (key, value) = split_line(line).map_err(|m| ConfigError::malformed(path, at, m))?;

        let accepted = parse_shared_field(&mut name, &mut id, &mut rect, key, value)
            .and_then(|shared| {
                if shared {
                    Ok(true)
                } else {
                    parse_kind_field(&mut kind, key, value)
                }
            })
            .map_err(|m| ConfigError::malformed(path, at, m))?;

        if !accepted {
            return Err(ConfigError::malformed(
                path,
                at,
                format!("unknown key '{key}' for {region_type} region"),
            ));
        }
    }

    if rect.bottom_right_x < rect.top_left_x || rect.bottom_right_y < rect.top_left_y {
        return Err(ConfigError::malformed(
            path,
            start_line,
            format!("{region_type} region '{name}' has bottom right above or left of top left"),
        ));
    }

    debug!("Parsed {region_type} region '{name}' (id {id}) at {rect:?}");
    Ok(Region::new(name, id, rect, kind))
}

// -- Top level ------------------------------------------------

/// Resolve a path named inside the config relative to the config's directory.
fn resolve_relative(config_path: &Path, value: &str) -> PathBuf {
    let named = Path::new(value);
    if named.is_absolute() {
        return named.to_path_buf();
    }
    config_path
        .parent()
        .map_or_else(|| named.to_path_buf(), |dir| dir.join(named))
}

/// Parse config text. `path` is used for error messages and for resolving a
/// relative `calibration file`.
pub fn parse_config_str(path: &Path, text: &str) -> Result<ConfigModel, ConfigError> {
    let mut cursor = LineCursor::new(text);
    let mut in_subdivisions = false;
    let mut device_names = Vec::new();
    let mut regions = Vec::new();
    let mut calibration = None;

    while let Some(line) = cursor.consume_line() {
        let at = cursor.line_number();
        if line.trim() == "subdivisions:" {
            in_subdivisions = true;
            continue;
        }

        let (key, value) = split_line(line).map_err(|m| ConfigError::malformed(path, at, m))?;

        if let Some(entry_key) = key.strip_prefix('-') {
            if !in_subdivisions {
                return Err(ConfigError::malformed(
                    path,
                    at,
                    "list entry found outside 'subdivisions'",
                ));
            }
            if entry_key.trim() != "type" {
                return Err(ConfigError::malformed(
                    path,
                    at,
                    format!("subdivision does not start with 'type' (found '{key}')"),
                ));
            }
            let region_type: RegionType = value.parse().map_err(|_| {
                ConfigError::malformed(path, at, format!("invalid subdivision type '{value}'"))
            })?;
            regions.push(parse_region(path, &mut cursor, region_type)?);
            continue;
        }

        match key {
            "device name" => device_names.push(value.to_string()),
            "calibration file" => {
                calibration = Some(CalibrationTransform::parse(&resolve_relative(path, value))?);
            }
            _ => {
                return Err(ConfigError::malformed(
                    path,
                    at,
                    format!("unknown key '{key}'"),
                ));
            }
        }
    }

    Ok(ConfigModel {
        path: path.to_path_buf(),
        device_names,
        regions,
        calibration: calibration.unwrap_or_else(CalibrationTransform::identity),
    })
}

/// Read and parse a region config file.
pub fn parse_config_file(path: &Path) -> Result<ConfigModel, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let model = parse_config_str(path, &text)?;
    info!(
        "Loaded {} region(s) and {} device filter(s) from {}",
        model.regions.len(),
        model.device_names.len(),
        path.display()
    );
    Ok(model)
}
