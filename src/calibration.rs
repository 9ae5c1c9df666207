//! Affine correction from raw device coordinates to screen coordinates.
//!
//! The calibration file holds six coefficients:
//!
//! ```text
//! x coefficient one: 1.02
//! x coefficient two: 0.0
//! x coefficient three: -12.5
//! y coefficient one: 0.0
//! y coefficient two: 0.98
//! y coefficient three: 4.0
//! ```

use std::fs;
use std::path::Path;

use log::debug;

use crate::config::{ConfigError, LineCursor, split_line};

/// `x' = x1*x + x2*y + x3`, `y' = y1*x + y2*y + y3`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationTransform {
    pub x1: f32,
    pub x2: f32,
    pub x3: f32,
    pub y1: f32,
    pub y2: f32,
    pub y3: f32,
}

impl Default for CalibrationTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl CalibrationTransform {
    pub fn new(x1: f32, x2: f32, x3: f32, y1: f32, y2: f32, y3: f32) -> Self {
        Self {
            x1,
            x2,
            x3,
            y1,
            y2,
            y3,
        }
    }

    /// Transform that leaves coordinates untouched.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// Map a raw coordinate to a calibrated one.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.x1 * x + self.x2 * y + self.x3,
            self.y1 * x + self.y2 * y + self.y3,
        )
    }

    /// Read a calibration file. All six coefficients must be present;
    /// unknown keys are ignored.
    pub fn parse(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse_str(path, &text)
    }

    /// Parse calibration text; `path` is only used in error messages.
    pub fn parse_str(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let mut coefficients: [Option<f32>; 6] = [None; 6];
        let mut cursor = LineCursor::new(text);

        while let Some(line) = cursor.consume_line() {
            let at = cursor.line_number();
            let (key, value) =
                split_line(line).map_err(|m| ConfigError::malformed(path, at, m))?;
            let Some(index) = COEFFICIENT_KEYS.iter().position(|k| *k == key) else {
                debug!("Ignoring unknown calibration key '{key}'");
                continue;
            };
            let coefficient: f32 = value.parse().map_err(|_| {
                ConfigError::malformed(path, at, format!("cannot convert '{value}' to float"))
            })?;
            coefficients[index] = Some(coefficient);
        }

        let missing: Vec<&str> = COEFFICIENT_KEYS
            .iter()
            .zip(&coefficients)
            .filter(|(_, c)| c.is_none())
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::malformed(
                path,
                cursor.line_number(),
                format!("missing coefficient(s): {}", missing.join(", ")),
            ));
        }

        let [x1, x2, x3, y1, y2, y3] = coefficients.map(Option::unwrap_or_default);
        Ok(Self::new(x1, x2, x3, y1, y2, y3))
    }
}

const COEFFICIENT_KEYS: [&str; 6] = [
    "x coefficient one",
    "x coefficient two",
    "x coefficient three",
    "y coefficient one",
    "y coefficient two",
    "y coefficient three",
];
