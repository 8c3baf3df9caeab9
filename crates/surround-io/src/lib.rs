//! Calibration persistence for surround-view cameras.
//!
//! Calibration documents are YAML files holding named matrix blocks
//! (`rows`, `cols`, row-major `data`) and 2-component vector blocks:
//!
//! ```yaml
//! camera_matrix: { rows: 3, cols: 3, data: [fx, 0, cx, 0, fy, cy, 0, 0, 1] }
//! dist_coeffs:   { rows: 4, cols: 1, data: [k1, k2, k3, k4] }
//! resolution:    { rows: 1, cols: 2, data: [width, height] }
//! project_matrix: { rows: 3, cols: 3, data: [...] }
//! scale_xy: { data: [1.0, 1.0] }
//! shift_xy: { data: [0.0, 0.0] }
//! ```
//!
//! Files written by OpenCV's `FileStorage` (with the `%YAML:1.0` directive,
//! `!!opencv-matrix` tags and inline `[x, y]` points) are accepted as well.

use std::path::PathBuf;
use thiserror::Error;

pub mod calibration;
pub mod matrix;

pub use calibration::{CalibrationData, CalibrationDocument, CalibrationStore};
pub use matrix::{MatrixBlock, VectorBlock};

/// Errors that can occur while loading or saving calibration documents.
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// The document is missing or cannot be parsed at all.
    #[error("Configuration error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// A matrix block's declared shape disagrees with its value count.
    #[error("Shape mismatch in '{block}': {rows}x{cols} declared but {len} values given")]
    ShapeMismatch {
        block: String,
        rows: usize,
        cols: usize,
        len: usize,
    },

    /// A 2-component block does not hold exactly two values.
    #[error("Invalid vector '{block}': expected 2 values, got {len}")]
    InvalidVector { block: String, len: usize },

    /// A well-formed block has the wrong dimensions for its role.
    #[error("Unexpected dimensions for '{block}': expected {expected}, got {rows}x{cols}")]
    UnexpectedDimensions {
        block: String,
        expected: String,
        rows: usize,
        cols: usize,
    },

    /// A value is out of range for its field.
    #[error("Invalid value in '{block}': {message}")]
    InvalidValue { block: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
