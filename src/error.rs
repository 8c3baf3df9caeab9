//! Error types for the surround-view library
//!
//! This module provides the main error and result types used throughout the library.
//! All errors use the `thiserror` crate for automatic trait implementations.

use std::path::PathBuf;
use surround_camera_models::CameraModelError;
use surround_io::CalibrationError;
use thiserror::Error;

/// Main result type used throughout the surround-view library
pub type SurroundViewResult<T> = Result<T, SurroundViewError>;

/// Main error type for the surround-view library
#[derive(Debug, Error)]
pub enum SurroundViewError {
    /// Loading, validating or saving a calibration document failed
    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    /// Calibration values do not describe a valid lens
    #[error("Camera model error: {0}")]
    CameraModel(#[from] CameraModelError),

    /// The bird's-eye homography cannot be inverted
    #[error("Projection matrix is singular")]
    SingularProjection,

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// `save` was called on a model that was not loaded from a file
    #[error("No calibration file associated with this camera")]
    NoCalibrationFile,

    /// Writing a calibration to an explicit destination failed
    #[error("Failed to save calibration to {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: CalibrationError,
    },
}
