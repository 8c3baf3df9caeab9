//! Fisheye camera core of a car surround-view system.
//!
//! Each of the four cameras (front, back, left, right) is described by a
//! [`CameraModel`] that turns raw fisheye frames into its patch of the
//! bird's-eye mosaic. Lens mathematics lives in `surround-camera-models`,
//! calibration persistence in `surround-io`.

pub mod camera;
pub mod error;
pub mod homography;
pub mod imaging;
pub mod layout;
pub mod logger;

pub use camera::CameraModel;
pub use error::{SurroundViewError, SurroundViewResult};
pub use imaging::Frame;
pub use layout::{layout_for, project_keypoints, MosaicLayout, MountingPosition, Size, MOSAIC};
pub use logger::{init_logger, init_logger_with_level};
pub use surround_camera_models::{DistortionModel, PinholeParams, Resolution, ScaleShift};
pub use surround_io::{CalibrationData, CalibrationError, CalibrationStore};
