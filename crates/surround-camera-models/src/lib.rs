//! Lens models for surround-view fisheye cameras.
//!
//! This crate provides the camera-side geometry used to correct fisheye frames
//! before they are warped into the bird's-eye mosaic.
//!
//! # Key Components
//!
//! - **`LensModel` trait**: Interface for projecting rays to pixels and back
//! - **`PinholeParams`**: Linear intrinsics (fx, fy, cx, cy) and their scale/shift adjustment
//! - **`DistortionModel`**: Radial distortion terms attached to a calibration
//! - **`UndistortionMap`**: Per-pixel lookup tables built from a lens and target intrinsics
//!
//! # Available Lens Models
//!
//! - **Pinhole**: Ideal perspective projection, used when all distortion terms are zero
//! - **Kannala-Brandt**: Equidistant fisheye model with polynomial distortion

use nalgebra::{Matrix3, Vector2, Vector3};

// ============================================================================
// Precision Constants
// ============================================================================

/// Minimum depth for a ray to be considered in front of the camera.
///
/// Default: 1e-6 (normalized image plane units)
pub const GEOMETRIC_PRECISION: f64 = 1e-6;

/// Convergence threshold for iterative unprojection (radians).
pub const CONVERGENCE_THRESHOLD: f64 = 1e-10;

/// Maximum Newton-Raphson iterations used by iterative unprojection.
pub const MAX_UNPROJECT_ITERATIONS: usize = 20;

/// Camera model errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraModelError {
    #[error("z is close to zero, point is at camera center")]
    PointAtCameraCenter,
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("NumericalError: {0}")]
    NumericalError(String),
}

/// Linear intrinsic parameters.
///
/// These are the four entries of the camera matrix K:
///
/// ```text
/// [ fx   0  cx ]
/// [  0  fy  cy ]
/// [  0   0   1 ]
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeParams {
    /// Focal length in x direction (pixels)
    pub fx: f64,
    /// Focal length in y direction (pixels)
    pub fy: f64,
    /// Principal point x-coordinate (pixels)
    pub cx: f64,
    /// Principal point y-coordinate (pixels)
    pub cy: f64,
}

impl PinholeParams {
    /// Create new pinhole parameters with validation.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraModelError> {
        let params = Self { fx, fy, cx, cy };
        params.validate()?;
        Ok(params)
    }

    /// Extract the intrinsics from a 3×3 camera matrix.
    ///
    /// Skew and the bottom row are ignored, matching the fisheye calibration
    /// convention where K carries only focal lengths and principal point.
    pub fn from_matrix(k: &Matrix3<f64>) -> Result<Self, CameraModelError> {
        Self::new(k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)])
    }

    /// Camera matrix K built from these parameters.
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Effective intrinsics after applying a scale/shift adjustment.
    ///
    /// Focal lengths are multiplied by `scale` and the principal point is
    /// offset by `shift`, per axis.
    pub fn adjusted(&self, adjust: &ScaleShift) -> Result<Self, CameraModelError> {
        Self::new(
            self.fx * adjust.scale.x,
            self.fy * adjust.scale.y,
            self.cx + adjust.shift.x,
            self.cy + adjust.shift.y,
        )
    }

    fn validate(&self) -> Result<(), CameraModelError> {
        if !(self.fx > 0.0 && self.fy > 0.0) || !self.fx.is_finite() || !self.fy.is_finite() {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !self.cx.is_finite() || !self.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }
}

/// Lens distortion models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistortionModel {
    /// Perfect pinhole (no distortion)
    None,

    /// Kannala-Brandt fisheye model (4 parameters)
    ///
    /// θ_d = θ·(1 + k₁·θ² + k₂·θ⁴ + k₃·θ⁶ + k₄·θ⁸)
    KannalaBrandt { k1: f64, k2: f64, k3: f64, k4: f64 },
}

impl DistortionModel {
    /// Number of coefficients stored in a calibration document.
    pub const COEFFICIENT_COUNT: usize = 4;

    /// Build a distortion model from the ordered coefficient list k1..k4.
    ///
    /// An all-zero list means the lens was calibrated as distortion free and
    /// yields [`DistortionModel::None`].
    pub fn from_coefficients(coeffs: &[f64]) -> Result<Self, CameraModelError> {
        if coeffs.len() != Self::COEFFICIENT_COUNT {
            return Err(CameraModelError::InvalidParams(format!(
                "expected {} distortion coefficients, got {}",
                Self::COEFFICIENT_COUNT,
                coeffs.len()
            )));
        }
        if coeffs.iter().any(|k| !k.is_finite()) {
            return Err(CameraModelError::InvalidParams(
                "Distortion coefficients must be finite".to_string(),
            ));
        }
        if coeffs.iter().all(|&k| k == 0.0) {
            return Ok(Self::None);
        }
        Ok(Self::KannalaBrandt {
            k1: coeffs[0],
            k2: coeffs[1],
            k3: coeffs[2],
            k4: coeffs[3],
        })
    }

    /// Coefficients k1..k4 (zeros for [`DistortionModel::None`]).
    pub fn coefficients(&self) -> [f64; 4] {
        match *self {
            Self::None => [0.0; 4],
            Self::KannalaBrandt { k1, k2, k3, k4 } => [k1, k2, k3, k4],
        }
    }
}

/// Represents the resolution of a camera image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// The width of the image in pixels.
    pub width: u32,
    /// The height of the image in pixels.
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Result<Self, CameraModelError> {
        if width == 0 || height == 0 {
            return Err(CameraModelError::InvalidParams(format!(
                "resolution must be non-empty, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Number of pixels covered by this resolution.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Scale and shift applied to the intrinsics when building the undistorted view.
///
/// `scale` multiplies the focal lengths and `shift` offsets the principal point.
/// Together they zoom and pan the corrected image without touching the lens model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleShift {
    pub scale: Vector2<f64>,
    pub shift: Vector2<f64>,
}

impl ScaleShift {
    pub fn new(scale: Vector2<f64>, shift: Vector2<f64>) -> Self {
        Self { scale, shift }
    }
}

impl Default for ScaleShift {
    fn default() -> Self {
        Self {
            scale: Vector2::new(1.0, 1.0),
            shift: Vector2::zeros(),
        }
    }
}

// Lens model modules

pub mod kannala_brandt;
pub mod pinhole;
pub mod undistort;

pub use kannala_brandt::KannalaBrandtCamera;
pub use pinhole::PinholeCamera;
pub use undistort::UndistortionMap;

/// Trait for lens projection models.
///
/// A lens maps rays in the camera frame to pixels of the raw (distorted)
/// image, and back. Implementations are immutable and shareable across
/// threads so undistortion maps can be built in parallel.
pub trait LensModel: Send + Sync + std::fmt::Debug {
    /// Projects a 3D point (or ray) to 2D image coordinates.
    ///
    /// # Returns
    ///
    /// - `Ok(uv)` - 2D image coordinates if projection is valid
    /// - `Err(CameraModelError)` - If the point cannot be projected
    fn project(&self, p_cam: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Unprojects a 2D image point to a normalized 3D ray in camera frame.
    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError>;

    /// Validates camera parameters.
    fn validate_params(&self) -> Result<(), CameraModelError>;

    /// Get pinhole parameters.
    fn get_pinhole_params(&self) -> PinholeParams;

    /// Get distortion parameters.
    fn get_distortion(&self) -> DistortionModel;

    /// Get model name identifier.
    fn get_model_name(&self) -> &'static str;
}

/// Instantiate the lens model matching a distortion description.
pub fn lens_model(
    pinhole: PinholeParams,
    distortion: DistortionModel,
) -> Result<Box<dyn LensModel>, CameraModelError> {
    match distortion {
        DistortionModel::None => Ok(Box::new(PinholeCamera::new(pinhole)?)),
        DistortionModel::KannalaBrandt { k1, k2, k3, k4 } => Ok(Box::new(
            KannalaBrandtCamera::new(pinhole, [k1, k2, k3, k4])?,
        )),
    }
}
