//! Pinhole Camera Model
//!
//! The simplest perspective camera model with no lens distortion.
//!
//! # Mathematical Model
//!
//! ```text
//! u = fx · (x/z) + cx
//! v = fy · (y/z) + cy
//! ```
//!
//! Unprojection normalizes `[(u - cx)/fx, (v - cy)/fy, 1]`.
//!
//! Besides describing distortion-free lenses, a pinhole camera is the target
//! of every undistortion: output pixels of a corrected frame are rays of the
//! effective (scaled and shifted) pinhole intrinsics.

use crate::{CameraModelError, DistortionModel, GEOMETRIC_PRECISION, LensModel, PinholeParams};
use nalgebra::{Vector2, Vector3};

/// Pinhole camera model with 4 intrinsic parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeCamera {
    pub pinhole: PinholeParams,
}

impl PinholeCamera {
    pub fn new(pinhole: PinholeParams) -> Result<Self, CameraModelError> {
        let camera = Self { pinhole };
        camera.validate_params()?;
        Ok(camera)
    }

    /// Checks the geometric condition for a valid projection.
    pub fn check_projection_condition(&self, z: f64) -> bool {
        z >= GEOMETRIC_PRECISION
    }
}

impl LensModel for PinholeCamera {
    fn project(&self, p_cam: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        if !self.check_projection_condition(p_cam.z) {
            return Err(CameraModelError::PointAtCameraCenter);
        }
        let inv_z = 1.0 / p_cam.z;
        Ok(Vector2::new(
            self.pinhole.fx * p_cam.x * inv_z + self.pinhole.cx,
            self.pinhole.fy * p_cam.y * inv_z + self.pinhole.cy,
        ))
    }

    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        let mx = (point_2d.x - self.pinhole.cx) / self.pinhole.fx;
        let my = (point_2d.y - self.pinhole.cy) / self.pinhole.fy;
        Ok(Vector3::new(mx, my, 1.0).normalize())
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        PinholeParams::new(
            self.pinhole.fx,
            self.pinhole.fy,
            self.pinhole.cx,
            self.pinhole.cy,
        )
        .map(|_| ())
    }

    fn get_pinhole_params(&self) -> PinholeParams {
        self.pinhole
    }

    fn get_distortion(&self) -> DistortionModel {
        DistortionModel::None
    }

    fn get_model_name(&self) -> &'static str {
        "pinhole"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn assert_approx_eq(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() < eps, "{a} != {b}");
    }

    #[test]
    fn test_projection_at_optical_axis() -> TestResult {
        let camera = PinholeCamera::new(PinholeParams::new(500.0, 500.0, 320.0, 240.0)?)?;
        let uv = camera.project(&Vector3::new(0.0, 0.0, 1.0))?;
        assert_approx_eq(uv.x, 320.0, 1e-10);
        assert_approx_eq(uv.y, 240.0, 1e-10);
        Ok(())
    }

    #[test]
    fn test_projection_off_axis() -> TestResult {
        let camera = PinholeCamera::new(PinholeParams::new(500.0, 500.0, 320.0, 240.0)?)?;
        let uv = camera.project(&Vector3::new(0.1, 0.2, 1.0))?;
        assert_approx_eq(uv.x, 370.0, 1e-10);
        assert_approx_eq(uv.y, 340.0, 1e-10);
        Ok(())
    }

    #[test]
    fn test_point_behind_camera_is_rejected() -> TestResult {
        let camera = PinholeCamera::new(PinholeParams::new(500.0, 500.0, 320.0, 240.0)?)?;
        assert_eq!(
            camera.project(&Vector3::new(0.1, 0.2, -1.0)),
            Err(CameraModelError::PointAtCameraCenter)
        );
        Ok(())
    }

    #[test]
    fn test_unproject_hits_same_pixel() -> TestResult {
        let camera = PinholeCamera::new(PinholeParams::new(520.0, 510.0, 320.0, 240.0)?)?;
        let pixel = Vector2::new(100.0, 400.0);
        let ray = camera.unproject(&pixel)?;
        assert_approx_eq(ray.norm(), 1.0, 1e-12);
        let uv = camera.project(&ray)?;
        assert_approx_eq(uv.x, pixel.x, 1e-9);
        assert_approx_eq(uv.y, pixel.y, 1e-9);
        Ok(())
    }
}
