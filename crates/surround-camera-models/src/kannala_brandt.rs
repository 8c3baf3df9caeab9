//! Kannala-Brandt Fisheye Camera Model
//!
//! The equidistant fisheye model with polynomial radial distortion, as used by
//! OpenCV's fisheye calibration.
//!
//! # Mathematical Model
//!
//! ## Projection (3D → 2D)
//!
//! For a 3D point p = (x, y, z) in camera coordinates:
//!
//! ```text
//! r = √(x² + y²)
//! θ = atan2(r, z)
//! θ_d = θ·(1 + k₁·θ² + k₂·θ⁴ + k₃·θ⁶ + k₄·θ⁸)
//! u = fx · θ_d · (x/r) + cx
//! v = fy · θ_d · (y/r) + cy
//! ```
//!
//! ## Unprojection (2D → 3D)
//!
//! Uses Newton-Raphson iteration to solve θ_d(θ) = r_d for θ, then recovers
//! the 3D ray direction.
//!
//! # References
//!
//! - Kannala & Brandt, "A Generic Camera Model and Calibration Method for
//!   Conventional, Wide-Angle, and Fish-Eye Lenses", PAMI 2006

use crate::{
    CONVERGENCE_THRESHOLD, CameraModelError, DistortionModel, LensModel,
    MAX_UNPROJECT_ITERATIONS, PinholeParams,
};
use nalgebra::{Vector2, Vector3};

const PRECISION: f64 = 1e-8;

/// Kannala-Brandt fisheye camera model with 8 parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KannalaBrandtCamera {
    pub pinhole: PinholeParams,
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
}

impl KannalaBrandtCamera {
    pub fn new(pinhole: PinholeParams, coeffs: [f64; 4]) -> Result<Self, CameraModelError> {
        let model = Self {
            pinhole,
            k1: coeffs[0],
            k2: coeffs[1],
            k3: coeffs[2],
            k4: coeffs[3],
        };
        model.validate_params()?;
        Ok(model)
    }

    /// Distorted angle θ_d for an incidence angle θ.
    #[inline]
    pub fn distort_angle(&self, theta: f64) -> f64 {
        let theta2 = theta * theta;
        let theta4 = theta2 * theta2;
        let theta6 = theta4 * theta2;
        let theta8 = theta4 * theta4;
        theta * (1.0 + self.k1 * theta2 + self.k2 * theta4 + self.k3 * theta6 + self.k4 * theta8)
    }

    /// Incidence angle θ whose distorted angle is `theta_d`.
    ///
    /// Newton-Raphson on f(θ) = θ_d(θ) − theta_d, started at θ = theta_d.
    pub fn undistort_angle(&self, theta_d: f64) -> Result<f64, CameraModelError> {
        let mut theta = theta_d;

        for _ in 0..MAX_UNPROJECT_ITERATIONS {
            let theta2 = theta * theta;
            let theta4 = theta2 * theta2;
            let theta6 = theta4 * theta2;
            let theta8 = theta4 * theta4;

            let k1_theta2 = self.k1 * theta2;
            let k2_theta4 = self.k2 * theta4;
            let k3_theta6 = self.k3 * theta6;
            let k4_theta8 = self.k4 * theta8;

            // f(θ)
            let f = theta * (1.0 + k1_theta2 + k2_theta4 + k3_theta6 + k4_theta8) - theta_d;

            // f'(θ)
            let f_prime =
                1.0 + 3.0 * k1_theta2 + 5.0 * k2_theta4 + 7.0 * k3_theta6 + 9.0 * k4_theta8;

            if f_prime.abs() < f64::EPSILON {
                return Err(CameraModelError::NumericalError(
                    "Derivative too small in KB unprojection".to_string(),
                ));
            }

            let delta = f / f_prime;
            theta -= delta;

            if delta.abs() < CONVERGENCE_THRESHOLD {
                return Ok(theta);
            }
        }

        Err(CameraModelError::NumericalError(format!(
            "KB unprojection did not converge for theta_d = {theta_d}"
        )))
    }
}

impl LensModel for KannalaBrandtCamera {
    fn project(&self, p_cam: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let x = p_cam[0];
        let y = p_cam[1];
        let z = p_cam[2];

        if z <= f64::EPSILON {
            return Err(CameraModelError::PointAtCameraCenter);
        }

        let r = (x * x + y * y).sqrt();
        let PinholeParams { fx, fy, cx, cy } = self.pinhole;

        if r < PRECISION {
            // Near the optical axis θ_d/r → 1/z, so the model is locally pinhole.
            let inv_z = 1.0 / z;
            return Ok(Vector2::new(fx * x * inv_z + cx, fy * y * inv_z + cy));
        }

        let theta_d = self.distort_angle(r.atan2(z));
        let inv_r = 1.0 / r;
        Ok(Vector2::new(
            fx * theta_d * x * inv_r + cx,
            fy * theta_d * y * inv_r + cy,
        ))
    }

    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        let mx = (point_2d.x - self.pinhole.cx) / self.pinhole.fx;
        let my = (point_2d.y - self.pinhole.cy) / self.pinhole.fy;

        let ru = (mx * mx + my * my).sqrt();
        if ru < PRECISION {
            return Ok(Vector3::new(0.0, 0.0, 1.0));
        }

        // Clamp to the hemisphere; larger radii have no physical ray.
        let theta = self.undistort_angle(ru.min(std::f64::consts::FRAC_PI_2))?;
        let scale = theta.sin() / ru;
        Ok(Vector3::new(mx * scale, my * scale, theta.cos()).normalize())
    }

    /// Validation rules: fx, fy positive; cx, cy and k₁..k₄ finite.
    fn validate_params(&self) -> Result<(), CameraModelError> {
        PinholeParams::new(
            self.pinhole.fx,
            self.pinhole.fy,
            self.pinhole.cx,
            self.pinhole.cy,
        )?;

        if !self.k1.is_finite()
            || !self.k2.is_finite()
            || !self.k3.is_finite()
            || !self.k4.is_finite()
        {
            return Err(CameraModelError::InvalidParams(
                "Distortion coefficients must be finite".to_string(),
            ));
        }

        Ok(())
    }

    fn get_pinhole_params(&self) -> PinholeParams {
        self.pinhole
    }

    fn get_distortion(&self) -> DistortionModel {
        DistortionModel::KannalaBrandt {
            k1: self.k1,
            k2: self.k2,
            k3: self.k3,
            k4: self.k4,
        }
    }

    fn get_model_name(&self) -> &'static str {
        "kannala_brandt"
    }
}
