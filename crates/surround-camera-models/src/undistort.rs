//! Undistortion map construction.
//!
//! An [`UndistortionMap`] stores, for every pixel of the corrected image, the
//! sub-pixel coordinate to sample in the raw fisheye frame. It is built by
//! casting the ray of each output pixel through the effective pinhole
//! intrinsics and projecting that ray with the lens model:
//!
//! ```text
//! x = (u - cx') / fx'      y = (v - cy') / fy'
//! (u_src, v_src) = lens.project([x, y, 1])
//! ```
//!
//! For the Kannala-Brandt lens this evaluates the distortion polynomial in
//! the forward direction, so the map itself needs no root finding. There is
//! no rectifying rotation: the corrected view differs from the raw one only
//! through the effective intrinsics.

use crate::{
    CameraModelError, DistortionModel, LensModel, PinholeParams, Resolution, ScaleShift,
    lens_model,
};
use nalgebra::Vector3;
use rayon::prelude::*;
use tracing::debug;

/// Per-pixel source coordinates for remapping a raw frame.
///
/// Coordinates are stored row-major as two planes (x and y) of `f32`, one entry
/// per pixel of [`UndistortionMap::resolution`]. Pixels whose ray cannot be
/// projected hold `NaN` and sample the constant border.
#[derive(Debug, Clone, PartialEq)]
pub struct UndistortionMap {
    resolution: Resolution,
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl UndistortionMap {
    /// Build the map for a calibrated lens.
    ///
    /// The lens is described by the original `intrinsics` and `distortion`;
    /// output pixels use the intrinsics adjusted by `adjust`. The result is a
    /// pure function of its arguments.
    pub fn build(
        intrinsics: &PinholeParams,
        distortion: &DistortionModel,
        resolution: Resolution,
        adjust: &ScaleShift,
    ) -> Result<Self, CameraModelError> {
        let lens = lens_model(*intrinsics, *distortion)?;
        let target = intrinsics.adjusted(adjust)?;
        Ok(Self::from_lens(lens.as_ref(), &target, resolution))
    }

    /// Build the map for an arbitrary lens and target pinhole intrinsics.
    pub fn from_lens(lens: &dyn LensModel, target: &PinholeParams, resolution: Resolution) -> Self {
        let width = resolution.width as usize;
        let mut map_x = vec![0.0_f32; resolution.pixel_count()];
        let mut map_y = vec![0.0_f32; resolution.pixel_count()];

        if width > 0 {
            map_x
                .par_chunks_mut(width)
                .zip(map_y.par_chunks_mut(width))
                .enumerate()
                .for_each(|(v, (row_x, row_y))| {
                    let y = (v as f64 - target.cy) / target.fy;
                    for (u, (mx, my)) in row_x.iter_mut().zip(row_y.iter_mut()).enumerate() {
                        let x = (u as f64 - target.cx) / target.fx;
                        match lens.project(&Vector3::new(x, y, 1.0)) {
                            Ok(src) => {
                                *mx = src.x as f32;
                                *my = src.y as f32;
                            }
                            Err(_) => {
                                *mx = f32::NAN;
                                *my = f32::NAN;
                            }
                        }
                    }
                });
        }

        debug!(
            model = lens.get_model_name(),
            width = resolution.width,
            height = resolution.height,
            fx = target.fx,
            fy = target.fy,
            cx = target.cx,
            cy = target.cy,
            "built undistortion map"
        );

        Self {
            resolution,
            map_x,
            map_y,
        }
    }

    /// Resolution of the corrected image.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Source x-coordinates, row-major.
    pub fn map_x(&self) -> &[f32] {
        &self.map_x
    }

    /// Source y-coordinates, row-major.
    pub fn map_y(&self) -> &[f32] {
        &self.map_y
    }

    /// Source coordinate for output pixel (u, v), if inside the map.
    pub fn source(&self, u: u32, v: u32) -> Option<(f32, f32)> {
        if u >= self.resolution.width || v >= self.resolution.height {
            return None;
        }
        let idx = v as usize * self.resolution.width as usize + u as usize;
        Some((self.map_x[idx], self.map_y[idx]))
    }
}
