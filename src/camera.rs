//! Calibrated surround-view camera.
//!
//! A [`CameraModel`] owns everything needed to turn a raw fisheye frame into
//! its patch of the bird's-eye mosaic:
//!
//! 1. [`CameraModel::undistort`] remaps the frame through the undistortion map
//! 2. [`CameraModel::project`] warps it with the projection homography
//! 3. [`CameraModel::flip`] orients the patch for its mounting position
//!
//! The derived state (undistortion map, inverse homography) is rebuilt as a
//! whole whenever the calibration changes and published by swapping an
//! [`Arc`], so frame transforms running on other threads always see one
//! consistent calibration. Writers are serialized, so concurrent
//! adjustments of different calibration parts all survive.

use crate::error::{SurroundViewError, SurroundViewResult};
use crate::imaging::{self, Frame};
use crate::layout::{layout_for, MountingPosition, Size};
use image::Pixel;
use nalgebra::{Matrix3, Vector2, Vector3};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use surround_camera_models::{
    lens_model, LensModel, PinholeCamera, PinholeParams, ScaleShift, UndistortionMap,
};
use surround_io::{CalibrationData, CalibrationStore};
use tracing::{debug, info, warn};

/// Everything derived from one calibration.
#[derive(Debug)]
struct CameraState {
    calibration: CalibrationData,
    lens: Box<dyn LensModel>,
    target: PinholeCamera,
    map: UndistortionMap,
    /// `None` while the projection matrix is singular (e.g. not fitted yet).
    project_inverse: Option<Matrix3<f64>>,
}

impl CameraState {
    fn new(calibration: CalibrationData) -> SurroundViewResult<Self> {
        let intrinsics = calibration.intrinsics()?;
        let distortion = calibration.distortion()?;
        let lens = lens_model(intrinsics, distortion)?;
        let target_params = intrinsics.adjusted(&calibration.scale_shift)?;
        let target = PinholeCamera::new(target_params)?;
        let project_inverse = calibration.project_matrix.try_inverse();
        if project_inverse.is_none() {
            warn!("projection matrix is singular, bird's-eye patches will be black");
        }

        let map = UndistortionMap::from_lens(lens.as_ref(), &target_params, calibration.resolution);

        Ok(Self {
            calibration,
            lens,
            target,
            map,
            project_inverse,
        })
    }
}

/// One calibrated fisheye camera of the surround-view rig.
#[derive(Debug)]
pub struct CameraModel {
    position: MountingPosition,
    project_shape: Size,
    calibration_file: Option<PathBuf>,
    state: RwLock<Arc<CameraState>>,
    writer: Mutex<()>,
}

impl CameraModel {
    /// Load the calibration at `path` for a camera mounted at `position`.
    ///
    /// The path is remembered for [`CameraModel::save`].
    pub fn load<P: AsRef<Path>>(path: P, position: MountingPosition) -> SurroundViewResult<Self> {
        let path = path.as_ref();
        let calibration = CalibrationStore::load(path)?;
        let mut model = Self::from_calibration(calibration, position)?;
        model.calibration_file = Some(path.to_path_buf());
        Ok(model)
    }

    /// Build a camera from an in-memory calibration.
    pub fn from_calibration(
        calibration: CalibrationData,
        position: MountingPosition,
    ) -> SurroundViewResult<Self> {
        let state = CameraState::new(calibration)?;
        info!(
            %position,
            lens = state.lens.get_model_name(),
            width = state.calibration.resolution.width,
            height = state.calibration.resolution.height,
            "camera model ready"
        );
        Ok(Self {
            position,
            project_shape: layout_for(position),
            calibration_file: None,
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
        })
    }

    pub fn position(&self) -> MountingPosition {
        self.position
    }

    /// Size of the bird's-eye patch produced by [`CameraModel::project`].
    pub fn project_shape(&self) -> Size {
        self.project_shape
    }

    pub fn calibration_file(&self) -> Option<&Path> {
        self.calibration_file.as_deref()
    }

    /// Snapshot of the current calibration.
    pub fn calibration(&self) -> CalibrationData {
        self.snapshot().calibration.clone()
    }

    pub fn scale_shift(&self) -> ScaleShift {
        self.snapshot().calibration.scale_shift
    }

    /// Effective intrinsics of the undistorted image.
    pub fn undistorted_intrinsics(&self) -> PinholeParams {
        self.snapshot().target.pinhole
    }

    /// Snapshot of the current undistortion map.
    pub fn undistortion_map(&self) -> UndistortionMap {
        self.snapshot().map.clone()
    }

    /// Remap a raw fisheye frame into the undistorted image.
    ///
    /// The output always has the calibrated resolution.
    pub fn undistort<P>(&self, frame: &Frame<P>) -> Frame<P>
    where
        P: Pixel<Subpixel = u8>,
    {
        let state = self.snapshot();
        imaging::remap(frame, &state.map)
    }

    /// Warp an undistorted frame onto this camera's bird's-eye patch.
    ///
    /// With a singular projection matrix the patch is entirely black.
    pub fn project<P>(&self, frame: &Frame<P>) -> Frame<P>
    where
        P: Pixel<Subpixel = u8>,
    {
        let state = self.snapshot();
        self.warp_patch(&state, frame)
    }

    /// Orient a projected patch for its slot in the mosaic.
    pub fn flip<P>(&self, frame: &Frame<P>) -> Frame<P>
    where
        P: Pixel<Subpixel = u8> + 'static,
    {
        imaging::flip(frame, self.position)
    }

    /// Undistort, project and flip a raw frame under a single calibration.
    pub fn birdview<P>(&self, frame: &Frame<P>) -> Frame<P>
    where
        P: Pixel<Subpixel = u8> + 'static,
    {
        let state = self.snapshot();
        let undistorted = imaging::remap(frame, &state.map);
        let projected = self.warp_patch(&state, &undistorted);
        imaging::flip(&projected, self.position)
    }

    fn warp_patch<P>(&self, state: &CameraState, frame: &Frame<P>) -> Frame<P>
    where
        P: Pixel<Subpixel = u8>,
    {
        match &state.project_inverse {
            Some(inverse) => imaging::warp_with_inverse(frame, inverse, self.project_shape),
            None => Frame::new(self.project_shape.width, self.project_shape.height),
        }
    }

    /// Map raw fisheye pixels to undistorted image pixels.
    ///
    /// Entries are `None` for pixels whose ray cannot be recovered or that
    /// land behind the undistorted image plane.
    pub fn undistort_points(&self, points: &[Vector2<f64>]) -> Vec<Option<Vector2<f64>>> {
        let state = self.snapshot();
        points
            .iter()
            .map(|p| {
                let ray: Vector3<f64> = state.lens.unproject(p).ok()?;
                state.target.project(&ray).ok()
            })
            .collect()
    }

    /// Replace the scale/shift adjustment and rebuild the undistortion map.
    ///
    /// On error the camera keeps its previous calibration.
    pub fn recalibrate(&self, scale: Vector2<f64>, shift: Vector2<f64>) -> SurroundViewResult<()> {
        let scale_shift = ScaleShift::new(scale, shift);
        self.replace_state(|calibration| calibration.with_scale_shift(scale_shift))?;
        info!(
            position = %self.position,
            scale_x = scale.x,
            scale_y = scale.y,
            shift_x = shift.x,
            shift_y = shift.y,
            "recalibrated undistortion"
        );
        Ok(())
    }

    /// Replace the bird's-eye projection homography.
    pub fn replace_projection_matrix(&self, project_matrix: Matrix3<f64>) -> SurroundViewResult<()> {
        self.replace_state(|calibration| calibration.with_project_matrix(project_matrix))?;
        info!(position = %self.position, "replaced projection matrix");
        Ok(())
    }

    /// Write the current calibration back to the file it was loaded from.
    pub fn save(&self) -> SurroundViewResult<()> {
        let path = self
            .calibration_file
            .as_deref()
            .ok_or(SurroundViewError::NoCalibrationFile)?;
        self.save_to(path)
    }

    /// Write the current calibration to `path`.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> SurroundViewResult<()> {
        let path = path.as_ref();
        let state = self.snapshot();
        CalibrationStore::save(path, &state.calibration).map_err(|source| {
            SurroundViewError::Save {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    fn snapshot(&self) -> Arc<CameraState> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Derive a new state from the current calibration and publish it.
    ///
    /// Writers hold `writer` from snapshot to swap, so each update starts from
    /// the previous writer's result. Readers keep using the old snapshot until
    /// the swap.
    fn replace_state<F>(&self, update: F) -> SurroundViewResult<()>
    where
        F: FnOnce(&CalibrationData) -> CalibrationData,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let next = CameraState::new(update(&current.calibration))?;
        debug!(position = %self.position, "publishing new camera state");
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use surround_camera_models::Resolution;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn calibration(dist_coeffs: [f64; 4]) -> Result<CalibrationData, Box<dyn std::error::Error>> {
        Ok(CalibrationData {
            camera_matrix: Matrix3::new(50.0, 0.0, 32.0, 0.0, 50.0, 24.0, 0.0, 0.0, 1.0),
            dist_coeffs,
            resolution: Resolution::new(64, 48)?,
            project_matrix: Matrix3::identity(),
            scale_shift: ScaleShift::default(),
        })
    }

    #[test]
    fn test_project_shape_follows_position() -> TestResult {
        let camera = CameraModel::from_calibration(calibration([0.0; 4])?, MountingPosition::Left)?;
        assert_eq!(camera.project_shape(), Size::new(1600, 500));
        assert_eq!(camera.position(), MountingPosition::Left);
        assert!(camera.calibration_file().is_none());
        Ok(())
    }

    #[test]
    fn test_singular_projection_gives_black_patch() -> TestResult {
        let mut data = calibration([0.0; 4])?;
        data.project_matrix = Matrix3::zeros();
        let camera = CameraModel::from_calibration(data, MountingPosition::Left)?;
        let raw = GrayImage::from_pixel(64, 48, Luma([180]));

        // Undistortion does not depend on the projection.
        assert_eq!(camera.undistort(&raw), raw);

        let patch = camera.project(&raw);
        assert_eq!(patch.dimensions(), (1600, 500));
        assert!(patch.pixels().all(|p| p.0[0] == 0));
        assert_eq!(camera.birdview(&raw).dimensions(), (500, 1600));

        camera.replace_projection_matrix(Matrix3::identity())?;
        assert_eq!(camera.project(&raw).get_pixel(10, 10).0[0], 180);
        Ok(())
    }

    #[test]
    fn test_concurrent_writers_keep_both_updates() -> TestResult {
        for i in 0..20 {
            let camera =
                CameraModel::from_calibration(calibration([0.0; 4])?, MountingPosition::Front)?;
            let h = Matrix3::new(1.0, 0.0, f64::from(i), 0.0, 1.0, 5.0, 0.0, 0.0, 1.0);

            std::thread::scope(|s| {
                s.spawn(|| {
                    camera
                        .recalibrate(Vector2::new(1.5, 1.5), Vector2::zeros())
                        .expect("recalibrate")
                });
                s.spawn(|| camera.replace_projection_matrix(h).expect("replace projection"));
            });

            let calibration = camera.calibration();
            assert_eq!(calibration.scale_shift.scale, Vector2::new(1.5, 1.5), "trial {i}");
            assert_eq!(calibration.project_matrix, h, "trial {i}");
            assert_eq!(camera.undistorted_intrinsics().fx, 75.0, "trial {i}");
        }
        Ok(())
    }

    #[test]
    fn test_recalibrate_updates_map_and_calibration() -> TestResult {
        let camera = CameraModel::from_calibration(calibration([0.0; 4])?, MountingPosition::Front)?;
        let before = camera.undistortion_map();

        camera.recalibrate(Vector2::new(2.0, 2.0), Vector2::new(0.0, 0.0))?;

        let after = camera.undistortion_map();
        assert_ne!(before, after);
        // Output pixel (40, 24) now looks at the source pixel halfway to the center.
        let (x, y) = after.source(40, 24).ok_or("outside map")?;
        assert!((x - 36.0).abs() < 1e-4 && (y - 24.0).abs() < 1e-4);
        assert_eq!(camera.scale_shift().scale, Vector2::new(2.0, 2.0));
        assert_eq!(camera.undistorted_intrinsics().fx, 100.0);
        Ok(())
    }

    #[test]
    fn test_failed_recalibrate_keeps_state() -> TestResult {
        let camera = CameraModel::from_calibration(calibration([0.0; 4])?, MountingPosition::Front)?;
        let before = camera.calibration();
        assert!(camera
            .recalibrate(Vector2::new(0.0, 1.0), Vector2::zeros())
            .is_err());
        assert_eq!(camera.calibration(), before);
        Ok(())
    }

    #[test]
    fn test_undistort_points_inverts_lens() -> TestResult {
        let camera =
            CameraModel::from_calibration(calibration([0.1, -0.02, 0.003, 0.0])?, MountingPosition::Front)?;
        let map = camera.undistortion_map();
        let (sx, sy) = map.source(20, 30).ok_or("outside map")?;

        let points = camera.undistort_points(&[Vector2::new(f64::from(sx), f64::from(sy))]);
        let p = points[0].ok_or("point not recovered")?;
        assert!((p.x - 20.0).abs() < 1e-3, "x = {}", p.x);
        assert!((p.y - 30.0).abs() < 1e-3, "y = {}", p.y);
        Ok(())
    }

    #[test]
    fn test_birdview_matches_step_by_step() -> TestResult {
        let camera = CameraModel::from_calibration(calibration([0.0; 4])?, MountingPosition::Back)?;
        let raw = GrayImage::from_fn(64, 48, |x, y| Luma([(x + y) as u8]));

        let expected = camera.flip(&camera.project(&camera.undistort(&raw)));
        assert_eq!(camera.birdview(&raw), expected);
        Ok(())
    }

    #[test]
    fn test_save_without_file_fails() -> TestResult {
        let camera = CameraModel::from_calibration(calibration([0.0; 4])?, MountingPosition::Right)?;
        assert!(matches!(camera.save(), Err(SurroundViewError::NoCalibrationFile)));
        Ok(())
    }
}
