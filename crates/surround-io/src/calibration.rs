//! Calibration data and its YAML store.

use crate::{CalibrationError, MatrixBlock, VectorBlock};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use surround_camera_models::{
    CameraModelError, DistortionModel, PinholeParams, Resolution, ScaleShift,
};
use tracing::{debug, info};

/// On-disk layout of a calibration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDocument {
    pub camera_matrix: MatrixBlock,
    pub dist_coeffs: MatrixBlock,
    pub resolution: MatrixBlock,
    pub project_matrix: MatrixBlock,
    #[serde(default = "default_scale")]
    pub scale_xy: VectorBlock,
    #[serde(default = "default_shift")]
    pub shift_xy: VectorBlock,
}

fn default_scale() -> VectorBlock {
    VectorBlock::from_vector2(&ScaleShift::default().scale)
}

fn default_shift() -> VectorBlock {
    VectorBlock::from_vector2(&ScaleShift::default().shift)
}

/// Validated calibration of one camera.
///
/// This is an immutable value: adjustments produce a new `CalibrationData`
/// through the `with_*` methods.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationData {
    /// Camera matrix K of the raw fisheye image.
    pub camera_matrix: Matrix3<f64>,
    /// Kannala-Brandt coefficients k1..k4.
    pub dist_coeffs: [f64; 4],
    /// Resolution of the corrected image.
    pub resolution: Resolution,
    /// Homography from undistorted pixels to the bird's-eye canvas.
    pub project_matrix: Matrix3<f64>,
    pub scale_shift: ScaleShift,
}

impl CalibrationData {
    pub fn intrinsics(&self) -> Result<PinholeParams, CameraModelError> {
        PinholeParams::from_matrix(&self.camera_matrix)
    }

    pub fn distortion(&self) -> Result<DistortionModel, CameraModelError> {
        DistortionModel::from_coefficients(&self.dist_coeffs)
    }

    pub fn with_scale_shift(&self, scale_shift: ScaleShift) -> Self {
        Self {
            scale_shift,
            ..self.clone()
        }
    }

    pub fn with_project_matrix(&self, project_matrix: Matrix3<f64>) -> Self {
        Self {
            project_matrix,
            ..self.clone()
        }
    }
}

impl TryFrom<CalibrationDocument> for CalibrationData {
    type Error = CalibrationError;

    fn try_from(doc: CalibrationDocument) -> Result<Self, Self::Error> {
        let camera_matrix = doc.camera_matrix.to_matrix3("camera_matrix")?;
        let project_matrix = doc.project_matrix.to_matrix3("project_matrix")?;

        doc.dist_coeffs.validate("dist_coeffs")?;
        let dist_coeffs: [f64; 4] = doc.dist_coeffs.data.as_slice().try_into().map_err(|_| {
            CalibrationError::UnexpectedDimensions {
                block: "dist_coeffs".to_string(),
                expected: "4 coefficients".to_string(),
                rows: doc.dist_coeffs.rows,
                cols: doc.dist_coeffs.cols,
            }
        })?;

        doc.resolution.validate("resolution")?;
        if doc.resolution.data.len() != 2 {
            return Err(CalibrationError::UnexpectedDimensions {
                block: "resolution".to_string(),
                expected: "2 values".to_string(),
                rows: doc.resolution.rows,
                cols: doc.resolution.cols,
            });
        }
        // Stored as 1x2 or 2x1 depending on the writer; normalize to a row.
        let resolution_row = doc.resolution.reshape(1, 2)?;
        let resolution = Resolution::new(
            pixel_extent(resolution_row[(0, 0)], "resolution")?,
            pixel_extent(resolution_row[(0, 1)], "resolution")?,
        )
        .map_err(|e| CalibrationError::InvalidValue {
            block: "resolution".to_string(),
            message: e.to_string(),
        })?;

        let scale_shift = ScaleShift::new(
            doc.scale_xy.to_vector2("scale_xy")?,
            doc.shift_xy.to_vector2("shift_xy")?,
        );

        Ok(Self {
            camera_matrix,
            dist_coeffs,
            resolution,
            project_matrix,
            scale_shift,
        })
    }
}

impl From<&CalibrationData> for CalibrationDocument {
    fn from(data: &CalibrationData) -> Self {
        Self {
            camera_matrix: MatrixBlock::from_matrix3(&data.camera_matrix),
            dist_coeffs: MatrixBlock {
                rows: 4,
                cols: 1,
                data: data.dist_coeffs.to_vec(),
            },
            resolution: MatrixBlock {
                rows: 1,
                cols: 2,
                data: vec![
                    f64::from(data.resolution.width),
                    f64::from(data.resolution.height),
                ],
            },
            project_matrix: MatrixBlock::from_matrix3(&data.project_matrix),
            scale_xy: VectorBlock::from_vector2(&data.scale_shift.scale),
            shift_xy: VectorBlock::from_vector2(&data.scale_shift.shift),
        }
    }
}

fn pixel_extent(value: f64, block: &str) -> Result<u32, CalibrationError> {
    if value.fract() != 0.0 || !(1.0..=f64::from(u32::MAX)).contains(&value) {
        return Err(CalibrationError::InvalidValue {
            block: block.to_string(),
            message: format!("{value} is not a positive pixel count"),
        });
    }
    Ok(value as u32)
}

/// Drop OpenCV `FileStorage` markup that plain YAML parsers reject.
fn strip_opencv_markup(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with('%'))
        .map(|line| line.replace("!!opencv-matrix", ""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Loads and saves [`CalibrationData`] as YAML documents.
pub struct CalibrationStore;

impl CalibrationStore {
    /// Load a calibration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<CalibrationData, CalibrationError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| CalibrationError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let data = Self::parse_from(&content, path)?;

        info!(
            path = %path.display(),
            width = data.resolution.width,
            height = data.resolution.height,
            "loaded camera calibration"
        );
        Ok(data)
    }

    /// Parse a calibration document held in memory.
    pub fn parse_document(content: &str) -> Result<CalibrationData, CalibrationError> {
        Self::parse_from(content, Path::new("<memory>"))
    }

    fn parse_from(content: &str, origin: &Path) -> Result<CalibrationData, CalibrationError> {
        let doc: CalibrationDocument = serde_yaml::from_str(&strip_opencv_markup(content))
            .map_err(|e| CalibrationError::Config {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;
        CalibrationData::try_from(doc)
    }

    /// Render a calibration in the same schema [`CalibrationStore::load`] reads.
    pub fn to_document_string(data: &CalibrationData) -> Result<String, CalibrationError> {
        Ok(serde_yaml::to_string(&CalibrationDocument::from(data))?)
    }

    /// Write a calibration to a file, replacing any previous content.
    pub fn save<P: AsRef<Path>>(path: P, data: &CalibrationData) -> Result<(), CalibrationError> {
        let path = path.as_ref();
        let content = Self::to_document_string(data)?;
        fs::write(path, content)?;
        debug!(
            scale_x = data.scale_shift.scale.x,
            scale_y = data.scale_shift.scale.y,
            shift_x = data.scale_shift.shift.x,
            shift_y = data.scale_shift.shift.y,
            "saved scale/shift"
        );
        info!(path = %path.display(), "saved camera calibration");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    const SAMPLE: &str = "\
camera_matrix:
  rows: 3
  cols: 3
  data: [1000.0, 0.0, 640.0, 0.0, 1000.0, 360.0, 0.0, 0.0, 1.0]
dist_coeffs:
  rows: 4
  cols: 1
  data: [0.1, -0.02, 0.003, -0.0004]
resolution:
  rows: 2
  cols: 1
  data: [1280, 720]
project_matrix:
  rows: 3
  cols: 3
  data: [1.0, 0.2, 10.0, 0.0, 1.5, 20.0, 0.0, 0.001, 1.0]
scale_xy:
  data: [0.7, 0.8]
shift_xy:
  data: [-150.0, -100.0]
";

    #[test]
    fn test_parse_document() -> TestResult {
        let data = CalibrationStore::parse_document(SAMPLE)?;
        assert_eq!(data.camera_matrix[(0, 2)], 640.0);
        assert_eq!(data.camera_matrix[(1, 1)], 1000.0);
        assert_eq!(data.dist_coeffs, [0.1, -0.02, 0.003, -0.0004]);
        assert_eq!(data.resolution, Resolution { width: 1280, height: 720 });
        assert_eq!(data.project_matrix[(2, 1)], 0.001);
        assert_eq!(data.scale_shift.scale, Vector2::new(0.7, 0.8));
        assert_eq!(data.scale_shift.shift, Vector2::new(-150.0, -100.0));
        Ok(())
    }

    #[test]
    fn test_shape_mismatch() {
        let broken = SAMPLE.replace(
            "data: [0.1, -0.02, 0.003, -0.0004]",
            "data: [0.1, -0.02, 0.003]",
        );
        assert!(matches!(
            CalibrationStore::parse_document(&broken),
            Err(CalibrationError::ShapeMismatch { ref block, rows: 4, cols: 1, len: 3 })
                if block == "dist_coeffs"
        ));
    }

    #[test]
    fn test_invalid_vector() {
        let broken = SAMPLE.replace("data: [0.7, 0.8]", "data: [0.7, 0.8, 0.9]");
        assert!(matches!(
            CalibrationStore::parse_document(&broken),
            Err(CalibrationError::InvalidVector { ref block, len: 3 }) if block == "scale_xy"
        ));
    }

    #[test]
    fn test_missing_block_is_config_error() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("camera.yaml");
        let without_projection = SAMPLE
            .split("project_matrix:")
            .next()
            .ok_or("sample split failed")?
            .to_string();
        fs::write(&path, without_projection)?;

        assert!(matches!(
            CalibrationStore::load(&path),
            Err(CalibrationError::Config { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_config_error() -> TestResult {
        let dir = tempfile::tempdir()?;
        let result = CalibrationStore::load(dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(CalibrationError::Config { .. })));
        Ok(())
    }

    #[test]
    fn test_unparseable_document_is_config_error() {
        assert!(matches!(
            CalibrationStore::parse_document("camera_matrix: [unterminated"),
            Err(CalibrationError::Config { .. })
        ));
    }

    #[test]
    fn test_scale_shift_default_when_absent() -> TestResult {
        let trimmed = SAMPLE
            .split("scale_xy:")
            .next()
            .ok_or("sample split failed")?
            .to_string();
        let data = CalibrationStore::parse_document(&trimmed)?;
        assert_eq!(data.scale_shift, ScaleShift::default());
        Ok(())
    }

    #[test]
    fn test_wrong_coefficient_count() {
        let broken = SAMPLE.replace(
            "rows: 4\n  cols: 1\n  data: [0.1, -0.02, 0.003, -0.0004]",
            "rows: 5\n  cols: 1\n  data: [0.1, -0.02, 0.003, -0.0004, 0.0]",
        );
        assert!(matches!(
            CalibrationStore::parse_document(&broken),
            Err(CalibrationError::UnexpectedDimensions { ref block, .. }) if block == "dist_coeffs"
        ));
    }

    #[test]
    fn test_non_integer_resolution() {
        let broken = SAMPLE.replace("data: [1280, 720]", "data: [1280.5, 720]");
        assert!(matches!(
            CalibrationStore::parse_document(&broken),
            Err(CalibrationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_opencv_file_storage_document() -> TestResult {
        let opencv = "%YAML:1.0
---
camera_matrix: !!opencv-matrix
   rows: 3
   cols: 3
   dt: d
   data: [ 3.2e+02, 0., 3.2e+02, 0., 3.1e+02, 2.4e+02, 0., 0., 1. ]
dist_coeffs: !!opencv-matrix
   rows: 4
   cols: 1
   dt: d
   data: [ -0.01, 0.02, -0.003, 0.0004 ]
resolution: !!opencv-matrix
   rows: 2
   cols: 1
   dt: d
   data: [ 640., 480. ]
project_matrix: !!opencv-matrix
   rows: 3
   cols: 3
   dt: d
   data: [ 1., 0., 0., 0., 1., 0., 0., 0., 1. ]
scale_xy: [ 1., 1. ]
shift_xy: [ 0., 0. ]
";
        let data = CalibrationStore::parse_document(opencv)?;
        assert_eq!(data.camera_matrix[(1, 1)], 310.0);
        assert_eq!(data.resolution, Resolution { width: 640, height: 480 });
        assert_eq!(data.project_matrix, Matrix3::identity());
        assert_eq!(data.scale_shift, ScaleShift::default());
        Ok(())
    }

    #[test]
    fn test_save_then_load() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("front.yaml");
        let original = CalibrationStore::parse_document(SAMPLE)?;
        let adjusted = original.with_scale_shift(ScaleShift::new(
            Vector2::new(0.9, 0.95),
            Vector2::new(12.0, -4.0),
        ));

        CalibrationStore::save(&path, &adjusted)?;
        let reloaded = CalibrationStore::load(&path)?;
        assert_eq!(reloaded, adjusted);
        assert_ne!(reloaded, original);
        Ok(())
    }
}
