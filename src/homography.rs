//! Bird's-eye homography estimation from point correspondences.
//!
//! The projection matrix stored in a calibration maps undistorted pixels to
//! the camera's patch of the mosaic. It is usually obtained once, by picking
//! the four pattern corners in an undistorted frame and pairing them with
//! [`crate::layout::project_keypoints`].

use crate::error::{SurroundViewError, SurroundViewResult};
use nalgebra::{DMatrix, Matrix3, Vector2, Vector3};

/// Estimate `H` with `dst ~ H · src` using the normalized DLT.
///
/// Needs at least four correspondences, no three of which are collinear. The
/// result is scaled so that `H[2,2] == 1` when possible.
pub fn from_correspondences(
    src: &[Vector2<f64>],
    dst: &[Vector2<f64>],
) -> SurroundViewResult<Matrix3<f64>> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return Err(SurroundViewError::InvalidInput(format!(
            "need at least 4 matching point pairs, got {} source and {} destination points",
            n,
            dst.len()
        )));
    }

    let (src_n, t_src) = normalize_points(src).ok_or_else(degenerate)?;
    let (dst_n, t_dst) = normalize_points(dst).ok_or_else(degenerate)?;

    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for (i, (p, q)) in src_n.iter().zip(dst_n.iter()).enumerate() {
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);
        let r0 = 2 * i;
        let r1 = r0 + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    // A square system keeps all nine right singular vectors available.
    if a.nrows() < a.ncols() {
        let mut padded = DMatrix::<f64>::zeros(9, 9);
        padded.view_mut((0, 0), (a.nrows(), 9)).copy_from(&a);
        a = padded;
    }

    let svd = a.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| SurroundViewError::InvalidInput("SVD did not converge".to_string()))?;
    let (min_idx, _) = svd.singular_values.argmin();
    let h_vec = v_t.row(min_idx);

    let h = Matrix3::from_fn(|r, c| h_vec[3 * r + c]);
    let t_dst_inv = t_dst.try_inverse().ok_or_else(degenerate)?;
    let mut h = t_dst_inv * h * t_src;

    let scale = h[(2, 2)];
    if scale.abs() > f64::EPSILON {
        h /= scale;
    }
    if !h.iter().all(|v| v.is_finite()) || h.determinant().abs() < f64::EPSILON {
        return Err(degenerate());
    }
    Ok(h)
}

/// Apply a homography to a point, if it does not map to infinity.
pub fn transform_point(h: &Matrix3<f64>, p: &Vector2<f64>) -> Option<Vector2<f64>> {
    let q = h * Vector3::new(p.x, p.y, 1.0);
    if q.z.abs() < f64::EPSILON {
        return None;
    }
    Some(Vector2::new(q.x / q.z, q.y / q.z))
}

fn degenerate() -> SurroundViewError {
    SurroundViewError::InvalidInput("degenerate point configuration".to_string())
}

/// Hartley normalization: zero mean, mean distance sqrt(2) from the origin.
fn normalize_points(points: &[Vector2<f64>]) -> Option<(Vec<Vector2<f64>>, Matrix3<f64>)> {
    let n = points.len() as f64;
    let centroid = points.iter().fold(Vector2::zeros(), |acc, p| acc + p) / n;
    let mean_dist = points.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n;
    if mean_dist < f64::EPSILON {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(
        s,
        0.0,
        -s * centroid.x,
        0.0,
        s,
        -s * centroid.y,
        0.0,
        0.0,
        1.0,
    );
    let normalized = points.iter().map(|p| (p - centroid) * s).collect();
    Some((normalized, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{project_keypoints, MountingPosition};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn assert_approx_eq(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() < eps, "expected {b}, got {a}");
    }

    #[test]
    fn test_recovers_known_homography() -> TestResult {
        let truth = Matrix3::new(1.2, 0.1, 30.0, -0.05, 0.9, 12.0, 1e-4, 2e-4, 1.0);
        let src = [
            Vector2::new(10.0, 20.0),
            Vector2::new(400.0, 30.0),
            Vector2::new(380.0, 300.0),
            Vector2::new(15.0, 280.0),
            Vector2::new(200.0, 150.0),
        ];
        let dst: Vec<_> = src
            .iter()
            .filter_map(|p| transform_point(&truth, p))
            .collect();

        let h = from_correspondences(&src, &dst)?;
        for (a, b) in h.iter().zip(truth.iter()) {
            assert_approx_eq(*a, *b, 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_maps_pattern_corners_to_keypoints() -> TestResult {
        let picked = [
            Vector2::new(412.0, 301.0),
            Vector2::new(868.0, 296.0),
            Vector2::new(350.0, 455.0),
            Vector2::new(930.0, 452.0),
        ];
        let keypoints = project_keypoints(MountingPosition::Front);
        let h = from_correspondences(&picked, &keypoints)?;

        for (p, k) in picked.iter().zip(keypoints.iter()) {
            let q = transform_point(&h, p).ok_or("point at infinity")?;
            assert_approx_eq(q.x, k.x, 1e-6);
            assert_approx_eq(q.y, k.y, 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_rejects_too_few_points() {
        let pts = [Vector2::new(0.0, 0.0); 3];
        assert!(matches!(
            from_correspondences(&pts, &pts),
            Err(SurroundViewError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_coincident_points() {
        let src = [Vector2::new(5.0, 5.0); 4];
        let dst = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(1.0, 1.0),
        ];
        assert!(from_correspondences(&src, &dst).is_err());
    }
}
