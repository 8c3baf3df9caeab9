//! Perspective warping.

use super::{remap::sample_bilinear, Frame};
use crate::error::{SurroundViewError, SurroundViewResult};
use crate::layout::Size;
use image::Pixel;
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

/// Homogeneous weights below this magnitude map to infinity.
const MIN_HOMOGENEOUS_WEIGHT: f64 = 1e-12;

/// Warp `src` onto a `size` canvas with the homography `h` (source → destination).
///
/// Fails with [`SurroundViewError::SingularProjection`] when `h` is not invertible.
pub fn warp_perspective<P>(src: &Frame<P>, h: &Matrix3<f64>, size: Size) -> SurroundViewResult<Frame<P>>
where
    P: Pixel<Subpixel = u8>,
{
    let inverse = h
        .try_inverse()
        .ok_or(SurroundViewError::SingularProjection)?;
    Ok(warp_with_inverse(src, &inverse, size))
}

/// Warp with a precomputed destination → source homography.
///
/// Destination pixel (u, v) samples `src` at the dehomogenized
/// `inverse · (u, v, 1)`.
pub fn warp_with_inverse<P>(src: &Frame<P>, inverse: &Matrix3<f64>, size: Size) -> Frame<P>
where
    P: Pixel<Subpixel = u8>,
{
    let channels = usize::from(P::CHANNEL_COUNT);
    let row_len = size.width as usize * channels;
    let (src_w, src_h) = src.dimensions();
    let raw = src.as_raw().as_slice();

    let mut out: Frame<P> = Frame::new(size.width, size.height);
    if row_len == 0 {
        return out;
    }

    out.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(v, row)| {
            for (u, pixel) in row.chunks_exact_mut(channels).enumerate() {
                let p = inverse * Vector3::new(u as f64, v as f64, 1.0);
                if p.z.abs() < MIN_HOMOGENEOUS_WEIGHT {
                    pixel.fill(0);
                    continue;
                }
                sample_bilinear(raw, src_w, src_h, p.x / p.z, p.y / p.z, pixel);
            }
        });
    out
}
