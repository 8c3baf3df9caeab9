//! Map-driven resampling with bilinear interpolation.

use super::Frame;
use image::Pixel;
use rayon::prelude::*;
use surround_camera_models::UndistortionMap;

/// Sample an interleaved 8-bit image at a sub-pixel location.
///
/// `src` holds `width × height` pixels of `out.len()` channels each. Taps that
/// fall outside the image contribute zero, so locations near the border fade
/// into black and locations far outside (or NaN) are fully black.
pub fn sample_bilinear(src: &[u8], width: u32, height: u32, x: f64, y: f64, out: &mut [u8]) {
    out.fill(0);
    if !x.is_finite() || !y.is_finite() {
        return;
    }
    let (w, h) = (i64::from(width), i64::from(height));
    let x0f = x.floor();
    let y0f = y.floor();
    if x0f < -1.0 || y0f < -1.0 || x0f >= w as f64 || y0f >= h as f64 {
        return;
    }

    let x0 = x0f as i64;
    let y0 = y0f as i64;
    let ax = x - x0f;
    let ay = y - y0f;
    let channels = out.len();

    let taps = [
        (x0, y0, (1.0 - ax) * (1.0 - ay)),
        (x0 + 1, y0, ax * (1.0 - ay)),
        (x0, y0 + 1, (1.0 - ax) * ay),
        (x0 + 1, y0 + 1, ax * ay),
    ];

    let mut acc = [0.0_f64; 4];
    for (tx, ty, weight) in taps {
        if tx < 0 || ty < 0 || tx >= w || ty >= h || weight == 0.0 {
            continue;
        }
        let base = (ty * w + tx) as usize * channels;
        for (c, value) in acc.iter_mut().take(channels).enumerate() {
            *value += weight * f64::from(src[base + c]);
        }
    }

    for (dst, value) in out.iter_mut().zip(acc) {
        *dst = value.round().clamp(0.0, 255.0) as u8;
    }
}

/// Resample `src` through a per-pixel coordinate map.
///
/// The output has the map's resolution; output pixel (u, v) takes the bilinear
/// sample of `src` at `map.source(u, v)`.
pub fn remap<P>(src: &Frame<P>, map: &UndistortionMap) -> Frame<P>
where
    P: Pixel<Subpixel = u8>,
{
    let resolution = map.resolution();
    let channels = usize::from(P::CHANNEL_COUNT);
    let row_len = resolution.width as usize * channels;
    let (src_w, src_h) = src.dimensions();
    let raw = src.as_raw().as_slice();

    let mut out: Frame<P> = Frame::new(resolution.width, resolution.height);
    if row_len == 0 {
        return out;
    }

    let width = resolution.width as usize;
    let (map_x, map_y) = (map.map_x(), map.map_y());
    out.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(v, row)| {
            let offset = v * width;
            for (u, pixel) in row.chunks_exact_mut(channels).enumerate() {
                let x = f64::from(map_x[offset + u]);
                let y = f64::from(map_y[offset + u]);
                sample_bilinear(raw, src_w, src_h, x, y, pixel);
            }
        });
    out
}
