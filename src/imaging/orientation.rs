//! Orientation of projected patches in the stitched mosaic.

use super::Frame;
use crate::layout::MountingPosition;
use image::{imageops, Pixel};

/// Swap rows and columns: output pixel (y, x) is input pixel (x, y).
pub fn transpose<P>(src: &Frame<P>) -> Frame<P>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = src.dimensions();
    Frame::from_fn(height, width, |x, y| *src.get_pixel(y, x))
}

/// Orient a projected patch for its slot in the mosaic.
///
/// | position | operation                         |
/// |----------|-----------------------------------|
/// | front    | unchanged                         |
/// | back     | rotate by 180°                    |
/// | left     | transpose, then flip vertically   |
/// | right    | transpose, then flip horizontally |
pub fn flip<P>(src: &Frame<P>, position: MountingPosition) -> Frame<P>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    match position {
        MountingPosition::Front => src.clone(),
        MountingPosition::Back => imageops::rotate180(src),
        MountingPosition::Left => {
            let mut out = transpose(src);
            imageops::flip_vertical_in_place(&mut out);
            out
        }
        MountingPosition::Right => {
            let mut out = transpose(src);
            imageops::flip_horizontal_in_place(&mut out);
            out
        }
    }
}
