//! Pixel-level image operations used by the camera pipeline.
//!
//! All operations work on 8-bit frames of any channel layout supported by the
//! `image` crate (`Luma`, `LumaA`, `Rgb`, `Rgba`). Output pixels that fall
//! outside the source image are filled with zero (constant black border).

pub mod orientation;
pub mod remap;
pub mod warp;

use image::ImageBuffer;

/// An owned 8-bit image buffer.
pub type Frame<P> = ImageBuffer<P, Vec<u8>>;

pub use orientation::{flip, transpose};
pub use remap::{remap, sample_bilinear};
pub use warp::{warp_perspective, warp_with_inverse};
