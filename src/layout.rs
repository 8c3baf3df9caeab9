//! Mosaic layout of the car-centric bird's-eye view.
//!
//! The stitched view is a `total_w × total_h` canvas. The calibration pattern
//! surrounds the car; `shift_w`/`shift_h` extend the view beyond the pattern and
//! `inn_shift_w`/`inn_shift_h` separate the pattern from the car body. The car
//! itself occupies the rectangle `(xl, yt)`–`(xr, yb)`.
//!
//! ```text
//!            total_w
//!   +-------------------------+
//!   |          front          |  yt
//!   |-------+---------+-------|
//!   |       |         |       |
//!   | left  |   car   | right |
//!   |       |         |       |
//!   |-------+---------+-------|  yb
//!   |          back           |
//!   +-------------------------+
//!           xl        xr
//! ```
//!
//! Each camera projects into its own patch: front/back patches are
//! `total_w × yt`, left/right patches are `total_h × xl` (before being rotated
//! into place by [`crate::imaging::flip`]).

use crate::error::SurroundViewError;
use nalgebra::Vector2;
use std::fmt;
use std::str::FromStr;

/// Physical placement of a camera on the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountingPosition {
    Front,
    Back,
    Left,
    Right,
}

impl MountingPosition {
    pub const ALL: [MountingPosition; 4] = [Self::Front, Self::Back, Self::Left, Self::Right];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for MountingPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MountingPosition {
    type Err = SurroundViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" => Ok(Self::Front),
            "back" => Ok(Self::Back),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(SurroundViewError::InvalidInput(format!(
                "unknown mounting position '{other}' (expected front, back, left or right)"
            ))),
        }
    }
}

/// Canvas size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Geometry of the stitched bird's-eye mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MosaicLayout {
    pub shift_w: u32,
    pub shift_h: u32,
    pub inn_shift_w: u32,
    pub inn_shift_h: u32,
    pub total_w: u32,
    pub total_h: u32,
    pub xl: u32,
    pub xr: u32,
    pub yt: u32,
    pub yb: u32,
}

/// Standard layout: 600×1000 calibration pattern area, 300 px margin.
pub const MOSAIC: MosaicLayout = MosaicLayout::new(300, 300, 20, 50);

impl MosaicLayout {
    /// Derive the full layout from the outer margin and the pattern-to-car gap.
    pub const fn new(shift_w: u32, shift_h: u32, inn_shift_w: u32, inn_shift_h: u32) -> Self {
        let total_w = 600 + 2 * shift_w;
        let total_h = 1000 + 2 * shift_h;
        let xl = shift_w + 180 + inn_shift_w;
        let yt = shift_h + 200 + inn_shift_h;
        Self {
            shift_w,
            shift_h,
            inn_shift_w,
            inn_shift_h,
            total_w,
            total_h,
            xl,
            xr: total_w - xl,
            yt,
            yb: total_h - yt,
        }
    }

    /// Output canvas of the camera at `position`.
    pub const fn project_shape(&self, position: MountingPosition) -> Size {
        match position {
            MountingPosition::Front | MountingPosition::Back => Size::new(self.total_w, self.yt),
            MountingPosition::Left | MountingPosition::Right => Size::new(self.total_h, self.xl),
        }
    }

    /// Canvas locations of the four calibration-pattern corners seen by a camera.
    ///
    /// Order: top-left, top-right, bottom-left, bottom-right, in the camera's
    /// own (unflipped) projection canvas.
    pub fn project_keypoints(&self, position: MountingPosition) -> [Vector2<f64>; 4] {
        let (x0, x1, y0, y1) = match position {
            MountingPosition::Front | MountingPosition::Back => (
                self.shift_w + 120,
                self.shift_w + 480,
                self.shift_h,
                self.shift_h + 160,
            ),
            MountingPosition::Left => (
                self.shift_h + 280,
                self.shift_h + 840,
                self.shift_w,
                self.shift_w + 160,
            ),
            MountingPosition::Right => (
                self.shift_h + 160,
                self.shift_h + 720,
                self.shift_w,
                self.shift_w + 160,
            ),
        };
        [
            Vector2::new(f64::from(x0), f64::from(y0)),
            Vector2::new(f64::from(x1), f64::from(y0)),
            Vector2::new(f64::from(x0), f64::from(y1)),
            Vector2::new(f64::from(x1), f64::from(y1)),
        ]
    }
}

/// Projection canvas size for a mounting position in the standard mosaic.
pub const fn layout_for(position: MountingPosition) -> Size {
    MOSAIC.project_shape(position)
}

/// Pattern keypoints for a mounting position in the standard mosaic.
pub fn project_keypoints(position: MountingPosition) -> [Vector2<f64>; 4] {
    MOSAIC.project_keypoints(position)
}
