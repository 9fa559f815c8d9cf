//! Frame buffers and detection results.
//!
//! - `ColorFrame`: 3-channel RGB frame as read from a capture source.
//! - `GrayFrame`: 1-channel intensity frame used for differencing.
//! - `MotionRegion`: bounding rectangle of the most significant moving region.
//!
//! Buffers are owned by the stage that last produced them. Sinks receive
//! borrowed references only; the borrow ends before the next cycle overwrites
//! the buffer, so a sink cannot hold on to pixel data between cycles.

use image::{GrayImage, RgbImage};

pub type ColorFrame = RgbImage;
pub type GrayFrame = GrayImage;

/// An empty frame, used for buffers that have not been filled yet or that
/// have been released.
pub fn empty_color() -> ColorFrame {
    ColorFrame::new(0, 0)
}

pub fn empty_gray() -> GrayFrame {
    GrayFrame::new(0, 0)
}

/// Give `frame` the shape `width` x `height`, allocating only when the shape
/// differs. Callers overwrite every pixel afterwards.
pub(crate) fn reshape_gray(frame: &mut GrayFrame, width: u32, height: u32) {
    if frame.dimensions() != (width, height) {
        *frame = GrayFrame::new(width, height);
    }
}

/// Axis-aligned rectangle in canonical frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MotionRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl MotionRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Centre of the rectangle.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// True when `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &MotionRegion) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }
}
