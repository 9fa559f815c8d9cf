//! Cosmetic overlay on the frame handed to the streamer. Nothing here feeds
//! back into detection.

use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::frame::{ColorFrame, MotionRegion};

pub const RECT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const STATUS_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const RECT_THICKNESS: u32 = 2;
const STATUS_POINT: (i32, i32) = (10, 20);
const STATUS_MARKER_SIZE: (u32, u32) = (12, 8);

/// Outline `region` and mark the frame as "motion detected".
///
/// No font ships with the crate, so the status label is a filled marker
/// anchored at the label position.
pub fn annotate_motion(frame: &mut ColorFrame, region: &MotionRegion) {
    for inset in 0..RECT_THICKNESS {
        let w = region.width.saturating_sub(2 * inset);
        let h = region.height.saturating_sub(2 * inset);
        if w == 0 || h == 0 {
            break;
        }
        let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32).of_size(w, h);
        draw_hollow_rect_mut(frame, rect, RECT_COLOR);
    }

    let (w, h) = STATUS_MARKER_SIZE;
    let marker = Rect::at(STATUS_POINT.0, STATUS_POINT.1 - h as i32).of_size(w, h);
    draw_filled_rect_mut(frame, marker, STATUS_COLOR);
}
