//! Contour extraction and best-contour selection over a binary mask.

use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;

use crate::frame::{GrayFrame, MotionRegion};

/// The contour chosen for a cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedContour {
    pub region: MotionRegion,
    pub area: f64,
}

/// Outer borders of the foreground blobs in `mask`. Holes, and blobs sitting
/// inside holes of other blobs, are dropped.
pub fn external_contours(mask: &GrayFrame) -> Vec<Contour<i32>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .collect()
}

/// Area enclosed by the polygon through `points` (shoelace formula).
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (twice_area as f64 / 2.0).abs()
}

/// Tight axis-aligned rectangle around `points`, inclusive of edge pixels.
pub fn bounding_rect(points: &[Point<i32>]) -> Option<MotionRegion> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(MotionRegion::new(
        min_x.max(0) as u32,
        min_y.max(0) as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}

/// The contour with the largest area strictly above `min_area`.
///
/// On equal areas the first contour in enumeration order is kept.
pub fn best_contour(contours: &[Contour<i32>], min_area: f64) -> Option<SelectedContour> {
    let mut best: Option<(&Contour<i32>, f64)> = None;
    let mut best_area = min_area;
    for contour in contours {
        let area = contour_area(&contour.points);
        if area > best_area {
            best_area = area;
            best = Some((contour, area));
        }
    }
    let (contour, area) = best?;
    let region = bounding_rect(&contour.points)?;
    Some(SelectedContour { region, area })
}
