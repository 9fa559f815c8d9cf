use crate::frame::MotionRegion;
use crate::sink::MotionHandler;

/// Motion handler that logs where the turret should aim.
///
/// The aim offset is the region centre relative to the frame centre, in
/// canonical pixels; positive x is right, positive y is down.
pub struct LogMotionHandler {
    frame_center: (f64, f64),
    events: u64,
}

impl LogMotionHandler {
    pub fn new(frame_width: u32, frame_height: u32) -> Self {
        Self {
            frame_center: (frame_width as f64 / 2.0, frame_height as f64 / 2.0),
            events: 0,
        }
    }

    pub fn aim_offset(&self, region: &MotionRegion) -> (f64, f64) {
        let (cx, cy) = region.center();
        (cx - self.frame_center.0, cy - self.frame_center.1)
    }

    pub fn events(&self) -> u64 {
        self.events
    }
}

impl MotionHandler for LogMotionHandler {
    fn handle_motion(&mut self, region: MotionRegion) {
        self.events += 1;
        let (dx, dy) = self.aim_offset(&region);
        log::info!(
            "motion at x={} y={} w={} h={} (aim offset {:+.1}, {:+.1})",
            region.x,
            region.y,
            region.width,
            region.height,
            dx,
            dy
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aim_offset_is_relative_to_frame_center() {
        let handler = LogMotionHandler::new(500, 500);
        assert_eq!(
            handler.aim_offset(&MotionRegion::new(240, 240, 20, 20)),
            (0.0, 0.0)
        );
        assert_eq!(
            handler.aim_offset(&MotionRegion::new(0, 400, 100, 100)),
            (-200.0, 200.0)
        );
    }

    #[test]
    fn counts_events() {
        let mut handler = LogMotionHandler::new(500, 500);
        handler.handle_motion(MotionRegion::new(0, 0, 10, 10));
        handler.handle_motion(MotionRegion::new(0, 0, 10, 10));
        assert_eq!(handler.events(), 2);
    }
}
