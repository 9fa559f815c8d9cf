use crate::config::BackgroundRefresh;
use crate::frame::{empty_gray, reshape_gray, GrayFrame};

/// Reference frame that every later frame is differenced against.
///
/// Captured once when the detector is built. With the default
/// `BackgroundRefresh::Never` it never changes afterwards, so slow lighting
/// drift accumulates as foreground over long runs.
pub struct BackgroundModel {
    reference: GrayFrame,
    refresh: BackgroundRefresh,
    frames_since_refresh: u32,
}

impl BackgroundModel {
    pub fn new(reference: GrayFrame, refresh: BackgroundRefresh) -> Self {
        Self {
            reference,
            refresh,
            frames_since_refresh: 0,
        }
    }

    pub fn reference(&self) -> &GrayFrame {
        &self.reference
    }

    /// Write `|reference - gray|` into `delta`.
    pub fn difference(&self, gray: &GrayFrame, delta: &mut GrayFrame) {
        debug_assert_eq!(self.reference.dimensions(), gray.dimensions());
        reshape_gray(delta, gray.width(), gray.height());
        for ((bg, cur), out) in self
            .reference
            .as_raw()
            .iter()
            .zip(gray.as_raw().iter())
            .zip(delta.iter_mut())
        {
            *out = bg.abs_diff(*cur);
        }
    }

    /// Account for one processed frame. Returns true when the reference was
    /// replaced by `gray`.
    pub fn observe(&mut self, gray: &GrayFrame) -> bool {
        let BackgroundRefresh::EveryFrames(interval) = self.refresh else {
            return false;
        };
        self.frames_since_refresh += 1;
        if self.frames_since_refresh < interval {
            return false;
        }
        self.frames_since_refresh = 0;
        self.reference.clone_from(gray);
        true
    }

    pub(crate) fn release(&mut self) {
        self.reference = empty_gray();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn difference_is_absolute() {
        let model = BackgroundModel::new(
            GrayFrame::from_pixel(3, 2, Luma([100])),
            BackgroundRefresh::Never,
        );
        let mut gray = GrayFrame::from_pixel(3, 2, Luma([100]));
        gray.put_pixel(0, 0, Luma([40]));
        gray.put_pixel(2, 1, Luma([180]));
        let mut delta = GrayFrame::new(0, 0);

        model.difference(&gray, &mut delta);

        assert_eq!(delta.get_pixel(0, 0).0, [60]);
        assert_eq!(delta.get_pixel(2, 1).0, [80]);
        assert_eq!(delta.get_pixel(1, 0).0, [0]);
    }

    #[test]
    fn never_refresh_keeps_startup_frame() {
        let mut model = BackgroundModel::new(
            GrayFrame::from_pixel(2, 2, Luma([10])),
            BackgroundRefresh::Never,
        );
        let bright = GrayFrame::from_pixel(2, 2, Luma([200]));
        for _ in 0..1000 {
            assert!(!model.observe(&bright));
        }
        assert_eq!(model.reference().get_pixel(0, 0).0, [10]);
    }

    #[test]
    fn periodic_refresh_recaptures_reference() {
        let mut model = BackgroundModel::new(
            GrayFrame::from_pixel(2, 2, Luma([10])),
            BackgroundRefresh::EveryFrames(3),
        );
        let bright = GrayFrame::from_pixel(2, 2, Luma([200]));

        assert!(!model.observe(&bright));
        assert!(!model.observe(&bright));
        assert_eq!(model.reference().get_pixel(0, 0).0, [10]);
        assert!(model.observe(&bright));
        assert_eq!(model.reference().get_pixel(0, 0).0, [200]);
    }
}
