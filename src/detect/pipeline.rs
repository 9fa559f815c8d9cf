use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate_mut;

use crate::config::PipelineConfig;
use crate::detect::background::BackgroundModel;
use crate::detect::contour::{best_contour, external_contours, SelectedContour};
use crate::detect::preprocess::FramePreprocessor;
use crate::frame::{empty_gray, reshape_gray, ColorFrame, GrayFrame};

/// Per-frame background subtraction.
///
/// Owns the reference frame and the three working buffers (grayscale,
/// difference, threshold mask). The buffers are overwritten on every call to
/// `process` and keep their allocation across frames.
pub struct MotionPipeline {
    preprocessor: FramePreprocessor,
    background: BackgroundModel,
    threshold: u8,
    dilation_radius: u8,
    min_area: f64,
    gray: GrayFrame,
    delta: GrayFrame,
    thresh: GrayFrame,
}

impl MotionPipeline {
    /// Build a pipeline whose reference is `first`. `first` is normalised in
    /// place, exactly like every later frame.
    pub fn new(config: &PipelineConfig, min_area: f64, first: &mut ColorFrame) -> Self {
        let mut preprocessor = FramePreprocessor::new(config);
        let mut reference = empty_gray();
        preprocessor.process(first, &mut reference);
        let (width, height) = reference.dimensions();
        log::debug!(
            "background captured at {}x{} (refresh {:?})",
            width,
            height,
            config.background_refresh
        );

        Self {
            preprocessor,
            background: BackgroundModel::new(reference, config.background_refresh),
            threshold: config.threshold,
            dilation_radius: config.dilation_radius,
            min_area,
            gray: GrayFrame::new(width, height),
            delta: GrayFrame::new(width, height),
            thresh: GrayFrame::new(width, height),
        }
    }

    /// Run one cycle over `frame`.
    ///
    /// `frame` is left resized and mirrored, in canonical coordinates. The
    /// difference and threshold images are always refreshed, whether or not a
    /// region qualifies.
    pub fn process(&mut self, frame: &mut ColorFrame) -> Option<SelectedContour> {
        self.preprocessor.process(frame, &mut self.gray);
        self.background.difference(&self.gray, &mut self.delta);
        binary_threshold(&self.delta, &mut self.thresh, self.threshold);
        if self.dilation_radius > 0 {
            dilate_mut(&mut self.thresh, Norm::LInf, self.dilation_radius);
        }

        let contours = external_contours(&self.thresh);
        let selected = best_contour(&contours, self.min_area);

        if self.background.observe(&self.gray) {
            log::info!("background reference refreshed");
        }
        selected
    }

    pub fn min_area(&self) -> f64 {
        self.min_area
    }

    pub fn canonical_size(&self) -> (u32, u32) {
        self.preprocessor.canonical_size()
    }

    pub fn background(&self) -> &BackgroundModel {
        &self.background
    }

    pub fn gray(&self) -> &GrayFrame {
        &self.gray
    }

    pub fn delta(&self) -> &GrayFrame {
        &self.delta
    }

    pub fn threshold(&self) -> &GrayFrame {
        &self.thresh
    }

    /// Drop the reference and every working buffer.
    pub(crate) fn release(&mut self) {
        self.background.release();
        self.gray = empty_gray();
        self.delta = empty_gray();
        self.thresh = empty_gray();
    }
}

/// Pixels at or above `threshold` become 255, everything else 0.
fn binary_threshold(src: &GrayFrame, dst: &mut GrayFrame, threshold: u8) {
    reshape_gray(dst, src.width(), src.height());
    for (value, out) in src.as_raw().iter().zip(dst.iter_mut()) {
        *out = if *value >= threshold { 255 } else { 0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackgroundRefresh;
    use crate::frame::MotionRegion;
    use image::{Luma, Rgb};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    const BACKGROUND: Rgb<u8> = Rgb([40, 40, 40]);
    const BRIGHT: Rgb<u8> = Rgb([250, 250, 250]);

    fn config() -> PipelineConfig {
        PipelineConfig {
            mirror: false,
            ..PipelineConfig::default()
        }
    }

    fn background() -> ColorFrame {
        ColorFrame::from_pixel(500, 500, BACKGROUND)
    }

    fn with_squares(squares: &[(i32, i32, u32)]) -> ColorFrame {
        let mut frame = background();
        for &(x, y, side) in squares {
            draw_filled_rect_mut(&mut frame, Rect::at(x, y).of_size(side, side), BRIGHT);
        }
        frame
    }

    fn assert_tightly_encloses(found: MotionRegion, inserted: MotionRegion) {
        assert!(
            found.contains(&inserted),
            "{:?} does not contain {:?}",
            found,
            inserted
        );
        let slack = 8;
        assert!(inserted.x - found.x <= slack);
        assert!(inserted.y - found.y <= slack);
        assert!(found.width - inserted.width <= 2 * slack);
        assert!(found.height - inserted.height <= 2 * slack);
    }

    #[test]
    fn identical_frame_yields_empty_masks() {
        let mut first = background();
        let mut pipeline = MotionPipeline::new(&config(), 100.0, &mut first);

        let mut frame = background();
        let selected = pipeline.process(&mut frame);

        assert!(selected.is_none());
        assert!(pipeline.delta().pixels().all(|p| *p == Luma([0])));
        assert!(pipeline.threshold().pixels().all(|p| *p == Luma([0])));
    }

    #[test]
    fn inserted_square_is_bounded() {
        let mut first = background();
        let mut pipeline = MotionPipeline::new(&config(), 7000.0, &mut first);

        let mut frame = with_squares(&[(200, 150, 100)]);
        let selected = pipeline.process(&mut frame).expect("motion region");

        assert_tightly_encloses(selected.region, MotionRegion::new(200, 150, 100, 100));
        assert!(selected.area > 7000.0);
        assert!(pipeline.threshold().pixels().any(|p| *p == Luma([255])));
    }

    #[test]
    fn square_at_or_below_min_area_is_ignored() {
        let mut first = background();
        let mut pipeline = MotionPipeline::new(&config(), 7000.0, &mut first);

        let mut frame = with_squares(&[(200, 150, 30)]);
        assert!(pipeline.process(&mut frame).is_none());
        // The masks are still produced.
        assert!(pipeline.threshold().pixels().any(|p| *p == Luma([255])));
    }

    #[test]
    fn largest_of_several_regions_wins() {
        let mut first = background();
        let mut pipeline = MotionPipeline::new(&config(), 500.0, &mut first);

        let mut frame = with_squares(&[(20, 20, 60), (250, 250, 150), (400, 40, 90)]);
        let selected = pipeline.process(&mut frame).expect("motion region");

        assert_tightly_encloses(selected.region, MotionRegion::new(250, 250, 150, 150));
    }

    #[test]
    fn frames_are_resized_before_comparison() {
        let mut first = ColorFrame::from_pixel(1000, 1000, BACKGROUND);
        let mut pipeline = MotionPipeline::new(&config(), 1000.0, &mut first);
        assert_eq!(first.dimensions(), (500, 500));

        let mut frame = ColorFrame::from_pixel(1000, 1000, BACKGROUND);
        draw_filled_rect_mut(&mut frame, Rect::at(400, 400).of_size(200, 200), BRIGHT);
        let selected = pipeline.process(&mut frame).expect("motion region");

        assert_eq!(frame.dimensions(), (500, 500));
        assert_tightly_encloses(selected.region, MotionRegion::new(200, 200, 100, 100));
    }

    #[test]
    fn refreshed_background_absorbs_static_change() {
        let cfg = PipelineConfig {
            background_refresh: BackgroundRefresh::EveryFrames(1),
            ..config()
        };
        let mut first = background();
        let mut pipeline = MotionPipeline::new(&cfg, 1000.0, &mut first);

        let mut frame = with_squares(&[(100, 100, 80)]);
        assert!(pipeline.process(&mut frame).is_some());

        let mut same = with_squares(&[(100, 100, 80)]);
        assert!(pipeline.process(&mut same).is_none());
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut delta = GrayFrame::new(3, 1);
        delta.put_pixel(0, 0, Luma([49]));
        delta.put_pixel(1, 0, Luma([50]));
        delta.put_pixel(2, 0, Luma([51]));
        let mut mask = GrayFrame::new(0, 0);

        binary_threshold(&delta, &mut mask, 50);

        assert_eq!(mask.as_raw(), &vec![0, 255, 255]);
    }

    #[test]
    fn release_drops_buffers() {
        let mut first = background();
        let mut pipeline = MotionPipeline::new(&config(), 100.0, &mut first);
        pipeline.release();
        assert_eq!(pipeline.delta().dimensions(), (0, 0));
        assert_eq!(pipeline.background().reference().dimensions(), (0, 0));
    }
}
