//! Consumers of detector output.
//!
//! Two narrow interfaces sit at the edge of the detection loop:
//! - `MotionHandler`: receives the selected `MotionRegion`, only on cycles
//!   where one was found (the turret controller side).
//! - `Streamer`: receives the frame, difference and threshold images on every
//!   cycle, in that order (the display side).
//!
//! Both are called synchronously on the detector thread, so a slow consumer
//! slows capture. Images are lent for the duration of the call only; a sink
//! that wants to keep pixels must copy them.

mod logger;
mod recording;
mod snapshot;

pub use logger::LogMotionHandler;
pub use recording::{Recorder, RecordingHandler, RecordingStreamer, SinkEvent};
pub use snapshot::SnapshotStreamer;

use crate::frame::{ColorFrame, GrayFrame, MotionRegion};

/// Receives the most significant motion region of a cycle.
pub trait MotionHandler: Send {
    fn handle_motion(&mut self, region: MotionRegion);
}

impl<F> MotionHandler for F
where
    F: FnMut(MotionRegion) + Send,
{
    fn handle_motion(&mut self, region: MotionRegion) {
        self(region)
    }
}

/// Receives the three images produced by every cycle.
pub trait Streamer: Send {
    /// The colour frame, annotated when motion was found.
    fn stream_frame(&mut self, frame: &ColorFrame);

    /// Absolute difference against the background.
    fn stream_delta(&mut self, delta: &GrayFrame);

    /// Dilated binary mask.
    fn stream_threshold(&mut self, thresh: &GrayFrame);
}

impl<S: Streamer + ?Sized> Streamer for Box<S> {
    fn stream_frame(&mut self, frame: &ColorFrame) {
        (**self).stream_frame(frame)
    }

    fn stream_delta(&mut self, delta: &GrayFrame) {
        (**self).stream_delta(delta)
    }

    fn stream_threshold(&mut self, thresh: &GrayFrame) {
        (**self).stream_threshold(thresh)
    }
}

/// Streamer that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStreamer;

impl Streamer for NullStreamer {
    fn stream_frame(&mut self, _frame: &ColorFrame) {}

    fn stream_delta(&mut self, _delta: &GrayFrame) {}

    fn stream_threshold(&mut self, _thresh: &GrayFrame) {}
}
