//! Scripted frame source.
//!
//! Replays a fixed list of frames, then reports end of stream. Used to drive
//! the detector deterministically without a camera. A shared `ReleaseCounter`
//! lets callers observe how many times the source was actually released after
//! the source itself has moved into a detector.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{CaptureSource, CaptureStats};
use crate::frame::ColorFrame;

/// Counts effective releases of a `ScriptedSource`.
#[derive(Clone, Debug, Default)]
pub struct ReleaseCounter(Arc<AtomicUsize>);

impl ReleaseCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct ScriptedSource {
    frames: VecDeque<ColorFrame>,
    looping: bool,
    fail_release: bool,
    released: bool,
    releases: ReleaseCounter,
    frames_captured: u64,
}

impl ScriptedSource {
    /// Replay `frames` once, in order.
    pub fn new(frames: Vec<ColorFrame>) -> Self {
        Self {
            frames: frames.into(),
            looping: false,
            fail_release: false,
            released: false,
            releases: ReleaseCounter::default(),
            frames_captured: 0,
        }
    }

    /// Replay `frames` forever.
    pub fn looping(frames: Vec<ColorFrame>) -> Self {
        Self {
            looping: true,
            ..Self::new(frames)
        }
    }

    /// Make `release` report a failure (after still releasing).
    pub fn with_failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn release_counter(&self) -> ReleaseCounter {
        self.releases.clone()
    }
}

impl CaptureSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn read_frame(&mut self, frame: &mut ColorFrame) -> Result<()> {
        if self.released {
            return Err(anyhow!("scripted source already released"));
        }
        let next = self
            .frames
            .pop_front()
            .ok_or_else(|| anyhow!("scripted source exhausted"))?;
        frame.clone_from(&next);
        if self.looping {
            self.frames.push_back(next);
        }
        self.frames_captured += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.frames.clear();
        self.releases.bump();
        if self.fail_release {
            return Err(anyhow!("scripted source release failed"));
        }
        Ok(())
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frames_captured,
            source: "scripted".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(value: u8) -> ColorFrame {
        ColorFrame::from_pixel(4, 4, Rgb([value, value, value]))
    }

    #[test]
    fn replays_in_order_then_ends() -> Result<()> {
        let mut source = ScriptedSource::new(vec![solid(1), solid(2)]);
        let mut frame = ColorFrame::new(0, 0);

        source.read_frame(&mut frame)?;
        assert_eq!(frame.get_pixel(0, 0), &Rgb([1, 1, 1]));
        source.read_frame(&mut frame)?;
        assert_eq!(frame.get_pixel(0, 0), &Rgb([2, 2, 2]));
        assert!(source.read_frame(&mut frame).is_err());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn looping_never_ends() -> Result<()> {
        let mut source = ScriptedSource::looping(vec![solid(1), solid(2)]);
        let mut frame = ColorFrame::new(0, 0);
        for i in 0..7 {
            source.read_frame(&mut frame)?;
            let expected = if i % 2 == 0 { 1 } else { 2 };
            assert_eq!(frame.get_pixel(0, 0), &Rgb([expected; 3]));
        }
        Ok(())
    }

    #[test]
    fn release_is_idempotent() -> Result<()> {
        let mut source = ScriptedSource::new(vec![solid(1)]);
        let counter = source.release_counter();

        source.release()?;
        source.release()?;

        assert_eq!(counter.get(), 1);
        let mut frame = ColorFrame::new(0, 0);
        assert!(source.read_frame(&mut frame).is_err());
        Ok(())
    }

    #[test]
    fn failing_release_still_counts_once() {
        let mut source = ScriptedSource::new(vec![]).with_failing_release();
        let counter = source.release_counter();

        assert!(source.release().is_err());
        assert!(source.release().is_ok());
        assert_eq!(counter.get(), 1);
    }
}
