//! Synthetic frame source.
//!
//! Renders a static textured scene with one bright square sweeping back and
//! forth across it, plus low-amplitude sensor noise. Useful for running the
//! daemon and exercising the pipeline without a camera.

use anyhow::{anyhow, Result};
use image::Rgb;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use rand::Rng;
use std::time::{Duration, Instant};

use super::{CaptureSource, CaptureStats};
use crate::frame::ColorFrame;

const TARGET_COLOR: Rgb<u8> = Rgb([235, 235, 235]);

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    /// Frames per second to pace reads at. 0 reads as fast as possible.
    pub target_fps: u32,
    /// Side of the moving square, in pixels.
    pub target_size: u32,
    /// Pixels the square moves per frame.
    pub target_speed: u32,
    /// Frames before the target first appears; the first frame is always empty.
    pub warmup_frames: u64,
    /// Maximum absolute noise added to each channel.
    pub noise: u8,
    /// End the stream after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            target_fps: 15,
            target_size: 120,
            target_speed: 8,
            warmup_frames: 10,
            noise: 3,
            max_frames: None,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    background: ColorFrame,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    released: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic source size must be non-zero"));
        }
        let background = render_background(config.width, config.height);
        log::info!(
            "SyntheticSource: {}x{} @ {} fps",
            config.width,
            config.height,
            config.target_fps
        );
        Ok(Self {
            config,
            background,
            frame_count: 0,
            last_frame_at: None,
            released: false,
        })
    }

    /// Horizontal position of the target for a frame, bouncing between the
    /// left and right edges.
    fn target_x(&self, frame_index: u64) -> u32 {
        let span = self.config.width.saturating_sub(self.config.target_size) as u64;
        if span == 0 {
            return 0;
        }
        let travel = frame_index * self.config.target_speed as u64 % (2 * span);
        if travel <= span {
            travel as u32
        } else {
            (2 * span - travel) as u32
        }
    }

    fn pace(&mut self) {
        if self.config.target_fps == 0 {
            return;
        }
        let interval = Duration::from_secs(1) / self.config.target_fps;
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

impl CaptureSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn read_frame(&mut self, frame: &mut ColorFrame) -> Result<()> {
        if self.released {
            return Err(anyhow!("synthetic source released"));
        }
        if let Some(max) = self.config.max_frames {
            if self.frame_count >= max {
                return Err(anyhow!("synthetic source reached {} frames", max));
            }
        }
        self.pace();

        frame.clone_from(&self.background);
        if self.frame_count > 0 && self.frame_count >= self.config.warmup_frames {
            let x = self.target_x(self.frame_count - self.config.warmup_frames);
            let y = self.config.height.saturating_sub(self.config.target_size) / 2;
            let rect = Rect::at(x as i32, y as i32)
                .of_size(self.config.target_size.max(1), self.config.target_size.max(1));
            draw_filled_rect_mut(frame, rect, TARGET_COLOR);
        }
        if self.config.noise > 0 {
            let amplitude = self.config.noise as i16;
            let mut rng = rand::thread_rng();
            for channel in frame.iter_mut() {
                let jitter = rng.gen_range(-amplitude..=amplitude);
                *channel = (*channel as i16 + jitter).clamp(0, 255) as u8;
            }
        }

        self.frame_count += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            self.released = true;
            log::debug!(
                "SyntheticSource: released after {} frames",
                self.frame_count
            );
        }
        Ok(())
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frame_count,
            source: format!("synthetic:{}x{}", self.config.width, self.config.height),
        }
    }
}

/// Low-contrast diagonal stripes, so the scene is not perfectly flat.
fn render_background(width: u32, height: u32) -> ColorFrame {
    ColorFrame::from_fn(width, height, |x, y| {
        let band = ((x + y) / 16 % 4) as u8;
        Rgb([60 + band * 6, 70 + band * 5, 55 + band * 4])
    })
}
