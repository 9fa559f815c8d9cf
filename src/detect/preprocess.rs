//! Frame normalisation ahead of differencing.
//!
//! Every frame goes through the same fixed steps:
//! 1. Resize to the canonical resolution (bilinear), so detection sensitivity
//!    does not depend on the camera resolution.
//! 2. Optionally mirror horizontally (front-facing capture).
//! 3. Convert to single-channel intensity.
//! 4. Gaussian blur with a square kernel and reflect-101 borders, to suppress
//!    sensor noise before differencing.
//!
//! Steps 1 and 2 rewrite the colour frame in place, so the frame handed to the
//! streamer has the same geometry as the rectangles reported to the handler.

use image::imageops::{self, FilterType};

use crate::config::PipelineConfig;
use crate::frame::{reshape_gray, ColorFrame, GrayFrame};

pub struct FramePreprocessor {
    width: u32,
    height: u32,
    mirror: bool,
    kernel: Vec<f32>,
    /// Horizontal-pass output, reused across frames.
    scratch: Vec<f32>,
}

impl FramePreprocessor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            width: config.canonical_width,
            height: config.canonical_height,
            mirror: config.mirror,
            kernel: gaussian_kernel(config.blur_kernel),
            scratch: Vec::new(),
        }
    }

    pub fn canonical_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Normalise `frame` in place and write its blurred intensity into `gray`.
    ///
    /// `frame` must be non-empty; the detector rejects empty reads before
    /// they get here.
    pub fn process(&mut self, frame: &mut ColorFrame, gray: &mut GrayFrame) {
        self.normalize(frame);
        to_intensity(frame, gray);
        self.blur_in_place(gray);
    }

    /// Resize to the canonical resolution and apply the mirror setting.
    pub fn normalize(&self, frame: &mut ColorFrame) {
        if frame.dimensions() != (self.width, self.height) {
            *frame = imageops::resize(frame, self.width, self.height, FilterType::Triangle);
        }
        if self.mirror {
            imageops::flip_horizontal_in_place(frame);
        }
    }

    fn blur_in_place(&mut self, gray: &mut GrayFrame) {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        if w == 0 || h == 0 {
            return;
        }
        let radius = (self.kernel.len() / 2) as isize;
        self.scratch.clear();
        self.scratch.resize(w * h, 0.0);

        let src = gray.as_raw();
        for y in 0..h {
            let row = &src[y * w..(y + 1) * w];
            for x in 0..w {
                let mut acc = 0.0f32;
                for (k, weight) in self.kernel.iter().enumerate() {
                    let sx = reflect_101(x as isize + k as isize - radius, w);
                    acc += weight * row[sx] as f32;
                }
                self.scratch[y * w + x] = acc;
            }
        }

        let dst: &mut [u8] = gray;
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0f32;
                for (k, weight) in self.kernel.iter().enumerate() {
                    let sy = reflect_101(y as isize + k as isize - radius, h);
                    acc += weight * self.scratch[sy * w + x];
                }
                dst[y * w + x] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// BT.601 luma (0.299 R + 0.587 G + 0.114 B) into a reusable buffer.
fn to_intensity(frame: &ColorFrame, gray: &mut GrayFrame) {
    reshape_gray(gray, frame.width(), frame.height());
    for (src, dst) in frame.as_raw().chunks_exact(3).zip(gray.iter_mut()) {
        *dst = bt601_luma(src[0], src[1], src[2]);
    }
}

fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
    ((weighted + 500) / 1000) as u8
}

/// Normalised 1-D Gaussian weights for an odd `size`.
///
/// Sigma is derived from the kernel size the same way common vision
/// libraries do when no sigma is given: `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub(crate) fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = size.max(1) as usize;
    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size as f64 - 1.0) / 2.0;
    let scale = -0.5 / (sigma * sigma);
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - center;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / sum) as f32).collect()
}

/// Border index for reflect-101 (`gfedcb|abcdefgh|gfedcba`).
pub(crate) fn reflect_101(mut i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}
