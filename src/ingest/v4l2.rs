//! V4L2 camera source.
//!
//! This module provides `V4l2Source` for reading frames from a local V4L2
//! device node (e.g. /dev/video0), selected by index the way the daemon's
//! `--device` flag names it.
//!
//! The source is responsible for:
//! - Negotiating a frame format (RGB3 preferred, YUYV accepted)
//! - Streaming through memory-mapped driver buffers
//! - Decoding each buffer into the caller's colour frame
//!
//! Frames are never copied out of the driver buffer except into the caller's
//! frame.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{decode_into, PixelFormat};
use super::{CaptureSource, CaptureStats};
use crate::frame::ColorFrame;

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Requested frame rate. 0 keeps the driver default.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Number of memory-mapped driver buffers.
    pub buffers: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 0,
            width: 640,
            height: 480,
            buffers: 4,
        }
    }
}

impl V4l2Config {
    /// Configuration for `/dev/video<index>`.
    pub fn for_index(index: u32) -> Self {
        Self {
            device: format!("/dev/video{}", index),
            ..Self::default()
        }
    }
}

pub struct V4l2Source {
    config: V4l2Config,
    state: Option<V4l2State>,
    format: PixelFormat,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Result<Self> {
        if config.buffers == 0 {
            return Err(anyhow!("v4l2 buffer count must be non-zero"));
        }
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Rgb24,
            frame_count: 0,
        })
    }

    /// Open the device and start streaming.
    pub fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        self.format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "{} negotiated unsupported pixel format {}",
                self.config.device,
                format.fourcc
            )
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let buffers = self.config.buffers;
        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, buffers)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }
}

impl CaptureSource for V4l2Source {
    fn name(&self) -> &str {
        &self.config.device
    }

    fn read_frame(&mut self, frame: &mut ColorFrame) -> Result<()> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let (width, height, format) = (self.active_width, self.active_height, self.format);
        state.with_mut(|fields| -> Result<()> {
            let (buf, _meta) = fields.stream.next().context("capture v4l2 frame")?;
            decode_into(buf, width, height, format, frame)
        })?;

        self.frame_count += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        // Dropping the stream unmaps the buffers, then the device is closed.
        if self.state.take().is_some() {
            log::info!(
                "V4l2Source: released {} after {} frames",
                self.config.device,
                self.frame_count
            );
        }
        Ok(())
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frame_count,
            source: self.config.device.clone(),
        }
    }
}
