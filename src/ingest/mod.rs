//! Frame capture sources.
//!
//! This module provides the sources the detector can read from:
//! - V4L2 camera devices by index (feature: ingest-v4l2)
//! - Synthetic moving-target scene (demos, no camera needed)
//! - Scripted frame list (tests)
//!
//! Every source fills a caller-owned `ColorFrame`, so the detector keeps one
//! frame allocation for the whole run. A failed read means the stream ended or
//! the device went away; the detector stops on it and does not retry.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod scripted;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;

use crate::config::{CaptureSettings, SourceKind};
use crate::frame::ColorFrame;

pub use scripted::{ReleaseCounter, ScriptedSource};
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// Frame statistics for a capture source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub source: String,
}

/// A source of colour frames.
pub trait CaptureSource: Send {
    /// Source identifier for logs.
    fn name(&self) -> &str;

    /// Read the next frame into `frame`, replacing its contents.
    ///
    /// An error means end of stream or disconnection. Implementations may
    /// reallocate `frame` when the incoming size differs.
    fn read_frame(&mut self, frame: &mut ColorFrame) -> Result<()>;

    /// Release the underlying device. Calling this more than once is a no-op.
    fn release(&mut self) -> Result<()>;

    fn stats(&self) -> CaptureStats;
}

/// Open the source described by `settings`.
pub fn open_device(settings: &CaptureSettings) -> Result<Box<dyn CaptureSource>> {
    match settings.kind {
        SourceKind::Synthetic => Ok(Box::new(SyntheticSource::new(SyntheticConfig {
            width: settings.synthetic_width,
            height: settings.synthetic_height,
            target_fps: settings.synthetic_fps,
            ..SyntheticConfig::default()
        })?)),
        SourceKind::Device => open_camera(settings.device),
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_camera(index: u32) -> Result<Box<dyn CaptureSource>> {
    let mut source = V4l2Source::new(V4l2Config::for_index(index))?;
    source.connect()?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_camera(index: u32) -> Result<Box<dyn CaptureSource>> {
    Err(anyhow::anyhow!(
        "cannot open capture device {}: camera capture requires the ingest-v4l2 feature",
        index
    ))
}
