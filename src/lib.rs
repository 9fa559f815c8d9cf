//! Tracking turret motion detector.
//!
//! Reads frames from a camera, finds the most significant region of motion
//! against a reference frame captured at startup, and reports its bounding
//! rectangle to a turret controller while streaming the intermediate images
//! (annotated frame, difference, threshold mask) to a display.
//!
//! # Module Structure
//!
//! - `config`: pipeline and detector parameters, `turretd` file + env loader
//! - `frame`: frame buffers and `MotionRegion`
//! - `detect`: preprocessing, background model, contour selection, overlay
//! - `ingest`: capture sources (V4L2 camera, synthetic scene, scripted frames)
//! - `sink`: motion handler and streamer interfaces with stock implementations
//! - `detector`: the cancellable detection loop

pub mod config;
pub mod detect;
pub mod detector;
pub mod frame;
pub mod ingest;
pub mod sink;

pub use config::{BackgroundRefresh, DetectorConfig, PipelineConfig, TurretdConfig};
pub use detect::{MotionPipeline, SelectedContour};
pub use detector::{
    Detector, DetectorHandle, DetectorState, DetectorStats, RunContext, StopReason,
};
pub use frame::{ColorFrame, GrayFrame, MotionRegion};
pub use ingest::{open_device, CaptureSource, CaptureStats, ScriptedSource, SyntheticSource};
pub use sink::{LogMotionHandler, MotionHandler, NullStreamer, SnapshotStreamer, Streamer};
