//! turretd - tracking turret motion detector daemon
//!
//! This daemon:
//! 1. Loads configuration (TURRET_CONFIG file, env overrides, CLI flags)
//! 2. Opens the capture source (camera index or synthetic scene)
//! 3. Captures the background and runs the detection loop on its own thread
//! 4. Logs aim offsets for every motion region
//! 5. Optionally keeps JPEG snapshots of the three streamed images current
//! 6. Stops cleanly on Ctrl-C / SIGTERM or when the source ends

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use tracking_turret::config::SourceKind;
use tracking_turret::{
    open_device, Detector, LogMotionHandler, NullStreamer, RunContext, SnapshotStreamer,
    StopReason, Streamer, TurretdConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Motion detector for a tracking turret")]
struct Args {
    /// Capture device index (/dev/videoN).
    #[arg(long)]
    device: Option<u32>,

    /// Minimum contour area, in canonical-frame pixels, that counts as motion.
    #[arg(long)]
    area: Option<f64>,

    /// JSON config file.
    #[arg(long, env = "TURRET_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep frame.jpg, delta.jpg and thresh.jpg current in this directory.
    #[arg(long, value_name = "DIR")]
    snapshot_dir: Option<PathBuf>,

    /// Use the synthetic moving-target scene instead of a camera.
    #[arg(long)]
    synthetic: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => TurretdConfig::load_from(path)?,
        None => TurretdConfig::load()?,
    };
    if let Some(device) = args.device {
        cfg.set_device(device);
    }
    if let Some(area) = args.area {
        cfg.detector.min_area = area;
    }
    if let Some(dir) = args.snapshot_dir {
        cfg.set_snapshot_dir(dir);
    }
    if args.synthetic {
        cfg.capture.kind = SourceKind::Synthetic;
    }
    cfg.validate()?;

    let source = open_device(&cfg.capture)?;
    let handler = LogMotionHandler::new(
        cfg.detector.pipeline.canonical_width,
        cfg.detector.pipeline.canonical_height,
    );
    let streamer: Box<dyn Streamer> = match &cfg.snapshot {
        Some(settings) => Box::new(SnapshotStreamer::new(settings)?),
        None => Box::new(NullStreamer),
    };
    let detector = Detector::with_source(cfg.detector.clone(), source, handler, streamer)?;

    let ctx = RunContext::new();
    let signal_ctx = ctx.clone();
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received, stopping detector...");
        signal_ctx.cancel();
    })
    .expect("error setting Ctrl-C handler");

    log::info!(
        "turretd running: source={:?} device={} min_area={}",
        cfg.capture.kind,
        cfg.capture.device,
        cfg.detector.min_area
    );
    let handle = detector.spawn(ctx)?;
    let (reason, stats) = handle.wait()?;

    match reason {
        StopReason::Cancelled => log::info!("turretd stopped"),
        StopReason::SourceExhausted => log::warn!("turretd stopped: capture source ended"),
    }
    log::info!(
        "processed {} frames, {} motion events",
        stats.frames_processed,
        stats.motion_events
    );
    Ok(())
}
