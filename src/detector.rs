//! Detection loop.
//!
//! `Detector` owns the capture source, the motion pipeline and every working
//! buffer. Construction reads the first frame and turns it into the
//! background reference; `run` then repeats read, process, dispatch until the
//! run context is cancelled or a read fails. Either way the loop releases its
//! resources before returning, exactly once.
//!
//! Per cycle the motion handler (only when a region qualified) and then the
//! streamer (frame, delta, threshold) are called synchronously, so a slow sink
//! throttles capture.

use anyhow::{anyhow, bail, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::{CaptureSettings, DetectorConfig, SourceKind};
use crate::detect::{annotate_motion, MotionPipeline};
use crate::frame::{empty_color, ColorFrame};
use crate::ingest::{open_device, CaptureSource};
use crate::sink::{MotionHandler, Streamer};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

// ---- run context ----

/// Cooperative cancellation token, checked once at the top of every cycle.
#[derive(Clone, Debug, Default)]
pub struct RunContext {
    cancelled: Arc<AtomicBool>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Why the loop stopped. Both are normal terminations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    /// A frame read failed: end of stream or disconnect.
    SourceExhausted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectorStats {
    pub frames_processed: u64,
    pub motion_events: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorState {
    /// Background captured, loop not started.
    Ready,
    Running,
    /// Terminal.
    Stopped,
}

// ---- detector ----

pub struct Detector {
    source: Box<dyn CaptureSource>,
    pipeline: MotionPipeline,
    frame: ColorFrame,
    handler: Box<dyn MotionHandler>,
    streamer: Box<dyn Streamer>,
    state: DetectorState,
    released: bool,
    cleanup_error: Option<anyhow::Error>,
    stats: DetectorStats,
}

impl Detector {
    /// Open capture device `config.device` and capture the background.
    pub fn open<H, S>(config: DetectorConfig, handler: H, streamer: S) -> Result<Self>
    where
        H: MotionHandler + 'static,
        S: Streamer + 'static,
    {
        let settings = CaptureSettings {
            kind: SourceKind::Device,
            device: config.device,
            ..CaptureSettings::default()
        };
        let source = open_device(&settings)
            .with_context(|| format!("open capture device {}", config.device))?;
        Self::with_source(config, source, handler, streamer)
    }

    /// Build a detector over an already opened source.
    ///
    /// On failure the source has been released and the detector does not
    /// exist.
    pub fn with_source<H, S>(
        config: DetectorConfig,
        mut source: Box<dyn CaptureSource>,
        handler: H,
        streamer: S,
    ) -> Result<Self>
    where
        H: MotionHandler + 'static,
        S: Streamer + 'static,
    {
        let mut frame = empty_color();
        let ready = config
            .validate()
            .and_then(|()| read_first_frame(source.as_mut(), &mut frame));
        if let Err(err) = ready {
            if let Err(release_err) = source.release() {
                log::warn!(
                    "release {} after failed start: {:#}",
                    source.name(),
                    release_err
                );
            }
            return Err(err);
        }

        let pipeline = MotionPipeline::new(&config.pipeline, config.min_area, &mut frame);
        let (width, height) = pipeline.canonical_size();
        log::info!(
            "detector ready: source={} canonical={}x{} min_area={}",
            source.name(),
            width,
            height,
            config.min_area
        );

        Ok(Self {
            source,
            pipeline,
            frame,
            handler: Box::new(handler),
            streamer: Box::new(streamer),
            state: DetectorState::Ready,
            released: false,
            cleanup_error: None,
            stats: DetectorStats::default(),
        })
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn stats(&self) -> DetectorStats {
        self.stats
    }

    pub fn pipeline(&self) -> &MotionPipeline {
        &self.pipeline
    }

    /// Run until `ctx` is cancelled or a read fails, then release everything.
    ///
    /// A detector runs once; calling this on a stopped detector is an error.
    pub fn run(&mut self, ctx: &RunContext) -> Result<StopReason> {
        if self.state != DetectorState::Ready {
            bail!("detector cannot run from state {:?}", self.state);
        }
        self.state = DetectorState::Running;
        log::info!("detector running on {}", self.source.name());

        let mut last_health_log = Instant::now();
        let reason = loop {
            if ctx.is_cancelled() {
                break StopReason::Cancelled;
            }
            if let Err(err) = self.source.read_frame(&mut self.frame) {
                log::info!("capture ended on {}: {:#}", self.source.name(), err);
                break StopReason::SourceExhausted;
            }
            if self.frame.width() == 0 || self.frame.height() == 0 {
                log::warn!("{} returned an empty frame, stopping", self.source.name());
                break StopReason::SourceExhausted;
            }

            self.cycle();

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let capture = self.source.stats();
                log::info!(
                    "detector health frames={} motion_events={} captured={} source={}",
                    self.stats.frames_processed,
                    self.stats.motion_events,
                    capture.frames_captured,
                    capture.source
                );
                last_health_log = Instant::now();
            }
        };

        log::info!(
            "detector stopped ({:?}) after {} frames, {} motion events",
            reason,
            self.stats.frames_processed,
            self.stats.motion_events
        );
        if let Err(err) = self.release_all() {
            log::warn!("cleanup after stop: {:#}", err);
            self.cleanup_error = Some(err);
        }
        Ok(reason)
    }

    /// Release the source and all buffers. Safe to call any number of times;
    /// reports the first cleanup failure once.
    pub fn close(&mut self) -> Result<()> {
        let result = self.release_all();
        match (self.cleanup_error.take(), result) {
            (Some(first), Err(later)) => {
                log::warn!("additional cleanup failure: {:#}", later);
                Err(first)
            }
            (Some(first), Ok(())) => Err(first),
            (None, result) => result,
        }
    }

    /// Move the detector onto its own thread and start the loop.
    pub fn spawn(self, ctx: RunContext) -> Result<DetectorHandle> {
        let thread_ctx = ctx.clone();
        let join = std::thread::Builder::new()
            .name("turret-detector".to_string())
            .spawn(move || -> Result<(StopReason, DetectorStats)> {
                let mut detector = self;
                let reason = detector.run(&thread_ctx)?;
                if let Err(err) = detector.close() {
                    log::warn!("detector cleanup failed: {:#}", err);
                }
                Ok((reason, detector.stats()))
            })
            .context("spawn detector thread")?;
        Ok(DetectorHandle {
            ctx,
            join: Some(join),
        })
    }

    fn cycle(&mut self) {
        if let Some(selected) = self.pipeline.process(&mut self.frame) {
            self.stats.motion_events += 1;
            log::debug!(
                "motion region {:?} area={:.0}",
                selected.region,
                selected.area
            );
            annotate_motion(&mut self.frame, &selected.region);
            self.handler.handle_motion(selected.region);
        }
        self.streamer.stream_frame(&self.frame);
        self.streamer.stream_delta(self.pipeline.delta());
        self.streamer.stream_threshold(self.pipeline.threshold());
        self.stats.frames_processed += 1;
    }

    fn release_all(&mut self) -> Result<()> {
        self.state = DetectorState::Stopped;
        if self.released {
            return Ok(());
        }
        self.released = true;

        let result = self
            .source
            .release()
            .with_context(|| format!("release capture source {}", self.source.name()));
        self.pipeline.release();
        self.frame = empty_color();
        log::debug!("detector resources released");
        result
    }
}

impl Drop for Detector {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.release_all() {
                log::warn!("cleanup on drop: {:#}", err);
            }
        }
    }
}

fn read_first_frame(source: &mut dyn CaptureSource, frame: &mut ColorFrame) -> Result<()> {
    source
        .read_frame(frame)
        .with_context(|| format!("read first frame from {}", source.name()))?;
    if frame.width() == 0 || frame.height() == 0 {
        return Err(anyhow!("{} returned an empty first frame", source.name()));
    }
    Ok(())
}

// ---- handle ----

/// A detector running on its own thread.
pub struct DetectorHandle {
    ctx: RunContext,
    join: Option<JoinHandle<Result<(StopReason, DetectorStats)>>>,
}

impl DetectorHandle {
    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |join| join.is_finished())
    }

    /// Cancel and wait for the loop to finish.
    pub fn stop(self) -> Result<StopReason> {
        self.cancel();
        self.wait().map(|(reason, _)| reason)
    }

    /// Wait for the loop to finish on its own (or after an earlier cancel).
    pub fn wait(mut self) -> Result<(StopReason, DetectorStats)> {
        let join = self
            .join
            .take()
            .ok_or_else(|| anyhow!("detector thread already joined"))?;
        join.join()
            .map_err(|_| anyhow!("detector thread panicked"))?
    }
}

impl Drop for DetectorHandle {
    /// A handle dropped without `stop` or `wait` still stops its loop.
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            self.ctx.cancel();
            match join.join() {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => log::warn!("detector thread failed: {:#}", err),
                Err(_) => log::warn!("detector thread panicked"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::frame::MotionRegion;
    use crate::ingest::ScriptedSource;
    use crate::sink::{NullStreamer, Recorder};
    use image::Rgb;

    fn config() -> DetectorConfig {
        DetectorConfig {
            min_area: 100.0,
            pipeline: PipelineConfig {
                canonical_width: 64,
                canonical_height: 64,
                blur_kernel: 5,
                mirror: false,
                ..PipelineConfig::default()
            },
            ..DetectorConfig::default()
        }
    }

    fn plain() -> ColorFrame {
        ColorFrame::from_pixel(64, 64, Rgb([30, 30, 30]))
    }

    #[test]
    fn run_context_is_shared_between_clones() {
        let ctx = RunContext::new();
        let clone = ctx.clone();
        assert!(!clone.is_cancelled());
        ctx.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn states_follow_lifecycle() -> Result<()> {
        let source = ScriptedSource::new(vec![plain(), plain()]);
        let mut detector =
            Detector::with_source(config(), Box::new(source), |_: MotionRegion| {}, NullStreamer)?;
        assert_eq!(detector.state(), DetectorState::Ready);

        let reason = detector.run(&RunContext::new())?;
        assert_eq!(reason, StopReason::SourceExhausted);
        assert_eq!(detector.state(), DetectorState::Stopped);
        assert_eq!(detector.stats().frames_processed, 1);

        assert!(detector.run(&RunContext::new()).is_err());
        Ok(())
    }

    #[test]
    fn close_before_run_prevents_running() -> Result<()> {
        let source = ScriptedSource::new(vec![plain(), plain()]);
        let counter = source.release_counter();
        let mut detector =
            Detector::with_source(config(), Box::new(source), |_: MotionRegion| {}, NullStreamer)?;

        detector.close()?;
        detector.close()?;

        assert_eq!(counter.get(), 1);
        assert!(detector.run(&RunContext::new()).is_err());
        Ok(())
    }

    #[test]
    fn drop_releases_once() -> Result<()> {
        let source = ScriptedSource::new(vec![plain()]);
        let counter = source.release_counter();
        let detector =
            Detector::with_source(config(), Box::new(source), |_: MotionRegion| {}, NullStreamer)?;
        drop(detector);
        assert_eq!(counter.get(), 1);
        Ok(())
    }

    #[test]
    fn invalid_config_releases_source() {
        let source = ScriptedSource::new(vec![plain()]);
        let counter = source.release_counter();
        let bad = DetectorConfig {
            min_area: -1.0,
            ..config()
        };
        let result =
            Detector::with_source(bad, Box::new(source), |_: MotionRegion| {}, NullStreamer);
        assert!(result.is_err());
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn spawned_detector_cleanup_failure_still_reports_reason() -> Result<()> {
        let source = ScriptedSource::new(vec![plain(), plain()]).with_failing_release();
        let counter = source.release_counter();
        let detector =
            Detector::with_source(config(), Box::new(source), |_: MotionRegion| {}, NullStreamer)?;

        let (reason, stats) = detector.spawn(RunContext::new())?.wait()?;

        assert_eq!(reason, StopReason::SourceExhausted);
        assert_eq!(stats.frames_processed, 1);
        assert_eq!(counter.get(), 1);
        Ok(())
    }

    #[test]
    fn dropping_handle_cancels_and_joins() -> Result<()> {
        let source = ScriptedSource::looping(vec![plain()]);
        let counter = source.release_counter();
        let detector =
            Detector::with_source(config(), Box::new(source), |_: MotionRegion| {}, NullStreamer)?;

        let handle = detector.spawn(RunContext::new())?;
        drop(handle);

        assert_eq!(counter.get(), 1);
        Ok(())
    }

    #[test]
    fn spawned_detector_reports_stats() -> Result<()> {
        let source = ScriptedSource::new(vec![plain(), plain(), plain()]);
        let recorder = Recorder::new();
        let detector = Detector::with_source(
            config(),
            Box::new(source),
            recorder.handler(),
            recorder.streamer(),
        )?;

        let handle = detector.spawn(RunContext::new())?;
        let (reason, stats) = handle.wait()?;

        assert_eq!(reason, StopReason::SourceExhausted);
        assert_eq!(stats.frames_processed, 2);
        assert_eq!(stats.motion_events, 0);
        assert_eq!(recorder.cycles(), 2);
        Ok(())
    }
}
