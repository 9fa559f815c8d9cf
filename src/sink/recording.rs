//! Recording sinks.
//!
//! A `Recorder` hands out a handler and a streamer that append to one shared
//! event log, so the relative order of motion callbacks and stream
//! publications can be checked after the sinks have moved into a detector.
//! Images are copied on receipt; the detector's buffers are never retained.
//! The log keeps only the most recent events, so a recorder can sit behind a
//! long-running detector without growing without bound.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::frame::{ColorFrame, GrayFrame, MotionRegion};
use crate::sink::{MotionHandler, Streamer};

/// One sink invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Motion(MotionRegion),
    Frame,
    Delta,
    Threshold,
}

const DEFAULT_EVENT_CAPACITY: usize = 4096;

struct Recording {
    capacity: usize,
    events: VecDeque<SinkEvent>,
    cycles: usize,
    motion_events: usize,
    last_frame: Option<ColorFrame>,
    last_delta: Option<GrayFrame>,
    last_threshold: Option<GrayFrame>,
}

impl Recording {
    fn push(&mut self, event: SinkEvent) {
        match event {
            SinkEvent::Frame => self.cycles += 1,
            SinkEvent::Motion(_) => self.motion_events += 1,
            _ => {}
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

#[derive(Clone)]
pub struct Recorder {
    inner: Arc<Mutex<Recording>>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` events (oldest dropped first). Counters keep
    /// counting past the cap.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recording {
                capacity: capacity.max(1),
                events: VecDeque::new(),
                cycles: 0,
                motion_events: 0,
                last_frame: None,
                last_delta: None,
                last_threshold: None,
            })),
        }
    }

    pub fn handler(&self) -> RecordingHandler {
        RecordingHandler {
            recorder: self.clone(),
        }
    }

    pub fn streamer(&self) -> RecordingStreamer {
        RecordingStreamer {
            recorder: self.clone(),
        }
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.lock().events.iter().cloned().collect()
    }

    /// Retained regions passed to the handler, in call order.
    pub fn motions(&self) -> Vec<MotionRegion> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Motion(region) => Some(*region),
                _ => None,
            })
            .collect()
    }

    /// Number of `stream_frame` calls, i.e. completed cycles.
    pub fn cycles(&self) -> usize {
        self.lock().cycles
    }

    /// Number of `handle_motion` calls.
    pub fn motion_events(&self) -> usize {
        self.lock().motion_events
    }

    pub fn last_frame(&self) -> Option<ColorFrame> {
        self.lock().last_frame.clone()
    }

    pub fn last_delta(&self) -> Option<GrayFrame> {
        self.lock().last_delta.clone()
    }

    pub fn last_threshold(&self) -> Option<GrayFrame> {
        self.lock().last_threshold.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        // A panicking test thread must not hide what was recorded.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct RecordingHandler {
    recorder: Recorder,
}

impl MotionHandler for RecordingHandler {
    fn handle_motion(&mut self, region: MotionRegion) {
        self.recorder.lock().push(SinkEvent::Motion(region));
    }
}

pub struct RecordingStreamer {
    recorder: Recorder,
}

impl Streamer for RecordingStreamer {
    fn stream_frame(&mut self, frame: &ColorFrame) {
        let mut recording = self.recorder.lock();
        recording.push(SinkEvent::Frame);
        recording.last_frame = Some(frame.clone());
    }

    fn stream_delta(&mut self, delta: &GrayFrame) {
        let mut recording = self.recorder.lock();
        recording.push(SinkEvent::Delta);
        recording.last_delta = Some(delta.clone());
    }

    fn stream_threshold(&mut self, thresh: &GrayFrame) {
        let mut recording = self.recorder.lock();
        recording.push(SinkEvent::Threshold);
        recording.last_threshold = Some(thresh.clone());
    }
}
