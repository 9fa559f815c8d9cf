//! JPEG snapshot streamer.
//!
//! Keeps `frame.jpg`, `delta.jpg` and `thresh.jpg` in one directory current,
//! for a browser or `feh --reload` to watch. Each file is written under a
//! temporary name and renamed into place so readers never see a partial image.
//! Writes are rate-limited; all three images of a cycle are written together
//! or not at all.

use anyhow::{Context, Result};
use image::{ImageFormat, ImageResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::SnapshotSettings;
use crate::frame::{ColorFrame, GrayFrame};
use crate::sink::Streamer;

const FRAME_FILE: &str = "frame.jpg";
const DELTA_FILE: &str = "delta.jpg";
const THRESH_FILE: &str = "thresh.jpg";

pub struct SnapshotStreamer {
    dir: PathBuf,
    interval: Duration,
    last_write: Option<Instant>,
    /// Set by `stream_frame` when this cycle is due; cleared after the mask.
    writing: bool,
    /// All writes of the current cycle succeeded so far.
    cycle_ok: bool,
    written: u64,
}

impl SnapshotStreamer {
    pub fn new(settings: &SnapshotSettings) -> Result<Self> {
        fs::create_dir_all(&settings.dir)
            .with_context(|| format!("create snapshot dir {}", settings.dir.display()))?;
        log::info!(
            "snapshots -> {} (every {:?})",
            settings.dir.display(),
            settings.interval
        );
        Ok(Self {
            dir: settings.dir.clone(),
            interval: settings.interval,
            last_write: None,
            writing: false,
            cycle_ok: false,
            written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of cycles whose three images all reached disk.
    pub fn written(&self) -> u64 {
        self.written
    }

    fn due(&self) -> bool {
        self.last_write
            .map_or(true, |last| last.elapsed() >= self.interval)
    }

    /// Returns false (after logging) when the image did not reach disk.
    fn write<F>(&self, name: &str, save: F) -> bool
    where
        F: FnOnce(&Path) -> ImageResult<()>,
    {
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!(".{}.tmp", name));
        let result = save(&tmp)
            .map_err(anyhow::Error::new)
            .and_then(|()| fs::rename(&tmp, &target).map_err(anyhow::Error::new));
        match result {
            Ok(()) => true,
            Err(err) => {
                log::warn!("snapshot {} failed: {:#}", target.display(), err);
                let _ = fs::remove_file(&tmp);
                false
            }
        }
    }
}

impl Streamer for SnapshotStreamer {
    fn stream_frame(&mut self, frame: &ColorFrame) {
        self.writing = self.due();
        if !self.writing {
            return;
        }
        self.last_write = Some(Instant::now());
        self.cycle_ok = self.write(FRAME_FILE, |path| {
            frame.save_with_format(path, ImageFormat::Jpeg)
        });
    }

    fn stream_delta(&mut self, delta: &GrayFrame) {
        if self.writing {
            let ok = self.write(DELTA_FILE, |path| {
                delta.save_with_format(path, ImageFormat::Jpeg)
            });
            self.cycle_ok &= ok;
        }
    }

    fn stream_threshold(&mut self, thresh: &GrayFrame) {
        if self.writing {
            let ok = self.write(THRESH_FILE, |path| {
                thresh.save_with_format(path, ImageFormat::Jpeg)
            });
            if self.cycle_ok && ok {
                self.written += 1;
            }
            self.writing = false;
        }
    }
}
