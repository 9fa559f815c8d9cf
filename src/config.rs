use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DEVICE: u32 = 0;
pub const DEFAULT_MIN_AREA: f64 = 7000.0;
const DEFAULT_CANONICAL_SIZE: u32 = 500;
const DEFAULT_BLUR_KERNEL: u32 = 21;
const DEFAULT_THRESHOLD: u8 = 50;
const DEFAULT_DILATION_RADIUS: u8 = 1;
const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 200;
const DEFAULT_SYNTHETIC_FPS: u32 = 15;

// ----------------------------------------------------------------------------
// Pipeline parameters
// ----------------------------------------------------------------------------

/// When the reference frame is re-captured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundRefresh {
    /// Keep the startup frame for the whole run.
    #[default]
    Never,
    /// Replace the reference with the current frame every `n` processed frames.
    EveryFrames(u32),
}

/// Fixed parameters of the motion pipeline.
///
/// Built once and handed to `MotionPipeline::new`; nothing reads these values
/// from module-level state.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Every frame is resized to this width before comparison.
    pub canonical_width: u32,
    /// Every frame is resized to this height before comparison.
    pub canonical_height: u32,
    /// Side of the square Gaussian kernel. Must be odd.
    pub blur_kernel: u32,
    /// Difference intensity at or above which a pixel is foreground.
    pub threshold: u8,
    /// Chebyshev radius of the dilation element (1 = 3x3 square).
    pub dilation_radius: u8,
    /// Flip frames horizontally (front-facing capture).
    pub mirror: bool,
    pub background_refresh: BackgroundRefresh,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canonical_width: DEFAULT_CANONICAL_SIZE,
            canonical_height: DEFAULT_CANONICAL_SIZE,
            blur_kernel: DEFAULT_BLUR_KERNEL,
            threshold: DEFAULT_THRESHOLD,
            dilation_radius: DEFAULT_DILATION_RADIUS,
            mirror: true,
            background_refresh: BackgroundRefresh::Never,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.canonical_width == 0 || self.canonical_height == 0 {
            return Err(anyhow!(
                "canonical frame size must be non-zero (got {}x{})",
                self.canonical_width,
                self.canonical_height
            ));
        }
        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return Err(anyhow!(
                "blur kernel must be a positive odd number (got {})",
                self.blur_kernel
            ));
        }
        if let BackgroundRefresh::EveryFrames(0) = self.background_refresh {
            return Err(anyhow!("background refresh interval must be > 0 frames"));
        }
        Ok(())
    }
}

/// Construction parameters for a `Detector`.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    /// Capture device index.
    pub device: u32,
    /// Contours must enclose strictly more than this area (canonical pixels).
    pub min_area: f64,
    pub pipeline: PipelineConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE,
            min_area: DEFAULT_MIN_AREA,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_area.is_finite() || self.min_area < 0.0 {
            return Err(anyhow!(
                "min_area must be a finite, non-negative number (got {})",
                self.min_area
            ));
        }
        self.pipeline.validate()
    }
}

// ----------------------------------------------------------------------------
// turretd configuration (file + env)
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct TurretdConfigFile {
    device: Option<u32>,
    min_area: Option<f64>,
    source: Option<SourceKind>,
    pipeline: Option<PipelineConfigFile>,
    synthetic: Option<SyntheticConfigFile>,
    snapshot: Option<SnapshotConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    canonical_width: Option<u32>,
    canonical_height: Option<u32>,
    blur_kernel: Option<u32>,
    threshold: Option<u8>,
    dilation_radius: Option<u8>,
    mirror: Option<bool>,
    background_refresh: Option<BackgroundRefresh>,
}

#[derive(Debug, Deserialize, Default)]
struct SyntheticConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SnapshotConfigFile {
    dir: Option<PathBuf>,
    interval_ms: Option<u64>,
}

/// Which capture backend `turretd` opens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Device,
    Synthetic,
}

impl std::str::FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "device" => Ok(Self::Device),
            "synthetic" => Ok(Self::Synthetic),
            other => Err(anyhow!(
                "unknown source '{}'; expected 'device' or 'synthetic'",
                other
            )),
        }
    }
}

/// Settings used to open a capture source.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureSettings {
    pub kind: SourceKind,
    pub device: u32,
    pub synthetic_width: u32,
    pub synthetic_height: u32,
    pub synthetic_fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::Device,
            device: DEFAULT_DEVICE,
            synthetic_width: 640,
            synthetic_height: 480,
            synthetic_fps: DEFAULT_SYNTHETIC_FPS,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotSettings {
    pub dir: PathBuf,
    pub interval: Duration,
}

#[derive(Clone, Debug)]
pub struct TurretdConfig {
    pub detector: DetectorConfig,
    pub capture: CaptureSettings,
    pub snapshot: Option<SnapshotSettings>,
}

impl TurretdConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TURRET_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads a specific file, then applies env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TurretdConfigFile) -> Self {
        let defaults = PipelineConfig::default();
        let pipeline_file = file.pipeline.unwrap_or_default();
        let pipeline = PipelineConfig {
            canonical_width: pipeline_file
                .canonical_width
                .unwrap_or(defaults.canonical_width),
            canonical_height: pipeline_file
                .canonical_height
                .unwrap_or(defaults.canonical_height),
            blur_kernel: pipeline_file.blur_kernel.unwrap_or(defaults.blur_kernel),
            threshold: pipeline_file.threshold.unwrap_or(defaults.threshold),
            dilation_radius: pipeline_file
                .dilation_radius
                .unwrap_or(defaults.dilation_radius),
            mirror: pipeline_file.mirror.unwrap_or(defaults.mirror),
            background_refresh: pipeline_file
                .background_refresh
                .unwrap_or(defaults.background_refresh),
        };

        let device = file.device.unwrap_or(DEFAULT_DEVICE);
        let detector = DetectorConfig {
            device,
            min_area: file.min_area.unwrap_or(DEFAULT_MIN_AREA),
            pipeline,
        };

        let capture_defaults = CaptureSettings::default();
        let synthetic = file.synthetic.unwrap_or_default();
        let capture = CaptureSettings {
            kind: file.source.unwrap_or_default(),
            device,
            synthetic_width: synthetic.width.unwrap_or(capture_defaults.synthetic_width),
            synthetic_height: synthetic
                .height
                .unwrap_or(capture_defaults.synthetic_height),
            synthetic_fps: synthetic.fps.unwrap_or(capture_defaults.synthetic_fps),
        };

        let snapshot = file.snapshot.and_then(|snapshot| {
            let interval_ms = snapshot.interval_ms.unwrap_or(DEFAULT_SNAPSHOT_INTERVAL_MS);
            snapshot.dir.map(|dir| SnapshotSettings {
                dir,
                interval: Duration::from_millis(interval_ms),
            })
        });

        Self {
            detector,
            capture,
            snapshot,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("TURRET_DEVICE") {
            if !device.trim().is_empty() {
                let device: u32 = device
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("TURRET_DEVICE must be a non-negative integer"))?;
                self.set_device(device);
            }
        }
        if let Ok(area) = std::env::var("TURRET_MIN_AREA") {
            if !area.trim().is_empty() {
                self.detector.min_area = area
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("TURRET_MIN_AREA must be a number"))?;
            }
        }
        if let Ok(source) = std::env::var("TURRET_SOURCE") {
            if !source.trim().is_empty() {
                self.capture.kind = source.parse()?;
            }
        }
        if let Ok(dir) = std::env::var("TURRET_SNAPSHOT_DIR") {
            if !dir.trim().is_empty() {
                self.set_snapshot_dir(PathBuf::from(dir));
            }
        }
        Ok(())
    }

    pub fn set_device(&mut self, device: u32) {
        self.detector.device = device;
        self.capture.device = device;
    }

    pub fn set_snapshot_dir(&mut self, dir: PathBuf) {
        let interval = self
            .snapshot
            .as_ref()
            .map(|snapshot| snapshot.interval)
            .unwrap_or(Duration::from_millis(DEFAULT_SNAPSHOT_INTERVAL_MS));
        self.snapshot = Some(SnapshotSettings { dir, interval });
    }

    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        if self.capture.kind == SourceKind::Synthetic
            && (self.capture.synthetic_width == 0 || self.capture.synthetic_height == 0)
        {
            return Err(anyhow!("synthetic source size must be non-zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<TurretdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
