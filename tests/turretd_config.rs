use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use tracking_turret::config::{BackgroundRefresh, SourceKind, TurretdConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "TURRET_CONFIG",
        "TURRET_DEVICE",
        "TURRET_MIN_AREA",
        "TURRET_SOURCE",
        "TURRET_SNAPSHOT_DIR",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = TurretdConfig::load().expect("load config");

    assert_eq!(cfg.detector.device, 0);
    assert_eq!(cfg.detector.min_area, 7000.0);
    assert!(cfg.detector.pipeline.mirror);
    assert_eq!(cfg.capture.kind, SourceKind::Device);
    assert!(cfg.snapshot.is_none());
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "device": 1,
            "min_area": 2500,
            "source": "synthetic",
            "pipeline": {
                "threshold": 40,
                "mirror": false,
                "background_refresh": { "every_frames": 300 }
            },
            "synthetic": { "width": 320, "height": 240, "fps": 5 },
            "snapshot": { "dir": "/tmp/turret-snapshots", "interval_ms": 500 }
        }"#,
    );

    std::env::set_var("TURRET_CONFIG", file.path());
    std::env::set_var("TURRET_DEVICE", "3");
    std::env::set_var("TURRET_MIN_AREA", "9000.5");

    let cfg = TurretdConfig::load().expect("load config");

    assert_eq!(cfg.detector.device, 3);
    assert_eq!(cfg.capture.device, 3);
    assert_eq!(cfg.detector.min_area, 9000.5);
    assert_eq!(cfg.detector.pipeline.threshold, 40);
    assert!(!cfg.detector.pipeline.mirror);
    assert_eq!(cfg.detector.pipeline.blur_kernel, 21);
    assert_eq!(
        cfg.detector.pipeline.background_refresh,
        BackgroundRefresh::EveryFrames(300)
    );
    assert_eq!(cfg.capture.kind, SourceKind::Synthetic);
    assert_eq!(cfg.capture.synthetic_width, 320);
    assert_eq!(cfg.capture.synthetic_height, 240);
    assert_eq!(cfg.capture.synthetic_fps, 5);
    let snapshot = cfg.snapshot.expect("snapshot settings");
    assert_eq!(snapshot.dir.to_str(), Some("/tmp/turret-snapshots"));
    assert_eq!(snapshot.interval, Duration::from_millis(500));

    clear_env();
}

#[test]
fn load_from_path_still_applies_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "min_area": 100 }"#);
    std::env::set_var("TURRET_SOURCE", "synthetic");
    std::env::set_var("TURRET_SNAPSHOT_DIR", "/tmp/turret-env");

    let cfg = TurretdConfig::load_from(file.path()).expect("load config");

    assert_eq!(cfg.detector.min_area, 100.0);
    assert_eq!(cfg.capture.kind, SourceKind::Synthetic);
    let snapshot = cfg.snapshot.expect("snapshot settings");
    assert_eq!(snapshot.dir.to_str(), Some("/tmp/turret-env"));
    assert_eq!(snapshot.interval, Duration::from_millis(200));

    clear_env();
}

#[test]
fn unparsable_env_values_are_errors() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("TURRET_DEVICE", "front");
    assert!(TurretdConfig::load().is_err());
    clear_env();

    std::env::set_var("TURRET_MIN_AREA", "lots");
    assert!(TurretdConfig::load().is_err());
    clear_env();

    std::env::set_var("TURRET_SOURCE", "rtsp");
    assert!(TurretdConfig::load().is_err());
    clear_env();
}

#[test]
fn invalid_file_values_fail_validation() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "pipeline": { "blur_kernel": 8 } }"#);
    std::env::set_var("TURRET_CONFIG", file.path());
    assert!(TurretdConfig::load().is_err());

    let file = write_config("{ not json");
    std::env::set_var("TURRET_CONFIG", file.path());
    assert!(TurretdConfig::load().is_err());

    clear_env();
}
