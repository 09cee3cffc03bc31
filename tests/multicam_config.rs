use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use multicam::config::CaptureConfig;
use multicam::{BackendId, CameraId, Driver};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "MULTICAM_CONFIG",
        "MULTICAM_CAMERAS",
        "MULTICAM_DRIVER",
        "MULTICAM_BACKEND",
        "MULTICAM_MAX_RETRIES",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "cameras": [0, 1, 2],
        "initial_camera": 1,
        "driver": "synthetic",
        "format": { "width": 320, "height": 240, "target_fps": 15, "buffer_count": 1 },
        "retry": {
            "open_timeout_ms": 3000,
            "read_timeout_ms": 500,
            "failure_threshold": 4,
            "failure_window_ms": 1500,
            "max_retries": 6,
            "backoff_base_ms": 250,
            "backoff_cap_ms": 4000
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("MULTICAM_CONFIG", file.path());
    std::env::set_var("MULTICAM_BACKEND", "dshow");
    std::env::set_var("MULTICAM_MAX_RETRIES", "2");

    let cfg = CaptureConfig::load().expect("load config");

    assert_eq!(cfg.cameras, vec![CameraId(0), CameraId(1), CameraId(2)]);
    assert_eq!(cfg.initial_camera, CameraId(1));
    assert_eq!(cfg.driver, Driver::Synthetic);
    assert_eq!(cfg.backend, Some(BackendId::DirectShow));
    assert_eq!((cfg.format.width, cfg.format.height), (320, 240));
    assert_eq!(cfg.format.target_fps, 15);
    assert_eq!(cfg.format.buffer_count, 1);
    assert_eq!(cfg.retry.open_timeout, Duration::from_millis(3000));
    assert_eq!(cfg.retry.read_timeout, Duration::from_millis(500));
    assert_eq!(cfg.retry.failure_threshold, 4);
    assert_eq!(cfg.retry.failure_window, Duration::from_millis(1500));
    assert_eq!(cfg.retry.max_retries, 2);
    assert_eq!(cfg.retry.backoff_base, Duration::from_millis(250));
    assert_eq!(cfg.retry.backoff_cap, Duration::from_millis(4000));

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
cameras = [2, 5]
backend = "v4l2"

[retry]
max_retries = 3
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = CaptureConfig::from_path(file.path()).expect("load config");

    assert_eq!(cfg.cameras, vec![CameraId(2), CameraId(5)]);
    assert_eq!(cfg.initial_camera, CameraId(2));
    assert_eq!(cfg.backend, Some(BackendId::V4l2));
    assert_eq!(cfg.retry.max_retries, 3);
    assert_eq!(cfg.retry.failure_threshold, 5);

    clear_env();
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = CaptureConfig::load().expect("load defaults");

    assert_eq!(cfg.cameras, vec![CameraId(0)]);
    assert_eq!(cfg.driver, Driver::Synthetic);
    assert_eq!(cfg.backend, None);
    assert_eq!(cfg.retry.max_retries, 10);
    assert_eq!(cfg.retry.backoff_cap, Duration::from_secs(5));
}

#[test]
fn camera_list_override_moves_initial_selection() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MULTICAM_CAMERAS", "3, 4");
    let cfg = CaptureConfig::load().expect("load config");
    assert_eq!(cfg.cameras, vec![CameraId(3), CameraId(4)]);
    assert_eq!(cfg.initial_camera, CameraId(3));

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MULTICAM_MAX_RETRIES", "lots");
    assert!(CaptureConfig::load().is_err());
    clear_env();

    std::env::set_var("MULTICAM_CAMERAS", "0,front");
    assert!(CaptureConfig::load().is_err());
    clear_env();

    std::env::set_var("MULTICAM_DRIVER", "opencv");
    assert!(CaptureConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_initial_camera_outside_list() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "cameras": [0, 1], "initial_camera": 7 }"#)
        .expect("write config");

    let err = CaptureConfig::from_path(file.path()).unwrap_err();
    assert!(err.to_string().contains("initial camera 7"), "{err}");

    clear_env();
}
