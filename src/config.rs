use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::backend::BackendId;
use crate::device::{Driver, FrameFormat};
use crate::frame::CameraId;
use crate::worker::{RetryPolicy, WorkerSettings};

const DEFAULT_CAMERA: CameraId = CameraId(0);
const DEFAULT_DRIVER: Driver = Driver::Synthetic;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_BUFFER_COUNT: u32 = 2;
const DEFAULT_OPEN_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_READ_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_FAILURE_WINDOW_MS: u64 = 2_000;
const DEFAULT_MAX_RETRIES: u32 = 10;
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
const DEFAULT_BACKOFF_CAP_MS: u64 = 5_000;

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    cameras: Option<Vec<u32>>,
    initial_camera: Option<u32>,
    driver: Option<String>,
    backend: Option<String>,
    format: Option<FormatConfigFile>,
    retry: Option<RetryConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct FormatConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    buffer_count: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RetryConfigFile {
    open_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
    failure_threshold: Option<u32>,
    failure_window_ms: Option<u64>,
    max_retries: Option<u32>,
    backoff_base_ms: Option<u64>,
    backoff_cap_ms: Option<u64>,
}

/// Capture configuration. Read once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub cameras: Vec<CameraId>,
    pub initial_camera: CameraId,
    pub driver: Driver,
    /// Overrides the backend the host platform resolves to.
    pub backend: Option<BackendId>,
    pub format: FrameFormat,
    pub retry: RetryPolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            cameras: vec![DEFAULT_CAMERA],
            initial_camera: DEFAULT_CAMERA,
            driver: DEFAULT_DRIVER,
            backend: None,
            format: FrameFormat::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl CaptureConfig {
    /// Load from `MULTICAM_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MULTICAM_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        Self::build(file_cfg.unwrap_or_default())
    }

    /// Load from an explicit file, then apply environment overrides.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::build(read_config_file(path)?)
    }

    fn build(file: CaptureConfigFile) -> Result<Self> {
        let mut cfg = Self::from_file(file)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Settings handed to every capture worker.
    pub fn worker_settings(&self, backend: BackendId) -> WorkerSettings {
        WorkerSettings {
            backend,
            format: self.format,
            retry: self.retry,
        }
    }

    fn from_file(file: CaptureConfigFile) -> Result<Self> {
        let cameras: Vec<CameraId> = file
            .cameras
            .map(|ids| ids.into_iter().map(CameraId).collect())
            .unwrap_or_else(|| vec![DEFAULT_CAMERA]);
        let initial_camera = file
            .initial_camera
            .map(CameraId)
            .or_else(|| cameras.first().copied())
            .unwrap_or(DEFAULT_CAMERA);
        let driver = match file.driver.as_deref() {
            Some(name) => name.parse()?,
            None => DEFAULT_DRIVER,
        };
        let backend = file
            .backend
            .as_deref()
            .map(str::parse::<BackendId>)
            .transpose()?;

        let format_file = file.format.unwrap_or_default();
        let format = FrameFormat {
            width: format_file.width.unwrap_or(DEFAULT_WIDTH),
            height: format_file.height.unwrap_or(DEFAULT_HEIGHT),
            target_fps: format_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            buffer_count: format_file.buffer_count.unwrap_or(DEFAULT_BUFFER_COUNT),
        };

        let retry_file = file.retry.unwrap_or_default();
        let retry = RetryPolicy {
            open_timeout: Duration::from_millis(
                retry_file.open_timeout_ms.unwrap_or(DEFAULT_OPEN_TIMEOUT_MS),
            ),
            read_timeout: Duration::from_millis(
                retry_file.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
            ),
            failure_threshold: retry_file
                .failure_threshold
                .unwrap_or(DEFAULT_FAILURE_THRESHOLD),
            failure_window: Duration::from_millis(
                retry_file
                    .failure_window_ms
                    .unwrap_or(DEFAULT_FAILURE_WINDOW_MS),
            ),
            max_retries: retry_file.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            backoff_base: Duration::from_millis(
                retry_file.backoff_base_ms.unwrap_or(DEFAULT_BACKOFF_BASE_MS),
            ),
            backoff_cap: Duration::from_millis(
                retry_file.backoff_cap_ms.unwrap_or(DEFAULT_BACKOFF_CAP_MS),
            ),
        };

        Ok(Self {
            cameras,
            initial_camera,
            driver,
            backend,
            format,
            retry,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(cameras) = std::env::var("MULTICAM_CAMERAS") {
            let parsed = split_csv(&cameras)
                .iter()
                .map(|entry| entry.parse::<CameraId>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| anyhow!("MULTICAM_CAMERAS must be a comma separated list of indices"))?;
            if !parsed.is_empty() {
                if !parsed.contains(&self.initial_camera) {
                    self.initial_camera = parsed[0];
                }
                self.cameras = parsed;
            }
        }
        if let Ok(driver) = std::env::var("MULTICAM_DRIVER") {
            if !driver.trim().is_empty() {
                self.driver = driver.parse()?;
            }
        }
        if let Ok(backend) = std::env::var("MULTICAM_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = Some(backend.parse()?);
            }
        }
        if let Ok(retries) = std::env::var("MULTICAM_MAX_RETRIES") {
            self.retry.max_retries = retries
                .trim()
                .parse()
                .map_err(|_| anyhow!("MULTICAM_MAX_RETRIES must be a non-negative integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(anyhow!("at least one camera must be configured"));
        }
        for (i, camera) in self.cameras.iter().enumerate() {
            if self.cameras[..i].contains(camera) {
                return Err(anyhow!("camera {} is configured more than once", camera));
            }
        }
        if !self.cameras.contains(&self.initial_camera) {
            return Err(anyhow!(
                "initial camera {} is not in the configured cameras",
                self.initial_camera
            ));
        }
        if self.format.width == 0 || self.format.height == 0 {
            return Err(anyhow!("frame width and height must be greater than zero"));
        }
        if self.retry.failure_threshold == 0 {
            return Err(anyhow!("failure_threshold must be at least 1"));
        }
        if self.retry.open_timeout.is_zero() || self.retry.read_timeout.is_zero() {
            return Err(anyhow!("open and read timeouts must be greater than zero"));
        }
        if self.retry.failure_window.is_zero() {
            return Err(anyhow!("failure_window must be greater than zero"));
        }
        if self.retry.backoff_cap.is_zero() {
            return Err(anyhow!("backoff_cap_ms must be greater than zero"));
        }
        if self.retry.backoff_base > self.retry.backoff_cap {
            return Err(anyhow!("backoff_base_ms must not exceed backoff_cap_ms"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CaptureConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CaptureConfig::default();
        assert_eq!(cfg.cameras, vec![CameraId(0)]);
        assert_eq!(cfg.initial_camera, CameraId(0));
        assert_eq!(cfg.driver, Driver::Synthetic);
        assert_eq!(cfg.backend, None);
        assert_eq!(cfg.format, FrameFormat::default());
        assert_eq!(cfg.retry, RetryPolicy::default());
    }

    #[test]
    fn initial_camera_defaults_to_first_listed() -> Result<()> {
        let cfg = CaptureConfig::from_file(CaptureConfigFile {
            cameras: Some(vec![4, 2]),
            ..Default::default()
        })?;
        assert_eq!(cfg.initial_camera, CameraId(4));
        cfg.validate()
    }

    #[test]
    fn rejects_duplicate_cameras() -> Result<()> {
        let cfg = CaptureConfig::from_file(CaptureConfigFile {
            cameras: Some(vec![0, 1, 0]),
            ..Default::default()
        })?;
        assert!(cfg.validate().is_err());
        Ok(())
    }

    #[test]
    fn rejects_backoff_base_above_cap() -> Result<()> {
        let cfg = CaptureConfig::from_file(CaptureConfigFile {
            retry: Some(RetryConfigFile {
                backoff_base_ms: Some(10_000),
                backoff_cap_ms: Some(1_000),
                ..Default::default()
            }),
            ..Default::default()
        })?;
        assert!(cfg.validate().is_err());
        Ok(())
    }

    #[test]
    fn rejects_zero_backoff_cap() -> Result<()> {
        let cfg = CaptureConfig::from_file(CaptureConfigFile {
            retry: Some(RetryConfigFile {
                backoff_base_ms: Some(0),
                backoff_cap_ms: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        })?;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("backoff_cap_ms"), "{err}");
        Ok(())
    }

    #[test]
    fn rejects_unknown_driver() {
        let result = CaptureConfig::from_file(CaptureConfigFile {
            driver: Some("opencv".to_string()),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn split_csv_skips_blanks() {
        assert_eq!(split_csv(" 0, ,2,"), vec!["0", "2"]);
    }
}
