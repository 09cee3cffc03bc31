//! Camera device drivers.
//!
//! A capture worker talks to hardware only through two traits:
//! - `DeviceOpener`: opens a device for a camera index on a backend.
//! - `CameraDevice`: an open handle that reads one frame at a time.
//!
//! Handles release the underlying device in `Drop`, so every exit path of a worker
//! (reconnect, permanent failure, shutdown) gives the device back.
//!
//! Drivers:
//! - synthetic generated frames (default, no hardware needed)
//! - V4L2 devices (feature: ingest-v4l2)
//! - GStreamer capture pipelines (feature: capture-gstreamer)
//! - scripted devices that replay open/read outcomes (tests and dry runs)

#[cfg(feature = "capture-gstreamer")]
mod gst_pipeline;
pub mod scripted;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

use anyhow::anyhow;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::backend::BackendId;
use crate::error::DeviceError;
use crate::frame::{CameraId, RawImage};

pub use scripted::{AfterScript, CameraScript, ReadStep, ScriptedOpener};
pub use synthetic::SyntheticDevice;

/// Requested capture format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    /// Target frame rate. Zero means "as fast as the device delivers".
    pub target_fps: u32,
    /// Device-side buffer depth. Small values keep frames fresh.
    pub buffer_count: u32,
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            target_fps: 30,
            buffer_count: 2,
        }
    }
}

impl FrameFormat {
    /// Interval between frames at the target rate.
    pub fn frame_interval(&self) -> Duration {
        if self.target_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / self.target_fps
        }
    }
}

/// Everything a driver needs to open one camera.
#[derive(Clone, Debug)]
pub struct OpenRequest {
    pub camera: CameraId,
    pub backend: BackendId,
    pub format: FrameFormat,
    /// Upper bound on a single read; drivers report `DeviceError::Timeout` past it.
    pub read_timeout: Duration,
}

/// An open camera handle, exclusively owned by one capture worker.
pub trait CameraDevice: Send {
    /// Read the next frame. Must return within the request's read timeout.
    fn read_frame(&mut self) -> Result<RawImage, DeviceError>;

    /// Human readable description for logs.
    fn describe(&self) -> String;
}

/// Opens camera devices. Shared by all workers, so it must be thread-safe.
pub trait DeviceOpener: Send + Sync {
    fn open(&self, request: &OpenRequest) -> Result<Box<dyn CameraDevice>, DeviceError>;
}

/// Which driver family opens devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// Pick a hardware driver compiled into this build for the resolved backend.
    Auto,
    Synthetic,
    V4l2,
    Gstreamer,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Auto => "auto",
            Driver::Synthetic => "synthetic",
            Driver::V4l2 => "v4l2",
            Driver::Gstreamer => "gstreamer",
        }
    }

    /// Concrete driver for `backend`. `Auto` prefers V4L2 on V4L2 hosts, then
    /// GStreamer, and stays `Auto` when no hardware driver is compiled in.
    pub fn resolve(self, backend: BackendId) -> Driver {
        if self != Driver::Auto {
            return self;
        }
        if cfg!(feature = "ingest-v4l2") && backend == BackendId::V4l2 {
            Driver::V4l2
        } else if cfg!(feature = "capture-gstreamer") {
            Driver::Gstreamer
        } else {
            Driver::Auto
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Driver::Auto),
            "synthetic" | "stub" => Ok(Driver::Synthetic),
            "v4l2" => Ok(Driver::V4l2),
            "gstreamer" | "gst" => Ok(Driver::Gstreamer),
            other => Err(anyhow!("unknown capture driver '{}'", other)),
        }
    }
}

/// Production opener dispatching on the configured driver.
pub struct SystemOpener {
    driver: Driver,
}

impl SystemOpener {
    pub fn new(driver: Driver) -> Self {
        Self { driver }
    }
}

impl DeviceOpener for SystemOpener {
    fn open(&self, request: &OpenRequest) -> Result<Box<dyn CameraDevice>, DeviceError> {
        match self.driver.resolve(request.backend) {
            Driver::Synthetic => Ok(Box::new(SyntheticDevice::open(request))),
            Driver::V4l2 => open_v4l2(request),
            Driver::Gstreamer => open_gstreamer(request),
            Driver::Auto => Err(DeviceError::Unsupported(format!(
                "no hardware capture driver compiled in for backend {}",
                request.backend
            ))),
        }
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_v4l2(request: &OpenRequest) -> Result<Box<dyn CameraDevice>, DeviceError> {
    Ok(Box::new(v4l2::V4l2Device::open(request)?))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_v4l2(_request: &OpenRequest) -> Result<Box<dyn CameraDevice>, DeviceError> {
    Err(DeviceError::Unsupported(
        "V4L2 capture requires the ingest-v4l2 feature".to_string(),
    ))
}

#[cfg(feature = "capture-gstreamer")]
fn open_gstreamer(request: &OpenRequest) -> Result<Box<dyn CameraDevice>, DeviceError> {
    Ok(Box::new(gst_pipeline::GstreamerDevice::open(request)?))
}

#[cfg(not(feature = "capture-gstreamer"))]
fn open_gstreamer(_request: &OpenRequest) -> Result<Box<dyn CameraDevice>, DeviceError> {
    Err(DeviceError::Unsupported(
        "GStreamer capture requires the capture-gstreamer feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(backend: BackendId) -> OpenRequest {
        OpenRequest {
            camera: CameraId(0),
            backend,
            format: FrameFormat {
                width: 8,
                height: 6,
                target_fps: 0,
                buffer_count: 1,
            },
            read_timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn synthetic_driver_opens_and_reads() {
        let opener = SystemOpener::new(Driver::Synthetic);
        let mut device = opener.open(&request(BackendId::Any)).unwrap();
        let image = device.read_frame().unwrap();
        assert_eq!((image.width, image.height), (8, 6));
        assert_eq!(image.pixels.len(), 8 * 6 * 3);
    }

    #[cfg(not(any(feature = "ingest-v4l2", feature = "capture-gstreamer")))]
    #[test]
    fn auto_without_hardware_drivers_is_unsupported() {
        let opener = SystemOpener::new(Driver::Auto);
        let err = opener.open(&request(BackendId::V4l2)).err().unwrap();
        assert!(matches!(err, DeviceError::Unsupported(_)));
    }

    #[test]
    fn explicit_driver_is_kept() {
        assert_eq!(Driver::Synthetic.resolve(BackendId::V4l2), Driver::Synthetic);
        assert_eq!(Driver::Gstreamer.resolve(BackendId::V4l2), Driver::Gstreamer);
    }

    #[test]
    fn frame_interval_follows_target_fps() {
        let mut format = FrameFormat::default();
        assert_eq!(format.frame_interval(), Duration::from_secs(1) / 30);
        format.target_fps = 0;
        assert_eq!(format.frame_interval(), Duration::ZERO);
    }

    #[test]
    fn driver_names_parse() {
        assert_eq!("stub".parse::<Driver>().unwrap(), Driver::Synthetic);
        assert_eq!("GST".parse::<Driver>().unwrap(), Driver::Gstreamer);
        assert!("opencv".parse::<Driver>().is_err());
    }
}
