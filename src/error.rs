//! Error taxonomy and classification for camera hardware failures.
//!
//! Devices report `DeviceError`s. `classify` folds them into the closed set of
//! `CaptureErrorKind`s the capture worker uses to choose between retrying the same
//! connection, reconnecting, or giving up. `CameraFault` is the operator-facing
//! diagnosis that accompanies each log record.
//!
//! Hardware errors never leave the owning worker. The only error surfaced
//! synchronously to callers is `InvalidCamera`.

use std::fmt;
use std::io;

use crate::frame::CameraId;

/// Raw failure reported by a device driver.
///
/// `Clone` so that scripted devices can replay the same failure repeatedly.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("device call timed out")]
    Timeout,

    #[error("device not found: {0}")]
    NotFound(String),

    #[error("device busy: {0}")]
    Busy(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device disconnected: {0}")]
    Disconnected(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("i/o error ({kind:?}): {message}")]
    Io { kind: io::ErrorKind, message: String },

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<io::Error> for DeviceError {
    fn from(err: io::Error) -> Self {
        if let Some(mapped) = from_os_code(&err) {
            return mapped;
        }
        let message = err.to_string();
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => DeviceError::Timeout,
            io::ErrorKind::NotFound => DeviceError::NotFound(message),
            io::ErrorKind::PermissionDenied => DeviceError::PermissionDenied(message),
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected => DeviceError::Disconnected(message),
            io::ErrorKind::Unsupported => DeviceError::Unsupported(message),
            kind => DeviceError::Io { kind, message },
        }
    }
}

#[cfg(target_os = "linux")]
fn from_os_code(err: &io::Error) -> Option<DeviceError> {
    let code = err.raw_os_error()?;
    let message = err.to_string();
    let mapped = match code {
        libc::ENODEV | libc::ENXIO | libc::ESHUTDOWN => DeviceError::Disconnected(message),
        libc::ENOENT => DeviceError::NotFound(message),
        libc::EBUSY => DeviceError::Busy(message),
        libc::EACCES | libc::EPERM => DeviceError::PermissionDenied(message),
        libc::ETIMEDOUT | libc::EAGAIN => DeviceError::Timeout,
        _ => return None,
    };
    Some(mapped)
}

#[cfg(not(target_os = "linux"))]
fn from_os_code(_err: &io::Error) -> Option<DeviceError> {
    None
}

/// Which device call produced a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceOp {
    Open,
    Read,
}

/// Closed set of failure kinds that drives retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureErrorKind {
    OpenFailure,
    ReadTimeout,
    ReadFailure,
    DeviceDisconnected,
    Unknown,
}

/// What the capture worker should do about a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Keep the handle, count the failure against the sliding window.
    RetrySameConnection,
    /// Drop the handle and reopen with backoff.
    Reconnect,
    /// Terminal for this camera.
    GiveUp,
}

impl CaptureErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureErrorKind::OpenFailure => "OPEN_FAILURE",
            CaptureErrorKind::ReadTimeout => "READ_TIMEOUT",
            CaptureErrorKind::ReadFailure => "READ_FAILURE",
            CaptureErrorKind::DeviceDisconnected => "DEVICE_DISCONNECTED",
            CaptureErrorKind::Unknown => "UNKNOWN",
        }
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            CaptureErrorKind::ReadTimeout | CaptureErrorKind::ReadFailure => {
                Disposition::RetrySameConnection
            }
            CaptureErrorKind::OpenFailure | CaptureErrorKind::DeviceDisconnected => {
                Disposition::Reconnect
            }
            CaptureErrorKind::Unknown => Disposition::GiveUp,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.disposition() != Disposition::GiveUp
    }
}

impl fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a raw device failure. Deterministic.
pub fn classify(op: DeviceOp, err: &DeviceError) -> CaptureErrorKind {
    if let DeviceError::Unsupported(_) = err {
        return CaptureErrorKind::Unknown;
    }
    match op {
        DeviceOp::Open => CaptureErrorKind::OpenFailure,
        DeviceOp::Read => match err {
            DeviceError::Timeout => CaptureErrorKind::ReadTimeout,
            DeviceError::Disconnected(_) | DeviceError::NotFound(_) => {
                CaptureErrorKind::DeviceDisconnected
            }
            DeviceError::Busy(_)
            | DeviceError::PermissionDenied(_)
            | DeviceError::Backend(_)
            | DeviceError::Io { .. } => CaptureErrorKind::ReadFailure,
            DeviceError::Unsupported(_) => CaptureErrorKind::Unknown,
        },
    }
}

/// Operator-facing diagnosis of why a camera is unavailable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraFault {
    DeviceNotFound,
    DeviceBusy,
    PermissionDenied,
    BackendError,
    Unknown,
}

impl CameraFault {
    pub fn diagnose(err: &DeviceError) -> Self {
        match err {
            DeviceError::NotFound(_) | DeviceError::Disconnected(_) => CameraFault::DeviceNotFound,
            DeviceError::Busy(_) => CameraFault::DeviceBusy,
            DeviceError::PermissionDenied(_) => CameraFault::PermissionDenied,
            DeviceError::Backend(_) | DeviceError::Unsupported(_) => CameraFault::BackendError,
            DeviceError::Timeout | DeviceError::Io { .. } => CameraFault::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraFault::DeviceNotFound => "DEVICE_NOT_FOUND",
            CameraFault::DeviceBusy => "DEVICE_BUSY",
            CameraFault::PermissionDenied => "PERMISSION_DENIED",
            CameraFault::BackendError => "BACKEND_ERROR",
            CameraFault::Unknown => "UNKNOWN",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            CameraFault::DeviceNotFound => "camera device could not be found",
            CameraFault::DeviceBusy => "camera is in use by another program",
            CameraFault::PermissionDenied => "access to the camera was denied",
            CameraFault::BackendError => "the capture backend reported an error",
            CameraFault::Unknown => "unknown camera error",
        }
    }
}

impl fmt::Display for CameraFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A camera id outside the configured set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("camera {0} is not configured")]
pub struct InvalidCamera(pub CameraId);
