//! Per-camera runtime state and its read-only view.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::CaptureErrorKind;

/// Capture state of one camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraState {
    Connecting,
    Capturing,
    Retrying,
    Failed,
}

impl CameraState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraState::Connecting => "connecting",
            CameraState::Capturing => "capturing",
            CameraState::Retrying => "retrying",
            CameraState::Failed => "failed",
        }
    }

    /// Next state after a failed open (from `Connecting` or `Retrying`).
    pub fn after_open_failure(kind: CaptureErrorKind, retries_left: bool) -> CameraState {
        if kind.is_retryable() && retries_left {
            CameraState::Retrying
        } else {
            CameraState::Failed
        }
    }

    /// Next state after a failed read while `Capturing`.
    pub fn after_read_failure(kind: CaptureErrorKind, window_exceeded: bool) -> CameraState {
        match kind {
            CaptureErrorKind::DeviceDisconnected => CameraState::Retrying,
            CaptureErrorKind::ReadTimeout | CaptureErrorKind::ReadFailure if window_exceeded => {
                CameraState::Retrying
            }
            CaptureErrorKind::ReadTimeout | CaptureErrorKind::ReadFailure => {
                CameraState::Capturing
            }
            CaptureErrorKind::OpenFailure => CameraState::Retrying,
            CaptureErrorKind::Unknown => CameraState::Failed,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            CameraState::Connecting => 0,
            CameraState::Capturing => 1,
            CameraState::Retrying => 2,
            CameraState::Failed => 3,
        }
    }

    fn from_u8(value: u8) -> CameraState {
        match value {
            1 => CameraState::Capturing,
            2 => CameraState::Retrying,
            3 => CameraState::Failed,
            _ => CameraState::Connecting,
        }
    }
}

impl fmt::Display for CameraState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct StatusCells {
    state: AtomicU8,
    frames: AtomicU64,
    reconnects: AtomicU32,
}

/// Shared view of one camera's state. Only the owning worker writes it.
#[derive(Clone, Default)]
pub struct CameraStatus {
    cells: Arc<StatusCells>,
}

impl CameraStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CameraState {
        CameraState::from_u8(self.cells.state.load(Ordering::Acquire))
    }

    /// Frames published since startup.
    pub fn frames(&self) -> u64 {
        self.cells.frames.load(Ordering::Relaxed)
    }

    /// Successful reopens after a failure.
    pub fn reconnects(&self) -> u32 {
        self.cells.reconnects.load(Ordering::Relaxed)
    }

    pub(crate) fn set_state(&self, state: CameraState) {
        self.cells.state.store(state.to_u8(), Ordering::Release);
    }

    pub(crate) fn add_frame(&self) {
        self.cells.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_reconnect(&self) {
        self.cells.reconnects.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_status_is_connecting() {
        let status = CameraStatus::new();
        assert_eq!(status.state(), CameraState::Connecting);
        assert_eq!(status.frames(), 0);
    }

    #[test]
    fn clones_share_cells() {
        let status = CameraStatus::new();
        let view = status.clone();
        status.set_state(CameraState::Retrying);
        status.add_frame();
        status.add_reconnect();
        assert_eq!(view.state(), CameraState::Retrying);
        assert_eq!(view.frames(), 1);
        assert_eq!(view.reconnects(), 1);
    }

    #[test]
    fn open_failure_transitions() {
        assert_eq!(
            CameraState::after_open_failure(CaptureErrorKind::OpenFailure, true),
            CameraState::Retrying
        );
        assert_eq!(
            CameraState::after_open_failure(CaptureErrorKind::OpenFailure, false),
            CameraState::Failed
        );
        assert_eq!(
            CameraState::after_open_failure(CaptureErrorKind::Unknown, true),
            CameraState::Failed
        );
    }

    #[test]
    fn read_failure_transitions() {
        assert_eq!(
            CameraState::after_read_failure(CaptureErrorKind::ReadTimeout, false),
            CameraState::Capturing
        );
        assert_eq!(
            CameraState::after_read_failure(CaptureErrorKind::ReadFailure, true),
            CameraState::Retrying
        );
        // Disconnects bypass the window.
        assert_eq!(
            CameraState::after_read_failure(CaptureErrorKind::DeviceDisconnected, false),
            CameraState::Retrying
        );
        assert_eq!(
            CameraState::after_read_failure(CaptureErrorKind::Unknown, false),
            CameraState::Failed
        );
    }
}
