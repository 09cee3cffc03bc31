//! Event vocabulary for structured log records.
//!
//! Every state-transition record starts with one of these tags followed by
//! `key=value` fields, e.g. `CAMERA_OPEN camera=0 backend=v4l2`.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    SystemStart,
    SystemStop,
    ModuleStart,
    ModuleStop,
    StateChange,
    CameraOpen,
    CameraClose,
    CameraError,
    RetryAttempt,
    UserInput,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SystemStart => "SYSTEM_START",
            EventType::SystemStop => "SYSTEM_STOP",
            EventType::ModuleStart => "MODULE_START",
            EventType::ModuleStop => "MODULE_STOP",
            EventType::StateChange => "STATE_CHANGE",
            EventType::CameraOpen => "CAMERA_OPEN",
            EventType::CameraClose => "CAMERA_CLOSE",
            EventType::CameraError => "CAMERA_ERROR",
            EventType::RetryAttempt => "RETRY_ATTEMPT",
            EventType::UserInput => "USER_INPUT",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
