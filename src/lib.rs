//! Multi-camera concurrent capture and selection.
//!
//! Every configured camera is captured continuously on its own thread, so the
//! operator can switch between cameras without waiting for a device to start.
//!
//! # Architecture
//!
//! - `backend`: picks the capture backend for the host, once, at startup.
//! - `worker`: one `CaptureWorker` per camera. Owns the device, runs the
//!   Connecting/Capturing/Retrying/Failed state machine, publishes frames.
//! - `hub`: `FrameHub`, one latest-frame slot per camera. Replace-whole-value
//!   semantics; readers never see a torn frame and never build a backlog.
//! - `selector`: `CameraSelector`, the currently displayed camera. Switching is a
//!   constant-time metadata update.
//! - `error`: `classify` folds raw device failures into `CaptureErrorKind`s that
//!   drive retry policy and logging.
//!
//! Hardware failures stay inside the owning worker. The consumer only sees them as
//! missing frames, stale `age()`s or snapshots with `is_valid() == false`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use multicam::{CaptureConfig, CaptureRig, SystemOpener};
//!
//! let config = CaptureConfig::load()?;
//! let rig = CaptureRig::start(&config, Arc::new(SystemOpener::new(config.driver)))?;
//! if let Some(frame) = rig.frame_for_display() {
//!     println!("camera {} frame {}", frame.camera_id(), frame.sequence());
//! }
//! rig.shutdown();
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod backend;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod events;
pub mod fps;
pub mod frame;
pub mod hub;
pub mod rig;
pub mod selector;
pub mod shutdown;
pub mod worker;

pub use backend::{BackendId, Platform};
pub use config::CaptureConfig;
pub use control::{ControlEvent, Flow};
pub use device::{CameraDevice, DeviceOpener, Driver, FrameFormat, OpenRequest, SystemOpener};
pub use error::{classify, CameraFault, CaptureErrorKind, DeviceError, DeviceOp, InvalidCamera};
pub use events::EventType;
pub use fps::FpsCounter;
pub use frame::{CameraId, FrameSnapshot, PixelFormat, RawImage};
pub use hub::FrameHub;
pub use rig::CaptureRig;
pub use selector::CameraSelector;
pub use shutdown::Shutdown;
pub use worker::{CameraState, CameraStatus, CaptureWorker, RetryPolicy, WorkerExit, WorkerSettings};
