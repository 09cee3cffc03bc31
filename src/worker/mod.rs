//! Per-camera capture worker.
//!
//! Each configured camera gets one `CaptureWorker`, run on its own thread. The
//! worker exclusively owns its device handle, failure window and backoff; the only
//! thing it shares is its slot in the `FrameHub` and a read-only `CameraStatus`.
//!
//! State machine:
//!
//! - `Connecting`: open the device once. Success moves to `Capturing`; a retryable
//!   failure moves to `Retrying`, anything else to `Failed`.
//! - `Capturing`: read and publish frames. Isolated timeouts and read failures are
//!   tolerated until the sliding window overflows; a disconnect moves to `Retrying`
//!   at once.
//! - `Retrying`: release the handle, wait out the backoff (interruptible by
//!   shutdown), reopen. Runs out after `max_retries` reopen attempts.
//! - `Failed`: terminal. The last frame is republished as an offline marker and the
//!   worker stops.
//!
//! Every device call is bounded: opens by `open_timeout` (enforced here), reads by
//! `read_timeout` (enforced by the driver).

pub mod policy;
pub mod status;

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::backend::BackendId;
use crate::device::{CameraDevice, DeviceOpener, FrameFormat, OpenRequest};
use crate::error::{classify, CameraFault, CaptureErrorKind, DeviceError, DeviceOp};
use crate::events::EventType;
use crate::frame::{CameraId, FrameSnapshot};
use crate::hub::FrameHub;
use crate::shutdown::Shutdown;

pub use policy::{Backoff, FailureWindow, RetryPolicy};
pub use status::{CameraState, CameraStatus};

/// Immutable per-worker settings, cloned from the loaded configuration.
#[derive(Clone, Debug)]
pub struct WorkerSettings {
    pub backend: BackendId,
    pub format: FrameFormat,
    pub retry: RetryPolicy,
}

impl WorkerSettings {
    fn open_request(&self, camera: CameraId) -> OpenRequest {
        OpenRequest {
            camera,
            backend: self.backend,
            format: self.format,
            read_timeout: self.retry.read_timeout,
        }
    }
}

/// Why a worker stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// Coordinated shutdown was requested.
    Shutdown,
    /// Every reopen attempt failed.
    RetriesExhausted { attempts: u32 },
    /// A failure that retrying cannot fix.
    Unrecoverable(CaptureErrorKind),
}

pub struct CaptureWorker {
    camera: CameraId,
    settings: WorkerSettings,
    opener: Arc<dyn DeviceOpener>,
    hub: Arc<FrameHub>,
    shutdown: Shutdown,
    status: CameraStatus,
    state: CameraState,
    device: Option<Box<dyn CameraDevice>>,
    window: FailureWindow,
    backoff: Backoff,
    retries: u32,
    next_sequence: u64,
    last: Option<Arc<FrameSnapshot>>,
    exit: Option<WorkerExit>,
}

impl CaptureWorker {
    pub fn new(
        camera: CameraId,
        settings: WorkerSettings,
        opener: Arc<dyn DeviceOpener>,
        hub: Arc<FrameHub>,
        shutdown: Shutdown,
    ) -> Self {
        let retry = settings.retry;
        Self {
            camera,
            settings,
            opener,
            hub,
            shutdown,
            status: CameraStatus::new(),
            state: CameraState::Connecting,
            device: None,
            window: FailureWindow::new(retry.failure_threshold, retry.failure_window),
            backoff: Backoff::new(retry.backoff_base, retry.backoff_cap),
            retries: 0,
            next_sequence: 0,
            last: None,
            exit: None,
        }
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Read-only view of this worker's state, safe to hand to other threads.
    pub fn status(&self) -> CameraStatus {
        self.status.clone()
    }

    /// Set once the worker has stopped.
    pub fn exit_reason(&self) -> Option<WorkerExit> {
        self.exit
    }

    /// Run until shutdown or permanent failure. Blocks the calling thread.
    pub fn run(mut self) -> WorkerExit {
        log::info!(
            "{} camera={} backend={}",
            EventType::ModuleStart,
            self.camera,
            self.settings.backend
        );
        let exit = loop {
            if self.shutdown.is_triggered() {
                break WorkerExit::Shutdown;
            }
            self.step();
            if let Some(exit) = self.exit {
                break exit;
            }
        };
        self.release_device();
        log::info!(
            "{} camera={} state={} exit={:?}",
            EventType::ModuleStop,
            self.camera,
            self.state,
            exit
        );
        exit
    }

    /// Advance the state machine by one iteration: one open attempt (preceded by
    /// the backoff wait when retrying) or one frame read.
    pub fn step(&mut self) -> CameraState {
        if self.exit.is_some() {
            return self.state;
        }
        match self.state {
            CameraState::Connecting => self.connect(),
            CameraState::Capturing => self.capture(),
            CameraState::Retrying => self.retry(),
            CameraState::Failed => {}
        }
        self.state
    }

    fn connect(&mut self) {
        match self.open() {
            Ok(()) => self.transition(CameraState::Capturing),
            Err(kind) => {
                let next =
                    CameraState::after_open_failure(kind, self.settings.retry.max_retries > 0);
                self.after_open_failure(kind, next);
            }
        }
    }

    fn capture(&mut self) {
        let Some(device) = self.device.as_mut() else {
            self.transition(CameraState::Retrying);
            return;
        };
        match device.read_frame() {
            Ok(image) => {
                let snapshot = Arc::new(FrameSnapshot::captured(
                    self.camera,
                    self.next_sequence,
                    image,
                ));
                self.next_sequence += 1;
                if let Err(err) = self.hub.publish(self.camera, Arc::clone(&snapshot)) {
                    log::error!("{} camera={} {}", EventType::CameraError, self.camera, err);
                    self.fail(WorkerExit::Unrecoverable(CaptureErrorKind::Unknown));
                    return;
                }
                self.status.add_frame();
                self.last = Some(snapshot);
            }
            Err(err) => {
                let kind = classify(DeviceOp::Read, &err);
                let exceeded = match kind {
                    CaptureErrorKind::ReadTimeout | CaptureErrorKind::ReadFailure => {
                        self.window.record(Instant::now())
                    }
                    _ => false,
                };
                let next = CameraState::after_read_failure(kind, exceeded);
                match next {
                    CameraState::Capturing => log::debug!(
                        "{} camera={} kind={} tolerated: {}",
                        EventType::CameraError,
                        self.camera,
                        kind,
                        err
                    ),
                    CameraState::Failed => {
                        log::error!(
                            "{} camera={} kind={} fault={}: {}",
                            EventType::CameraError,
                            self.camera,
                            kind,
                            CameraFault::diagnose(&err),
                            err
                        );
                        self.fail(WorkerExit::Unrecoverable(kind));
                    }
                    _ => {
                        log::warn!(
                            "{} camera={} kind={} reconnecting: {}",
                            EventType::CameraError,
                            self.camera,
                            kind,
                            err
                        );
                        self.transition(next);
                    }
                }
            }
        }
    }

    fn retry(&mut self) {
        self.release_device();
        let max_retries = self.settings.retry.max_retries;
        if self.retries >= max_retries {
            self.fail(WorkerExit::RetriesExhausted {
                attempts: self.retries,
            });
            return;
        }

        let delay = self.backoff.next_delay();
        log::info!(
            "{} camera={} attempt={}/{} delay_ms={}",
            EventType::RetryAttempt,
            self.camera,
            self.retries + 1,
            max_retries,
            delay.as_millis()
        );
        if self.shutdown.wait_timeout(delay) {
            self.exit = Some(WorkerExit::Shutdown);
            return;
        }

        self.retries += 1;
        match self.open() {
            Ok(()) => {
                self.status.add_reconnect();
                self.transition(CameraState::Capturing);
            }
            Err(kind) => {
                let next = CameraState::after_open_failure(kind, self.retries < max_retries);
                self.after_open_failure(kind, next);
            }
        }
    }

    fn after_open_failure(&mut self, kind: CaptureErrorKind, next: CameraState) {
        if next != CameraState::Failed {
            self.transition(next);
        } else if kind.is_retryable() {
            self.fail(WorkerExit::RetriesExhausted {
                attempts: self.retries,
            });
        } else {
            self.fail(WorkerExit::Unrecoverable(kind));
        }
    }

    /// One bounded open attempt. On success the handle is installed and the
    /// failure bookkeeping starts over.
    fn open(&mut self) -> Result<(), CaptureErrorKind> {
        let request = self.settings.open_request(self.camera);
        match open_with_timeout(
            Arc::clone(&self.opener),
            request,
            self.settings.retry.open_timeout,
        ) {
            Ok(device) => {
                log::info!(
                    "{} camera={} backend={} device={}",
                    EventType::CameraOpen,
                    self.camera,
                    self.settings.backend,
                    device.describe()
                );
                self.device = Some(device);
                self.window.reset();
                self.backoff.reset();
                self.retries = 0;
                Ok(())
            }
            Err(err) => {
                let kind = classify(DeviceOp::Open, &err);
                let fault = CameraFault::diagnose(&err);
                log::warn!(
                    "{} camera={} kind={} fault={} ({}): {}",
                    EventType::CameraError,
                    self.camera,
                    kind,
                    fault,
                    fault.describe(),
                    err
                );
                Err(kind)
            }
        }
    }

    fn fail(&mut self, reason: WorkerExit) {
        self.release_device();
        // The marker goes out before the state flips, so anyone who sees `Failed`
        // also sees the marker.
        if let Some(last) = &self.last {
            let marker = Arc::new(last.offline_marker());
            if let Err(err) = self.hub.publish(self.camera, marker) {
                log::error!("{} camera={} {}", EventType::CameraError, self.camera, err);
            }
        }
        self.transition(CameraState::Failed);
        log::error!(
            "{} camera={} permanently offline: {:?}",
            EventType::CameraError,
            self.camera,
            reason
        );
        self.exit = Some(reason);
    }

    fn transition(&mut self, next: CameraState) {
        if next != self.state {
            log::info!(
                "{} camera={} from={} to={}",
                EventType::StateChange,
                self.camera,
                self.state,
                next
            );
            self.state = next;
        }
        self.status.set_state(next);
    }

    fn release_device(&mut self) {
        if let Some(device) = self.device.take() {
            log::info!(
                "{} camera={} device={}",
                EventType::CameraClose,
                self.camera,
                device.describe()
            );
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.release_device();
    }
}

/// Open on a helper thread so a hung driver cannot stall the worker past
/// `timeout`. A handle that arrives late is dropped (and released) by the helper.
fn open_with_timeout(
    opener: Arc<dyn DeviceOpener>,
    request: OpenRequest,
    timeout: Duration,
) -> Result<Box<dyn CameraDevice>, DeviceError> {
    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name(format!("open-{}", request.camera))
        .spawn(move || {
            let _ = tx.send(opener.open(&request));
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(DeviceError::Timeout),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(DeviceError::Backend(
            "open attempt ended without a result".to_string(),
        )),
    }
}
