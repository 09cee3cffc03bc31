//! Startup glue and the display boundary.
//!
//! `CaptureRig` resolves the backend, builds the hub and selector, and spawns one
//! named thread per camera. The consumer only ever calls `frame_for_display`, which
//! reads the selector and the hub and never waits on a worker.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::backend::{self, BackendId};
use crate::config::CaptureConfig;
use crate::device::DeviceOpener;
use crate::events::EventType;
use crate::frame::{CameraId, FrameSnapshot};
use crate::hub::FrameHub;
use crate::selector::CameraSelector;
use crate::shutdown::Shutdown;
use crate::worker::{CameraState, CameraStatus, CaptureWorker, WorkerExit};

struct WorkerHandle {
    camera: CameraId,
    status: CameraStatus,
    thread: JoinHandle<WorkerExit>,
}

pub struct CaptureRig {
    backend: BackendId,
    hub: Arc<FrameHub>,
    selector: Arc<CameraSelector>,
    shutdown: Shutdown,
    workers: Vec<WorkerHandle>,
}

impl CaptureRig {
    /// Start one capture worker per configured camera.
    pub fn start(config: &CaptureConfig, opener: Arc<dyn DeviceOpener>) -> Result<Self> {
        let backend = config.backend.unwrap_or_else(backend::resolve);
        let hub = Arc::new(FrameHub::new(&config.cameras));
        let selector = Arc::new(
            CameraSelector::new(&config.cameras, config.initial_camera)
                .context("initial camera selection")?,
        );
        let shutdown = Shutdown::new();

        log::info!(
            "{} cameras={:?} backend={} driver={}",
            EventType::SystemStart,
            config.cameras.iter().map(|c| c.index()).collect::<Vec<_>>(),
            backend,
            config.driver
        );

        let mut rig = Self {
            backend,
            hub,
            selector,
            shutdown,
            workers: Vec::with_capacity(config.cameras.len()),
        };
        for camera in &config.cameras {
            let worker = CaptureWorker::new(
                *camera,
                config.worker_settings(backend),
                Arc::clone(&opener),
                Arc::clone(&rig.hub),
                rig.shutdown.clone(),
            );
            let status = worker.status();
            // On error the partially started rig is dropped, which stops the
            // workers already running.
            let thread = thread::Builder::new()
                .name(format!("capture-{}", camera))
                .spawn(move || worker.run())
                .with_context(|| format!("failed to spawn capture thread for camera {}", camera))?;
            rig.workers.push(WorkerHandle {
                camera: *camera,
                status,
                thread,
            });
        }
        Ok(rig)
    }

    /// Latest frame of the selected camera, `None` until it has captured once.
    pub fn frame_for_display(&self) -> Option<Arc<FrameSnapshot>> {
        self.hub.get_latest(self.selector.current())
    }

    pub fn backend(&self) -> BackendId {
        self.backend
    }

    pub fn hub(&self) -> &Arc<FrameHub> {
        &self.hub
    }

    pub fn selector(&self) -> &Arc<CameraSelector> {
        &self.selector
    }

    /// Handle that stops every worker when triggered (e.g. from a signal handler).
    pub fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn status(&self, camera: CameraId) -> Option<CameraStatus> {
        self.workers
            .iter()
            .find(|w| w.camera == camera)
            .map(|w| w.status.clone())
    }

    /// Current state of every camera, in configuration order.
    pub fn states(&self) -> Vec<(CameraId, CameraState)> {
        self.workers
            .iter()
            .map(|w| (w.camera, w.status.state()))
            .collect()
    }

    /// True once every worker has permanently failed; nothing will recover without
    /// a restart.
    pub fn all_offline(&self) -> bool {
        all_offline(&self.states())
    }

    /// Signal every worker, wait for each to release its device, report how each one ended.
    pub fn shutdown(mut self) -> Vec<(CameraId, WorkerExit)> {
        self.stop_workers()
    }

    fn stop_workers(&mut self) -> Vec<(CameraId, WorkerExit)> {
        self.shutdown.trigger();
        let mut exits = Vec::with_capacity(self.workers.len());
        for handle in self.workers.drain(..) {
            match handle.thread.join() {
                Ok(exit) => exits.push((handle.camera, exit)),
                Err(_) => log::error!(
                    "{} camera={} capture thread panicked",
                    EventType::CameraError,
                    handle.camera
                ),
            }
        }
        if !exits.is_empty() {
            log::info!("{} workers={}", EventType::SystemStop, exits.len());
        }
        exits
    }
}

/// True when there is at least one camera and every one of them is `Failed`.
pub fn all_offline(states: &[(CameraId, CameraState)]) -> bool {
    !states.is_empty()
        && states
            .iter()
            .all(|(_, state)| *state == CameraState::Failed)
}

impl Drop for CaptureRig {
    fn drop(&mut self) {
        self.stop_workers();
    }
}
