//! Scripted cameras that replay predetermined open and read outcomes.
//!
//! Used to drive the capture state machine without hardware:
//!
//! ```
//! use multicam::device::{AfterScript, CameraScript, ReadStep, ScriptedOpener};
//! use multicam::{CameraId, DeviceError};
//!
//! let opener = ScriptedOpener::new().camera(
//!     CameraId(1),
//!     CameraScript::new()
//!         .fail_opens(3, DeviceError::Busy("in use".into()))
//!         .open_with(vec![ReadStep::Frame; 5], AfterScript::Disconnect),
//! );
//! # let _ = opener;
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{CameraDevice, DeviceOpener, FrameFormat, OpenRequest};
use crate::error::DeviceError;
use crate::frame::{CameraId, RawImage};

/// One scripted read.
#[derive(Clone, Debug)]
pub enum ReadStep {
    /// Deliver a frame.
    Frame,
    /// Fail the read with this error.
    Fail(DeviceError),
    /// Block for the duration (capped at the read timeout), then time out.
    Stall(Duration),
}

/// What a session does once its read script runs out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AfterScript {
    /// Keep delivering frames.
    Stream,
    /// Report the device as unplugged on every read.
    Disconnect,
}

#[derive(Clone, Debug)]
enum OpenStep {
    Fail(DeviceError),
    Session {
        reads: Vec<ReadStep>,
        after: AfterScript,
    },
}

/// Script for one camera: a queue of open outcomes.
#[derive(Clone, Debug)]
pub struct CameraScript {
    opens: VecDeque<OpenStep>,
    exhausted: OpenStep,
    frame_interval: Duration,
}

impl Default for CameraScript {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraScript {
    /// Empty script: every open fails with `NotFound` until steps are added.
    pub fn new() -> Self {
        Self {
            opens: VecDeque::new(),
            exhausted: OpenStep::Fail(DeviceError::NotFound("scripted camera".to_string())),
            frame_interval: Duration::ZERO,
        }
    }

    /// A camera that opens once and streams forever.
    pub fn streaming() -> Self {
        Self::new().open_with(Vec::new(), AfterScript::Stream)
    }

    pub fn fail_open(mut self, err: DeviceError) -> Self {
        self.opens.push_back(OpenStep::Fail(err));
        self
    }

    pub fn fail_opens(mut self, count: usize, err: DeviceError) -> Self {
        for _ in 0..count {
            self.opens.push_back(OpenStep::Fail(err.clone()));
        }
        self
    }

    /// Queue a successful open whose reads follow `reads`, then `after`.
    pub fn open_with(mut self, reads: Vec<ReadStep>, after: AfterScript) -> Self {
        self.opens.push_back(OpenStep::Session { reads, after });
        self
    }

    /// Outcome of every open once the queue is empty.
    pub fn otherwise_fail(mut self, err: DeviceError) -> Self {
        self.exhausted = OpenStep::Fail(err);
        self
    }

    /// Every open once the queue is empty streams forever.
    pub fn otherwise_stream(mut self) -> Self {
        self.exhausted = OpenStep::Session {
            reads: Vec::new(),
            after: AfterScript::Stream,
        };
        self
    }

    /// Delay before each delivered frame.
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    fn next_open(&mut self) -> OpenStep {
        self.opens
            .pop_front()
            .unwrap_or_else(|| self.exhausted.clone())
    }
}

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    releases: AtomicUsize,
}

/// Opener that serves scripted devices per camera.
#[derive(Default)]
pub struct ScriptedOpener {
    scripts: Mutex<HashMap<CameraId, CameraScript>>,
    counters: HashMap<CameraId, Arc<Counters>>,
}

impl ScriptedOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera(mut self, camera: CameraId, script: CameraScript) -> Self {
        self.scripts
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(camera, script);
        self.counters.entry(camera).or_default();
        self
    }

    /// Number of open attempts made for `camera`.
    pub fn opens(&self, camera: CameraId) -> usize {
        self.counters
            .get(&camera)
            .map_or(0, |c| c.opens.load(Ordering::SeqCst))
    }

    /// Number of opened handles for `camera` that have been dropped.
    pub fn releases(&self, camera: CameraId) -> usize {
        self.counters
            .get(&camera)
            .map_or(0, |c| c.releases.load(Ordering::SeqCst))
    }
}

impl DeviceOpener for ScriptedOpener {
    fn open(&self, request: &OpenRequest) -> Result<Box<dyn CameraDevice>, DeviceError> {
        let counters = self.counters.get(&request.camera).ok_or_else(|| {
            DeviceError::NotFound(format!("no script for camera {}", request.camera))
        })?;
        counters.opens.fetch_add(1, Ordering::SeqCst);

        let (step, frame_interval) = {
            let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
            let script = scripts.get_mut(&request.camera).ok_or_else(|| {
                DeviceError::NotFound(format!("no script for camera {}", request.camera))
            })?;
            (script.next_open(), script.frame_interval)
        };

        match step {
            OpenStep::Fail(err) => Err(err),
            OpenStep::Session { reads, after } => Ok(Box::new(ScriptedDevice {
                camera: request.camera,
                format: request.format,
                read_timeout: request.read_timeout,
                reads: reads.into(),
                after,
                frame_interval,
                counters: Arc::clone(counters),
            })),
        }
    }
}

struct ScriptedDevice {
    camera: CameraId,
    format: FrameFormat,
    read_timeout: Duration,
    reads: VecDeque<ReadStep>,
    after: AfterScript,
    frame_interval: Duration,
    counters: Arc<Counters>,
}

impl ScriptedDevice {
    fn frame(&self) -> RawImage {
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval);
        }
        let len = (self.format.width as usize) * (self.format.height as usize) * 3;
        RawImage::rgb(vec![self.camera.index() as u8; len], self.format.width, self.format.height)
    }
}

impl CameraDevice for ScriptedDevice {
    fn read_frame(&mut self) -> Result<RawImage, DeviceError> {
        match self.reads.pop_front() {
            Some(ReadStep::Frame) => Ok(self.frame()),
            Some(ReadStep::Fail(err)) => Err(err),
            Some(ReadStep::Stall(duration)) => {
                std::thread::sleep(duration.min(self.read_timeout));
                Err(DeviceError::Timeout)
            }
            None => match self.after {
                AfterScript::Stream => Ok(self.frame()),
                AfterScript::Disconnect => Err(DeviceError::Disconnected(format!(
                    "scripted camera {} unplugged",
                    self.camera
                ))),
            },
        }
    }

    fn describe(&self) -> String {
        format!("scripted://camera{}", self.camera)
    }
}

impl Drop for ScriptedDevice {
    fn drop(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}
