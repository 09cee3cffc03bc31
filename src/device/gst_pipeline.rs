//! GStreamer camera device.
//!
//! Pipeline: `<platform source> ! videoconvert ! videoscale ! RGB caps ! appsink`.
//! The appsink keeps a single buffer and drops older ones, so a read always yields
//! the freshest frame. Pulls are bounded by the read timeout.

use gstreamer::prelude::*;

use super::{CameraDevice, OpenRequest};
use crate::backend::BackendId;
use crate::error::DeviceError;
use crate::frame::{CameraId, RawImage};

pub(crate) struct GstreamerDevice {
    camera: CameraId,
    description: String,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    read_timeout: gstreamer::ClockTime,
}

/// Source element for a camera index on a backend.
pub(crate) fn source_element(backend: BackendId, camera: CameraId) -> String {
    let index = camera.index();
    match backend {
        BackendId::V4l2 => format!("v4l2src device=/dev/video{}", index),
        BackendId::DirectShow => format!("ksvideosrc device-index={}", index),
        BackendId::MediaFoundation => format!("mfvideosrc device-index={}", index),
        BackendId::AvFoundation => format!("avfvideosrc device-index={}", index),
        BackendId::Any => "autovideosrc".to_string(),
    }
}

fn backend_error(context: &str, err: impl std::fmt::Display) -> DeviceError {
    DeviceError::Backend(format!("{}: {}", context, err))
}

impl GstreamerDevice {
    pub(crate) fn open(request: &OpenRequest) -> Result<Self, DeviceError> {
        gstreamer::init().map_err(|err| backend_error("initialize gstreamer", err))?;

        let source = source_element(request.backend, request.camera);
        let description = format!(
            "{} ! videoconvert ! videoscale ! video/x-raw,format=RGB,width={},height={} ! \
             appsink name=appsink sync=false max-buffers=1 drop=true",
            source, request.format.width, request.format.height
        );
        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|err| backend_error("build capture pipeline", err))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| DeviceError::Backend("capture pipeline is not a Pipeline".into()))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| DeviceError::Backend("appsink element missing".into()))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| DeviceError::Backend("appsink element has unexpected type".into()))?;

        start_playing(&pipeline)?;

        log::info!(
            "GstreamerDevice: camera {} playing via {}",
            request.camera,
            source
        );

        Ok(Self {
            camera: request.camera,
            description: source,
            pipeline,
            appsink,
            read_timeout: gstreamer::ClockTime::from_nseconds(
                request.read_timeout.as_nanos().min(u128::from(u64::MAX)) as u64,
            ),
        })
    }

    /// Drain pending bus messages; an error or end-of-stream means the device is gone.
    fn poll_bus(&self) -> Result<(), DeviceError> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        while let Some(message) = bus.pop() {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    return Err(DeviceError::Disconnected(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    )));
                }
                MessageView::Eos(..) => {
                    return Err(DeviceError::Disconnected(
                        "gstreamer reached end of stream".into(),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl CameraDevice for GstreamerDevice {
    fn read_frame(&mut self) -> Result<RawImage, DeviceError> {
        self.poll_bus()?;

        let Some(sample) = self.appsink.try_pull_sample(self.read_timeout) else {
            if self.appsink.is_eos() {
                return Err(DeviceError::Disconnected("capture stream ended".into()));
            }
            return Err(DeviceError::Timeout);
        };

        let (pixels, width, height) = sample_to_pixels(&sample)?;
        Ok(RawImage::rgb(pixels, width, height))
    }

    fn describe(&self) -> String {
        format!("gstreamer://{} (camera {})", self.description, self.camera)
    }
}

impl Drop for GstreamerDevice {
    fn drop(&mut self) {
        if let Err(err) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!(
                "GstreamerDevice: failed to stop pipeline for camera {}: {}",
                self.camera,
                err
            );
        }
    }
}

/// Set the pipeline playing; on failure take it back to `Null` so the source
/// releases the device before the pipeline is dropped.
fn start_playing(pipeline: &gstreamer::Pipeline) -> Result<(), DeviceError> {
    if let Err(err) = pipeline.set_state(gstreamer::State::Playing) {
        let _ = pipeline.set_state(gstreamer::State::Null);
        return Err(backend_error("set capture pipeline to Playing", err));
    }
    Ok(())
}

fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32), DeviceError> {
    let buffer = sample
        .buffer()
        .ok_or_else(|| DeviceError::Backend("sample missing buffer".into()))?;
    let caps = sample
        .caps()
        .ok_or_else(|| DeviceError::Backend("sample missing caps".into()))?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|err| backend_error("parse caps as video info", err))?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride()[0] as usize;

    let map = buffer
        .map_readable()
        .map_err(|err| backend_error("map buffer", err))?;
    let data = map.as_slice();

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let chunk = data
            .get(start..start + row_bytes)
            .ok_or_else(|| DeviceError::Backend("buffer row is out of bounds".into()))?;
        pixels.extend_from_slice(chunk);
    }

    Ok((pixels, width, height))
}
