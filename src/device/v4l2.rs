//! V4L2 camera device.
//!
//! Opens `/dev/video<index>`, negotiates the requested format (keeping whatever the
//! driver settles on when it refuses), and streams through memory-mapped buffers.
//! The stream's poll timeout is set to the worker's read timeout, so a hung device
//! surfaces as `DeviceError::Timeout` instead of blocking the worker.

use ouroboros::self_referencing;
use std::io;

use super::{CameraDevice, OpenRequest};
use crate::error::DeviceError;
use crate::frame::{CameraId, PixelFormat, RawImage};

#[self_referencing]
struct V4l2Stream {
    device: v4l::Device,
    #[borrows(device)]
    #[covariant]
    stream: v4l::io::mmap::Stream<'this>,
}

pub(crate) struct V4l2Device {
    camera: CameraId,
    path: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    state: V4l2Stream,
}

impl V4l2Device {
    pub(crate) fn open(request: &OpenRequest) -> Result<Self, DeviceError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let index = request.camera.index() as usize;
        let path = format!("/dev/video{}", index);
        let device = v4l::Device::new(index)?;

        let mut wanted = device.format()?;
        wanted.width = request.format.width;
        wanted.height = request.format.height;
        wanted.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&wanted) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Device: failed to set format on {}: {}", path, err);
                device.format()?
            }
        };

        if request.format.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(request.format.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Device: failed to set fps on {}: {}", path, err);
            }
        }

        let pixel_format = match &format.fourcc.repr {
            b"RGB3" => PixelFormat::Rgb24,
            b"YUYV" => PixelFormat::Yuyv,
            b"NV12" => PixelFormat::Nv12,
            b"MJPG" => PixelFormat::Mjpeg,
            _ => {
                return Err(DeviceError::Unsupported(format!(
                    "{} delivers unsupported pixel format {}",
                    path, format.fourcc
                )))
            }
        };

        let buffer_count = request.format.buffer_count.max(1);
        let read_timeout = request.read_timeout;
        let state = V4l2StreamTryBuilder {
            device,
            stream_builder: |device| {
                let mut stream =
                    v4l::io::mmap::Stream::with_buffers(device, Type::VideoCapture, buffer_count)?;
                stream.set_timeout(read_timeout);
                Ok::<_, io::Error>(stream)
            },
        }
        .try_build()?;

        log::info!(
            "V4l2Device: opened {} ({}x{} {})",
            path,
            format.width,
            format.height,
            format.fourcc
        );

        Ok(Self {
            camera: request.camera,
            path,
            width: format.width,
            height: format.height,
            format: pixel_format,
            state,
        })
    }
}

impl CameraDevice for V4l2Device {
    fn read_frame(&mut self) -> Result<RawImage, DeviceError> {
        use v4l::io::traits::CaptureStream;

        let compressed = self.format == PixelFormat::Mjpeg;
        let pixels = self.state.with_stream_mut(|stream| {
            stream.next().map(|(buf, meta)| {
                let used = meta.bytesused as usize;
                if compressed && used > 0 && used <= buf.len() {
                    buf[..used].to_vec()
                } else {
                    buf.to_vec()
                }
            })
        })?;

        if pixels.is_empty() {
            return Err(DeviceError::Backend(format!(
                "{} returned an empty buffer",
                self.path
            )));
        }

        Ok(RawImage {
            pixels,
            width: self.width,
            height: self.height,
            format: self.format,
        })
    }

    fn describe(&self) -> String {
        format!("v4l2://{} (camera {})", self.path, self.camera)
    }
}

impl Drop for V4l2Device {
    fn drop(&mut self) {
        log::debug!("V4l2Device: released {}", self.path);
    }
}
