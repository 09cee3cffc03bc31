// ----------------------------------------------------------------------------
// Synthetic camera: generated frames paced at the target rate
// ----------------------------------------------------------------------------

use std::time::Instant;

use super::{CameraDevice, FrameFormat, OpenRequest};
use crate::error::DeviceError;
use crate::frame::{CameraId, RawImage};

/// Synthetic device. Always opens, never fails; each camera gets its own pattern.
pub struct SyntheticDevice {
    camera: CameraId,
    format: FrameFormat,
    frame_count: u64,
    /// Simulated scene changes so consecutive frames differ visibly.
    scene_state: u8,
    next_due: Instant,
}

impl SyntheticDevice {
    pub fn open(request: &OpenRequest) -> Self {
        log::debug!(
            "SyntheticDevice: opened camera {} ({}x{} @ {} fps)",
            request.camera,
            request.format.width,
            request.format.height,
            request.format.target_fps
        );
        Self {
            camera: request.camera,
            format: request.format,
            frame_count: 0,
            scene_state: 0,
            next_due: Instant::now(),
        }
    }

    fn pace(&mut self) {
        let interval = self.format.frame_interval();
        if interval.is_zero() {
            return;
        }
        let now = Instant::now();
        if self.next_due > now {
            std::thread::sleep(self.next_due - now);
        }
        // Re-anchor after a long gap instead of bursting to catch up.
        self.next_due = self.next_due.max(now) + interval;
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.format.width as usize) * (self.format.height as usize) * 3;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let offset = self.frame_count
            + u64::from(self.scene_state)
            + u64::from(self.camera.index()).wrapping_mul(64);
        (0..pixel_count)
            .map(|i| ((i as u64 + offset) % 256) as u8)
            .collect()
    }
}

impl CameraDevice for SyntheticDevice {
    fn read_frame(&mut self) -> Result<RawImage, DeviceError> {
        self.pace();
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Ok(RawImage::rgb(pixels, self.format.width, self.format.height))
    }

    fn describe(&self) -> String {
        format!("synthetic://camera{}", self.camera)
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        log::debug!(
            "SyntheticDevice: released camera {} after {} frames",
            self.camera,
            self.frame_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendId;
    use std::time::Duration;

    fn request(camera: u32, target_fps: u32) -> OpenRequest {
        OpenRequest {
            camera: CameraId(camera),
            backend: BackendId::Any,
            format: FrameFormat {
                width: 4,
                height: 2,
                target_fps,
                buffer_count: 1,
            },
            read_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut device = SyntheticDevice::open(&request(0, 0));
        let a = device.read_frame().unwrap();
        let b = device.read_frame().unwrap();
        assert_ne!(a.pixels, b.pixels);
    }

    #[test]
    fn cameras_have_distinct_patterns() {
        let mut zero = SyntheticDevice::open(&request(0, 0));
        let mut one = SyntheticDevice::open(&request(1, 0));
        assert_ne!(zero.read_frame().unwrap().pixels, one.read_frame().unwrap().pixels);
    }

    #[test]
    fn reads_are_paced_at_target_rate() {
        let mut device = SyntheticDevice::open(&request(0, 50));
        let start = Instant::now();
        for _ in 0..3 {
            device.read_frame().unwrap();
        }
        // First frame is immediate, the next two wait one 20ms interval each.
        assert!(start.elapsed() >= Duration::from_millis(35));
    }
}
