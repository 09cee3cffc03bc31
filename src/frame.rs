//! Frame values shared between capture workers and the consumer.
//!
//! - `CameraId`: identifier of a configured camera (fixed set, decided at startup).
//! - `RawImage`: what a device hands back from a single read.
//! - `FrameSnapshot`: immutable, published value. Once built it is never mutated;
//!   the hub replaces whole snapshots, so readers can never see a torn frame.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant, SystemTime};

/// Small non-negative camera index, as configured.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CameraId(pub u32);

impl CameraId {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CameraId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(CameraId)
    }
}

impl From<u32> for CameraId {
    fn from(value: u32) -> Self {
        CameraId(value)
    }
}

/// Pixel layout of a captured buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Yuyv,
    Nv12,
    Mjpeg,
}

/// One frame as returned by a device read, before it is stamped and published.
#[derive(Clone, Debug)]
pub struct RawImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl RawImage {
    pub fn rgb(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
            format: PixelFormat::Rgb24,
        }
    }
}

/// Immutable published frame.
///
/// Produced by exactly one capture worker. After publication it is shared read-only
/// (behind an `Arc`) with any number of readers until a newer snapshot supersedes it.
#[derive(Debug)]
pub struct FrameSnapshot {
    camera_id: CameraId,
    sequence: u64,
    captured_at: SystemTime,
    captured_instant: Instant,
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    is_valid: bool,
}

impl FrameSnapshot {
    /// Stamp a freshly read image.
    pub fn captured(camera_id: CameraId, sequence: u64, image: RawImage) -> Self {
        Self {
            camera_id,
            sequence,
            captured_at: SystemTime::now(),
            captured_instant: Instant::now(),
            pixels: image.pixels,
            width: image.width,
            height: image.height,
            format: image.format,
            is_valid: true,
        }
    }

    /// Copy of this snapshot flagged as no longer valid.
    ///
    /// Published once when a camera goes permanently offline so the consumer shows an
    /// offline marker instead of silently freezing on the last good frame.
    pub fn offline_marker(&self) -> Self {
        Self {
            camera_id: self.camera_id,
            sequence: self.sequence,
            captured_at: self.captured_at,
            captured_instant: self.captured_instant,
            pixels: self.pixels.clone(),
            width: self.width,
            height: self.height,
            format: self.format,
            is_valid: false,
        }
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Time since capture, measured on the monotonic clock.
    pub fn age(&self) -> Duration {
        self.captured_instant.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_snapshot_is_valid_and_keeps_pixels() {
        let image = RawImage::rgb(vec![1, 2, 3], 1, 1);
        let snap = FrameSnapshot::captured(CameraId(2), 7, image);

        assert!(snap.is_valid());
        assert_eq!(snap.camera_id(), CameraId(2));
        assert_eq!(snap.sequence(), 7);
        assert_eq!(snap.pixels(), &[1, 2, 3]);
        assert_eq!(snap.format(), PixelFormat::Rgb24);
    }

    #[test]
    fn offline_marker_keeps_identity_but_is_invalid() {
        let snap = FrameSnapshot::captured(CameraId(0), 41, RawImage::rgb(vec![9; 12], 2, 2));
        let marker = snap.offline_marker();

        assert!(!marker.is_valid());
        assert_eq!(marker.sequence(), 41);
        assert_eq!(marker.captured_at(), snap.captured_at());
        assert_eq!(marker.pixels(), snap.pixels());
    }

    #[test]
    fn camera_id_parses_with_whitespace() {
        assert_eq!(" 3 ".parse::<CameraId>().unwrap(), CameraId(3));
        assert!("x".parse::<CameraId>().is_err());
    }
}
