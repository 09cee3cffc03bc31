//! Latest-frame hand-off point.
//!
//! `FrameHub` owns exactly one slot per configured camera. Each slot holds an
//! `Arc<FrameSnapshot>`; publishing swaps the `Arc`, reading clones it. The lock
//! around a slot is held only for that pointer swap/clone, never across a device
//! read, so neither side blocks the other for longer than a reference swap.
//!
//! There is no queue: a slow reader skips intermediate frames.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::InvalidCamera;
use crate::frame::{CameraId, FrameSnapshot};

#[derive(Default)]
struct Slot {
    latest: RwLock<Option<Arc<FrameSnapshot>>>,
}

/// Fixed-size mapping from camera id to its most recent snapshot.
pub struct FrameHub {
    slots: HashMap<CameraId, Slot>,
}

impl FrameHub {
    /// Build one empty slot per camera. The set never changes afterwards.
    pub fn new(cameras: &[CameraId]) -> Self {
        Self {
            slots: cameras.iter().map(|id| (*id, Slot::default())).collect(),
        }
    }

    /// Replace the camera's slot with `snapshot`.
    ///
    /// Single writer per slot: only the camera's own worker publishes.
    pub fn publish(
        &self,
        camera_id: CameraId,
        snapshot: Arc<FrameSnapshot>,
    ) -> Result<(), InvalidCamera> {
        let slot = self.slots.get(&camera_id).ok_or(InvalidCamera(camera_id))?;
        let previous = {
            let mut guard = slot.latest.write().unwrap_or_else(PoisonError::into_inner);
            debug_assert!(
                guard
                    .as_ref()
                    .map_or(true, |prev| prev.sequence() <= snapshot.sequence()),
                "sequence numbers must not go backwards"
            );
            guard.replace(snapshot)
        };
        // The superseded frame (possibly the last reference to a large buffer) is
        // released outside the lock.
        drop(previous);
        Ok(())
    }

    /// Most recently published snapshot, `None` until the camera's first capture.
    ///
    /// Unknown camera ids also yield `None`.
    pub fn get_latest(&self, camera_id: CameraId) -> Option<Arc<FrameSnapshot>> {
        let slot = self.slots.get(&camera_id)?;
        let guard = slot.latest.read().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    pub fn contains(&self, camera_id: CameraId) -> bool {
        self.slots.contains_key(&camera_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RawImage;
    use std::thread;

    fn snapshot(camera: u32, sequence: u64) -> Arc<FrameSnapshot> {
        let fill = (sequence % 251) as u8;
        Arc::new(FrameSnapshot::captured(
            CameraId(camera),
            sequence,
            RawImage::rgb(vec![fill; 4 * 4 * 3], 4, 4),
        ))
    }

    #[test]
    fn empty_until_first_publish() {
        let hub = FrameHub::new(&[CameraId(0), CameraId(1)]);
        assert!(hub.get_latest(CameraId(0)).is_none());

        hub.publish(CameraId(0), snapshot(0, 0)).unwrap();
        assert_eq!(hub.get_latest(CameraId(0)).unwrap().sequence(), 0);
        assert!(hub.get_latest(CameraId(1)).is_none());
    }

    #[test]
    fn publish_replaces_whole_value() {
        let hub = FrameHub::new(&[CameraId(0)]);
        hub.publish(CameraId(0), snapshot(0, 0)).unwrap();
        let held = hub.get_latest(CameraId(0)).unwrap();

        hub.publish(CameraId(0), snapshot(0, 1)).unwrap();

        // A reader holding the old snapshot keeps an intact value.
        assert_eq!(held.sequence(), 0);
        assert!(held.pixels().iter().all(|p| *p == 0));
        assert_eq!(hub.get_latest(CameraId(0)).unwrap().sequence(), 1);
    }

    #[test]
    fn unknown_camera_is_rejected() {
        let hub = FrameHub::new(&[CameraId(0)]);
        assert_eq!(
            hub.publish(CameraId(5), snapshot(5, 0)),
            Err(InvalidCamera(CameraId(5)))
        );
        assert!(hub.get_latest(CameraId(5)).is_none());
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn concurrent_readers_never_see_torn_or_older_frames() {
        let hub = Arc::new(FrameHub::new(&[CameraId(0)]));
        let writer_hub = Arc::clone(&hub);
        let writer = thread::spawn(move || {
            for seq in 0..2_000u64 {
                writer_hub.publish(CameraId(0), snapshot(0, seq)).unwrap();
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let hub = Arc::clone(&hub);
                thread::spawn(move || {
                    let mut last_seen = None;
                    for _ in 0..5_000 {
                        if let Some(snap) = hub.get_latest(CameraId(0)) {
                            let fill = (snap.sequence() % 251) as u8;
                            assert!(snap.pixels().iter().all(|p| *p == fill));
                            if let Some(prev) = last_seen {
                                assert!(snap.sequence() >= prev);
                            }
                            last_seen = Some(snap.sequence());
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(hub.get_latest(CameraId(0)).unwrap().sequence(), 1_999);
    }
}
