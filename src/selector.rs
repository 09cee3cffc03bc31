//! Active camera selection.
//!
//! Switching is a metadata update: every configured camera is already capturing, so
//! `switch_to` never touches a worker and completes in constant time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::InvalidCamera;
use crate::frame::CameraId;

/// Holds the camera currently shown to the operator.
pub struct CameraSelector {
    order: Vec<CameraId>,
    positions: HashMap<CameraId, usize>,
    selected: AtomicUsize,
}

impl CameraSelector {
    /// Build a selector over the configured cameras, starting at `initial`.
    pub fn new(cameras: &[CameraId], initial: CameraId) -> Result<Self, InvalidCamera> {
        let mut order = Vec::with_capacity(cameras.len());
        let mut positions = HashMap::with_capacity(cameras.len());
        for id in cameras {
            if !positions.contains_key(id) {
                positions.insert(*id, order.len());
                order.push(*id);
            }
        }
        let start = *positions.get(&initial).ok_or(InvalidCamera(initial))?;
        Ok(Self {
            order,
            positions,
            selected: AtomicUsize::new(start),
        })
    }

    pub fn current(&self) -> CameraId {
        self.order[self.selected.load(Ordering::Acquire)]
    }

    /// Select `requested`. An id outside the configured set leaves the selection unchanged.
    pub fn switch_to(&self, requested: CameraId) -> Result<(), InvalidCamera> {
        let position = *self
            .positions
            .get(&requested)
            .ok_or(InvalidCamera(requested))?;
        self.selected.store(position, Ordering::Release);
        Ok(())
    }

    /// Advance to the next configured camera, wrapping around.
    pub fn next(&self) -> CameraId {
        self.rotate(1)
    }

    /// Step back to the previous configured camera, wrapping around.
    pub fn previous(&self) -> CameraId {
        self.rotate(self.order.len() - 1)
    }

    pub fn cameras(&self) -> &[CameraId] {
        &self.order
    }

    pub fn contains(&self, camera: CameraId) -> bool {
        self.positions.contains_key(&camera)
    }

    fn rotate(&self, step: usize) -> CameraId {
        let len = self.order.len();
        let previous = self
            .selected
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pos| {
                Some((pos + step) % len)
            })
            .unwrap_or_else(|pos| pos);
        self.order[(previous + step) % len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<CameraId> {
        raw.iter().copied().map(CameraId).collect()
    }

    #[test]
    fn starts_at_initial_camera() {
        let sel = CameraSelector::new(&ids(&[0, 2, 4]), CameraId(2)).unwrap();
        assert_eq!(sel.current(), CameraId(2));
    }

    #[test]
    fn initial_camera_must_be_configured() {
        assert_eq!(
            CameraSelector::new(&ids(&[0, 1]), CameraId(3)).err(),
            Some(InvalidCamera(CameraId(3)))
        );
    }

    #[test]
    fn switch_to_configured_camera() {
        let sel = CameraSelector::new(&ids(&[0, 1]), CameraId(0)).unwrap();
        sel.switch_to(CameraId(1)).unwrap();
        assert_eq!(sel.current(), CameraId(1));
    }

    #[test]
    fn invalid_switch_keeps_selection() {
        let sel = CameraSelector::new(&ids(&[0, 1]), CameraId(1)).unwrap();
        assert_eq!(sel.switch_to(CameraId(7)), Err(InvalidCamera(CameraId(7))));
        assert_eq!(sel.current(), CameraId(1));
    }

    #[test]
    fn next_and_previous_wrap_in_configured_order() {
        let sel = CameraSelector::new(&ids(&[4, 0, 2]), CameraId(4)).unwrap();
        assert_eq!(sel.next(), CameraId(0));
        assert_eq!(sel.next(), CameraId(2));
        assert_eq!(sel.next(), CameraId(4));
        assert_eq!(sel.previous(), CameraId(2));
        assert_eq!(sel.current(), CameraId(2));
    }

    #[test]
    fn duplicates_are_collapsed() {
        let sel = CameraSelector::new(&ids(&[1, 1, 0]), CameraId(1)).unwrap();
        assert_eq!(sel.cameras(), &ids(&[1, 0])[..]);
    }
}
