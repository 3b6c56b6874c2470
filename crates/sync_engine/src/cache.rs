//! Latest accepted result per camera.

use std::collections::HashMap;
use std::sync::RwLock;

use contracts::{FrameSink, UpdateOutcome, VisionFrame, VisionResult};
use tracing::trace;

/// Change-detected result store
///
/// Single writer (the decode path), any number of readers. The lock is
/// only held to clone or replace one entry.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<u32, VisionResult>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` if its sequence is newer than the cached one.
    pub fn update(&self, frame: VisionFrame) -> UpdateOutcome {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(current) = entries.get(&frame.camera_index) {
            if frame.update_seq <= current.last_observed_seq {
                trace!(
                    camera = frame.camera_index,
                    update_seq = frame.update_seq,
                    current = current.last_observed_seq,
                    "stale frame discarded"
                );
                return UpdateOutcome::Stale {
                    current: current.last_observed_seq,
                };
            }
        }

        entries.insert(frame.camera_index, VisionResult::new(frame));
        UpdateOutcome::Accepted
    }

    /// Snapshot for `camera`, or the no-data placeholder.
    pub fn get(&self, camera: u32) -> VisionResult {
        self.read(|entries| entries.get(&camera).cloned())
            .unwrap_or_else(|| VisionResult::no_data(camera))
    }

    /// Stored sequence for `camera`, 0 when unseen.
    pub fn update_number(&self, camera: u32) -> u64 {
        self.read(|entries| entries.get(&camera).map(|r| r.last_observed_seq))
            .unwrap_or(0)
    }

    /// Whether the cached sequence is newer than the caller's `last_seen`.
    ///
    /// Pure read: the caller owns and advances `last_seen`.
    pub fn has_new_update(&self, camera: u32, last_seen: u64) -> bool {
        self.update_number(camera) > last_seen
    }

    /// Camera indices with at least one accepted frame.
    pub fn cameras(&self) -> Vec<u32> {
        let mut cameras = self.read(|entries| entries.keys().copied().collect::<Vec<_>>());
        cameras.sort_unstable();
        cameras
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<u32, VisionResult>) -> T) -> T {
        match self.entries.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }
}

impl FrameSink for ResultCache {
    fn accept(&self, frame: VisionFrame) -> UpdateOutcome {
        self.update(frame)
    }
}
