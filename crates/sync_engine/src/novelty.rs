//! Per-reader novelty cursor.

use contracts::VisionResult;

use crate::cache::ResultCache;

/// Last sequence seen by one reader of one camera
///
/// Each reader owns its tracker, so several readers can poll the same
/// camera on their own schedule without consuming each other's updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoveltyTracker {
    camera: u32,
    last_seen: u64,
}

impl NoveltyTracker {
    pub fn new(camera: u32) -> Self {
        Self {
            camera,
            last_seen: 0,
        }
    }

    pub fn camera(&self) -> u32 {
        self.camera
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    /// True when the cache holds a sequence this reader has not observed.
    pub fn has_new_update(&self, cache: &ResultCache) -> bool {
        cache.has_new_update(self.camera, self.last_seen)
    }

    /// Return the new result, if any, and advance the cursor to it.
    pub fn observe(&mut self, cache: &ResultCache) -> Option<VisionResult> {
        let result = cache.get(self.camera);
        if result.last_observed_seq > self.last_seen {
            self.last_seen = result.last_observed_seq;
            Some(result)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FrameMode, VisionFrame, YawSource};

    fn tags_frame(update_seq: u64) -> VisionFrame {
        VisionFrame {
            camera_index: 1,
            update_seq,
            capture_timestamp: 0,
            mode: FrameMode::Tags,
            tag_ids: vec![3],
            tag_corners: Vec::new(),
            yaw_source: YawSource::Vision,
        }
    }

    #[test]
    fn test_true_exactly_once_per_transition() {
        let cache = ResultCache::new();
        let mut tracker = NoveltyTracker::new(1);
        assert!(!tracker.has_new_update(&cache));

        cache.update(tags_frame(1));
        assert!(tracker.has_new_update(&cache));
        assert!(tracker.has_new_update(&cache));
        assert_eq!(tracker.observe(&cache).map(|r| r.update_seq()), Some(1));
        assert!(!tracker.has_new_update(&cache));
        assert!(tracker.observe(&cache).is_none());

        // Duplicate sequence does not re-trigger
        cache.update(tags_frame(1));
        assert!(!tracker.has_new_update(&cache));

        cache.update(tags_frame(2));
        assert!(tracker.has_new_update(&cache));
    }

    #[test]
    fn test_independent_readers() {
        let cache = ResultCache::new();
        let mut fast = NoveltyTracker::new(1);
        let mut slow = NoveltyTracker::new(1);

        cache.update(tags_frame(1));
        assert!(fast.observe(&cache).is_some());
        cache.update(tags_frame(2));
        assert!(fast.observe(&cache).is_some());

        // Slow reader still sees novelty, collapsed to the latest
        assert_eq!(slow.observe(&cache).map(|r| r.update_seq()), Some(2));
        assert_eq!(slow.last_seen(), fast.last_seen());
    }
}
