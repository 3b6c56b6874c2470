//! Vision/gyro temporal correlation.
//!
//! A vision frame that lags the gyro stream gets the yaw of the newest gyro
//! sample captured at or before it. The scan is linear over at most
//! `capacity` samples, newest first.

use contracts::{FrameMode, GyroSample, VisionFrame, YawSource};
use tracing::debug;

use crate::buffer::GyroSampleBuffer;

/// Read-only search over one camera's gyro history
#[derive(Debug, Clone, Copy)]
pub struct Correlator<'a> {
    buffer: &'a GyroSampleBuffer,
}

/// Frame after correlation, with the lag used for metrics
#[derive(Debug, Clone, PartialEq)]
pub struct Correlated {
    pub frame: VisionFrame,
    /// Newest gyro timestamp minus the vision capture timestamp
    pub lag_us: Option<i64>,
}

impl<'a> Correlator<'a> {
    pub fn new(buffer: &'a GyroSampleBuffer) -> Self {
        Self { buffer }
    }

    /// Newest sample with `timestamp <= target`.
    ///
    /// Among equal timestamps the most recently written sample wins.
    pub fn lookup(&self, target: i64) -> Option<GyroSample> {
        self.buffer
            .iter_newest_first()
            .find(|s| s.timestamp <= target)
            .copied()
    }

    /// Like [`lookup`](Self::lookup), degrading to `(fallback_angle, target)`
    /// when the whole history is newer than `target`.
    pub fn find_before(&self, target: i64, fallback_angle: f64) -> GyroSample {
        match self.lookup(target) {
            Some(sample) => sample,
            None => {
                debug!(
                    target_timestamp = target,
                    samples = self.buffer.len(),
                    "no temporal match, falling back to vision yaw"
                );
                GyroSample::new(fallback_angle, target)
            }
        }
    }

    /// Whether `frame` should take its yaw from the gyro history.
    ///
    /// Vision yaw is used directly when the strobe is disabled, the history
    /// is not yet full, or the frame is newer than the newest gyro sample.
    pub fn needs_correlation(&self, strobe_enabled: bool, capture_timestamp: i64) -> bool {
        if !strobe_enabled || !self.buffer.is_full() {
            return false;
        }
        match self.buffer.latest() {
            Some(latest) => capture_timestamp <= latest.timestamp,
            None => false,
        }
    }

    /// Apply the substitution rule to `frame`.
    ///
    /// Only pose-mode frames are rewritten: the primary pose keeps its
    /// translation, takes the gyro yaw with zero roll and pitch, and the
    /// capture timestamp becomes the matched sample's timestamp.
    pub fn correlate(&self, mut frame: VisionFrame, strobe_enabled: bool) -> Correlated {
        if !self.needs_correlation(strobe_enabled, frame.capture_timestamp) {
            return Correlated { frame, lag_us: None };
        }

        let vision_yaw = match frame.primary_pose() {
            Some(pose) => pose.rotation.yaw,
            None => return Correlated { frame, lag_us: None },
        };

        let target = frame.capture_timestamp;
        let lag_us = self.buffer.latest().map(|latest| latest.timestamp - target);

        let (sample, source) = match self.lookup(target) {
            Some(sample) => (sample, YawSource::Gyro),
            None => (
                self.find_before(target, vision_yaw),
                YawSource::GyroFallback,
            ),
        };

        if let FrameMode::Pose { primary, .. } = &mut frame.mode {
            *primary = primary.with_yaw_only(sample.angle);
        }
        frame.capture_timestamp = sample.timestamp;
        frame.yaw_source = source;

        Correlated { frame, lag_us }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Pose3, Rotation3};

    fn filled(samples: &[(f64, i64)]) -> GyroSampleBuffer {
        let mut buffer = GyroSampleBuffer::new(samples.len());
        for &(angle, ts) in samples {
            buffer.push(angle, ts);
        }
        buffer
    }

    fn pose_frame(capture_timestamp: i64) -> VisionFrame {
        VisionFrame {
            camera_index: 0,
            update_seq: 1,
            capture_timestamp,
            mode: FrameMode::pose(
                Pose3::from_components([1.0, 2.0, 0.5, 0.1, 0.2, 0.9]),
                None,
                0.05,
            ),
            tag_ids: vec![7],
            tag_corners: Vec::new(),
            yaw_source: YawSource::Vision,
        }
    }

    #[test]
    fn test_find_before_picks_newest_not_after_target() {
        let buffer = filled(&[(0.10, 100), (0.20, 200), (0.30, 300), (0.40, 400)]);
        let correlator = Correlator::new(&buffer);

        assert_eq!(correlator.find_before(250, 9.0), GyroSample::new(0.20, 200));
        assert_eq!(correlator.find_before(300, 9.0), GyroSample::new(0.30, 300));
        assert_eq!(correlator.find_before(10_000, 9.0), GyroSample::new(0.40, 400));
    }

    #[test]
    fn test_find_before_fallback_when_all_newer() {
        let buffer = filled(&[(0.10, 100), (0.20, 200)]);
        let correlator = Correlator::new(&buffer);

        assert_eq!(correlator.find_before(50, 1.25), GyroSample::new(1.25, 50));
        assert!(correlator.lookup(50).is_none());
    }

    #[test]
    fn test_tie_break_most_recent_write() {
        let buffer = filled(&[(0.10, 100), (0.20, 200), (0.25, 200)]);
        let correlator = Correlator::new(&buffer);

        assert_eq!(correlator.find_before(200, 0.0).angle, 0.25);
    }

    #[test]
    fn test_scan_after_wrap() {
        let mut buffer = GyroSampleBuffer::new(3);
        for i in 1..=5 {
            buffer.push(i as f64, i * 100);
        }
        let correlator = Correlator::new(&buffer);

        // Samples 100 and 200 were overwritten
        assert_eq!(correlator.find_before(350, -1.0), GyroSample::new(3.0, 300));
        assert_eq!(correlator.find_before(250, -1.0), GyroSample::new(-1.0, 250));
    }

    #[test]
    fn test_no_correlation_when_strobe_disabled() {
        let buffer = filled(&[(0.10, 100), (0.20, 200)]);
        let correlator = Correlator::new(&buffer);

        let out = correlator.correlate(pose_frame(150), false);
        assert_eq!(out.frame, pose_frame(150));
        assert!(out.lag_us.is_none());
    }

    #[test]
    fn test_no_correlation_until_buffer_full() {
        let mut buffer = GyroSampleBuffer::new(3);
        buffer.push(0.10, 100);
        buffer.push(0.20, 200);
        let correlator = Correlator::new(&buffer);

        assert!(!correlator.needs_correlation(true, 150));
        assert_eq!(correlator.correlate(pose_frame(150), true).frame.yaw_source, YawSource::Vision);
    }

    #[test]
    fn test_no_correlation_when_frame_newer_than_gyro() {
        let buffer = filled(&[(0.10, 100), (0.20, 200)]);
        let correlator = Correlator::new(&buffer);

        assert!(!correlator.needs_correlation(true, 201));
        assert!(correlator.needs_correlation(true, 200));
    }

    #[test]
    fn test_substitution_keeps_translation_and_uses_gyro_time() {
        let buffer = filled(&[(0.10, 100), (0.20, 200), (0.30, 300)]);
        let correlator = Correlator::new(&buffer);

        let out = correlator.correlate(pose_frame(250), true);
        let pose = out.frame.primary_pose().copied().unwrap();

        assert_eq!(pose.translation, pose_frame(0).primary_pose().unwrap().translation);
        assert_eq!(pose.rotation, Rotation3::new(0.0, 0.0, 0.20));
        assert_eq!(out.frame.capture_timestamp, 200);
        assert_eq!(out.frame.yaw_source, YawSource::Gyro);
        assert_eq!(out.lag_us, Some(50));
    }

    #[test]
    fn test_substitution_fallback_keeps_vision_yaw() {
        let buffer = filled(&[(0.10, 100), (0.20, 200)]);
        let correlator = Correlator::new(&buffer);

        let out = correlator.correlate(pose_frame(40), true);
        let pose = out.frame.primary_pose().copied().unwrap();

        assert_eq!(pose.rotation, Rotation3::new(0.0, 0.0, 0.9));
        assert_eq!(out.frame.capture_timestamp, 40);
        assert_eq!(out.frame.yaw_source, YawSource::GyroFallback);
    }

    #[test]
    fn test_tags_frame_untouched() {
        let buffer = filled(&[(0.10, 100), (0.20, 200)]);
        let correlator = Correlator::new(&buffer);

        let mut frame = pose_frame(150);
        frame.mode = FrameMode::Tags;
        let out = correlator.correlate(frame.clone(), true);
        assert_eq!(out.frame, frame);
    }
}
