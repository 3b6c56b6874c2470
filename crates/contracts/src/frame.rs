//! Canonical vision frame
//!
//! Every wire encoding decodes into [`VisionFrame`]; the result cache stores
//! one [`VisionResult`] per camera index.

use serde::{Deserialize, Serialize};

use crate::Pose3;

/// Image-space point in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Four corners of one detected tag, clockwise from bottom-right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TagCorners(pub [Point2; 4]);

impl TagCorners {
    pub const fn new(corners: [Point2; 4]) -> Self {
        Self(corners)
    }

    pub fn corners(&self) -> &[Point2; 4] {
        &self.0
    }

    /// Mean of the four corners.
    pub fn center(&self) -> Point2 {
        let (sx, sy) = self
            .0
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2::new(sx / 4.0, sy / 4.0)
    }

    /// Mean area of the two rectangles spanned by the diagonals.
    pub fn area(&self) -> f64 {
        let [c0, c1, c2, c3] = self.0;
        let a = ((c0.x - c2.x) * (c0.y - c2.y)).abs();
        let b = ((c1.x - c3.x) * (c1.y - c3.y)).abs();
        (a + b) / 2.0
    }
}

/// Which sensor the cached yaw came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YawSource {
    /// Yaw as estimated by the camera
    #[default]
    Vision,
    /// Yaw of the matching gyro sample
    Gyro,
    /// No gyro sample old enough; the vision yaw was kept
    GyroFallback,
}

/// Frame payload, selected by the wire `mode` field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FrameMode {
    /// Mode 0: full pose estimate
    Pose {
        primary: Pose3,
        /// Second solution of an ambiguous single-tag solve
        alternate: Option<Pose3>,
        /// 0.0 is unambiguous, 1.0 is worst
        ambiguity: f64,
    },
    /// Mode 1: tag detections only
    Tags,
}

impl FrameMode {
    pub const fn pose(primary: Pose3, alternate: Option<Pose3>, ambiguity: f64) -> Self {
        Self::Pose {
            primary,
            alternate,
            ambiguity,
        }
    }

    /// Wire code of this mode.
    pub const fn code(&self) -> u32 {
        match self {
            Self::Pose { .. } => 0,
            Self::Tags => 1,
        }
    }
}

/// One decoded packet from one camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionFrame {
    pub camera_index: u32,
    /// Publisher-side monotonically increasing update number
    pub update_seq: u64,
    /// Capture time in the local clock domain (µs)
    pub capture_timestamp: i64,
    pub mode: FrameMode,
    pub tag_ids: Vec<i32>,
    /// Empty, or one entry per tag id
    pub tag_corners: Vec<TagCorners>,
    #[serde(default)]
    pub yaw_source: YawSource,
}

impl VisionFrame {
    /// Primary pose, if this is a pose-mode frame.
    pub fn primary_pose(&self) -> Option<&Pose3> {
        match &self.mode {
            FrameMode::Pose { primary, .. } => Some(primary),
            FrameMode::Tags => None,
        }
    }

    pub fn ambiguity(&self) -> Option<f64> {
        match self.mode {
            FrameMode::Pose { ambiguity, .. } => Some(ambiguity),
            FrameMode::Tags => None,
        }
    }

    pub fn tag_count(&self) -> usize {
        self.tag_ids.len()
    }
}

/// Latest accepted frame of one camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionResult {
    pub frame: VisionFrame,
    /// Sequence of `frame` at the time it was accepted
    pub last_observed_seq: u64,
}

impl VisionResult {
    pub fn new(frame: VisionFrame) -> Self {
        let last_observed_seq = frame.update_seq;
        Self {
            frame,
            last_observed_seq,
        }
    }

    /// Placeholder returned for a camera that has not produced data yet.
    pub fn no_data(camera_index: u32) -> Self {
        Self {
            frame: VisionFrame {
                camera_index,
                update_seq: 0,
                capture_timestamp: -1,
                mode: FrameMode::pose(Pose3::sentinel(), Some(Pose3::sentinel()), 1.0),
                tag_ids: Vec::new(),
                tag_corners: Vec::new(),
                yaw_source: YawSource::Vision,
            },
            last_observed_seq: 0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.frame.update_seq != 0 || self.frame.capture_timestamp >= 0
    }

    pub fn camera_pose(&self) -> Option<&Pose3> {
        self.frame.primary_pose()
    }

    pub fn update_seq(&self) -> u64 {
        self.last_observed_seq
    }
}
