//! 6-DoF pose primitives
//!
//! Plain data only. Composition lives in `sync_engine::transform`.

use serde::{Deserialize, Serialize};

/// Coordinate published when a camera has no estimate.
pub const SENTINEL_COORDINATE: f64 = 2767.0;

/// Translation in meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Translation3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Translation3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Extrinsic roll/pitch/yaw rotation in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rotation3 {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Rotation3 {
    pub const fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Pure yaw rotation, as substituted from a gyro sample.
    pub const fn from_yaw(yaw: f64) -> Self {
        Self {
            roll: 0.0,
            pitch: 0.0,
            yaw,
        }
    }
}

/// Camera or robot pose in field coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose3 {
    pub translation: Translation3,
    pub rotation: Rotation3,
}

impl Pose3 {
    pub const fn new(translation: Translation3, rotation: Rotation3) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Build from the six wire scalars `[x, y, z, roll, pitch, yaw]`.
    pub const fn from_components(c: [f64; 6]) -> Self {
        Self {
            translation: Translation3::new(c[0], c[1], c[2]),
            rotation: Rotation3::new(c[3], c[4], c[5]),
        }
    }

    /// Six wire scalars in `[x, y, z, roll, pitch, yaw]` order.
    pub const fn components(&self) -> [f64; 6] {
        [
            self.translation.x,
            self.translation.y,
            self.translation.z,
            self.rotation.roll,
            self.rotation.pitch,
            self.rotation.yaw,
        ]
    }

    /// `(2767, 2767, 2767)` with zero rotation.
    pub const fn sentinel() -> Self {
        Self {
            translation: Translation3::new(
                SENTINEL_COORDINATE,
                SENTINEL_COORDINATE,
                SENTINEL_COORDINATE,
            ),
            rotation: Rotation3::new(0.0, 0.0, 0.0),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }

    /// Keep the translation, replace the rotation by a pure yaw.
    pub const fn with_yaw_only(&self, yaw: f64) -> Self {
        Self {
            translation: self.translation,
            rotation: Rotation3::from_yaw(yaw),
        }
    }
}

/// Rigid transform from a camera's optical frame to the robot center.
///
/// Same shape as [`Pose3`]; kept as its own type so a pose cannot be passed
/// where a mounting transform is expected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform3 {
    #[serde(default)]
    pub translation: Translation3,
    #[serde(default)]
    pub rotation: Rotation3,
}

impl Transform3 {
    pub const fn new(translation: Translation3, rotation: Rotation3) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub const fn identity() -> Self {
        Self {
            translation: Translation3::new(0.0, 0.0, 0.0),
            rotation: Rotation3::new(0.0, 0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_pose() {
        let p = Pose3::sentinel();
        assert_eq!(p.translation.x, 2767.0);
        assert_eq!(p.translation.y, 2767.0);
        assert_eq!(p.translation.z, 2767.0);
        assert_eq!(p.rotation, Rotation3::default());
        assert!(p.is_sentinel());
    }

    #[test]
    fn test_components_order() {
        let p = Pose3::from_components([1.0, 2.0, 3.0, 0.1, 0.2, 0.3]);
        assert_eq!(p.translation, Translation3::new(1.0, 2.0, 3.0));
        assert_eq!(p.rotation.yaw, 0.3);
        assert_eq!(p.components(), [1.0, 2.0, 3.0, 0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_with_yaw_only_zeroes_roll_pitch() {
        let p = Pose3::from_components([1.0, 2.0, 3.0, 0.1, 0.2, 0.3]);
        let q = p.with_yaw_only(1.5);
        assert_eq!(q.translation, p.translation);
        assert_eq!(q.rotation, Rotation3::new(0.0, 0.0, 1.5));
    }

    #[test]
    fn test_transform_partial_toml_shape() {
        let t: Transform3 = serde_json::from_str(r#"{"translation":{"x":0.5,"y":0.0,"z":0.2}}"#)
            .unwrap();
        assert_eq!(t.translation.x, 0.5);
        assert_eq!(t.rotation, Rotation3::default());
    }
}
