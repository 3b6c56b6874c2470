//! Camera pose to robot-center pose.

use std::collections::HashMap;
use std::sync::RwLock;

use contracts::{Pose3, Rotation3, Transform3, Translation3};
use nalgebra::{Isometry3, UnitQuaternion, Vector3};

/// Per-camera mounting transforms
#[derive(Debug, Default)]
pub struct PoseCenterTransform {
    transforms: RwLock<HashMap<u32, Transform3>>,
}

impl PoseCenterTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from configuration.
    pub fn with_transforms(transforms: impl IntoIterator<Item = (u32, Transform3)>) -> Self {
        Self {
            transforms: RwLock::new(transforms.into_iter().collect()),
        }
    }

    /// Install or replace the transform of `camera`.
    pub fn set_transform(&self, camera: u32, transform: Transform3) {
        let mut transforms = match self.transforms.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        transforms.insert(camera, transform);
    }

    pub fn transform(&self, camera: u32) -> Option<Transform3> {
        match self.transforms.read() {
            Ok(guard) => guard.get(&camera).copied(),
            Err(poisoned) => poisoned.into_inner().get(&camera).copied(),
        }
    }

    /// `pose ∘ transform`, or the sentinel pose when `camera` has no transform.
    pub fn to_robot_center(&self, camera: u32, pose: &Pose3) -> Pose3 {
        match self.transform(camera) {
            Some(t) => compose(pose, &t),
            None => Pose3::sentinel(),
        }
    }
}

/// Apply `transform` in the frame of `pose`.
pub fn compose(pose: &Pose3, transform: &Transform3) -> Pose3 {
    let a = to_isometry(&pose.translation, &pose.rotation);
    let b = to_isometry(&transform.translation, &transform.rotation);
    from_isometry(&(a * b))
}

fn to_isometry(t: &Translation3, r: &Rotation3) -> Isometry3<f64> {
    Isometry3::from_parts(
        Vector3::new(t.x, t.y, t.z).into(),
        UnitQuaternion::from_euler_angles(r.roll, r.pitch, r.yaw),
    )
}

fn from_isometry(iso: &Isometry3<f64>) -> Pose3 {
    let v = iso.translation.vector;
    let (roll, pitch, yaw) = iso.rotation.euler_angles();
    Pose3::new(
        Translation3::new(v.x, v.y, v.z),
        Rotation3::new(roll, pitch, yaw),
    )
}
