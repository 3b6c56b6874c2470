use serde::{Deserialize, Serialize};

/// One yaw reading captured on a strobe edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GyroSample {
    /// Yaw in radians
    pub angle: f64,
    /// Local monotonic time in microseconds
    pub timestamp: i64,
}

impl GyroSample {
    pub const fn new(angle: f64, timestamp: i64) -> Self {
        Self { angle, timestamp }
    }
}
