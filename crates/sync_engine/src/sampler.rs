//! Strobe-driven gyro sampler.
//!
//! The camera pulses a digital line at exposure. Each rising edge records
//! one `(yaw, now)` sample into the camera's history.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use contracts::{Clock, GyroSample, GyroSource, StrobeInput};
use tracing::trace;

use crate::buffer::GyroSampleBuffer;

/// Shared handle to one camera's gyro history
pub type SharedGyroBuffer = Arc<RwLock<GyroSampleBuffer>>;

/// Edge detector feeding a [`GyroSampleBuffer`]
///
/// A held strobe yields exactly one sample: the sampler disarms on the edge
/// and re-arms only once the line deasserts.
pub struct GyroSampler {
    camera: u32,
    strobe: Arc<dyn StrobeInput>,
    gyro: Arc<dyn GyroSource>,
    clock: Arc<dyn Clock>,
    buffer: SharedGyroBuffer,
    armed: AtomicBool,
}

impl std::fmt::Debug for GyroSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GyroSampler")
            .field("camera", &self.camera)
            .field("armed", &self.armed.load(Ordering::Relaxed))
            .finish()
    }
}

impl GyroSampler {
    pub fn new(
        camera: u32,
        strobe: Arc<dyn StrobeInput>,
        gyro: Arc<dyn GyroSource>,
        clock: Arc<dyn Clock>,
        buffer: SharedGyroBuffer,
    ) -> Self {
        Self {
            camera,
            strobe,
            gyro,
            clock,
            buffer,
            armed: AtomicBool::new(true),
        }
    }

    pub fn camera(&self) -> u32 {
        self.camera
    }

    /// Sample the strobe once; returns the recorded sample on a rising edge.
    pub fn poll(&self) -> Option<GyroSample> {
        if !self.strobe.is_asserted() {
            self.armed.store(true, Ordering::Release);
            return None;
        }

        if !self.armed.swap(false, Ordering::AcqRel) {
            return None;
        }

        let sample = GyroSample::new(self.gyro.yaw(), self.clock.now_micros());
        let mut buffer = match self.buffer.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        buffer.push(sample.angle, sample.timestamp);
        trace!(
            camera = self.camera,
            angle = sample.angle,
            timestamp = sample.timestamp,
            depth = buffer.len(),
            "gyro sample recorded"
        );
        Some(sample)
    }
}
