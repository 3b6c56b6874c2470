//! Narrow collaborator interfaces
//!
//! Clock, strobe line, gyro and publish/subscribe table are consumed through
//! these traits so every component can be driven by fakes in tests.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Opaque monotonic microsecond counter
pub trait Clock: Send + Sync {
    fn now_micros(&self) -> i64;
}

/// Monotonic clock anchored at construction
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_micros()).unwrap_or(i64::MAX)
    }
}

/// Hand-driven clock for tests and replay
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_us: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_us)),
        }
    }

    pub fn set(&self, us: i64) {
        self.now.store(us, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_us: i64) -> i64 {
        self.now.fetch_add(delta_us, Ordering::SeqCst) + delta_us
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Digital input pulsed by the camera at exposure
pub trait StrobeInput: Send + Sync {
    fn is_asserted(&self) -> bool;
}

impl StrobeInput for AtomicBool {
    fn is_asserted(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl<T: StrobeInput + ?Sized> StrobeInput for Arc<T> {
    fn is_asserted(&self) -> bool {
        (**self).is_asserted()
    }
}

/// Robot yaw in radians
pub trait GyroSource: Send + Sync {
    fn yaw(&self) -> f64;
}

impl<F> GyroSource for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn yaw(&self) -> f64 {
        self()
    }
}

/// Polled publish/subscribe table
///
/// Entries are keyed by camera identity (`<table_name><index>`).
pub trait TableTransport: Send + Sync {
    /// Current numeric array published by the camera, if any.
    fn read_array(&self, camera: &str) -> Option<Vec<f64>>;

    /// Publisher-side update counter for the entry.
    fn update_number(&self, camera: &str) -> i64;

    /// Whether the camera currently reports itself connected.
    fn is_connected(&self, _camera: &str) -> bool {
        true
    }
}

impl<T: TableTransport + ?Sized> TableTransport for Arc<T> {
    fn read_array(&self, camera: &str) -> Option<Vec<f64>> {
        (**self).read_array(camera)
    }

    fn update_number(&self, camera: &str) -> i64 {
        (**self).update_number(camera)
    }

    fn is_connected(&self, camera: &str) -> bool {
        (**self).is_connected(camera)
    }
}
