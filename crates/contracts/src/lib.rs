//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the vision fusion layer.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - All timestamps are microseconds (`i64`) of the robot's monotonic clock
//! - Camera-side times are translated into this domain at decode time
//! - `update_seq` is the per-camera ordering key, never the timestamp

mod camera_id;
mod config;
mod error;
mod frame;
mod gyro;
mod pose;
mod sink;
mod transport;

pub use camera_id::CameraId;
pub use config::*;
pub use error::*;
pub use frame::*;
pub use gyro::GyroSample;
pub use pose::*;
pub use sink::{DatagramTransport, FrameSink, LocalDatagramTransport, UpdateOutcome};
pub use transport::*;
