//! 融合层配置契约
//!
//! Loaded by `config_loader`, consumed by `sync_engine` and `ingestion`.
//! Field-level rules are declared with `validator`; cross-field rules
//! (unique camera indices, parseable bind address) live in `config_loader`.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{CameraId, Transform3};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FusionConfig {
    /// 配置版本
    #[serde(default = "default_version")]
    pub version: String,

    /// Camera-name prefix; camera `i` is published as `<table_name><i>`
    #[validate(length(min = 1, message = "table_name must not be empty"))]
    pub table_name: String,

    #[serde(default)]
    #[validate(nested)]
    pub transport: TransportConfig,

    #[serde(default)]
    #[validate(nested)]
    pub gyro: GyroConfig,

    #[validate(length(min = 1, message = "at least one camera is required"))]
    pub cameras: Vec<CameraConfig>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl FusionConfig {
    /// Wire identity of camera `index`.
    pub fn camera_id(&self, index: u32) -> CameraId {
        CameraId::for_camera(&self.table_name, index)
    }

    pub fn camera(&self, index: u32) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.index == index)
    }
}

/// Wire encoding used to receive vision results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Polled numeric array on a publish/subscribe table
    Table,
    /// Raw big-endian UDP datagrams
    BinaryUdp,
    /// JSON UDP datagrams
    #[default]
    JsonUdp,
}

impl TransportKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::BinaryUdp => "binary_udp",
            Self::JsonUdp => "json_udp",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 丢包策略 (背压满时)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// 丢弃最旧的包
    #[default]
    DropOldest,
    /// 丢弃最新的包
    DropNewest,
}

/// Network / table transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,

    /// UDP bind address (ignored for `table`)
    #[validate(length(min = 1))]
    pub bind_addr: String,

    /// Receive timeout so the listener can observe its stop flag
    #[validate(range(min = 1))]
    pub read_timeout_ms: u64,

    /// Table polling period
    #[validate(range(min = 1))]
    pub poll_period_ms: u64,

    /// Bounded channel between listener and decoder
    #[validate(range(min = 1))]
    pub channel_capacity: usize,

    pub drop_policy: DropPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            bind_addr: "0.0.0.0:5800".to_string(),
            read_timeout_ms: 100,
            poll_period_ms: 20,
            channel_capacity: 64,
            drop_policy: DropPolicy::default(),
        }
    }
}

/// Gyro history configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GyroConfig {
    /// Samples kept per camera
    #[validate(range(min = 2, message = "gyro capacity must be >= 2"))]
    pub capacity: usize,

    /// Strobe polling period in microseconds
    #[validate(range(min = 1))]
    pub sample_period_us: u64,
}

impl Default for GyroConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            sample_period_us: 1000,
        }
    }
}

/// Per-camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub index: u32,

    /// Camera exposure drives a strobe line sampled by the robot
    #[serde(default)]
    pub strobe_enabled: bool,

    /// Camera-to-robot-center mounting transform
    #[serde(default)]
    pub camera_to_center: Option<Transform3>,
}

impl CameraConfig {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            strobe_enabled: false,
            camera_to_center: None,
        }
    }
}
