//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
///
/// 解码错误只在解码器与缓存之间传递，不会越过 pipeline。
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 结构非法或被截断的线上数据
    #[error("malformed frame for camera {camera}: {message}")]
    MalformedFrame {
        /// 相机索引
        camera: u32,
        /// 错误消息
        message: String,
    },

    /// 帧内身份标识与相机名不符 (必须恰好出现一次且位于开头)
    #[error("identity mismatch for camera {camera}: expected '{expected}' once at frame start, found {occurrences}")]
    IdentityMismatch {
        camera: u32,
        expected: String,
        occurrences: usize,
    },

    /// update 序号未增长
    #[error("stale update for camera {camera}: {update} <= {last}")]
    StaleUpdate { camera: u32, update: u64, last: u64 },

    /// 启动时无法获取 socket / 表
    #[error("transport unavailable for camera {camera}: {message}")]
    TransportUnavailable { camera: u32, message: String },

    /// 通道已关闭
    #[error("channel closed for camera {camera}")]
    ChannelClosed { camera: u32 },
}

impl IngestionError {
    pub fn malformed(camera: u32, message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            camera,
            message: message.into(),
        }
    }

    pub fn identity_mismatch(camera: u32, expected: impl Into<String>, occurrences: usize) -> Self {
        Self::IdentityMismatch {
            camera,
            expected: expected.into(),
            occurrences,
        }
    }

    pub fn transport_unavailable(camera: u32, message: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            camera,
            message: message.into(),
        }
    }

    /// Metrics label
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MalformedFrame { .. } => "malformed",
            Self::IdentityMismatch { .. } => "identity_mismatch",
            Self::StaleUpdate { .. } => "stale",
            Self::TransportUnavailable { .. } => "transport_unavailable",
            Self::ChannelClosed { .. } => "channel_closed",
        }
    }
}

impl From<IngestionError> for contracts::ContractError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::TransportUnavailable { camera, message } => {
                contracts::ContractError::transport_unavailable(camera, message)
            }
            other => contracts::ContractError::Other(other.to_string()),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
