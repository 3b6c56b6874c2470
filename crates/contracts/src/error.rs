//! Layered error definitions
//!
//! Categorized by source: config / transport / io

use thiserror::Error;

/// Unified error type for configuration and resource acquisition
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Transport Errors =====
    /// Socket or table could not be acquired at startup
    #[error("transport unavailable for camera {camera_index}: {message}")]
    TransportUnavailable { camera_index: u32, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport acquisition error
    pub fn transport_unavailable(camera_index: u32, message: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            camera_index,
            message: message.into(),
        }
    }
}
