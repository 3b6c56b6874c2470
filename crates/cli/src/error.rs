//! Error types for CLI operations.

use contracts::TransportKind;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Transport kind the binary cannot drive on its own
    #[error("Transport '{kind}' is not supported by `run`: {message}")]
    UnsupportedTransport {
        kind: TransportKind,
        message: String,
    },

    /// Vision transport could not be started
    #[error("Failed to start vision transport: {0}")]
    Transport(#[from] ingestion::IngestionError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn unsupported_transport(kind: TransportKind, message: impl Into<String>) -> Self {
        Self::UnsupportedTransport {
            kind,
            message: message.into(),
        }
    }
}
