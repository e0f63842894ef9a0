//! PipeWire error types.

use thiserror::Error;

/// PipeWire error type.
#[derive(Debug, Error)]
pub enum PwError {
    #[error("PipeWire connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("MainLoop error: {0}")]
    MainLoopError(String),

    #[error("Metadata not available: {0}")]
    MetadataUnavailable(String),

    #[error("Volume control failed: {0}")]
    VolumeControlFailed(String),
}

/// Result type for PipeWire operations.
pub type PwResult<T> = Result<T, PwError>;
