//! Error types for Tonewire core.

use thiserror::Error;

use crate::notify::EndpointKey;

/// Core error type.
///
/// Daemon silence is never reported through this type; only requests that
/// name something the registry does not hold.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(EndpointKey),

    #[error("Endpoint is not bound to a node: {0}")]
    EndpointUnbound(EndpointKey),
}

/// Result type alias for Tonewire core operations.
pub type Result<T> = std::result::Result<T, Error>;
