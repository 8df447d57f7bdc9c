//! Client error types.

use crate::transport::TransportError;
use thiserror::Error;

/// Errors from client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client has not been started, or was already stopped.
    #[error("client is not running")]
    NotRunning,

    /// The underlying connection failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
