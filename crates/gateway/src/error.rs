//! Gateway error types.

use thiserror::Error;

/// Gateway error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Ranked store call failed.
    #[error("store error: {0}")]
    Store(#[from] ranked_store::StoreError),

    /// Outbound queue closed; the connection is gone.
    #[error("channel send error")]
    ChannelSend,
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
