//! Ranked store error types.

use thiserror::Error;

/// Ranked store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Redis connection or command error.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Result type for ranked store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
