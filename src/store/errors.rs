//! # Store Errors

use thiserror::Error;

use crate::errors::EngineError;

/// Result type for backend operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store checksum mismatch: expected {expected:08x}, computed {actual:08x}")]
    Corrupted { expected: u32, actual: u32 },

    #[error("Store file malformed: {0}")]
    Malformed(String),

    #[error("Unsupported store format version {0}")]
    UnsupportedVersion(u32),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::unavailable(err.to_string())
    }
}
