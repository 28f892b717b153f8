use thiserror::Error;

/// Errors that can occur when building or querying the LSH index.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LshError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("seed mismatch: expected {expected}, got {got}")]
    SeedMismatch { expected: i64, got: i64 },

    #[error("index is finalized, insertion is no longer permitted")]
    NotBuilding,

    #[error("index is not finalized yet")]
    IndexNotReady,

    #[error("index is already finalized")]
    AlreadyFinalized,

    #[error("threshold must be in (0, 1), got {0}")]
    InvalidThreshold(f64),

    #[error("dimension must be greater than 0")]
    ZeroDimension,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A specialized Result type for LSH index operations.
pub type Result<T> = std::result::Result<T, LshError>;
