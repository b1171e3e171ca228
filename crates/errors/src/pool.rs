//! Device pool error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PoolError {
    #[error("device discovery failed for {path}: {message}")]
    Discovery { path: String, message: String },

    #[error("invalid device name pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("insufficient devices: requested {requested}, available {available}")]
    InsufficientResources { requested: usize, available: usize },

    #[error("pool consistency violation: {message}")]
    InternalConsistency { message: String },
}

impl PoolError {
    /// True when the caller may simply retry later (resource scarcity),
    /// as opposed to a defect in the pool itself.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InsufficientResources { .. })
    }
}
