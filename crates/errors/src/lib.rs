#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for devlease
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone for easier handling across the
//! injection pipeline.

use thiserror::Error;

pub mod config;
pub mod inject;
pub mod pool;

// Re-export all error types at the root
pub use config::ConfigError;
pub use inject::InjectError;
pub use pool::PoolError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("inject error: {0}")]
    Inject(#[from] InjectError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an internal error from any displayable value
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
