//! Configuration error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    FileRead { path: String, message: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("invalid config: {message}")]
    Invalid { message: String },
}
