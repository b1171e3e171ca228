//! Request injection error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum InjectError {
    #[error("unknown user: {user}")]
    UnknownUser { user: String },

    #[error("invalid create request: {message}")]
    InvalidRequest { message: String },
}
