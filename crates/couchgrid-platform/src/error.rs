//! Error types for platform operations.

use thiserror::Error;

use crate::object::ResourceKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("cannot reach orchestration API: {0}")]
    Connect(String),

    #[error("{kind} {name} not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("{kind} {name} already exists")]
    Conflict { kind: ResourceKind, name: String },

    #[error("{kind} is not supported by this platform: {detail}")]
    Unsupported { kind: ResourceKind, detail: String },

    #[error("{kind} {name}: API error {code}: {message}")]
    Api {
        kind: ResourceKind,
        name: String,
        code: u16,
        message: String,
    },

    #[error("invalid {kind} object: {reason}")]
    Invalid { kind: ResourceKind, reason: String },
}

impl PlatformError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound { .. })
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;
