//! Engine-level error types.

use thiserror::Error;

use crate::stores::StoreError;

/// Errors produced by the campaign engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is invalid for the entity's current state.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The caller is not allowed to touch this entity.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A concurrent change beat this operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The campaign's request budget is exhausted.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Typed failure from the messaging provider.
    #[error(transparent)]
    Provider(#[from] provider::ProviderError),

    /// Transient failure worth retrying as-is.
    #[error("transient: {0}")]
    Transient(String),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// The provider error inside, if that's what this is.
    pub fn as_provider(&self) -> Option<&provider::ProviderError> {
        match self {
            Self::Provider(err) => Some(err),
            _ => None,
        }
    }
}
