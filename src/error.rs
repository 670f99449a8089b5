//! Error taxonomy for the floorplan kernel.
//!
//! Every failure surfaces to the caller with a machine-readable kind and a
//! human message. Nothing is swallowed inside the engine: a failure in any
//! reconciliation phase aborts the enclosing store transaction, so no partial
//! graph is ever considered saved.

use crate::store::StoreError;

/// Kernel-level error returned by all public operations.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// Malformed input: missing ids, bad matrix shape, non-positive dimensions.
    #[error("validation: {0}")]
    Validation(String),

    /// Missing project, version or share token.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller is not the owner of the targeted project.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A wall or article references a client id absent from the resolved set.
    #[error("referential integrity: {entity} references unresolved client id {reference:?}")]
    ReferentialIntegrity {
        /// Client id of the referencing entity.
        entity: String,
        /// The client-space reference that failed to resolve.
        reference: String,
    },

    /// Duplicate client id within one desired graph for the same kind.
    #[error("conflict: duplicate client id {0:?} in desired graph")]
    Conflict(String),

    /// Persistence collaborator failure. Not retried here; retry policy is
    /// the caller's responsibility.
    #[error("persistence: {0}")]
    Persistence(#[from] StoreError),

    /// Share token past its expiry instant.
    #[error("share token expired")]
    Expired,

    /// Share token revoked by the owner.
    #[error("share token revoked")]
    Revoked,

    /// Share token view budget exhausted.
    #[error("share token view limit reached")]
    ViewLimit,
}

impl KernelError {
    /// Machine-readable error kind for structured responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found_error",
            Self::Forbidden(_) => "forbidden_error",
            Self::ReferentialIntegrity { .. } => "referential_integrity_error",
            Self::Conflict(_) => "conflict_error",
            Self::Persistence(_) => "persistence_error",
            Self::Expired => "expired_error",
            Self::Revoked => "revoked_error",
            Self::ViewLimit => "view_limit_error",
        }
    }

    /// Build a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build a forbidden error.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Build a referential-integrity error.
    pub fn unresolved(entity: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::ReferentialIntegrity {
            entity: entity.into(),
            reference: reference.into(),
        }
    }
}
