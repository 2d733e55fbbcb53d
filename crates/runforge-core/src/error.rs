// crates/runforge-core/src/error.rs
// ============================================================================
// Module: Runforge Core Errors
// Description: Closed error taxonomy shared by every layer of Runforge.
// Purpose: Give the registry, workflow engine, and HTTP boundary one error
//          type to map to status codes / exit codes rather than inventing
//          their own per layer.
// Dependencies: thiserror, crate::validation::FieldErrors
// ============================================================================

//! ## Overview
//! `CoreError` is the single error enum threaded through Runforge. Each
//! variant corresponds to one row of the error taxonomy table in the
//! design: validation, not-found, path containment, forbidden/unauthorized,
//! signature/expiry, and a catch-all internal kind.

use crate::validation::FieldErrors;

/// Closed error taxonomy for Runforge's core and registry layers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Intake validation failed; carries a field → message map.
    #[error("validation failed")]
    Validation(FieldErrors),

    /// A lookup by run id (or artifact path) found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A resolved path would escape its run directory, or is otherwise malformed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The caller's scopes or tenant do not permit the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The caller presented no credential, or an invalid one.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A signed URL's signature did not verify under any current key.
    #[error("signature invalid")]
    SignatureInvalid,

    /// A signed URL's expiry timestamp has passed.
    #[error("signed url expired")]
    Expired,

    /// An unexpected, non-domain failure (I/O, (de)serialization, etc).
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Builds a [`CoreError::Validation`] from a single field/message pair.
    #[must_use]
    pub fn single_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), message.into());
        Self::Validation(errors)
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
