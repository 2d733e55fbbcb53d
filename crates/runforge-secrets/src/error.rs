// crates/runforge-secrets/src/error.rs
// ============================================================================
// Module: Runforge Secrets Errors
// Description: Error type for URL signing.
// Purpose: Distinguish "signing unavailable" from a successful signature.
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

/// Errors raised while signing a download URL.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    /// No primary signing key is configured, so new URLs cannot be signed.
    #[error("no signing key is configured")]
    NoSigningKey,

    /// The configured key could not be turned into an HMAC instance.
    #[error("signing key is invalid")]
    InvalidKey,
}
