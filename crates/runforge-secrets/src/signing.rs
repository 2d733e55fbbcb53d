// crates/runforge-secrets/src/signing.rs
// ============================================================================
// Module: Runforge URL Signing
// Description: HMAC-SHA256 signed-URL issuance and verification.
// Purpose: Let the server hand out time-boxed download links without a
//          database-backed token store.
// Dependencies: hmac, sha2, subtle
// ============================================================================

//! ## Overview
//! Per spec.md §4.7: `signature = HMAC-SHA256(key, "<run_id>:<org_slug>:<path>:<expires>")`,
//! rendered as lowercase hex. Verification tries every key currently in the
//! ring (primary first, then previous keys) so key rotation never breaks a
//! link issued moments before the rotation. Tenant slug, expiry, signature,
//! and path containment are independent checks — callers combine them.

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::SigningError;

type HmacSha256 = Hmac<Sha256>;

/// The active signing key and the full verification ring, primary first.
/// `all_keys` always contains `primary` as its first element when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningKeySet {
    /// The key used to sign new URLs. `None` disables signing entirely.
    pub primary: Option<String>,
    /// Every key accepted for verification, primary first, deduplicated.
    pub all_keys: Vec<String>,
}

impl SigningKeySet {
    fn verification_keys(&self) -> impl Iterator<Item = &str> {
        self.all_keys.iter().map(String::as_str)
    }
}

/// Builds the canonical message signed over: `run_id:org_slug:path:expires`.
fn canonical_message(run_id: &str, org_slug: &str, path: &str, expires_at: i64) -> String {
    format!("{run_id}:{org_slug}:{path}:{expires_at}")
}

fn hex_hmac(key: &str, message: &str) -> Result<String, SigningError> {
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        return Err(SigningError::InvalidKey);
    };
    mac.update(message.as_bytes());
    let bytes = mac.finalize().into_bytes();
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        hex.push_str(&format!("{byte:02x}"));
    }
    Ok(hex)
}

/// Signs `path` for `run_id`/`org_slug`, expiring at `expires_at` (unix
/// seconds), using the key set's primary key.
///
/// # Errors
/// Returns [`SigningError::NoSigningKey`] if no primary key is configured, or
/// [`SigningError::InvalidKey`] if the configured key cannot be used as an
/// HMAC key.
pub fn sign(
    keys: &SigningKeySet,
    run_id: &str,
    org_slug: &str,
    path: &str,
    expires_at: i64,
) -> Result<String, SigningError> {
    let key = keys.primary.as_deref().ok_or(SigningError::NoSigningKey)?;
    let message = canonical_message(run_id, org_slug, path, expires_at);
    hex_hmac(key, &message)
}

/// Verifies `signature` against every key in the ring using a
/// constant-time comparison. Does not check expiry or path containment —
/// callers check those independently alongside this.
#[must_use]
pub fn verify(keys: &SigningKeySet, run_id: &str, org_slug: &str, path: &str, expires_at: i64, signature: &str) -> bool {
    let message = canonical_message(run_id, org_slug, path, expires_at);
    keys.verification_keys().any(|key| {
        let Ok(expected) = hex_hmac(key, &message) else {
            return false;
        };
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    })
}
