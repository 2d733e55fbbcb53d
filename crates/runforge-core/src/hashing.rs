// crates/runforge-core/src/hashing.rs
// ============================================================================
// Module: Runforge Hashing
// Description: Content hashing for artifact manifests and canonical payloads.
// Purpose: Provide a single, stable hash representation shared by the
//          artifact manifest builder, the audit log, and signed URLs.
// Dependencies: sha2, serde_jcs, serde
// ============================================================================

//! ## Overview
//! Runforge hashes bytes with SHA-256 and serializes digests as lowercase
//! hex. Canonical JSON hashing (used when a stable hash of a JSON value is
//! needed rather than of raw file bytes) goes through RFC 8785 JSON
//! Canonicalization via `serde_jcs` before hashing, so key order never
//! affects the result.

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::error::CoreError;

/// Hash algorithms recognized by Runforge artifact records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256, the only algorithm Runforge currently produces.
    Sha256,
}

/// A hash digest, serialized as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashDigest(String);

impl HashDigest {
    /// Returns the digest as a lowercase hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HashDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hashes raw bytes with SHA-256, returning a lowercase hex digest.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> HashDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    HashDigest(hex_lower(&hasher.finalize()))
}

/// Canonicalizes `value` per RFC 8785 and hashes the resulting bytes.
///
/// # Errors
/// Returns [`CoreError::Internal`] if `value` cannot be canonicalized
/// (non-finite floats, for example).
pub fn hash_canonical_json<T: Serialize>(value: &T) -> Result<HashDigest, CoreError> {
    let canonical =
        serde_jcs::to_string(value).map_err(|err| CoreError::Internal(err.to_string()))?;
    Ok(hash_bytes(canonical.as_bytes()))
}

/// Formats bytes as lowercase hex without pulling in a dedicated crate.
fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::hash_bytes;
    use super::hash_canonical_json;
    use serde_json::json;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_bytes(b"hello world"), hash_bytes(b"hello world"));
    }

    #[test]
    fn canonical_json_hash_ignores_key_order() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(
            hash_canonical_json(&a).unwrap(),
            hash_canonical_json(&b).unwrap()
        );
    }
}
