// crates/runforge-core/src/ids.rs
// ============================================================================
// Module: Runforge Identifiers
// Description: Canonical opaque identifiers for runs and tenant slugs.
// Purpose: Provide strongly typed, serializable identifiers with stable
//          wire forms and the one normalization algorithm slugs share.
// Dependencies: serde, rand (dev-only via workflow crate, not here)
// ============================================================================

//! ## Overview
//! `RunId` and `Slug` are opaque string newtypes. `RunId` is generated once
//! at intake and never mutated; `Slug` is derived from caller-supplied
//! organization names through [`Slug::normalize`].

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Run identifier of the form `RUN-<12 uppercase hex>`.
///
/// # Invariants
/// - Immutable once assigned to a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Prefix every run identifier carries.
    pub const PREFIX: &'static str = "RUN-";

    /// Builds a `RunId` from 12 hex bytes, formatting as uppercase hex.
    #[must_use]
    pub fn from_hex_bytes(bytes: [u8; 6]) -> Self {
        let mut hex = String::with_capacity(12);
        for byte in bytes {
            hex.push_str(&format!("{byte:02X}"));
        }
        Self(format!("{}{hex}", Self::PREFIX))
    }

    /// Wraps an already-formatted run id string without validation.
    ///
    /// Used when reading an id back from disk; callers that construct new
    /// ids should prefer [`RunId::from_hex_bytes`].
    #[must_use]
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the run id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RunId> for String {
    fn from(value: RunId) -> Self {
        value.0
    }
}

/// A normalized, kebab-case organization slug.
///
/// # Invariants
/// - Matches `^[a-z0-9]+(?:-[a-z0-9]+)*$` or is exactly `"default"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Default slug used when normalization yields an empty string.
    pub const DEFAULT: &'static str = "default";

    /// Normalizes `raw` per the intake rules: lowercase, `_` → `-`,
    /// non-alphanumerics collapsed to `-`, then hyphen runs collapsed and
    /// trimmed. Empty results fall back to `"default"`.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let lowered = raw.to_lowercase().replace('_', "-");
        let mut collapsed = String::with_capacity(lowered.len());
        let mut last_was_hyphen = false;
        for ch in lowered.chars() {
            let is_alnum = ch.is_ascii_alphanumeric();
            if is_alnum {
                collapsed.push(ch);
                last_was_hyphen = false;
            } else if !last_was_hyphen {
                collapsed.push('-');
                last_was_hyphen = true;
            }
        }
        let trimmed = collapsed.trim_matches('-');
        if trimmed.is_empty() {
            Self(Self::DEFAULT.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Wraps an already-normalized slug string without re-normalizing.
    ///
    /// Used when reading a slug back from disk/index entries that were
    /// already validated at write time.
    #[must_use]
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
