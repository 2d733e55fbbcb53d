// crates/runforge-secrets/src/lib.rs
// ============================================================================
// Module: Runforge Secrets Library
// Description: Public API surface for token registry loading and URL signing.
// Purpose: Expose the hot-reloading secrets manager and signed-URL helpers
//          to the server crate.
// Dependencies: crate::{error, manager, signing, tokens}
// ============================================================================

//! ## Overview
//! Runforge secrets covers two concerns the server boundary needs: who a
//! bearer token is ([`tokens::TokenRegistryEntry`], composed by
//! [`manager::SecretsManager`]) and how a download link is signed and
//! checked ([`signing::sign`]/[`signing::verify`]). Both hot-reload from
//! disk so operators can rotate credentials without a restart.

pub mod error;
pub mod manager;
pub mod signing;
pub mod tokens;

pub use error::SigningError;
pub use manager::SecretsManager;
pub use manager::SecretsManagerConfig;
pub use manager::TokenFileDefaults;
pub use signing::sign;
pub use signing::verify;
pub use signing::SigningKeySet;
pub use tokens::load_token_registry;
pub use tokens::normalize_registry_entry;
pub use tokens::scopes_for_role;
pub use tokens::TokenRegistryEntry;

/// All scopes granted when no token registry is configured at all
/// ("single-tenant dev mode" per spec.md §4.7).
pub const DEFAULT_OPEN_SCOPES: &[&str] = &["runs:create", "runs:read", "runs:events", "runs:read:all"];
