//! Trait seams for external systems explicitly out of scope for this crate (spec §1 non-goals):
//! the configuration store, the credential-encryption layer, and the session/auth surface.
//!
//! The core depends only on these narrow contracts, never on a concrete storage backend, mirroring
//! the way the upstream registry depends on `IdentityProviderRegistration` rather than a specific
//! identity provider implementation.

// std
use std::collections::HashMap;
// crates.io
use async_trait::async_trait;
// self
use crate::_prelude::*;

/// A user's catalog configuration, owned and persisted by an external configuration store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserConfig {
	/// Catalog identifiers the user has configured, in display order.
	pub catalogs: Vec<String>,
	/// Preferred display language (BCP-47-ish code).
	pub display_language: String,
	/// Per-user cross-reference hints, opaque to the core.
	pub cross_reference_hints: HashMap<String, String>,
	/// Whether the user opted into shuffled catalog ordering.
	pub shuffle_enabled: bool,
	/// Per-catalog poster-service overrides: `None` defers to the global default.
	pub poster_overrides: HashMap<String, bool>,
	/// Category identifiers excluded from catalog responses.
	pub excluded_categories: Vec<String>,
}

/// Read-only accessor for user configuration, backed by an external configuration store.
///
/// The core never persists `UserConfig`; it only reads through this trait, typically via
/// [`crate::config_cache::ConfigCache`].
#[async_trait]
pub trait UserConfigStore: Send + Sync + 'static {
	/// Fetch configuration for the given user, or `None` if the user is unknown.
	async fn get_user_config(&self, user_id: &str) -> Result<Option<UserConfig>>;
}

/// Collaborator responsible for encrypting/decrypting credentials at rest.
///
/// The core never implements encryption; it validates that a key of the correct shape was
/// supplied at startup (see [`crate::config::Config::validate`]) and otherwise treats this as an
/// opaque external concern.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
	/// Decrypt a credential blob previously sealed by the external encryption layer.
	async fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>>;
}

/// Collaborator responsible for validating a caller's session token.
#[async_trait]
pub trait SessionValidator: Send + Sync + 'static {
	/// Validate the given session token, returning the authenticated user id.
	async fn validate(&self, token: &str) -> Result<String>;
}

/// Collaborator tracking revoked session tokens (spec §3 `RevokedTokenSet`).
///
/// Implementations must cap cardinality at 10 000 entries with oldest-first eviction; the core
/// only ever queries membership.
#[async_trait]
pub trait RevocationStore: Send + Sync + 'static {
	/// Whether the given token has been revoked.
	async fn is_revoked(&self, token: &str) -> Result<bool>;
}

/// In-memory [`UserConfigStore`] used by tests and local development only.
#[derive(Debug, Default)]
pub struct InMemoryUserConfigStore {
	entries: std::sync::RwLock<HashMap<String, UserConfig>>,
}
impl InMemoryUserConfigStore {
	/// Construct an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace a user's configuration.
	pub fn insert(&self, user_id: impl Into<String>, config: UserConfig) {
		self.entries.write().expect("lock poisoned").insert(user_id.into(), config);
	}
}
#[async_trait]
impl UserConfigStore for InMemoryUserConfigStore {
	async fn get_user_config(&self, user_id: &str) -> Result<Option<UserConfig>> {
		Ok(self.entries.read().expect("lock poisoned").get(user_id).cloned())
	}
}

/// In-memory [`RevocationStore`] used by tests and local development only.
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
	revoked: std::sync::RwLock<std::collections::HashSet<String>>,
}
impl InMemoryRevocationStore {
	/// Construct an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Mark a token as revoked.
	pub fn revoke(&self, token: impl Into<String>) {
		self.revoked.write().expect("lock poisoned").insert(token.into());
	}
}
#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
	async fn is_revoked(&self, token: &str) -> Result<bool> {
		Ok(self.revoked.read().expect("lock poisoned").contains(token))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn in_memory_user_config_store_round_trips() {
		let store = InMemoryUserConfigStore::new();
		let config = UserConfig {
			catalogs: vec!["top250".into()],
			display_language: "en-US".into(),
			cross_reference_hints: HashMap::new(),
			shuffle_enabled: false,
			poster_overrides: HashMap::new(),
			excluded_categories: Vec::new(),
		};

		store.insert("user-1", config.clone());

		assert_eq!(store.get_user_config("user-1").await.unwrap(), Some(config));
		assert_eq!(store.get_user_config("unknown").await.unwrap(), None);
	}

	#[tokio::test]
	async fn in_memory_revocation_store_tracks_revoked_tokens() {
		let store = InMemoryRevocationStore::new();

		assert!(!store.is_revoked("token-a").await.unwrap());

		store.revoke("token-a");

		assert!(store.is_revoked("token-a").await.unwrap());
	}
}
