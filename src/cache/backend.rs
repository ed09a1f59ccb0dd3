//! Capability-set trait shared by the in-process and shared Response Cache backends (spec §4.2,
//! §9 "Polymorphism over cache/ratings backends"), grounded in the pack's `CacheBackend` /
//! `L2CacheBackend` trait designs.

// std
use std::collections::HashMap;
// crates.io
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// Wall-clock-addressable representation of a cache payload, suitable for cross-process transport.
///
/// The in-process backend stores this directly; the shared (Redis) backend serialises it as JSON.
/// Monotonic [`Instant`]s are not portable across processes, so freshness is expressed as absolute
/// UTC timestamps here and converted back to `Instant`-relative terms by
/// [`crate::cache::manager::ResponseCache`] at the point of use.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredEntry {
	/// Response bytes (empty for negative entries).
	pub payload: Vec<u8>,
	/// SHA-256 digest of `payload`.
	pub digest: [u8; 32],
	/// Entry kind (spec §3).
	pub kind: StoredEntryKind,
	/// UTC instant after which the entry is stale but within grace.
	pub fresh_until: DateTime<Utc>,
	/// UTC instant after which the entry must be discarded.
	pub stale_until: DateTime<Utc>,
}

/// Entry kind (spec §3 `CachedEntry.source kind`): a genuine payload, or a negative-cached typed
/// failure recorded to prevent thundering herds (spec §4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredEntryKind {
	/// A genuine upstream payload.
	Ok,
	/// Negative-cached "not found" outcome.
	NegativeNotFound,
	/// Negative-cached "unauthorized" outcome.
	NegativeAuth,
}

/// Point-in-time statistics for a backend (spec §4.2 `stats()`).
///
/// `evictions` is `None` for backends (e.g. a remote store) that do not expose it; callers treat
/// that as "unknown" rather than zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct BackendStats {
	/// Total lookups that found a usable entry.
	pub hits: u64,
	/// Total lookups that found nothing usable.
	pub misses: u64,
	/// Entries removed due to capacity pressure, if tracked.
	pub evictions: Option<u64>,
	/// Current number of resident entries, if known.
	pub size: usize,
}

/// Capability set implemented by every Response Cache backend.
#[async_trait]
pub trait CacheBackend: Send + Sync {
	/// Fetch a single entry by key.
	async fn get(&self, key: &str) -> Result<Option<StoredEntry>>;

	/// Store a single entry.
	async fn set(&self, key: &str, entry: StoredEntry) -> Result<()>;

	/// Fetch several entries at once.
	async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, StoredEntry>>;

	/// Store several entries at once.
	async fn set_batch(&self, entries: Vec<(String, StoredEntry)>) -> Result<()>;

	/// Remove every key matching `prefix`, returning the number removed.
	async fn remove_prefix(&self, prefix: &str) -> Result<usize>;

	/// Current aggregate statistics.
	async fn stats(&self) -> BackendStats;

	/// Remove a single key, if present.
	async fn destroy(&self, key: &str) -> Result<()>;
}
