//! Capability-set trait shared by the in-process and shared Ratings Engine snapshot stores (spec
//! §4.4 "MEMORY"/"SHARED" variants, §9 "Polymorphism over cache/ratings backends"), mirroring
//! [`crate::cache::backend::CacheBackend`].

// crates.io
use async_trait::async_trait;
// self
use crate::{_prelude::*, ratings::store::RatingsSnapshot};

/// Capability set implemented by every Ratings Engine snapshot store.
///
/// [`RatingsEngine`](crate::ratings::engine::RatingsEngine) always keeps the live snapshot
/// in-process for lock-free lookups; this trait governs how a freshly-ingested snapshot is
/// published for other instances to pick up, and how a newly-started instance can adopt an
/// already-live snapshot instead of serving misses until its own first ingest completes.
#[async_trait]
pub trait RatingsStore: Send + Sync {
	/// Publish a freshly-ingested snapshot, replacing whatever was previously shared.
	async fn publish(&self, snapshot: &RatingsSnapshot) -> Result<()>;

	/// Load the most recently published snapshot, if any instance has ever published one.
	async fn load(&self) -> Result<Option<RatingsSnapshot>>;
}
