//! Small in-process LRU+TTL cache for user configuration, with stampede protection (spec §4.3).

// std
use std::{collections::HashMap, sync::Arc};
// crates.io
use lru::LruCache;
use tokio::sync::Mutex as AsyncMutex;
// self
use crate::{
	_prelude::*,
	collaborators::{UserConfig, UserConfigStore},
};

/// Default capacity (spec §4.3: ~1000 entries).
pub const DEFAULT_CAPACITY: usize = 1_000;
/// Default TTL (spec §4.3: 5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct Slot {
	config: Option<UserConfig>,
	inserted_at: Instant,
}

/// LRU+TTL cache fronting a [`UserConfigStore`], coalescing concurrent lookups for the same user
/// onto a single producer call.
pub struct ConfigCache {
	store: Arc<dyn UserConfigStore>,
	entries: AsyncMutex<LruCache<String, Slot>>,
	in_flight: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
	ttl: Duration,
}
impl ConfigCache {
	/// Construct a cache in front of `store` with the given capacity and TTL.
	pub fn new(store: Arc<dyn UserConfigStore>, capacity: usize, ttl: Duration) -> Self {
		Self {
			store,
			entries: AsyncMutex::new(LruCache::new(
				std::num::NonZeroUsize::new(capacity.max(1)).expect("capacity is non-zero"),
			)),
			in_flight: std::sync::Mutex::new(HashMap::new()),
			ttl,
		}
	}

	/// Construct a cache with spec-default capacity and TTL.
	pub fn with_defaults(store: Arc<dyn UserConfigStore>) -> Self {
		Self::new(store, DEFAULT_CAPACITY, DEFAULT_TTL)
	}

	/// Fetch configuration for `user_id`, reading through to the backing store on miss.
	pub async fn get(&self, user_id: &str) -> Result<Option<UserConfig>> {
		{
			let mut entries = self.entries.lock().await;

			if let Some(slot) = entries.get(user_id)
				&& slot.inserted_at.elapsed() < self.ttl
			{
				return Ok(slot.config.clone());
			}
		}

		let leader = {
			let mut in_flight = self.in_flight.lock().expect("lock poisoned");

			in_flight.entry(user_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
		};

		let _guard = leader.lock().await;

		{
			let mut entries = self.entries.lock().await;

			if let Some(slot) = entries.get(user_id)
				&& slot.inserted_at.elapsed() < self.ttl
			{
				self.cleanup_leader(user_id, &leader);

				return Ok(slot.config.clone());
			}
		}

		let config = self.store.get_user_config(user_id).await?;

		{
			let mut entries = self.entries.lock().await;

			entries.put(user_id.to_string(), Slot { config: config.clone(), inserted_at: Instant::now() });
		}

		self.cleanup_leader(user_id, &leader);

		Ok(config)
	}

	/// Explicitly invalidate a user's cached configuration (e.g. on a write path).
	pub async fn invalidate(&self, user_id: &str) {
		let mut entries = self.entries.lock().await;

		entries.pop(user_id);
	}

	fn cleanup_leader(&self, user_id: &str, leader: &Arc<AsyncMutex<()>>) {
		let mut in_flight = self.in_flight.lock().expect("lock poisoned");

		if let Some(current) = in_flight.get(user_id)
			&& Arc::ptr_eq(current, leader)
			&& Arc::strong_count(current) <= 2
		{
			in_flight.remove(user_id);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::collaborators::InMemoryUserConfigStore;

	#[tokio::test]
	async fn caches_hits_until_ttl_expires() {
		let backing = Arc::new(InMemoryUserConfigStore::new());

		backing.insert("user-1", UserConfig {
			catalogs: vec!["top250".into()],
			display_language: "en-US".into(),
			cross_reference_hints: HashMap::new(),
			shuffle_enabled: false,
			poster_overrides: HashMap::new(),
			excluded_categories: Vec::new(),
		});

		let cache = ConfigCache::new(backing, 10, Duration::from_millis(20));

		let first = cache.get("user-1").await.unwrap();
		assert!(first.is_some());

		tokio::time::sleep(Duration::from_millis(30)).await;

		let second = cache.get("user-1").await.unwrap();
		assert!(second.is_some());
	}

	#[tokio::test]
	async fn missing_user_returns_none() {
		let backing = Arc::new(InMemoryUserConfigStore::new());
		let cache = ConfigCache::with_defaults(backing);

		assert!(cache.get("unknown").await.unwrap().is_none());
	}
}
