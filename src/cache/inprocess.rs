//! Bounded in-process LRU backend (spec §4.2 "IN-PROCESS" variant).

// std
use std::{
	collections::HashMap,
	sync::atomic::{AtomicU64, Ordering},
};
// crates.io
use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
// self
use crate::{
	_prelude::*,
	cache::backend::{BackendStats, CacheBackend, StoredEntry},
};

/// Linked-hash-map-backed LRU store with TTL-aware capacity eviction.
#[derive(Debug)]
pub struct InProcessBackend {
	entries: Mutex<LruCache<String, StoredEntry>>,
	capacity: usize,
	hits: AtomicU64,
	misses: AtomicU64,
	evictions: AtomicU64,
}
impl InProcessBackend {
	/// Construct a backend bounded at `capacity` entries (spec default 50 000).
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.max(1);

		Self {
			entries: Mutex::new(LruCache::unbounded()),
			capacity,
			hits: AtomicU64::new(0),
			misses: AtomicU64::new(0),
			evictions: AtomicU64::new(0),
		}
	}

	async fn evict_to_capacity(&self, entries: &mut LruCache<String, StoredEntry>) {
		let now = Utc::now();
		let expired: Vec<String> = entries
			.iter()
			.filter(|(_, entry)| entry.stale_until <= now)
			.map(|(key, _)| key.clone())
			.collect();

		for key in &expired {
			entries.pop(key);
		}
		self.evictions.fetch_add(expired.len() as u64, Ordering::Relaxed);

		if entries.len() <= self.capacity {
			return;
		}

		// Evict the 10% least-recently-used entries via the cache's own recency order,
		// which `pop_lru` already tracks in O(1) per pop.
		let quota = (self.capacity / 10).max(1);
		let mut evicted = 0u64;

		for _ in 0..quota {
			if entries.pop_lru().is_none() {
				break;
			}
			evicted += 1;
		}
		self.evictions.fetch_add(evicted, Ordering::Relaxed);
	}
}
#[async_trait]
impl CacheBackend for InProcessBackend {
	async fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
		let mut entries = self.entries.lock().await;

		match entries.get(key) {
			Some(entry) => {
				self.hits.fetch_add(1, Ordering::Relaxed);

				Ok(Some(entry.clone()))
			},
			None => {
				self.misses.fetch_add(1, Ordering::Relaxed);

				Ok(None)
			},
		}
	}

	async fn set(&self, key: &str, entry: StoredEntry) -> Result<()> {
		let mut entries = self.entries.lock().await;

		entries.put(key.to_string(), entry);
		self.evict_to_capacity(&mut entries).await;

		Ok(())
	}

	async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, StoredEntry>> {
		let mut entries = self.entries.lock().await;
		let mut result = HashMap::with_capacity(keys.len());

		for key in keys {
			if let Some(entry) = entries.get(key) {
				result.insert(key.clone(), entry.clone());
				self.hits.fetch_add(1, Ordering::Relaxed);
			} else {
				self.misses.fetch_add(1, Ordering::Relaxed);
			}
		}

		Ok(result)
	}

	async fn set_batch(&self, batch: Vec<(String, StoredEntry)>) -> Result<()> {
		let mut entries = self.entries.lock().await;

		for (key, entry) in batch {
			entries.put(key, entry);
		}
		self.evict_to_capacity(&mut entries).await;

		Ok(())
	}

	async fn remove_prefix(&self, prefix: &str) -> Result<usize> {
		let mut entries = self.entries.lock().await;
		let matching: Vec<String> =
			entries.iter().map(|(key, _)| key.clone()).filter(|key| key.starts_with(prefix)).collect();

		for key in &matching {
			entries.pop(key);
		}

		Ok(matching.len())
	}

	async fn stats(&self) -> BackendStats {
		let entries = self.entries.lock().await;

		BackendStats {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			evictions: Some(self.evictions.load(Ordering::Relaxed)),
			size: entries.len(),
		}
	}

	async fn destroy(&self, key: &str) -> Result<()> {
		let mut entries = self.entries.lock().await;

		entries.pop(key);

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::backend::StoredEntryKind;

	fn sample_entry(stale_in: chrono::Duration) -> StoredEntry {
		StoredEntry {
			payload: b"{}".to_vec(),
			digest: [0u8; 32],
			kind: StoredEntryKind::Ok,
			fresh_until: Utc::now() + stale_in,
			stale_until: Utc::now() + stale_in,
		}
	}

	#[tokio::test]
	async fn capacity_eviction_never_panics_and_bounds_size() {
		let backend = InProcessBackend::new(10);

		for i in 0..50 {
			backend
				.set(&format!("key-{i}"), sample_entry(chrono::Duration::seconds(3600)))
				.await
				.unwrap();
		}

		let stats = backend.stats().await;

		assert!(stats.size <= 10, "size {} should respect capacity", stats.size);
	}

	#[tokio::test]
	async fn expired_entries_are_purged_before_lru_eviction() {
		let backend = InProcessBackend::new(10);

		backend.set("expired", sample_entry(chrono::Duration::seconds(-1))).await.unwrap();
		backend.set("fresh", sample_entry(chrono::Duration::seconds(3600))).await.unwrap();

		backend.set("trigger", sample_entry(chrono::Duration::seconds(3600))).await.unwrap();

		assert!(backend.get("expired").await.unwrap().is_none());
		assert!(backend.get("fresh").await.unwrap().is_some());
	}
}
