//! Remote key-value store backend with transparent in-process fallback (spec §4.2 "SHARED"
//! variant), grounded in the teacher's `RedisPersistence` connection handling.

// std
use std::{
	collections::HashMap,
	sync::atomic::{AtomicBool, Ordering},
};
// crates.io
use async_trait::async_trait;
use redis::AsyncCommands;
// self
use crate::{
	_prelude::*,
	cache::backend::{BackendStats, CacheBackend, StoredEntry},
	cache::inprocess::InProcessBackend,
};

/// Redis-backed [`CacheBackend`] that falls through to an in-process backend on any backend
/// error, recording the degradation for observability rather than failing the caller (spec §4.2,
/// §4.8).
pub struct SharedBackend {
	client: redis::Client,
	namespace: Arc<str>,
	fallback: InProcessBackend,
	degraded: AtomicBool,
}
impl SharedBackend {
	/// Construct a backend against the given Redis connection string.
	pub fn new(redis_url: &str, fallback_capacity: usize) -> Result<Self> {
		Ok(Self {
			client: redis::Client::open(redis_url)?,
			namespace: Arc::from("catalog-cache"),
			fallback: InProcessBackend::new(fallback_capacity),
			degraded: AtomicBool::new(false),
		})
	}

	/// Whether the most recent operation fell back to the in-process store.
	pub fn is_degraded(&self) -> bool {
		self.degraded.load(Ordering::Relaxed)
	}

	fn key(&self, key: &str) -> String {
		format!("{}:{key}", self.namespace)
	}

	async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
		Ok(self.client.get_multiplexed_async_connection().await?)
	}

	fn mark_degraded(&self, err: &Error) {
		tracing::warn!(error = %err, "shared cache backend degraded, falling back to in-process");
		self.degraded.store(true, Ordering::Relaxed);
	}

	fn mark_healthy(&self) {
		self.degraded.store(false, Ordering::Relaxed);
	}
}
#[async_trait]
impl CacheBackend for SharedBackend {
	async fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
		let attempt: Result<Option<StoredEntry>> = async {
			let mut conn = self.connection().await?;
			let raw: Option<Vec<u8>> = conn.get(self.key(key)).await?;

			match raw {
				Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
				None => Ok(None),
			}
		}
		.await;

		match attempt {
			Ok(value) => {
				self.mark_healthy();

				Ok(value)
			},
			Err(err) => {
				self.mark_degraded(&err);

				self.fallback.get(key).await
			},
		}
	}

	async fn set(&self, key: &str, entry: StoredEntry) -> Result<()> {
		let attempt: Result<()> = async {
			let mut conn = self.connection().await?;
			let ttl = (entry.stale_until - Utc::now()).num_seconds().max(1) as u64;
			let payload = serde_json::to_vec(&entry)?;

			conn.set_ex::<_, _, ()>(self.key(key), payload, ttl).await?;

			Ok(())
		}
		.await;

		match attempt {
			Ok(()) => {
				self.mark_healthy();

				Ok(())
			},
			Err(err) => {
				self.mark_degraded(&err);

				self.fallback.set(key, entry).await
			},
		}
	}

	async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, StoredEntry>> {
		let mut result = HashMap::with_capacity(keys.len());

		for key in keys {
			if let Some(entry) = self.get(key).await? {
				result.insert(key.clone(), entry);
			}
		}

		Ok(result)
	}

	async fn set_batch(&self, entries: Vec<(String, StoredEntry)>) -> Result<()> {
		for (key, entry) in entries {
			self.set(&key, entry).await?;
		}

		Ok(())
	}

	async fn remove_prefix(&self, prefix: &str) -> Result<usize> {
		let attempt: Result<usize> = async {
			let mut conn = self.connection().await?;
			let pattern = format!("{}:{prefix}*", self.namespace);
			let keys: Vec<String> = conn.keys(pattern).await?;

			if keys.is_empty() {
				return Ok(0);
			}

			conn.del::<_, ()>(&keys).await?;

			Ok(keys.len())
		}
		.await;

		match attempt {
			Ok(count) => {
				self.mark_healthy();

				Ok(count)
			},
			Err(err) => {
				self.mark_degraded(&err);

				self.fallback.remove_prefix(prefix).await
			},
		}
	}

	async fn stats(&self) -> BackendStats {
		if self.is_degraded() {
			return self.fallback.stats().await;
		}

		// The remote store does not expose hit/miss/eviction counters to this client; size is
		// reported as unknown (synthetic zero) per spec §4.2 "stats surfaced if the backend
		// exposes them, else synthetic".
		BackendStats { hits: 0, misses: 0, evictions: None, size: 0 }
	}

	async fn destroy(&self, key: &str) -> Result<()> {
		let attempt: Result<()> = async {
			let mut conn = self.connection().await?;

			conn.del::<_, ()>(self.key(key)).await?;

			Ok(())
		}
		.await;

		match attempt {
			Ok(()) => {
				self.mark_healthy();

				Ok(())
			},
			Err(err) => {
				self.mark_degraded(&err);

				self.fallback.destroy(key).await
			},
		}
	}
}
