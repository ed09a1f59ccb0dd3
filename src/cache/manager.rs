//! Response Cache orchestration: coalescing, stale-while-revalidate, and negative caching
//! (spec §4.2), generalising the teacher's single-entry `CacheManager` to a sharded map keyed by
//! [`Fingerprint`].

// std
use std::{
	collections::HashMap,
	future::Future,
	sync::atomic::{AtomicU64, Ordering},
};
// crates.io
use tokio::sync::Mutex as AsyncMutex;
// self
use crate::{
	_prelude::*,
	cache::backend::{BackendStats, CacheBackend, StoredEntry, StoredEntryKind},
	config::STALE_GRACE_MULTIPLIER,
	fingerprint::Fingerprint,
	upstream::UpstreamErrorKind,
};
#[cfg(feature = "metrics")]
use crate::observability::metrics::Metrics;

/// Aggregate statistics surfaced by the Response Cache (spec §4.2 `stats()`).
#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseCacheStats {
	/// Backend-level statistics.
	pub backend: BackendStatsView,
	/// Requests that attached to an in-flight producer instead of becoming the leader.
	pub coalesced_waits: u64,
}

/// Local mirror of [`BackendStats`] avoiding a circular re-export.
#[derive(Clone, Copy, Debug, Default)]
pub struct BackendStatsView {
	/// Hits observed by the backend.
	pub hits: u64,
	/// Misses observed by the backend.
	pub misses: u64,
	/// Evictions observed by the backend, if tracked.
	pub evictions: Option<u64>,
	/// Current resident size.
	pub size: usize,
}
impl From<BackendStats> for BackendStatsView {
	fn from(value: BackendStats) -> Self {
		Self { hits: value.hits, misses: value.misses, evictions: value.evictions, size: value.size }
	}
}

struct Leader {
	lock: AsyncMutex<()>,
}

/// Maps [`Fingerprint`] to cached entries with at-most-one concurrent producer per fingerprint.
pub struct ResponseCache {
	backend: Arc<dyn CacheBackend>,
	leaders: Arc<std::sync::Mutex<HashMap<Fingerprint, Arc<Leader>>>>,
	coalesced_waits: AtomicU64,
	#[cfg(feature = "metrics")]
	metrics: Option<Arc<Metrics>>,
}
impl ResponseCache {
	/// Construct a cache over the given backend.
	pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
		Self {
			backend,
			leaders: Arc::new(std::sync::Mutex::new(HashMap::new())),
			coalesced_waits: AtomicU64::new(0),
			#[cfg(feature = "metrics")]
			metrics: None,
		}
	}

	/// Attach a metrics sink; cache hits/misses/coalesced waits and the resident-size gauge are
	/// recorded against it from then on.
	#[cfg(feature = "metrics")]
	pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
		self.metrics = Some(metrics);
		self
	}

	/// Fetch the cached entry for `fingerprint`, invoking `producer` at most once per miss window
	/// (spec §4.2, §8 property 1); background revalidation is scheduled via `spawn_refresh` when a
	/// within-grace entry is served.
	pub async fn get_or_fetch<P, Fut>(
		&self,
		fingerprint: &Fingerprint,
		ttl: Duration,
		producer: P,
	) -> Result<bytes::Bytes>
	where
		P: Fn() -> Fut + Clone + Send + Sync + 'static,
		Fut: Future<Output = std::result::Result<bytes::Bytes, (UpstreamErrorKind, Error)>> + Send,
	{
		if let Some(payload) = self.try_serve(fingerprint, ttl, producer.clone()).await? {
			return Ok(payload);
		}

		self.lead_or_coalesce(fingerprint, ttl, producer).await
	}

	async fn try_serve<P, Fut>(
		&self,
		fingerprint: &Fingerprint,
		ttl: Duration,
		producer: P,
	) -> Result<Option<bytes::Bytes>>
	where
		P: Fn() -> Fut + Clone + Send + Sync + 'static,
		Fut: Future<Output = std::result::Result<bytes::Bytes, (UpstreamErrorKind, Error)>> + Send,
	{
		let Some(stored) = self.backend.get(fingerprint.as_str()).await? else {
			self.record_cache_miss();

			return Ok(None);
		};

		if !digest_matches(&stored) {
			tracing::debug!(fingerprint = %fingerprint, "cache entry digest mismatch, discarding");
			self.backend.destroy(fingerprint.as_str()).await?;
			self.record_cache_miss();

			return Ok(None);
		}

		let now = Utc::now();

		if now < stored.fresh_until {
			self.record_cache_hit();

			return Ok(Some(bytes::Bytes::from(stored.payload)));
		}

		if now < stored.stale_until {
			tracing::debug!(fingerprint = %fingerprint, "serving stale entry within grace, scheduling refresh");
			self.record_cache_hit();

			let fingerprint = fingerprint.clone();
			let this = self.backend.clone();
			let leaders = self.leaders_handle();

			tokio::spawn(async move {
				refresh_in_background(this, leaders, fingerprint, ttl, producer).await;
			});

			return Ok(Some(bytes::Bytes::from(stored.payload)));
		}

		self.record_cache_miss();

		Ok(None)
	}

	fn record_cache_hit(&self) {
		#[cfg(feature = "metrics")]
		if let Some(metrics) = &self.metrics {
			metrics.record_cache_hit();
		}
	}

	fn record_cache_miss(&self) {
		#[cfg(feature = "metrics")]
		if let Some(metrics) = &self.metrics {
			metrics.record_cache_miss();
		}
	}

	async fn lead_or_coalesce<P, Fut>(
		&self,
		fingerprint: &Fingerprint,
		ttl: Duration,
		producer: P,
	) -> Result<bytes::Bytes>
	where
		P: Fn() -> Fut + Clone + Send + Sync + 'static,
		Fut: Future<Output = std::result::Result<bytes::Bytes, (UpstreamErrorKind, Error)>> + Send,
	{
		let leader = {
			let mut leaders = self.leaders.lock().expect("lock poisoned");

			leaders.entry(fingerprint.clone()).or_insert_with(|| Arc::new(Leader { lock: AsyncMutex::new(()) })).clone()
		};
		let already_held = leader.lock.try_lock().is_err();

		if already_held {
			self.coalesced_waits.fetch_add(1, Ordering::Relaxed);

			#[cfg(feature = "metrics")]
			if let Some(metrics) = &self.metrics {
				metrics.record_coalesced_wait();
			}
		}

		let _guard = leader.lock.lock().await;

		// Double-checked: another leader may have filled this slot while we waited.
		if let Some(stored) = self.backend.get(fingerprint.as_str()).await?
			&& digest_matches(&stored)
			&& Utc::now() < stored.stale_until
		{
			self.cleanup_leader(fingerprint, &leader);

			return Ok(bytes::Bytes::from(stored.payload));
		}

		let result = run_producer(&producer).await;

		self.cleanup_leader(fingerprint, &leader);

		match result {
			Ok(payload) => {
				self.store_positive(fingerprint, &payload, ttl).await?;

				Ok(payload)
			},
			Err((kind, err)) => {
				if kind.is_negative_cacheable() {
					self.store_negative(fingerprint, kind).await?;
				}

				Err(err)
			},
		}
	}

	fn cleanup_leader(&self, fingerprint: &Fingerprint, leader: &Arc<Leader>) {
		let mut leaders = self.leaders.lock().expect("lock poisoned");

		if let Some(current) = leaders.get(fingerprint)
			&& Arc::ptr_eq(current, leader)
			&& Arc::strong_count(current) <= 2
		{
			leaders.remove(fingerprint);
		}
	}

	fn leaders_handle(&self) -> Arc<std::sync::Mutex<HashMap<Fingerprint, Arc<Leader>>>> {
		self.leaders.clone()
	}

	async fn store_positive(
		&self,
		fingerprint: &Fingerprint,
		payload: &bytes::Bytes,
		ttl: Duration,
	) -> Result<()> {
		use sha2::{Digest, Sha256};

		let digest: [u8; 32] = Sha256::digest(payload).into();
		let now = Utc::now();
		let grace = ttl.mul_f64(STALE_GRACE_MULTIPLIER);

		debug_assert!(
			(grace.as_secs_f64() - ttl.as_secs_f64() * STALE_GRACE_MULTIPLIER).abs() < 1e-6,
			"grace window must be exactly ttl * {STALE_GRACE_MULTIPLIER}"
		);

		let stored = StoredEntry {
			payload: payload.to_vec(),
			digest,
			kind: StoredEntryKind::Ok,
			fresh_until: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
			stale_until: now + chrono::Duration::from_std(grace).unwrap_or_default(),
		};

		self.backend.set(fingerprint.as_str(), stored).await
	}

	async fn store_negative(&self, fingerprint: &Fingerprint, kind: UpstreamErrorKind) -> Result<()> {
		let Some(negative_ttl) = kind.negative_cache_ttl() else { return Ok(()) };
		let now = Utc::now();
		let stored_kind = match kind {
			UpstreamErrorKind::NotFound => StoredEntryKind::NegativeNotFound,
			UpstreamErrorKind::Auth => StoredEntryKind::NegativeAuth,
			_ => return Ok(()),
		};
		let stored = StoredEntry {
			payload: Vec::new(),
			digest: [0u8; 32],
			kind: stored_kind,
			fresh_until: now + chrono::Duration::from_std(negative_ttl).unwrap_or_default(),
			stale_until: now + chrono::Duration::from_std(negative_ttl).unwrap_or_default(),
		};

		self.backend.set(fingerprint.as_str(), stored).await
	}

	/// Remove every cached entry whose fingerprint string starts with `prefix`.
	pub async fn invalidate(&self, prefix: &str) -> Result<usize> {
		self.backend.remove_prefix(prefix).await
	}

	/// Aggregate statistics for observability.
	pub async fn stats(&self) -> ResponseCacheStats {
		let backend_stats = self.backend.stats().await;

		#[cfg(feature = "metrics")]
		if let Some(metrics) = &self.metrics {
			metrics.set_cache_size(backend_stats.size as u64);
		}

		ResponseCacheStats {
			backend: backend_stats.into(),
			coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
		}
	}
}

async fn refresh_in_background<P, Fut>(
	backend: Arc<dyn CacheBackend>,
	_leaders: Arc<std::sync::Mutex<HashMap<Fingerprint, Arc<Leader>>>>,
	fingerprint: Fingerprint,
	ttl: Duration,
	producer: P,
) where
	P: Fn() -> Fut + Send + Sync + 'static,
	Fut: Future<Output = std::result::Result<bytes::Bytes, (UpstreamErrorKind, Error)>> + Send,
{
	match run_producer(&producer).await {
		Ok(payload) => {
			use sha2::{Digest, Sha256};

			let digest: [u8; 32] = Sha256::digest(&payload).into();
			let now = Utc::now();
			let grace = ttl.mul_f64(STALE_GRACE_MULTIPLIER);
			let stored = StoredEntry {
				payload: payload.to_vec(),
				digest,
				kind: StoredEntryKind::Ok,
				fresh_until: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
				stale_until: now + chrono::Duration::from_std(grace).unwrap_or_default(),
			};

			let _ = backend.set(fingerprint.as_str(), stored).await;
		},
		Err((_, err)) => {
			tracing::warn!(fingerprint = %fingerprint, error = %err, "background revalidation failed, stale entry retained");
		},
	}
}

async fn run_producer<P, Fut>(
	producer: &P,
) -> std::result::Result<bytes::Bytes, (UpstreamErrorKind, Error)>
where
	P: Fn() -> Fut,
	Fut: Future<Output = std::result::Result<bytes::Bytes, (UpstreamErrorKind, Error)>>,
{
	producer().await
}

fn digest_matches(stored: &StoredEntry) -> bool {
	use sha2::{Digest, Sha256};

	if matches!(stored.kind, StoredEntryKind::NegativeNotFound | StoredEntryKind::NegativeAuth) {
		return true;
	}

	let recomputed: [u8; 32] = Sha256::digest(&stored.payload).into();

	recomputed == stored.digest
}
