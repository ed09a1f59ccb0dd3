//! Application wiring: [`AppState`] assembly and the `axum` router (spec §6), grounded in the
//! pack's `ServiceBuilder`-layered router construction.

// std
use std::{
	collections::{HashMap, VecDeque},
	net::{IpAddr, SocketAddr},
	sync::Mutex,
};
// crates.io
use axum::{
	Router,
	extract::{ConnectInfo, Request, State},
	http::StatusCode,
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::get,
};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
// self
use crate::{
	_prelude::*,
	cache::{backend::CacheBackend, inprocess::InProcessBackend, manager::ResponseCache},
	collaborators::{InMemoryUserConfigStore, UserConfigStore},
	config::{CacheBackendKind, Config},
	config_cache::ConfigCache,
	handlers::{catalog, manifest, meta, status},
	lifecycle::{Runtime, Subsystem},
	ratings::{RatingsEngine, RatingsStore, inprocess::InProcessRatingsStore},
	upstream::{UpstreamClient, token_bucket::TokenBucket},
};

#[cfg(feature = "metrics")]
use crate::observability::metrics::Metrics;
#[cfg(feature = "redis")]
use crate::cache::shared::SharedBackend;
#[cfg(feature = "redis")]
use crate::ratings::SharedRatingsStore;

/// Cap on distinct client IPs tracked by the inbound rate limiter, beyond which the
/// oldest-admitted bucket is evicted (mirrors [`crate::observability::cardinality::BoundedMap`]).
const RATE_LIMITER_CAPACITY: usize = 10_000;

/// Shared application state threaded through every `axum` handler via [`State`].
#[derive(Clone)]
pub struct AppState {
	pub config: Arc<Config>,
	pub upstream: Arc<UpstreamClient>,
	pub response_cache: Arc<ResponseCache>,
	pub config_cache: Arc<ConfigCache>,
	pub ratings: Arc<RatingsEngine>,
	pub runtime: Arc<Runtime>,
	#[cfg(feature = "metrics")]
	pub metrics: Arc<Metrics>,
	rate_limiter: Arc<IpRateLimiter>,
}
impl AppState {
	/// Assemble application state from configuration, defaulting to an in-memory user config
	/// store (spec §1 non-goal: persisted user configuration is an external collaborator the core
	/// only ever reads through [`crate::collaborators::UserConfigStore`]).
	pub fn new(config: Config) -> Result<Self> {
		Self::with_user_config_store(config, Arc::new(InMemoryUserConfigStore::new()))
	}

	/// Assemble application state against an explicit [`UserConfigStore`] implementation.
	pub fn with_user_config_store(config: Config, store: Arc<dyn UserConfigStore>) -> Result<Self> {
		let config = Arc::new(config);
		let runtime = Arc::new(Runtime::new());

		#[cfg(feature = "metrics")]
		let metrics = Metrics::new();

		let mut upstream = UpstreamClient::new(&config)?;
		#[cfg(feature = "metrics")]
		{
			upstream = upstream.with_metrics(metrics.clone());
		}
		let upstream = Arc::new(upstream);

		let ratings_store = build_ratings_store(&config, &runtime)?;
		let mut ratings = RatingsEngine::new(&config, ratings_store, runtime.clone())?;
		#[cfg(feature = "metrics")]
		{
			ratings = ratings.with_metrics(metrics.clone());
		}
		let ratings = Arc::new(ratings);

		let config_cache = Arc::new(ConfigCache::with_defaults(store));

		let backend = build_cache_backend(&config, &runtime)?;
		let mut response_cache = ResponseCache::new(backend);
		#[cfg(feature = "metrics")]
		{
			response_cache = response_cache.with_metrics(metrics.clone());
		}
		let response_cache = Arc::new(response_cache);

		Ok(Self {
			config,
			upstream,
			response_cache,
			config_cache,
			ratings,
			runtime,
			#[cfg(feature = "metrics")]
			metrics,
			rate_limiter: Arc::new(IpRateLimiter::new(RATE_LIMITER_CAPACITY)),
		})
	}
}

#[cfg(not(feature = "redis"))]
fn build_cache_backend(config: &Config, _runtime: &Arc<Runtime>) -> Result<Arc<dyn CacheBackend>> {
	if config.cache_backend == CacheBackendKind::Shared {
		return Err(Error::Validation {
			field: "cache_backend",
			reason: "Built without the 'redis' feature; cannot select the shared backend.".into(),
		});
	}

	Ok(Arc::new(InProcessBackend::new(config.cache_max_entries)))
}

#[cfg(feature = "redis")]
fn build_cache_backend(config: &Config, runtime: &Arc<Runtime>) -> Result<Arc<dyn CacheBackend>> {
	match config.cache_backend {
		CacheBackendKind::InProcess => Ok(Arc::new(InProcessBackend::new(config.cache_max_entries))),
		CacheBackendKind::Shared => {
			let redis_url = config.redis_url.as_deref().ok_or_else(|| Error::Validation {
				field: "redis_url",
				reason: "Must be set when cache_backend is 'shared'.".into(),
			})?;
			let backend = SharedBackend::new(redis_url, config.cache_max_entries)?;

			if backend.is_degraded() {
				runtime.mark_degraded(Subsystem::CacheBackend, "shared backend unreachable at startup");
			}

			Ok(Arc::new(backend))
		},
	}
}

#[cfg(not(feature = "redis"))]
fn build_ratings_store(config: &Config, _runtime: &Arc<Runtime>) -> Result<Arc<dyn RatingsStore>> {
	if config.ratings_backend == CacheBackendKind::Shared {
		return Err(Error::Validation {
			field: "ratings_backend",
			reason: "Built without the 'redis' feature; cannot select the shared store.".into(),
		});
	}

	Ok(Arc::new(InProcessRatingsStore))
}

#[cfg(feature = "redis")]
fn build_ratings_store(config: &Config, _runtime: &Arc<Runtime>) -> Result<Arc<dyn RatingsStore>> {
	match config.ratings_backend {
		CacheBackendKind::InProcess => Ok(Arc::new(InProcessRatingsStore)),
		CacheBackendKind::Shared => {
			let redis_url = config.redis_url.as_deref().ok_or_else(|| Error::Validation {
				field: "redis_url",
				reason: "Must be set when ratings_backend is 'shared'.".into(),
			})?;

			Ok(Arc::new(SharedRatingsStore::new(redis_url)?))
		},
	}
}

/// Build the complete `axum` router: the catalog/meta/manifest surface plus `/health` and
/// `/api/status` (spec §6), with body-size limiting and per-IP rate limiting applied globally.
pub fn build_router(state: AppState) -> Router {
	let body_limit_bytes = state.config.body_limit_bytes;

	let middleware_stack = ServiceBuilder::new()
		.layer(TraceLayer::new_for_http())
		.layer(RequestBodyLimitLayer::new(body_limit_bytes))
		.layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

	Router::new()
		.route("/:user_id/manifest.json", get(manifest::get))
		.route("/:user_id/catalog/:kind/:catalog_id", get(catalog::get))
		.route("/:user_id/catalog/:kind/:catalog_id/:extra", get(catalog::get_with_extra))
		.route("/:user_id/meta/:kind/:meta_id", get(meta::get))
		.route("/:user_id/meta/:kind/:meta_id/:extra", get(meta::get_with_extra))
		.route("/health", get(status::health))
		.route("/api/status", get(status::status))
		.layer(middleware_stack)
		.with_state(state)
}

/// Per-client-IP token bucket guarding the whole HTTP surface, independent of the
/// [`TokenBucket`] instance the [`UpstreamClient`] holds for outbound calls (spec §6).
struct IpRateLimiter {
	capacity: usize,
	buckets: Mutex<(VecDeque<IpAddr>, HashMap<IpAddr, Arc<TokenBucket>>)>,
	per_ip_rate: f64,
}
impl IpRateLimiter {
	fn new(capacity: usize) -> Self {
		Self { capacity: capacity.max(1), buckets: Mutex::new((VecDeque::new(), HashMap::new())), per_ip_rate: 20.0 }
	}

	fn bucket_for(&self, ip: IpAddr) -> Arc<TokenBucket> {
		let mut guard = self.buckets.lock().expect("lock poisoned");
		let (order, map) = &mut *guard;

		if let Some(bucket) = map.get(&ip) {
			return bucket.clone();
		}

		if map.len() >= self.capacity
			&& let Some(oldest) = order.pop_front()
		{
			map.remove(&oldest);
		}

		let bucket = Arc::new(TokenBucket::new(self.per_ip_rate, self.per_ip_rate));
		order.push_back(ip);
		map.insert(ip, bucket.clone());

		bucket
	}
}

async fn rate_limit_middleware(
	State(state): State<AppState>,
	ConnectInfo(addr): ConnectInfo<SocketAddr>,
	request: Request,
	next: Next,
) -> Response {
	let bucket = state.rate_limiter.bucket_for(addr.ip());
	let acquired = tokio::time::timeout(Duration::from_secs(5), bucket.acquire()).await;

	if acquired.is_err() {
		#[cfg(feature = "metrics")]
		state.metrics.record_token_bucket_wait();

		return (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
	}

	next.run(request).await
}

#[cfg(test)]
mod tests {
	use super::*;

	fn test_config() -> Config {
		Config {
			upstream_base_url: url::Url::parse("https://content.example.invalid").unwrap(),
			upstream_allowed_domains: Vec::new(),
			cache_backend: CacheBackendKind::InProcess,
			cache_max_entries: 1000,
			redis_url: None,
			ratings_backend: CacheBackendKind::InProcess,
			ratings_min_votes: 100,
			ratings_refresh_interval: Duration::from_secs(3600),
			ratings_dataset_url: url::Url::parse("https://datasets.imdbws.invalid/title.ratings.tsv.gz")
				.unwrap(),
			rate_limit_per_sec: 35.0,
			body_limit_bytes: 1024 * 1024,
			encryption_key: vec![0u8; 32],
			session_secret: "x".repeat(32),
			placeholder_poster_url: url::Url::parse("https://example.invalid/p.png").unwrap(),
		}
	}

	#[test]
	fn builds_state_with_in_memory_defaults() {
		let state = AppState::new(test_config()).unwrap();

		assert!(!state.runtime.is_degraded());
	}

	#[test]
	fn ip_rate_limiter_evicts_oldest_bucket_past_capacity() {
		let limiter = IpRateLimiter::new(2);

		limiter.bucket_for("10.0.0.1".parse().unwrap());
		limiter.bucket_for("10.0.0.2".parse().unwrap());
		limiter.bucket_for("10.0.0.3".parse().unwrap());

		let guard = limiter.buckets.lock().unwrap();
		assert_eq!(guard.1.len(), 2);
	}
}
