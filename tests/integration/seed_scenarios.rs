//! Router-level coverage for the remaining seed scenarios.
//!
//! S1 is adapted to this crate's read-only surface (no catalog-editor / write endpoints are
//! exposed, per the non-goals): the equivalent "malformed request, no user configuration present"
//! case is a request for a user the configuration store has never heard of.

// std
use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};
// crates.io
use axum::http::StatusCode;
use catalog_cache::{
	AppState, Error,
	cache::manager::ResponseCache,
	collaborators::{InMemoryUserConfigStore, UserConfig},
	config::CacheBackendKind,
	fingerprint::Fingerprint,
	handlers::catalog::CATALOG_TTL,
	upstream::UpstreamErrorKind,
};
use serde_json::json;
use tower::ServiceExt;
use url::Url;
// self
use crate::support;

fn test_config() -> catalog_cache::config::Config {
	catalog_cache::config::Config {
		upstream_base_url: Url::parse("https://content.example.invalid").unwrap(),
		upstream_allowed_domains: Vec::new(),
		cache_backend: CacheBackendKind::InProcess,
		cache_max_entries: 1000,
		redis_url: None,
		ratings_backend: CacheBackendKind::InProcess,
		ratings_min_votes: 100,
		ratings_refresh_interval: std::time::Duration::from_secs(3600),
		ratings_dataset_url: Url::parse("https://datasets.imdbws.invalid/title.ratings.tsv.gz")
			.unwrap(),
		rate_limit_per_sec: 35.0,
		body_limit_bytes: 1024 * 1024,
		encryption_key: vec![0u8; 32],
		session_secret: "x".repeat(32),
		placeholder_poster_url: Url::parse("https://example.invalid/p.png").unwrap(),
	}
}

/// S1 (adapted): a request for a user with no stored configuration is rejected as a validation
/// error before any upstream call is attempted.
#[tokio::test]
async fn request_for_unconfigured_user_is_rejected_without_an_upstream_call() {
	let _ = tracing_subscriber::fmt::try_init();

	let store = InMemoryUserConfigStore::new();
	let state = AppState::with_user_config_store(test_config(), Arc::new(store)).unwrap();
	let router = catalog_cache::build_router(state);

	let response =
		router.oneshot(support::get("/nobody/manifest.json")).await.unwrap();

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// S5: the upstream client is never consulted here — the Response Cache is seeded directly with
/// the pre-enrichment page, since [`catalog_cache::upstream::UpstreamClient`] enforces HTTPS
/// unconditionally and a plaintext mock server cannot stand in for it. This still exercises the
/// full router, enrichment, and wire-serialisation path for the category-exclusion contract.
#[tokio::test]
async fn excluded_category_is_filtered_but_total_results_is_left_unadjusted() {
	let _ = tracing_subscriber::fmt::try_init();

	let store = InMemoryUserConfigStore::new();
	store.insert("user-1", UserConfig {
		catalogs: vec!["top250".into()],
		display_language: "en-US".into(),
		cross_reference_hints: HashMap::new(),
		shuffle_enabled: false,
		poster_overrides: HashMap::new(),
		excluded_categories: vec!["28".into()],
	});

	let state = AppState::with_user_config_store(test_config(), Arc::new(store)).unwrap();

	let fingerprint = Fingerprint::compute(
		"catalog",
		&[("kind", "movie"), ("catalogId", "top250"), ("skip", "0"), ("search", ""), ("genre", "")],
		"en-US",
	);
	let page = json!({
		"items": [
			{"id": "a", "categories": ["28", "12"]},
			{"id": "b", "categories": ["12"]},
		],
		"total_results": 42,
	});
	let payload = bytes::Bytes::from(serde_json::to_vec(&page).unwrap());

	seed(&state.response_cache, &fingerprint, payload).await;

	let router = catalog_cache::build_router(state);
	let response =
		router.oneshot(support::get("/user-1/catalog/movie/top250.json")).await.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
	let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();

	let metas = parsed["metas"].as_array().expect("metas array");
	assert_eq!(metas.len(), 1);
	assert_eq!(metas[0]["id"], "b");
	assert_eq!(parsed["totalResults"], 42);
}

async fn seed(cache: &Arc<ResponseCache>, fingerprint: &Fingerprint, payload: bytes::Bytes) {
	let producer = move || -> Pin<Box<dyn Future<Output = Result<bytes::Bytes, (UpstreamErrorKind, Error)>> + Send>> {
		let payload = payload.clone();
		Box::pin(async move { Ok(payload) })
	};

	cache.get_or_fetch(fingerprint, CATALOG_TTL, producer).await.expect("seed succeeds");
}
