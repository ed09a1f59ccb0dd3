//! Manifest conditional-response round trip (seed scenario S6).

// std
use std::collections::HashMap;
// crates.io
use axum::http::{StatusCode, header};
use catalog_cache::{
	AppState,
	collaborators::{InMemoryUserConfigStore, UserConfig},
	config::CacheBackendKind,
};
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

/// S6: a second manifest request carrying the `ETag` from the first gets an empty `304`, with no
/// recomputation needed on the caller's part.
#[tokio::test]
async fn repeat_manifest_request_with_matching_etag_is_not_modified() {
	let _ = tracing_subscriber::fmt::try_init();

	let store = InMemoryUserConfigStore::new();
	store.insert("user-1", UserConfig {
		catalogs: vec!["top250".into()],
		display_language: "en-US".into(),
		cross_reference_hints: HashMap::new(),
		shuffle_enabled: false,
		poster_overrides: HashMap::new(),
		excluded_categories: Vec::new(),
	});

	let state = AppState::with_user_config_store(test_config(), std::sync::Arc::new(store)).unwrap();
	let router = catalog_cache::build_router(state);

	let first = router.clone().oneshot(support::get("/user-1/manifest.json")).await.unwrap();

	assert_eq!(first.status(), StatusCode::OK);
	let etag = first.headers().get(header::ETAG).expect("etag header present").to_str().unwrap().to_string();

	let second = router
		.oneshot(support::with_headers("/user-1/manifest.json", &[("if-none-match", &etag)]))
		.await
		.unwrap();

	assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
	let body = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
	assert!(body.is_empty(), "304 response must carry no body");
}
