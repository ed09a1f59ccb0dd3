//! Ratings ingest: conditional fetch and vote-threshold filtering (seed scenarios S3/S4).

// std
use std::io::Write;
// crates.io
use catalog_cache::{config::CacheBackendKind, ratings::RatingsEngine};
use flate2::{Compression, write::GzEncoder};
use url::Url;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};

fn gzip(text: &str) -> Vec<u8> {
	let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
	encoder.write_all(text.as_bytes()).unwrap();
	encoder.finish().unwrap()
}

fn test_config(dataset_url: Url) -> catalog_cache::config::Config {
	catalog_cache::config::Config {
		upstream_base_url: Url::parse("https://content.example.invalid").unwrap(),
		upstream_allowed_domains: Vec::new(),
		cache_backend: CacheBackendKind::InProcess,
		cache_max_entries: 1000,
		redis_url: None,
		ratings_backend: CacheBackendKind::InProcess,
		ratings_min_votes: 100,
		ratings_refresh_interval: std::time::Duration::from_secs(3600),
		ratings_dataset_url: dataset_url,
		rate_limit_per_sec: 35.0,
		body_limit_bytes: 1024,
		encryption_key: vec![0u8; 32],
		session_secret: "x".repeat(32),
		placeholder_poster_url: Url::parse("https://example.invalid/p.png").unwrap(),
	}
}

/// S3: a title above the vote threshold is returned with its average/vote count intact.
#[tokio::test]
async fn rating_above_threshold_is_looked_up_after_ingest() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let body = gzip("tconst\taverageRating\tnumVotes\ntt0133093\t8.7\t2000000\n");

	Mock::given(method("GET"))
		.and(path("/title.ratings.tsv.gz"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_bytes(body)
				.insert_header("content-type", "application/gzip"),
		)
		.expect(1)
		.mount(&server)
		.await;

	let dataset_url = Url::parse(&format!("{}/title.ratings.tsv.gz", server.uri())).unwrap();
	let engine = RatingsEngine::new(&test_config(dataset_url), std::sync::Arc::new(catalog_cache::ratings::InProcessRatingsStore), std::sync::Arc::new(catalog_cache::lifecycle::Runtime::new())).unwrap();

	engine.run_ingest_once().await.unwrap();

	let rating = engine.lookup("tt0133093").expect("rating present after ingest");
	assert_eq!(rating.votes, 2_000_000);
	assert!((rating.average - 8.7).abs() < f32::EPSILON);

	server.verify().await;
}

/// S4: a title below the vote threshold never makes it into the live snapshot.
#[tokio::test]
async fn rating_below_threshold_is_a_miss() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let body = gzip("tconst\taverageRating\tnumVotes\ntt9999999\t7.0\t50\n");

	Mock::given(method("GET"))
		.and(path("/title.ratings.tsv.gz"))
		.respond_with(ResponseTemplate::new(200).set_body_bytes(body))
		.expect(1)
		.mount(&server)
		.await;

	let dataset_url = Url::parse(&format!("{}/title.ratings.tsv.gz", server.uri())).unwrap();
	let engine = RatingsEngine::new(&test_config(dataset_url), std::sync::Arc::new(catalog_cache::ratings::InProcessRatingsStore), std::sync::Arc::new(catalog_cache::lifecycle::Runtime::new())).unwrap();

	engine.run_ingest_once().await.unwrap();

	assert!(engine.lookup("tt9999999").is_none());

	server.verify().await;
}

/// A conditional re-ingest against an unchanged `ETag` retains the live snapshot without
/// re-downloading, mirroring the teacher's `caches_jwks_after_initial_fetch` coverage.
#[tokio::test]
async fn conditional_reingest_reuses_the_live_snapshot_on_304() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let body = gzip("tconst\taverageRating\tnumVotes\ntt0133093\t8.7\t2000000\n");

	Mock::given(method("GET"))
		.and(path("/title.ratings.tsv.gz"))
		.respond_with(
			ResponseTemplate::new(200).set_body_bytes(body).insert_header("etag", "\"v1\""),
		)
		.up_to_n_times(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/title.ratings.tsv.gz"))
		.respond_with(ResponseTemplate::new(304).insert_header("etag", "\"v1\""))
		.mount(&server)
		.await;

	let dataset_url = Url::parse(&format!("{}/title.ratings.tsv.gz", server.uri())).unwrap();
	let engine = RatingsEngine::new(&test_config(dataset_url), std::sync::Arc::new(catalog_cache::ratings::InProcessRatingsStore), std::sync::Arc::new(catalog_cache::lifecycle::Runtime::new())).unwrap();

	engine.run_ingest_once().await.unwrap();
	engine.run_ingest_once().await.unwrap();

	assert_eq!(engine.state(), catalog_cache::ratings::RatingsState::Ready);
	assert!(engine.lookup("tt0133093").is_some());
}
