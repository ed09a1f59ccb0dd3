//! Response Cache single-flight coalescing under concurrent load (seed scenario S2).

// std
use std::{
	future::Future,
	pin::Pin,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use catalog_cache::{
	Error,
	cache::{inprocess::InProcessBackend, manager::ResponseCache},
	fingerprint::Fingerprint,
	upstream::UpstreamErrorKind,
};

type ProducerFuture = Pin<Box<dyn Future<Output = Result<bytes::Bytes, (UpstreamErrorKind, Error)>> + Send>>;

fn slow_producer(
	calls: Arc<AtomicUsize>,
) -> impl Fn() -> ProducerFuture + Clone + Send + Sync + 'static {
	move || {
		let calls = calls.clone();

		Box::pin(async move {
			calls.fetch_add(1, Ordering::SeqCst);
			tokio::time::sleep(Duration::from_millis(200)).await;

			Ok(bytes::Bytes::from_static(b"{\"metas\":[]}"))
		})
	}
}

/// Two concurrent requests for the same fingerprint, with a 200ms upstream latency, must result
/// in exactly one producer invocation and byte-identical responses for both callers.
#[tokio::test]
async fn concurrent_requests_for_the_same_fingerprint_coalesce_into_one_producer_call() {
	let backend = Arc::new(InProcessBackend::new(100));
	let cache = Arc::new(ResponseCache::new(backend));
	let fingerprint = Fingerprint::compute("catalog", &[("catalogId", "top250")], "en-US");
	let calls = Arc::new(AtomicUsize::new(0));
	let producer = slow_producer(calls.clone());

	let first_cache = cache.clone();
	let first_fingerprint = fingerprint.clone();
	let first_producer = producer.clone();
	let first = tokio::spawn(async move {
		first_cache.get_or_fetch(&first_fingerprint, Duration::from_secs(60), first_producer).await
	});

	// Give the leader a head start so the second request observes an in-flight producer.
	tokio::time::sleep(Duration::from_millis(20)).await;

	let second_cache = cache.clone();
	let second_fingerprint = fingerprint.clone();
	let second = tokio::spawn(async move {
		second_cache.get_or_fetch(&second_fingerprint, Duration::from_secs(60), producer).await
	});

	let first_result = first.await.unwrap().unwrap();
	let second_result = second.await.unwrap().unwrap();

	assert_eq!(first_result, second_result);
	assert_eq!(calls.load(Ordering::SeqCst), 1, "exactly one upstream call should have been made");

	let stats = cache.stats().await;
	assert_eq!(stats.coalesced_waits, 1);
}
