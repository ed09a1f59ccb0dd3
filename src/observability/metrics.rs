//! Counters, gauges, and per-endpoint latency histograms (spec §4.7), following the teacher's
//! `metrics.rs` pattern: `AtomicU64` fields for cheap in-process reads, plus `metrics` crate
//! emission for optional Prometheus export.

// std
use std::sync::{
	OnceLock,
	atomic::{AtomicU64, Ordering},
};
// crates.io
use metrics::Label;
#[cfg(feature = "prometheus")] use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use smallvec::SmallVec;
// self
use crate::{_prelude::*, observability::cardinality::BoundedMap, upstream::UpstreamErrorKind};

type LabelSet = SmallVec<[Label; 4]>;

#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// In-process counters and gauges, readable without going through the `metrics` facade (used by
/// the `/health` and `/api/status` handlers).
#[derive(Debug, Default)]
pub struct Metrics {
	requests_total: AtomicU64,
	cache_hits_total: AtomicU64,
	cache_misses_total: AtomicU64,
	coalesced_waits_total: AtomicU64,
	upstream_calls_total: AtomicU64,
	token_bucket_waits_total: AtomicU64,
	ingest_successes_total: AtomicU64,
	ingest_failures_total: AtomicU64,
	cache_size: AtomicU64,
	live_rating_set_size: AtomicU64,
	upstream_in_flight: AtomicU64,
	endpoint_cardinality: BoundedMap<String>,
}
impl Metrics {
	/// Construct a fresh, zeroed metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record one request against `endpoint`, bounding the live set of distinct endpoint labels
	/// (spec §4.7 bounded cardinality).
	pub fn record_request(&self, endpoint: &str) {
		self.requests_total.fetch_add(1, Ordering::Relaxed);
		metrics::counter!("catalog_cache_requests_total", &labels_for(&self.endpoint_cardinality, endpoint))
			.increment(1);
	}

	/// Record a Response Cache hit.
	pub fn record_cache_hit(&self) {
		self.cache_hits_total.fetch_add(1, Ordering::Relaxed);
		metrics::counter!("catalog_cache_hits_total").increment(1);
	}

	/// Record a Response Cache miss.
	pub fn record_cache_miss(&self) {
		self.cache_misses_total.fetch_add(1, Ordering::Relaxed);
		metrics::counter!("catalog_cache_misses_total").increment(1);
	}

	/// Record a request that attached to an in-flight producer instead of leading.
	pub fn record_coalesced_wait(&self) {
		self.coalesced_waits_total.fetch_add(1, Ordering::Relaxed);
		metrics::counter!("catalog_cache_coalesced_waits_total").increment(1);
	}

	/// Record one outbound upstream call.
	pub fn record_upstream_call(&self) {
		self.upstream_calls_total.fetch_add(1, Ordering::Relaxed);
		metrics::counter!("catalog_cache_upstream_calls_total").increment(1);
	}

	/// Record a classified upstream error by kind.
	pub fn record_classified_error(&self, kind: UpstreamErrorKind) {
		metrics::counter!("catalog_cache_upstream_errors_total", "kind" => kind.as_str()).increment(1);
	}

	/// Record a suspension at the token bucket.
	pub fn record_token_bucket_wait(&self) {
		self.token_bucket_waits_total.fetch_add(1, Ordering::Relaxed);
		metrics::counter!("catalog_cache_token_bucket_waits_total").increment(1);
	}

	/// Record a completed ratings ingest attempt.
	pub fn record_ingest_outcome(&self, succeeded: bool) {
		if succeeded {
			self.ingest_successes_total.fetch_add(1, Ordering::Relaxed);
			metrics::counter!("catalog_cache_ingest_total", "status" => "success").increment(1);
		} else {
			self.ingest_failures_total.fetch_add(1, Ordering::Relaxed);
			metrics::counter!("catalog_cache_ingest_total", "status" => "failure").increment(1);
		}
	}

	/// Record one endpoint's request latency (spec §4.7 "per-endpoint latency histograms").
	pub fn record_latency(&self, endpoint: &str, duration: Duration) {
		metrics::histogram!(
			"catalog_cache_request_duration_seconds",
			&labels_for(&self.endpoint_cardinality, endpoint)
		)
		.record(duration.as_secs_f64());
	}

	/// Update the Response Cache resident-entry gauge.
	pub fn set_cache_size(&self, size: u64) {
		self.cache_size.store(size, Ordering::Relaxed);
		metrics::gauge!("catalog_cache_size").set(size as f64);
	}

	/// Update the live ratings-set size gauge.
	pub fn set_live_rating_set_size(&self, size: u64) {
		self.live_rating_set_size.store(size, Ordering::Relaxed);
		metrics::gauge!("catalog_cache_ratings_set_size").set(size as f64);
	}

	/// Update the in-flight upstream call gauge.
	pub fn set_upstream_in_flight(&self, value: u64) {
		self.upstream_in_flight.store(value, Ordering::Relaxed);
		metrics::gauge!("catalog_cache_upstream_in_flight").set(value as f64);
	}

	/// Point-in-time snapshot of the in-process counters, used by `/health` and `/api/status`.
	pub fn snapshot(&self) -> MetricsSnapshot {
		MetricsSnapshot {
			requests_total: self.requests_total.load(Ordering::Relaxed),
			cache_hits_total: self.cache_hits_total.load(Ordering::Relaxed),
			cache_misses_total: self.cache_misses_total.load(Ordering::Relaxed),
			coalesced_waits_total: self.coalesced_waits_total.load(Ordering::Relaxed),
			upstream_calls_total: self.upstream_calls_total.load(Ordering::Relaxed),
			token_bucket_waits_total: self.token_bucket_waits_total.load(Ordering::Relaxed),
			ingest_successes_total: self.ingest_successes_total.load(Ordering::Relaxed),
			ingest_failures_total: self.ingest_failures_total.load(Ordering::Relaxed),
			cache_size: self.cache_size.load(Ordering::Relaxed),
			live_rating_set_size: self.live_rating_set_size.load(Ordering::Relaxed),
			upstream_in_flight: self.upstream_in_flight.load(Ordering::Relaxed),
		}
	}
}

/// Read-only snapshot of the in-process counters (spec §4.7; surfaced via `/api/status`).
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsSnapshot {
	pub requests_total: u64,
	pub cache_hits_total: u64,
	pub cache_misses_total: u64,
	pub coalesced_waits_total: u64,
	pub upstream_calls_total: u64,
	pub token_bucket_waits_total: u64,
	pub ingest_successes_total: u64,
	pub ingest_failures_total: u64,
	pub cache_size: u64,
	pub live_rating_set_size: u64,
	pub upstream_in_flight: u64,
}

fn labels_for(cardinality: &BoundedMap<String>, value: &str) -> LabelSet {
	let mut labels = LabelSet::with_capacity(1);

	cardinality.observe(&value.to_string());
	labels.push(Label::new("endpoint", value.to_owned()));

	labels
}

/// Install the default Prometheus recorder. Safe to call more than once; later calls are no-ops.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle =
		PrometheusBuilder::new().install_recorder().map_err(|err| Error::Internal(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn snapshot_reflects_recorded_counters() {
		let metrics = Metrics::new();

		metrics.record_request("catalog");
		metrics.record_cache_hit();
		metrics.record_cache_miss();
		metrics.set_cache_size(42);

		let snapshot = metrics.snapshot();

		assert_eq!(snapshot.requests_total, 1);
		assert_eq!(snapshot.cache_hits_total, 1);
		assert_eq!(snapshot.cache_misses_total, 1);
		assert_eq!(snapshot.cache_size, 42);
	}
}
