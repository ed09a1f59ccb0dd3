//! Single-flight-rate-limited HTTP client for the upstream content database (spec §4.1).

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use sha2::{Digest, Sha256};
use url::Url;
// self
use crate::{
	_prelude::*,
	config::Config,
	upstream::{
		classify::{UpstreamErrorKind, classify_status, classify_text},
		retry::{RetryExecutor, RetryPolicy},
		token_bucket::TokenBucket,
	},
};
#[cfg(feature = "metrics")]
use crate::observability::metrics::Metrics;

/// A successfully fetched upstream payload.
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
	/// Raw response body bytes.
	pub payload: bytes::Bytes,
	/// SHA-256 digest of `payload`, computed once and reused for self-healing checks.
	pub digest: [u8; 32],
	/// Retry-after delay advertised by the upstream, if any.
	pub retry_after: Option<Duration>,
}

/// Single-flight, rate-limited, retrying HTTP client for the content database.
#[derive(Debug)]
pub struct UpstreamClient {
	http: reqwest::Client,
	base_url: Url,
	allowed_domains: Vec<String>,
	bucket: TokenBucket,
	retry_policy: RetryPolicy,
	in_flight: AtomicU64,
	#[cfg(feature = "metrics")]
	metrics: Option<Arc<Metrics>>,
}
impl UpstreamClient {
	/// Construct a client for the given configuration.
	pub fn new(config: &Config) -> Result<Self> {
		crate::security::enforce_https(&config.upstream_base_url)?;

		let http = reqwest::Client::builder()
			.redirect(reqwest::redirect::Policy::limited(5))
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.connect_timeout(Duration::from_secs(5))
			.build()?;

		Ok(Self {
			http,
			base_url: config.upstream_base_url.clone(),
			allowed_domains: config.upstream_allowed_domains.clone(),
			bucket: TokenBucket::new(config.rate_limit_per_sec, config.rate_limit_per_sec),
			retry_policy: RetryPolicy::default(),
			in_flight: AtomicU64::new(0),
			#[cfg(feature = "metrics")]
			metrics: None,
		})
	}

	/// Attach a metrics sink; call counts, classified errors, latency, and the in-flight gauge are
	/// recorded against it from then on.
	#[cfg(feature = "metrics")]
	pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
		self.metrics = Some(metrics);
		self
	}

	/// Number of upstream calls currently in flight (observability gauge).
	pub fn in_flight(&self) -> u64 {
		self.in_flight.load(Ordering::Relaxed)
	}

	fn record_in_flight_gauge(&self) {
		#[cfg(feature = "metrics")]
		if let Some(metrics) = &self.metrics {
			metrics.set_upstream_in_flight(self.in_flight.load(Ordering::Relaxed));
		}
	}

	/// Issue a rate-limited, retried GET request for `endpoint` with query `params`.
	#[tracing::instrument(skip(self, params), fields(endpoint))]
	pub async fn fetch(
		&self,
		endpoint: &str,
		params: &[(&str, &str)],
	) -> std::result::Result<UpstreamResponse, UpstreamErrorKind> {
		let url = self.build_url(endpoint, params).map_err(|_| UpstreamErrorKind::Malformed)?;
		let mut executor = RetryExecutor::new(&self.retry_policy);
		let started_at = Instant::now();

		loop {
			self.bucket.acquire().await;

			self.in_flight.fetch_add(1, Ordering::Relaxed);
			self.record_in_flight_gauge();

			#[cfg(feature = "metrics")]
			if let Some(metrics) = &self.metrics {
				metrics.record_upstream_call();
			}

			let attempt = self.attempt(&url, executor.attempt_timeout()).await;

			self.in_flight.fetch_sub(1, Ordering::Relaxed);
			self.record_in_flight_gauge();

			match attempt {
				Ok(response) => {
					#[cfg(feature = "metrics")]
					if let Some(metrics) = &self.metrics {
						metrics.record_latency(endpoint, started_at.elapsed());
					}

					return Ok(response);
				},
				Err((kind, retry_after)) => {
					#[cfg(feature = "metrics")]
					if let Some(metrics) = &self.metrics {
						metrics.record_classified_error(kind);
					}

					if let Some(delay) = retry_after {
						self.bucket.drain_until(Instant::now() + delay).await;
					}

					let retryable = matches!(kind, UpstreamErrorKind::Transient | UpstreamErrorKind::Timeout);

					if !retryable || !executor.can_retry() {
						tracing::warn!(?kind, endpoint, "upstream fetch failed, no more retries");

						#[cfg(feature = "metrics")]
						if let Some(metrics) = &self.metrics {
							metrics.record_latency(endpoint, started_at.elapsed());
						}

						return Err(kind);
					}

					tracing::debug!(?kind, endpoint, "upstream fetch failed, retrying");
					executor.sleep_backoff().await;
				},
			}
		}
	}

	/// Batched helper issuing one [`fetch`](Self::fetch) per id, in order.
	pub async fn fetch_many(
		&self,
		endpoint: &str,
		ids: &[&str],
	) -> Vec<std::result::Result<UpstreamResponse, UpstreamErrorKind>> {
		let mut results = Vec::with_capacity(ids.len());

		for id in ids {
			results.push(self.fetch(endpoint, &[("id", id)]).await);
		}

		results
	}

	fn build_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url> {
		let mut url = self.base_url.join(endpoint)?;

		if let Some(host) = url.host_str()
			&& !crate::security::host_is_allowed(host, &self.allowed_domains)
		{
			return Err(Error::Validation {
				field: "endpoint",
				reason: format!("Host '{host}' is not within the upstream allowlist."),
			});
		}

		{
			let mut query = url.query_pairs_mut();

			for (key, value) in params {
				query.append_pair(key, value);
			}
		}

		Ok(url)
	}

	async fn attempt(
		&self,
		url: &Url,
		timeout: Duration,
	) -> std::result::Result<UpstreamResponse, (UpstreamErrorKind, Option<Duration>)> {
		let start = Instant::now();
		let response = self.http.get(url.clone()).timeout(timeout).send().await;

		let response = match response {
			Ok(response) => response,
			Err(err) if err.is_timeout() => return Err((UpstreamErrorKind::Timeout, None)),
			Err(_) => return Err((UpstreamErrorKind::Transient, None)),
		};

		let retry_after = response
			.headers()
			.get(reqwest::header::RETRY_AFTER)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.parse::<u64>().ok())
			.map(Duration::from_secs);

		let status = response.status();

		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			let kind = if body.is_empty() { classify_status(status) } else { classify_text(&body) };

			return Err((kind, retry_after));
		}

		let payload = response.bytes().await.map_err(|_| (UpstreamErrorKind::Malformed, None))?;
		let digest: [u8; 32] = Sha256::digest(&payload).into();

		tracing::debug!(elapsed = ?start.elapsed(), bytes = payload.len(), "upstream fetch complete");

		Ok(UpstreamResponse { payload, digest, retry_after })
	}
}
