//! `RatingsEngine`: the pointer-swap front for the ratings dataset (spec §4.4 "MEMORY" variant),
//! generalising the teacher's `RwLock`-guarded provider state (`registry.rs`) from a map of
//! per-tenant handles to a single swappable snapshot.

// std
use std::collections::HashMap;
// crates.io
use url::Url;
// self
use crate::{
	_prelude::*,
	config::Config,
	lifecycle::{Runtime, Subsystem},
	ratings::{
		backend::RatingsStore,
		ingest::{self, IngestOutcome},
		store::{Rating, RatingsSnapshot},
	},
};
#[cfg(feature = "metrics")]
use crate::observability::metrics::Metrics;

/// Lifecycle state of the ratings engine (spec §4.4 state machine).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RatingsState {
	/// No snapshot has ever been imported; lookups return misses without blocking.
	Uninitialised,
	/// The first import is in flight.
	Loading,
	/// A snapshot is live and was imported without error.
	Ready,
	/// A later import attempt is in flight; the previous snapshot remains live.
	Refreshing,
	/// A later import attempt failed; the previous snapshot remains live but is stale.
	ReadyStale,
}

/// Holds the live ratings snapshot behind a lock held only for the duration of the pointer swap
/// or clone, and drives periodic re-ingest.
pub struct RatingsEngine {
	snapshot: std::sync::RwLock<Arc<RatingsSnapshot>>,
	state: std::sync::RwLock<RatingsState>,
	http: reqwest::Client,
	dataset_url: Url,
	min_votes: u32,
	store: Arc<dyn RatingsStore>,
	runtime: Arc<Runtime>,
	#[cfg(feature = "metrics")]
	metrics: Option<Arc<Metrics>>,
}
impl RatingsEngine {
	/// Construct an engine pointed at the dataset URL named in `config`, publishing/adopting
	/// snapshots through `store` (spec §4.4 "MEMORY"/"SHARED" variants). No ingest has run yet;
	/// [`RatingsEngine::state`] is [`RatingsState::Uninitialised`] until
	/// [`RatingsEngine::run_ingest_once`] is first called.
	pub fn new(config: &Config, store: Arc<dyn RatingsStore>, runtime: Arc<Runtime>) -> Result<Self> {
		let http = reqwest::Client::builder()
			.connect_timeout(Duration::from_secs(10))
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.build()?;

		Ok(Self {
			snapshot: std::sync::RwLock::new(Arc::new(RatingsSnapshot::default())),
			state: std::sync::RwLock::new(RatingsState::Uninitialised),
			http,
			dataset_url: config.ratings_dataset_url.clone(),
			min_votes: config.ratings_min_votes,
			store,
			runtime,
			#[cfg(feature = "metrics")]
			metrics: None,
		})
	}

	/// Attach a metrics sink; ingest outcomes and the live rating-set-size gauge are recorded
	/// against it from then on.
	#[cfg(feature = "metrics")]
	pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
		self.metrics = Some(metrics);
		self
	}

	/// Current lifecycle state, observable for stats (spec §4.4 "READY-STALE is observable via
	/// stats").
	pub fn state(&self) -> RatingsState {
		*self.state.read().expect("lock poisoned")
	}

	/// Number of titles in the currently live snapshot.
	pub fn len(&self) -> usize {
		self.current().len()
	}

	/// Look up a single title. Always non-blocking, including while [`RatingsState::Uninitialised`]
	/// (spec §4.4 "A fresh client lookup on UNINITIALISED returns a miss").
	pub fn lookup(&self, title_id: &str) -> Option<Rating> {
		self.current().lookup(title_id)
	}

	/// Look up several titles at once.
	pub fn lookup_many(&self, title_ids: &[String]) -> HashMap<String, Rating> {
		self.current().lookup_many(title_ids)
	}

	fn current(&self) -> Arc<RatingsSnapshot> {
		self.snapshot.read().expect("lock poisoned").clone()
	}

	/// Run one ingest attempt: conditional fetch, parse, and atomic swap on success (spec §4.4
	/// steps 1-5). Never clears the live snapshot on failure. Marks
	/// [`Subsystem::RatingsIngest`](crate::lifecycle::Subsystem::RatingsIngest) degraded on
	/// failure and clears it on the next success (spec §4.8).
	#[tracing::instrument(skip(self))]
	pub async fn run_ingest_once(&self) -> Result<()> {
		let had_live_set = !matches!(self.state(), RatingsState::Uninitialised | RatingsState::Loading);

		if !had_live_set {
			self.adopt_from_shared_store().await;
		}

		self.set_state(if had_live_set { RatingsState::Refreshing } else { RatingsState::Loading });

		let previous_tag = self.current().source_tag.clone();
		let outcome = ingest::fetch(&self.http, &self.dataset_url, self.min_votes, previous_tag.as_deref()).await;

		match outcome {
			Ok(IngestOutcome::Unchanged) => {
				tracing::debug!("ratings dataset unchanged since last ingest, skipping");
				self.set_state(RatingsState::Ready);
				self.runtime.clear_degraded(Subsystem::RatingsIngest);
				self.record_ingest_outcome(true);

				Ok(())
			},
			Ok(IngestOutcome::Imported { snapshot, rows_imported }) => {
				tracing::info!(rows_imported, "ratings ingest complete");

				if let Err(err) = self.store.publish(&snapshot).await {
					tracing::warn!(error = %err, "failed to publish ratings snapshot to shared store");
					self.runtime.mark_degraded(Subsystem::RatingsStore, "shared ratings store unreachable");
				} else {
					self.runtime.clear_degraded(Subsystem::RatingsStore);
				}

				self.set_live_rating_set_size_gauge(snapshot.len());
				*self.snapshot.write().expect("lock poisoned") = Arc::new(snapshot);
				self.set_state(RatingsState::Ready);
				self.runtime.clear_degraded(Subsystem::RatingsIngest);
				self.record_ingest_outcome(true);

				Ok(())
			},
			Err(err) => {
				tracing::warn!(error = %err, "ratings ingest failed, retaining live set");
				self.set_state(if had_live_set { RatingsState::ReadyStale } else { RatingsState::Uninitialised });
				self.runtime.mark_degraded(Subsystem::RatingsIngest, "ratings dataset ingest failed");
				self.record_ingest_outcome(false);

				Err(err)
			},
		}
	}

	fn record_ingest_outcome(&self, succeeded: bool) {
		#[cfg(feature = "metrics")]
		if let Some(metrics) = &self.metrics {
			metrics.record_ingest_outcome(succeeded);
		}
		#[cfg(not(feature = "metrics"))]
		let _ = succeeded;
	}

	fn set_live_rating_set_size_gauge(&self, size: usize) {
		#[cfg(feature = "metrics")]
		if let Some(metrics) = &self.metrics {
			metrics.set_live_rating_set_size(size as u64);
		}
		#[cfg(not(feature = "metrics"))]
		let _ = size;
	}

	/// Adopt an already-published shared snapshot instead of serving misses until this
	/// instance's own first ingest completes (spec §4.4 "SHARED" variant). A failure or empty
	/// result here is not itself an error: the normal ingest that follows still runs.
	async fn adopt_from_shared_store(&self) {
		match self.store.load().await {
			Ok(Some(snapshot)) if !snapshot.is_empty() => {
				tracing::debug!(len = snapshot.len(), "adopted ratings snapshot from shared store");
				*self.snapshot.write().expect("lock poisoned") = Arc::new(snapshot);
			},
			Ok(_) => {},
			Err(err) => {
				tracing::debug!(error = %err, "no ratings snapshot adopted from shared store");
			},
		}
	}

	/// Spawn the periodic ingest scheduler on the current Tokio runtime. The first tick fires
	/// immediately (spec §4.4 "At startup and every N hours").
	pub fn spawn_scheduler(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);

			loop {
				ticker.tick().await;

				if let Err(err) = self.run_ingest_once().await {
					tracing::warn!(error = %err, "scheduled ratings ingest failed");
				}
			}
		})
	}

	fn set_state(&self, state: RatingsState) {
		*self.state.write().expect("lock poisoned") = state;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn test_config() -> Config {
		Config {
			upstream_base_url: Url::parse("https://content.example.invalid").unwrap(),
			upstream_allowed_domains: Vec::new(),
			cache_backend: crate::config::CacheBackendKind::InProcess,
			cache_max_entries: 1000,
			redis_url: None,
			ratings_backend: crate::config::CacheBackendKind::InProcess,
			ratings_min_votes: 100,
			ratings_refresh_interval: Duration::from_secs(3600),
			ratings_dataset_url: Url::parse("https://datasets.imdbws.invalid/title.ratings.tsv.gz")
				.unwrap(),
			rate_limit_per_sec: 35.0,
			body_limit_bytes: 1024,
			encryption_key: vec![0u8; 32],
			session_secret: "x".repeat(32),
			placeholder_poster_url: Url::parse("https://example.invalid/p.png").unwrap(),
		}
	}

	fn test_engine() -> RatingsEngine {
		let store = Arc::new(crate::ratings::inprocess::InProcessRatingsStore);
		let runtime = Arc::new(Runtime::new());

		RatingsEngine::new(&test_config(), store, runtime).unwrap()
	}

	#[test]
	fn starts_uninitialised_and_reports_empty_lookups() {
		let engine = test_engine();

		assert_eq!(engine.state(), RatingsState::Uninitialised);
		assert!(engine.lookup("tt0000001").is_none());
		assert_eq!(engine.len(), 0);
	}
}
