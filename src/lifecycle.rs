//! Graceful Lifecycle: startup dependency classification, `DEGRADED` tracking, and cooperative
//! shutdown (spec §4.8), grounded in the teacher's init/teardown discipline ("singletons are
//! permitted only behind explicit init/teardown contracts").

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use tokio::sync::watch;
// self
use crate::_prelude::*;

/// Deadline allowed for in-flight requests to drain before a forced shutdown.
pub const DEFAULT_DRAIN_DEADLINE: Duration = Duration::from_secs(30);

/// Non-critical subsystem a [`Runtime`] tracks degradation for. The encryption configuration is
/// the sole CRITICAL dependency (spec §4.8); it is validated by [`crate::config::Config::validate`]
/// before a `Runtime` is ever constructed; a failure there aborts startup rather than degrading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Subsystem {
	/// The Response Cache's shared (Redis) backend.
	CacheBackend,
	/// The Ratings Engine's shared snapshot store.
	RatingsStore,
	/// The scheduled ratings ingest task.
	RatingsIngest,
}

/// Process-wide startup/shutdown state: which non-critical subsystems are degraded, and a
/// cooperative shutdown signal honoured by background tasks (spec §4.8, §5 cancellation points).
pub struct Runtime {
	cache_backend_degraded: AtomicBool,
	ratings_store_degraded: AtomicBool,
	ratings_ingest_degraded: AtomicBool,
	shutdown_tx: watch::Sender<bool>,
	drain_deadline: Duration,
	started_at: Instant,
}
impl Runtime {
	/// Construct a runtime with the default drain deadline.
	pub fn new() -> Self {
		Self::with_drain_deadline(DEFAULT_DRAIN_DEADLINE)
	}

	/// Construct a runtime with an explicit drain deadline.
	pub fn with_drain_deadline(drain_deadline: Duration) -> Self {
		let (shutdown_tx, _) = watch::channel(false);

		Self {
			cache_backend_degraded: AtomicBool::new(false),
			ratings_store_degraded: AtomicBool::new(false),
			ratings_ingest_degraded: AtomicBool::new(false),
			shutdown_tx,
			drain_deadline,
			started_at: Instant::now(),
		}
	}

	/// Mark `subsystem` degraded, recording the reason (spec §4.8 "records it"); the process keeps
	/// accepting traffic.
	pub fn mark_degraded(&self, subsystem: Subsystem, reason: &str) {
		tracing::warn!(?subsystem, reason, "non-critical subsystem degraded, continuing to accept traffic");
		self.flag(subsystem).store(true, Ordering::Relaxed);
	}

	/// Clear a subsystem's degraded flag (e.g. once a shared backend recovers).
	pub fn clear_degraded(&self, subsystem: Subsystem) {
		self.flag(subsystem).store(false, Ordering::Relaxed);
	}

	/// Whether any non-critical subsystem is currently degraded.
	pub fn is_degraded(&self) -> bool {
		self.cache_backend_degraded.load(Ordering::Relaxed)
			|| self.ratings_store_degraded.load(Ordering::Relaxed)
			|| self.ratings_ingest_degraded.load(Ordering::Relaxed)
	}

	/// Per-subsystem degraded flags, surfaced via `/health`.
	pub fn degraded_flags(&self) -> Vec<(Subsystem, bool)> {
		vec![
			(Subsystem::CacheBackend, self.cache_backend_degraded.load(Ordering::Relaxed)),
			(Subsystem::RatingsStore, self.ratings_store_degraded.load(Ordering::Relaxed)),
			(Subsystem::RatingsIngest, self.ratings_ingest_degraded.load(Ordering::Relaxed)),
		]
	}

	/// Wall-clock time since this runtime was constructed, surfaced via `/api/status`.
	pub fn uptime(&self) -> Duration {
		self.started_at.elapsed()
	}

	/// Subscribe to the shutdown signal; background tasks select on this alongside their own work
	/// (spec §4.8 "cancels scheduled work").
	pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
		self.shutdown_tx.subscribe()
	}

	/// Begin cooperative shutdown: flip the shutdown signal, then wait up to the configured drain
	/// deadline for `drain` to resolve (spec §4.8 "drains in-flight requests up to a deadline").
	pub async fn shutdown<F>(&self, drain: F)
	where
		F: std::future::Future<Output = ()>,
	{
		let _ = self.shutdown_tx.send(true);

		if tokio::time::timeout(self.drain_deadline, drain).await.is_err() {
			tracing::warn!(deadline = ?self.drain_deadline, "drain deadline exceeded, shutting down anyway");
		}
	}

	fn flag(&self, subsystem: Subsystem) -> &AtomicBool {
		match subsystem {
			Subsystem::CacheBackend => &self.cache_backend_degraded,
			Subsystem::RatingsStore => &self.ratings_store_degraded,
			Subsystem::RatingsIngest => &self.ratings_ingest_degraded,
		}
	}
}
impl Default for Runtime {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn starts_with_no_subsystem_degraded() {
		let runtime = Runtime::new();

		assert!(!runtime.is_degraded());
	}

	#[test]
	fn marking_one_subsystem_degraded_is_observable() {
		let runtime = Runtime::new();

		runtime.mark_degraded(Subsystem::CacheBackend, "redis connection refused");

		assert!(runtime.is_degraded());
		assert!(runtime.degraded_flags().iter().any(|(s, d)| *s == Subsystem::CacheBackend && *d));

		runtime.clear_degraded(Subsystem::CacheBackend);

		assert!(!runtime.is_degraded());
	}

	#[tokio::test]
	async fn shutdown_flips_signal_and_waits_for_drain() {
		let runtime = Runtime::with_drain_deadline(Duration::from_millis(200));
		let mut signal = runtime.shutdown_signal();

		runtime.shutdown(async { tokio::time::sleep(Duration::from_millis(10)).await }).await;

		assert!(*signal.borrow_and_update());
	}
}
