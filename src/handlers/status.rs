//! `/health` and `/api/status` (spec §4.8, §6): liveness/degradation and coarse runtime counters.

// crates.io
use axum::extract::State;
use serde::Serialize;
// self
use crate::{app::AppState, lifecycle::Subsystem};

#[derive(Debug, Serialize)]
struct SubsystemFlag {
	name: &'static str,
	degraded: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	healthy: bool,
	degraded: bool,
	subsystems: Vec<SubsystemFlag>,
}

/// Liveness probe: always `200`, reporting whether any non-critical subsystem is degraded rather
/// than failing the probe (spec §4.8 "the process keeps accepting traffic").
pub async fn health(State(state): State<AppState>) -> axum::Json<HealthResponse> {
	let subsystems = state
		.runtime
		.degraded_flags()
		.into_iter()
		.map(|(subsystem, degraded)| SubsystemFlag { name: subsystem_name(subsystem), degraded })
		.collect();

	axum::Json(HealthResponse { healthy: true, degraded: state.runtime.is_degraded(), subsystems })
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
	version: &'static str,
	channel: &'static str,
	commit: &'static str,
	#[serde(rename = "uptimeSecs")]
	uptime_secs: u64,
	#[serde(rename = "cacheBackend")]
	cache_backend: &'static str,
	#[cfg(feature = "metrics")]
	counters: crate::observability::metrics::MetricsSnapshot,
}

/// Coarse operational snapshot: version/build identity, uptime, configured backends, and (when the
/// `metrics` feature is enabled) the in-process counter snapshot (spec §4.7, §6).
pub async fn status(State(state): State<AppState>) -> axum::Json<StatusResponse> {
	#[cfg(feature = "metrics")]
	let _ = state.response_cache.stats().await;

	axum::Json(StatusResponse {
		version: env!("CARGO_PKG_VERSION"),
		channel: if cfg!(debug_assertions) { "dev" } else { "release" },
		commit: option_env!("CATALOG_CACHE_COMMIT").unwrap_or("unknown"),
		uptime_secs: state.runtime.uptime().as_secs(),
		cache_backend: match state.config.cache_backend {
			crate::config::CacheBackendKind::InProcess => "inprocess",
			crate::config::CacheBackendKind::Shared => "shared",
		},
		#[cfg(feature = "metrics")]
		counters: state.metrics.snapshot(),
	})
}

fn subsystem_name(subsystem: Subsystem) -> &'static str {
	match subsystem {
		Subsystem::CacheBackend => "cache_backend",
		Subsystem::RatingsStore => "ratings_store",
		Subsystem::RatingsIngest => "ratings_ingest",
	}
}
