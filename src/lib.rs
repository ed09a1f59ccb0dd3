//! Serving-path caching, coalescing, and rate-limiting subsystem for a personalised media
//! catalog provider, plus the IMDb ratings bulk-ingest engine that enriches every response.

#![deny(clippy::all, unused_crate_dependencies)]

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod config_cache;
pub mod enrichment;
pub mod fingerprint;
pub mod handlers;
pub mod lifecycle;
#[cfg(feature = "metrics")] pub mod observability;
pub mod ratings;
pub mod security;
pub mod upstream;

mod app;
mod error;

// Consumed by `src/bin/server.rs`, not by the library target itself.
use tracing_subscriber as _;
mod _prelude {
	pub use std::{
		sync::Arc,
		time::{Duration, SystemTime},
	};

	pub use chrono::{DateTime, TimeDelta, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")]
pub use crate::observability::metrics::install_default_exporter;
pub use crate::{
	app::{AppState, build_router},
	error::{Error, ErrorKind, Result},
};

#[cfg(test)]
mod _test {
	use metrics_util as _;
	use wiremock as _;
}
