//! Observability: in-process counters/gauges plus optional `metrics` crate emission, with
//! bounded per-endpoint label cardinality (spec §4.7).

pub mod cardinality;
pub mod metrics;

pub use self::metrics::{Metrics, MetricsSnapshot};
#[cfg(feature = "prometheus")] pub use self::metrics::install_default_exporter;
