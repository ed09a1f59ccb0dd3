//! Ratings Engine: serves `lookup`/`lookupMany` from a locally materialised copy of a public
//! ratings dataset, kept fresh by a scheduled conditional ingest (spec §4.4).

pub mod backend;
pub mod engine;
pub mod ingest;
pub mod inprocess;
#[cfg(feature = "redis")] pub mod shared;
pub mod store;

pub use self::{
	backend::RatingsStore,
	engine::{RatingsEngine, RatingsState},
	inprocess::InProcessRatingsStore,
	store::{Rating, RatingsSnapshot},
};
#[cfg(feature = "redis")] pub use self::shared::SharedRatingsStore;
