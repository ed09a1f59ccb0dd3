//! Enrichment Pipeline: combines Upstream Client output with the Ratings Engine and the user's
//! cross-reference hints to produce the client's catalog/meta schema (spec §4.5).

// std
use std::collections::HashMap;
// self
use crate::_prelude::*;

pub mod dates;
pub mod filters;
pub mod pipeline;
pub mod poster;
pub mod xref;

pub use self::pipeline::{EnrichmentContext, MAX_SHUFFLE_PAGE, choose_shuffled_page_index, enrich_page};

/// A single catalog result, as normalised from the upstream content database.
///
/// Fields the core does not interpret (title, description, cast, etc.) are preserved verbatim in
/// `extra` so enrichment is additive rather than lossy.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct CatalogItem {
	/// Upstream content-database identifier.
	pub id: String,
	/// Category identifiers attached to this item (spec §4.5 step 3 post-filter input).
	#[serde(default)]
	pub categories: Vec<String>,
	/// Poster URL as supplied by the upstream, if any.
	#[serde(default)]
	pub poster: Option<String>,
	/// External (e.g. IMDb) identifier, resolved by cross-reference lookup when absent.
	#[serde(default)]
	pub external_id: Option<String>,
	/// Attached rating, populated by [`enrich_page`] via `RatingsEngine::lookup_many`.
	#[serde(default)]
	pub rating: Option<crate::ratings::Rating>,
	/// Stable upstream rank, used to preserve order under popularity-descending sort.
	#[serde(default)]
	pub popularity_rank: u32,
	/// Fields not modelled by the core, passed through unchanged.
	#[serde(flatten)]
	pub extra: HashMap<String, serde_json::Value>,
}

/// A catalog page as returned by the upstream, before enrichment.
///
/// This is the shape cached by [`crate::cache::manager::ResponseCache`]: caching happens before
/// per-user enrichment (cross-reference hints, exclusions, poster overrides) so that one upstream
/// fetch serves every user requesting the same catalog/locale, and enrichment runs fresh on every
/// request from the cached or freshly-fetched page.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct CatalogPage {
	/// Items in upstream order.
	pub items: Vec<CatalogItem>,
	/// Upstream-reported total result count (spec §4.5 step 3: left unadjusted by post-filtering,
	/// per the documented Open Question decision — see `DESIGN.md`).
	pub total_results: u64,
}
