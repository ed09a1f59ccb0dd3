//! Composes a catalog page: cross-reference resolution, post-filtering, ratings attachment,
//! poster policy, and the popularity/shuffle tie-break rules (spec §4.5).

// std
use std::collections::HashMap;
// crates.io
use rand::seq::SliceRandom;
use url::Url;
// self
use crate::{
	enrichment::{CatalogItem, CatalogPage, dates::DateWindow, filters, poster, xref},
	ratings::RatingsEngine,
};

/// Upper bound on the page index drawn for shuffled catalogs (spec §4.5 tie-break rules).
pub const MAX_SHUFFLE_PAGE: u32 = 500;

/// Per-request context threaded through enrichment; borrowed collaborators only, per spec §1
/// ("everything else is an external collaborator").
pub struct EnrichmentContext<'a> {
	/// Ratings Engine used for the bulk `lookupMany` call (spec §4.5 step 4).
	pub ratings: &'a RatingsEngine,
	/// Categories excluded for this user (spec §4.5 step 3).
	pub excluded_categories: &'a [String],
	/// This user's cross-reference hints (spec §4.5 step 2).
	pub cross_reference_hints: &'a HashMap<String, String>,
	/// Catalog being served, used to resolve the poster-service override.
	pub catalog_id: &'a str,
	/// Per-catalog poster-service overrides (spec §4.5 step 5).
	pub poster_overrides: &'a HashMap<String, bool>,
	/// Global default when a catalog has no explicit override.
	pub poster_service_global_default: bool,
	/// Placeholder poster substituted when an item still lacks one (spec §4.5 step 6).
	pub placeholder_poster_url: &'a Url,
	/// Whether this user opted into shuffled catalog order (spec §4.5 tie-break rules).
	pub shuffle_enabled: bool,
	/// Resolved date window for a dynamic date-preset filter, if the request named one (spec
	/// §4.5 step 1).
	pub date_window: Option<DateWindow>,
}

/// Enrich one fetched catalog page in place, per spec §4.5 steps 1-6.
///
/// `total_results` is left unchanged by the post-filter (Open Question decision, see
/// `DESIGN.md`); pagination therefore reflects the upstream total, not the post-filtered count.
pub fn enrich_page(mut page: CatalogPage, ctx: &EnrichmentContext<'_>) -> CatalogPage {
	page.items = filters::filter_by_date_window(page.items, ctx.date_window);

	for item in &mut page.items {
		xref::resolve(item, ctx.cross_reference_hints);
	}

	page.items = filters::exclude_categories(page.items, ctx.excluded_categories);

	attach_ratings(&mut page.items, ctx.ratings);

	for item in &mut page.items {
		poster::apply(
			item,
			ctx.catalog_id,
			ctx.poster_overrides,
			ctx.poster_service_global_default,
			ctx.placeholder_poster_url,
		);
	}

	if ctx.shuffle_enabled {
		page.items.shuffle(&mut rand::rng());
	}
	// Otherwise: stable upstream order is preserved (spec §4.5 "sort key equals popularity
	// descending" tie-break), since nothing above reorders `page.items`.

	page
}

fn attach_ratings(items: &mut [CatalogItem], ratings: &RatingsEngine) {
	let lookup_keys: Vec<String> =
		items.iter().map(|item| item.external_id.clone().unwrap_or_else(|| item.id.clone())).collect();
	let found = ratings.lookup_many(&lookup_keys);

	for (item, key) in items.iter_mut().zip(lookup_keys.iter()) {
		item.rating = found.get(key).copied();
	}
}

/// Draw the page index for a shuffle-enabled catalog request: a bounded uniform draw over
/// `[1, min(total_pages, MAX_SHUFFLE_PAGE)]` (spec §4.5 tie-break rules).
pub fn choose_shuffled_page_index(total_pages: u32) -> u32 {
	let upper = total_pages.min(MAX_SHUFFLE_PAGE).max(1);

	rand::Rng::random_range(&mut rand::rng(), 1..=upper)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Config;

	fn test_config() -> Config {
		Config {
			upstream_base_url: Url::parse("https://content.example.invalid").unwrap(),
			upstream_allowed_domains: Vec::new(),
			cache_backend: crate::config::CacheBackendKind::InProcess,
			cache_max_entries: 1000,
			redis_url: None,
			ratings_backend: crate::config::CacheBackendKind::InProcess,
			ratings_min_votes: 100,
			ratings_refresh_interval: std::time::Duration::from_secs(3600),
			ratings_dataset_url: Url::parse("https://datasets.imdbws.invalid/title.ratings.tsv.gz")
				.unwrap(),
			rate_limit_per_sec: 35.0,
			body_limit_bytes: 1024,
			encryption_key: vec![0u8; 32],
			session_secret: "x".repeat(32),
			placeholder_poster_url: Url::parse("https://example.invalid/p.png").unwrap(),
		}
	}

	fn item(id: &str, categories: &[&str]) -> CatalogItem {
		CatalogItem {
			id: id.into(),
			categories: categories.iter().map(|c| c.to_string()).collect(),
			poster: None,
			external_id: None,
			rating: None,
			popularity_rank: 0,
			extra: HashMap::new(),
		}
	}

	#[test]
	fn excluded_categories_never_appear_and_total_is_unadjusted() {
		let store = std::sync::Arc::new(crate::ratings::InProcessRatingsStore);
		let runtime = std::sync::Arc::new(crate::lifecycle::Runtime::new());
		let ratings = RatingsEngine::new(&test_config(), store, runtime).unwrap();
		let page = CatalogPage { items: vec![item("a", &["28", "12"]), item("b", &["12"])], total_results: 42 };
		let placeholder = test_config().placeholder_poster_url;
		let ctx = EnrichmentContext {
			ratings: &ratings,
			excluded_categories: &["28".to_string()],
			cross_reference_hints: &HashMap::new(),
			catalog_id: "top250",
			poster_overrides: &HashMap::new(),
			poster_service_global_default: true,
			placeholder_poster_url: &placeholder,
			shuffle_enabled: false,
			date_window: None,
		};

		let enriched = enrich_page(page, &ctx);

		assert_eq!(enriched.items.len(), 1);
		assert_eq!(enriched.items[0].id, "b");
		assert_eq!(enriched.total_results, 42);
	}

	#[test]
	fn shuffled_page_index_stays_within_bounds() {
		for _ in 0..50 {
			let index = choose_shuffled_page_index(10);
			assert!((1..=10).contains(&index));
		}

		assert_eq!(choose_shuffled_page_index(0), 1);
	}
}
