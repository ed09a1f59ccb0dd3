//! Per-catalog poster-service overrides and placeholder substitution (spec §4.5 steps 5-6).

// std
use std::collections::HashMap;
// crates.io
use url::Url;
// self
use crate::{_prelude::*, enrichment::CatalogItem};

/// Whether the poster-service override is enabled for `catalog_id`.
///
/// `overrides` maps catalog id to an explicit true/false; a missing entry defers to
/// `global_default` (spec §4.5 step 5: "null -> use global; true/false -> override").
fn poster_service_enabled(catalog_id: &str, overrides: &HashMap<String, bool>, global_default: bool) -> bool {
	overrides.get(catalog_id).copied().unwrap_or(global_default)
}

/// Apply the poster-service override for one item, then substitute `placeholder_url` (resolved
/// against `request_base_url`) if the item still has no poster (spec §4.5 step 6).
pub fn apply(
	item: &mut CatalogItem,
	catalog_id: &str,
	overrides: &HashMap<String, bool>,
	global_default: bool,
	placeholder_url: &Url,
) {
	if !poster_service_enabled(catalog_id, overrides, global_default) {
		item.poster = None;
	}

	if item.poster.as_deref().is_none_or(str::is_empty) {
		item.poster = Some(placeholder_url.to_string());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn item() -> CatalogItem {
		CatalogItem {
			id: "a".into(),
			categories: Vec::new(),
			poster: None,
			external_id: None,
			rating: None,
			popularity_rank: 0,
			extra: HashMap::new(),
		}
	}

	#[test]
	fn substitutes_placeholder_when_no_poster() {
		let mut item = item();
		let placeholder = Url::parse("https://example.invalid/placeholder.png").unwrap();

		apply(&mut item, "top250", &HashMap::new(), true, &placeholder);

		assert_eq!(item.poster.as_deref(), Some(placeholder.as_str()));
	}

	#[test]
	fn override_false_clears_an_upstream_poster() {
		let mut item = item();
		item.poster = Some("https://upstream.invalid/poster.jpg".into());
		let overrides = HashMap::from([("top250".to_string(), false)]);
		let placeholder = Url::parse("https://example.invalid/placeholder.png").unwrap();

		apply(&mut item, "top250", &overrides, true, &placeholder);

		assert_eq!(item.poster.as_deref(), Some(placeholder.as_str()));
	}
}
