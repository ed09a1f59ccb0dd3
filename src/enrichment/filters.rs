//! Post-filtering for date windows and excluded categories (spec §4.5 steps 1 and 3, §8 property 5).

// self
use crate::enrichment::{CatalogItem, dates::DateWindow};

/// Drop items whose category set intersects `excluded`, even when the upstream request included
/// those categories. Upstream-reported totals are left unadjusted by design (see `DESIGN.md` for
/// the Open Question decision this preserves).
pub fn exclude_categories(items: Vec<CatalogItem>, excluded: &[String]) -> Vec<CatalogItem> {
	if excluded.is_empty() {
		return items;
	}

	items.into_iter().filter(|item| !item.categories.iter().any(|category| excluded.contains(category))).collect()
}

/// Drop items whose `releaseDate` extra field falls outside `window` (spec §4.5 step 1). Items
/// with no parseable `releaseDate` are kept: absence of the field is not evidence the item is out
/// of range.
pub fn filter_by_date_window(items: Vec<CatalogItem>, window: Option<DateWindow>) -> Vec<CatalogItem> {
	let Some(window) = window else {
		return items;
	};

	items
		.into_iter()
		.filter(|item| match item.extra.get("releaseDate").and_then(|value| value.as_str()) {
			Some(raw) => chrono::DateTime::parse_from_rfc3339(raw)
				.map(|dt| window.contains(dt.with_timezone(&chrono::Utc)))
				.unwrap_or(true),
			None => true,
		})
		.collect()
}
