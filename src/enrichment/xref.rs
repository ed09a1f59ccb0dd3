//! Cross-reference resolution: content-database id to external id (spec §4.5 step 2).
//!
//! Resolution is a pure lookup against the user's own hints (opaque to the core per
//! [`crate::collaborators::UserConfig::cross_reference_hints`]); a miss never fails the response.

// std
use std::collections::HashMap;
// self
use crate::enrichment::CatalogItem;

/// Resolve `item.external_id` from `hints`, leaving it untouched on a miss.
pub fn resolve(item: &mut CatalogItem, hints: &HashMap<String, String>) {
	if item.external_id.is_some() {
		return;
	}

	item.external_id = hints.get(&item.id).cloned();
}

#[cfg(test)]
mod tests {
	use super::*;

	fn item() -> CatalogItem {
		CatalogItem {
			id: "content-42".into(),
			categories: Vec::new(),
			poster: None,
			external_id: None,
			rating: None,
			popularity_rank: 0,
			extra: HashMap::new(),
		}
	}

	#[test]
	fn resolves_from_hints() {
		let mut item = item();
		let hints = HashMap::from([("content-42".to_string(), "tt0000042".to_string())]);

		resolve(&mut item, &hints);

		assert_eq!(item.external_id.as_deref(), Some("tt0000042"));
	}

	#[test]
	fn miss_leaves_external_id_none() {
		let mut item = item();

		resolve(&mut item, &HashMap::new());

		assert!(item.external_id.is_none());
	}
}
