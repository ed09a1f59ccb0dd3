//! Materialised ratings snapshot (spec §4.4): the unit swapped atomically by the engine.

// std
use std::collections::HashMap;
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// A single title's aggregate rating, as imported from the dataset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rating {
	/// Mean rating, 0.0-10.0.
	pub average: f32,
	/// Number of votes backing `average`.
	pub votes: u32,
}

/// The live (or staged) set of ratings, plus the metadata needed to decide whether a future
/// ingest can be skipped (spec §4.4 step 2, conditional fetch via source tag).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RatingsSnapshot {
	pub(crate) ratings: HashMap<String, Rating>,
	/// Opaque tag identifying the dataset revision this snapshot was built from (an HTTP ETag).
	pub source_tag: Option<String>,
	/// When this snapshot was imported, if it has ever been populated.
	pub imported_at: Option<DateTime<Utc>>,
}
impl RatingsSnapshot {
	/// Number of titles held in this snapshot.
	pub fn len(&self) -> usize {
		self.ratings.len()
	}

	/// Whether this snapshot holds no titles.
	pub fn is_empty(&self) -> bool {
		self.ratings.is_empty()
	}

	/// Look up a single title by id.
	pub fn lookup(&self, title_id: &str) -> Option<Rating> {
		self.ratings.get(title_id).copied()
	}

	/// Look up several titles at once, omitting ids with no recorded rating.
	pub fn lookup_many(&self, title_ids: &[String]) -> HashMap<String, Rating> {
		title_ids
			.iter()
			.filter_map(|id| self.ratings.get(id).map(|rating| (id.clone(), *rating)))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> RatingsSnapshot {
		let mut ratings = HashMap::new();
		ratings.insert("tt0000001".to_string(), Rating { average: 5.7, votes: 2000 });
		ratings.insert("tt0000002".to_string(), Rating { average: 8.1, votes: 50_000 });

		RatingsSnapshot { ratings, source_tag: Some("\"abc\"".into()), imported_at: Some(Utc::now()) }
	}

	#[test]
	fn lookup_many_omits_unknown_ids() {
		let snapshot = sample();
		let found = snapshot.lookup_many(&["tt0000001".into(), "tt9999999".into()]);

		assert_eq!(found.len(), 1);
		assert_eq!(found["tt0000001"].votes, 2000);
	}

	#[test]
	fn lookup_is_none_for_unknown_id() {
		assert!(sample().lookup("tt0000000").is_none());
	}
}
