//! Category-name resolution for the manifest and catalog endpoints (spec §4.6: "localised, then
//! static, then fuzzy (substring / word-bag) matching").
//!
//! Neither the teacher nor the rest of the pack models localised category names anywhere, so this
//! table is an explicit authoring decision rather than a grounded port (see `DESIGN.md`).

const STATIC_CATEGORIES: &[(&str, &str)] = &[
	("28", "Action"),
	("12", "Adventure"),
	("16", "Animation"),
	("35", "Comedy"),
	("80", "Crime"),
	("99", "Documentary"),
	("18", "Drama"),
	("10751", "Family"),
	("14", "Fantasy"),
	("36", "History"),
	("27", "Horror"),
	("10402", "Music"),
	("9648", "Mystery"),
	("10749", "Romance"),
	("878", "Science Fiction"),
	("53", "Thriller"),
	("10752", "War"),
	("37", "Western"),
];

/// Per-language overrides, keyed by the primary subtag of a BCP-47-ish locale (e.g. `fr` from
/// `fr-FR`). Categories with no override fall back to [`STATIC_CATEGORIES`].
const LOCALE_OVERRIDES: &[(&str, &[(&str, &str)])] = &[
	("fr", &[("28", "Action"), ("35", "Comédie"), ("18", "Drame"), ("27", "Horreur"), ("99", "Documentaire")]),
	("es", &[("28", "Acción"), ("35", "Comedia"), ("18", "Drama"), ("27", "Terror"), ("99", "Documental")]),
	("de", &[("28", "Action"), ("35", "Komödie"), ("18", "Drama"), ("27", "Horror"), ("99", "Dokumentarfilm")]),
];

fn primary_subtag(locale: &str) -> &str {
	locale.split(['-', '_']).next().unwrap_or(locale)
}

fn locale_table(locale: &str) -> Option<&'static [(&'static str, &'static str)]> {
	let lang = primary_subtag(locale);

	LOCALE_OVERRIDES.iter().find(|(candidate, _)| *candidate == lang).map(|(_, table)| *table)
}

/// Resolve a category id to its display name in `locale`, falling back to the static (English)
/// table when no localised override exists.
pub(crate) fn localised_name(category_id: &str, locale: &str) -> Option<&'static str> {
	if let Some(table) = locale_table(locale)
		&& let Some((_, name)) = table.iter().find(|(id, _)| *id == category_id)
	{
		return Some(name);
	}

	STATIC_CATEGORIES.iter().find(|(id, _)| *id == category_id).map(|(_, name)| *name)
}

/// Resolve a user-supplied category label to its canonical upstream id: first against the
/// localised table, then the static table, then a fuzzy substring/word-bag match; `query` passed
/// through unchanged when it already looks like a raw id (spec §4.6).
pub(crate) fn resolve_category_id(query: &str, locale: &str) -> Option<String> {
	let trimmed = query.trim();
	if trimmed.is_empty() {
		return None;
	}

	if STATIC_CATEGORIES.iter().any(|(id, _)| *id == trimmed) {
		return Some(trimmed.to_string());
	}

	let query_lower = trimmed.to_ascii_lowercase();

	if let Some(table) = locale_table(locale)
		&& let Some((id, _)) = table.iter().find(|(_, name)| name.to_ascii_lowercase() == query_lower)
	{
		return Some((*id).to_string());
	}

	if let Some((id, _)) =
		STATIC_CATEGORIES.iter().find(|(_, name)| name.to_ascii_lowercase() == query_lower)
	{
		return Some((*id).to_string());
	}

	fuzzy_match(&query_lower, locale_table(locale).unwrap_or(&[]))
		.or_else(|| fuzzy_match(&query_lower, STATIC_CATEGORIES))
}

fn fuzzy_match(query_lower: &str, table: &[(&str, &str)]) -> Option<String> {
	// Substring match either direction, then a word-bag (any shared token) match.
	if let Some((id, _)) =
		table.iter().find(|(_, name)| name.to_ascii_lowercase().contains(query_lower))
	{
		return Some((*id).to_string());
	}

	let query_words: Vec<&str> = query_lower.split_whitespace().collect();

	table
		.iter()
		.find(|(_, name)| {
			let name_lower = name.to_ascii_lowercase();
			query_words.iter().any(|word| name_lower.split_whitespace().any(|token| token == *word))
		})
		.map(|(id, _)| (*id).to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_exact_static_name_case_insensitively() {
		assert_eq!(resolve_category_id("horror", "en-US").as_deref(), Some("27"));
	}

	#[test]
	fn resolves_localised_name_before_falling_back_to_static() {
		assert_eq!(resolve_category_id("Horreur", "fr-FR").as_deref(), Some("27"));
	}

	#[test]
	fn passes_through_a_raw_id() {
		assert_eq!(resolve_category_id("28", "en-US").as_deref(), Some("28"));
	}

	#[test]
	fn fuzzy_substring_match_finds_science_fiction() {
		assert_eq!(resolve_category_id("sci-fi science", "en-US").as_deref(), Some("878"));
	}

	#[test]
	fn unknown_label_resolves_to_none() {
		assert!(resolve_category_id("not-a-genre", "en-US").is_none());
	}

	#[test]
	fn localised_name_falls_back_to_static_table() {
		assert_eq!(localised_name("28", "ja-JP"), Some("Action"));
	}
}
