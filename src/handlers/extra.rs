//! Parsing for the catalog/meta "extra" path segment (spec §4.6, §6 "Extra segment syntax").

// crates.io
use url::form_urlencoded;
// self
use crate::enrichment::dates::DatePreset;

/// Fields recognised from an extra segment; unknown keys are ignored (spec §6).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtraParams {
	/// Pagination offset (`skip`), if present and parseable as a non-negative integer.
	pub skip: Option<u64>,
	/// Free-text search query.
	pub search: Option<String>,
	/// Category labels from a comma-separated `genre` value.
	pub genre: Vec<String>,
	/// Preferred display language, BCP-47-ish.
	pub display_language: Option<String>,
	/// Dynamic date preset (`lastNDays` or `yearToDate`), resolved at request time (spec §4.5
	/// step 1).
	pub date_preset: Option<DatePreset>,
}

/// Parse a `k1=v1&k2=v2&...` extra segment, percent-decoding keys and values.
pub fn parse(extra: &str) -> ExtraParams {
	let mut params = ExtraParams::default();

	for (key, value) in form_urlencoded::parse(extra.as_bytes()) {
		match key.as_ref() {
			"skip" => params.skip = value.parse().ok(),
			"search" if !value.is_empty() => params.search = Some(value.into_owned()),
			"genre" if !value.is_empty() =>
				params.genre = value.split(',').map(str::to_string).collect(),
			"displayLanguage" if !value.is_empty() => params.display_language = Some(value.into_owned()),
			"datePreset" if !value.is_empty() => params.date_preset = parse_date_preset(&value),
			_ => {},
		}
	}

	params
}

/// Parse the `datePreset` extra value: `lastNDays:<n>` or `yearToDate`. Unrecognised values are
/// ignored rather than rejected, matching `skip`'s non-numeric handling.
fn parse_date_preset(value: &str) -> Option<DatePreset> {
	if value == "yearToDate" {
		return Some(DatePreset::YearToDate);
	}

	value.strip_prefix("lastNDays:").and_then(|days| days.parse().ok()).map(DatePreset::LastNDays)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_recognised_keys() {
		let params = parse("skip=20&genre=28,12&displayLanguage=fr-FR&search=matrix");

		assert_eq!(params.skip, Some(20));
		assert_eq!(params.genre, vec!["28".to_string(), "12".to_string()]);
		assert_eq!(params.display_language.as_deref(), Some("fr-FR"));
		assert_eq!(params.search.as_deref(), Some("matrix"));
	}

	#[test]
	fn ignores_unknown_keys_and_percent_decodes() {
		let params = parse("search=star%20wars&bogus=1");

		assert_eq!(params.search.as_deref(), Some("star wars"));
	}

	#[test]
	fn empty_segment_yields_defaults() {
		assert_eq!(parse(""), ExtraParams::default());
	}

	#[test]
	fn parses_last_n_days_date_preset() {
		let params = parse("datePreset=lastNDays:30");
		assert_eq!(params.date_preset, Some(DatePreset::LastNDays(30)));
	}

	#[test]
	fn parses_year_to_date_preset() {
		let params = parse("datePreset=yearToDate");
		assert_eq!(params.date_preset, Some(DatePreset::YearToDate));
	}

	#[test]
	fn unrecognised_date_preset_is_ignored() {
		let params = parse("datePreset=bogus");
		assert_eq!(params.date_preset, None);
	}

	#[test]
	fn non_numeric_skip_is_ignored_rather_than_rejected() {
		let params = parse("skip=not-a-number");

		assert_eq!(params.skip, None);
	}
}
