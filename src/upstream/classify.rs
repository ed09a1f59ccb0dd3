//! Upstream error classification (spec §4.1, §7, §8 property 7).
//!
//! Replaces the legacy dynamic-source substring search with a typed enumeration; the
//! word-boundary constraint on the text heuristic exists only to guard call sites that still feed
//! raw response bodies through `classify_text` instead of status codes.

// self
use crate::_prelude::*;

/// Classification of an upstream failure, independent of how it was observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpstreamErrorKind {
	/// Transient failure, safe to retry once with backoff.
	Transient,
	/// Upstream rate limit or quota exhaustion.
	Quota,
	/// Resource does not exist upstream.
	NotFound,
	/// Caller is not authorized upstream.
	Auth,
	/// Response could not be parsed or otherwise violates the expected schema.
	Malformed,
	/// Outbound call did not complete before its deadline.
	Timeout,
}
impl UpstreamErrorKind {
	/// Whether a negative cache entry should be recorded for this kind (spec §4.2).
	pub fn is_negative_cacheable(self) -> bool {
		matches!(self, UpstreamErrorKind::NotFound | UpstreamErrorKind::Auth)
	}

	/// TTL applied to a negative cache entry of this kind, if any.
	pub fn negative_cache_ttl(self) -> Option<Duration> {
		match self {
			UpstreamErrorKind::NotFound => Some(Duration::from_secs(30 * 60)),
			UpstreamErrorKind::Auth => Some(Duration::from_secs(60)),
			_ => None,
		}
	}

	/// Stable lowercase tag used as a metric label (spec §4.7 "classified errors by kind").
	pub fn as_str(self) -> &'static str {
		match self {
			UpstreamErrorKind::Transient => "transient",
			UpstreamErrorKind::Quota => "quota",
			UpstreamErrorKind::NotFound => "not_found",
			UpstreamErrorKind::Auth => "auth",
			UpstreamErrorKind::Malformed => "malformed",
			UpstreamErrorKind::Timeout => "timeout",
		}
	}

	/// Coarse crate-level taxonomy this upstream error surfaces as (spec §7).
	pub fn to_crate_error(self, detail: impl Into<String>) -> Error {
		match self {
			UpstreamErrorKind::NotFound => Error::NotFound(detail.into()),
			UpstreamErrorKind::Auth => Error::Unauthorized(detail.into()),
			UpstreamErrorKind::Quota =>
				Error::DependencyDegraded(format!("upstream quota exhausted: {}", detail.into())),
			UpstreamErrorKind::Transient | UpstreamErrorKind::Timeout | UpstreamErrorKind::Malformed =>
				Error::DependencyDegraded(detail.into()),
		}
	}
}

/// Classify an upstream failure from its HTTP status code.
pub fn classify_status(status: reqwest::StatusCode) -> UpstreamErrorKind {
	match status.as_u16() {
		404 => UpstreamErrorKind::NotFound,
		401 | 403 => UpstreamErrorKind::Auth,
		408 => UpstreamErrorKind::Timeout,
		429 => UpstreamErrorKind::Quota,
		500..=599 => UpstreamErrorKind::Transient,
		_ => UpstreamErrorKind::Malformed,
	}
}

/// Classify an upstream failure from free-text diagnostic content (e.g. a legacy error body).
///
/// Digit substrings are only matched when bounded by non-digit characters on both sides, so a
/// 5xx-looking digit embedded in an unrelated number (`"found 5 matches"`) never misfires as a
/// status code (spec §8 property 7).
pub fn classify_text(text: &str) -> UpstreamErrorKind {
	if contains_bounded_status(text, "404") {
		return UpstreamErrorKind::NotFound;
	}
	if contains_bounded_status(text, "401") || contains_bounded_status(text, "403") {
		return UpstreamErrorKind::Auth;
	}
	if contains_bounded_status(text, "429") {
		return UpstreamErrorKind::Quota;
	}
	if contains_bounded_status(text, "408") {
		return UpstreamErrorKind::Timeout;
	}
	if contains_bounded_5xx(text) {
		return UpstreamErrorKind::Transient;
	}

	UpstreamErrorKind::Malformed
}

fn contains_bounded_status(text: &str, needle: &str) -> bool {
	find_bounded(text, needle, |digits| digits == needle)
}

fn contains_bounded_5xx(text: &str) -> bool {
	find_bounded(text, "5", |digits| digits.len() == 3 && digits.starts_with('5'))
}

/// Scan `text` for maximal digit runs, invoking `matches` on each run found. A run is only a
/// candidate once it is confirmed bounded by non-digit characters (or string edges) on both sides.
fn find_bounded(text: &str, _hint: &str, matches: impl Fn(&str) -> bool) -> bool {
	let bytes = text.as_bytes();
	let mut i = 0;

	while i < bytes.len() {
		if bytes[i].is_ascii_digit() {
			let start = i;

			while i < bytes.len() && bytes[i].is_ascii_digit() {
				i += 1;
			}

			let run = &text[start..i];

			if matches(run) {
				return true;
			}
		} else {
			i += 1;
		}
	}

	false
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classifies_server_error_phrase() {
		assert_eq!(classify_text("status 500 from server"), UpstreamErrorKind::Transient);
	}

	#[test]
	fn does_not_misfire_on_embedded_digit() {
		assert_eq!(classify_text("found 5 matches"), UpstreamErrorKind::Malformed);
	}

	#[test]
	fn does_not_misfire_on_longer_number_containing_five() {
		assert_eq!(classify_text("processed 1500 rows"), UpstreamErrorKind::Malformed);
	}

	#[test]
	fn classifies_exact_not_found_code() {
		assert_eq!(classify_text("upstream replied 404 not found"), UpstreamErrorKind::NotFound);
	}

	#[test]
	fn status_based_classification_matches_ranges() {
		assert_eq!(classify_status(reqwest::StatusCode::NOT_FOUND), UpstreamErrorKind::NotFound);
		assert_eq!(classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS), UpstreamErrorKind::Quota);
		assert_eq!(
			classify_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
			UpstreamErrorKind::Transient
		);
	}
}
