//! Canonical request fingerprinting used to key the Response Cache.

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Opaque key identifying a unique upstream response.
///
/// Equal fingerprints must yield semantically equal responses; unequal fingerprints may still
/// yield equal responses (e.g. two different sort orders that happen to produce the same page).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(Arc<str>);
impl Fingerprint {
	/// Compute a fingerprint from an endpoint name, its semantic parameters, and a display locale.
	///
	/// Parameters are sorted by key before hashing so that equivalent parameter sets in different
	/// orders collapse to the same fingerprint.
	pub fn compute(endpoint: &str, params: &[(&str, &str)], display_locale: &str) -> Self {
		let mut sorted: Vec<&(&str, &str)> = params.iter().collect();

		sorted.sort_unstable_by_key(|(key, _)| *key);

		let mut hasher = Sha256::new();

		hasher.update(endpoint.as_bytes());
		hasher.update(b"\0");
		for (key, value) in sorted {
			hasher.update(key.as_bytes());
			hasher.update(b"=");
			hasher.update(value.as_bytes());
			hasher.update(b"\0");
		}
		hasher.update(display_locale.as_bytes());

		let digest = hasher.finalize();
		let encoded =
			base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, digest);

		Self(Arc::from(encoded))
	}

	/// Borrow the fingerprint as a string slice, suitable for use as a shared-backend key.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl std::fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parameter_order_does_not_affect_fingerprint() {
		let a = Fingerprint::compute("catalog", &[("skip", "0"), ("genre", "action")], "en-US");
		let b = Fingerprint::compute("catalog", &[("genre", "action"), ("skip", "0")], "en-US");

		assert_eq!(a, b);
	}

	#[test]
	fn different_locale_changes_fingerprint() {
		let a = Fingerprint::compute("catalog", &[], "en-US");
		let b = Fingerprint::compute("catalog", &[], "fr-FR");

		assert_ne!(a, b);
	}

	#[test]
	fn different_endpoint_changes_fingerprint() {
		let a = Fingerprint::compute("catalog", &[], "en-US");
		let b = Fingerprint::compute("meta", &[], "en-US");

		assert_ne!(a, b);
	}
}
