//! Strong validator computation and conditional-request handling (spec §4.6, §8 property 6).

// crates.io
use sha2::{Digest, Sha256};

/// Compute a strong ETag from a serialised payload and a contextual salt (e.g. `user_id` plus
/// endpoint name), so identical bytes served to different users never collide (spec §4.6 "emit a
/// strong validator derived from the SHA-256 of the serialised payload plus a contextual salt").
///
/// MD5 is explicitly forbidden by spec §6; only SHA-256 is used here.
pub fn compute(payload: &[u8], salt: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(salt.as_bytes());
	hasher.update(b"\0");
	hasher.update(payload);

	let digest = hasher.finalize();
	let encoded = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, digest);

	format!("\"{encoded}\"")
}

/// Whether the caller's `If-None-Match` header value satisfies `etag` (spec §8 property 6).
pub fn if_none_match_satisfied(header_value: Option<&str>, etag: &str) -> bool {
	match header_value {
		Some(value) => value.split(',').map(str::trim).any(|candidate| candidate == etag || candidate == "*"),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identical_payload_and_salt_are_deterministic() {
		assert_eq!(compute(b"hello", "user-1:manifest"), compute(b"hello", "user-1:manifest"));
	}

	#[test]
	fn different_salts_change_the_etag() {
		assert_ne!(compute(b"hello", "user-1:manifest"), compute(b"hello", "user-2:manifest"));
	}

	#[test]
	fn wildcard_and_exact_match_are_satisfied() {
		let etag = compute(b"hello", "salt");

		assert!(if_none_match_satisfied(Some(&etag), &etag));
		assert!(if_none_match_satisfied(Some("*"), &etag));
		assert!(!if_none_match_satisfied(Some("\"other\""), &etag));
	}

	#[test]
	fn absent_header_is_never_satisfied() {
		let etag = compute(b"hello", "salt");

		assert!(!if_none_match_satisfied(None, &etag));
	}
}
