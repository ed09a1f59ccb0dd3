//! HTTP surface: manifest/catalog/meta handlers plus `/health` and `/api/status` (spec §4.6, §6).

// crates.io
use axum::{
	body::Body,
	http::{HeaderMap, StatusCode, header},
	response::{IntoResponse, Response},
};
use serde::Serialize;
// self
use crate::error::Error;

mod categories;
pub mod catalog;
pub mod etag;
pub mod extra;
pub mod manifest;
pub mod meta;
pub mod status;

pub(crate) use categories::{localised_name, resolve_category_id};

/// Wraps a crate [`Error`] for use as an axum handler return type, mapping the error taxonomy to
/// HTTP status codes (spec §7).
pub struct AppError(pub Error);
impl IntoResponse for AppError {
	fn into_response(self) -> Response {
		let status = match self.0.kind() {
			crate::error::ErrorKind::Validation => StatusCode::BAD_REQUEST,
			crate::error::ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
			crate::error::ErrorKind::NotFound => StatusCode::NOT_FOUND,
			crate::error::ErrorKind::DependencyDegraded => StatusCode::SERVICE_UNAVAILABLE,
			crate::error::ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
		};

		(status, self.0.to_string()).into_response()
	}
}
impl From<Error> for AppError {
	fn from(value: Error) -> Self {
		Self(value)
	}
}

/// Content kind recognised by the catalog/meta endpoints (spec §6: `type` ∈ {movie, series}).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
	Movie,
	Series,
}
impl Kind {
	pub fn as_str(self) -> &'static str {
		match self {
			Kind::Movie => "movie",
			Kind::Series => "series",
		}
	}
}

/// Parse and validate the `{type}` path segment, 400 on anything else (spec §6).
pub(crate) fn parse_kind(raw: &str) -> crate::Result<Kind> {
	match raw {
		"movie" => Ok(Kind::Movie),
		"series" => Ok(Kind::Series),
		other => Err(Error::Validation {
			field: "type",
			reason: format!("Unsupported type '{other}'; expected 'movie' or 'series'."),
		}),
	}
}

/// Validate a `userId`/`catalogId`/`metaId` path segment: non-empty, bounded, and free of
/// path-traversal-shaped content (spec §6 "`userId` format validated").
pub(crate) fn validate_segment(field: &'static str, value: &str) -> crate::Result<()> {
	if value.is_empty() || value.len() > 256 {
		return Err(Error::Validation { field, reason: "Must be 1-256 characters.".into() });
	}
	if value.contains('/') || value.contains("..") {
		return Err(Error::Validation { field, reason: "Must not contain '/' or '..'.".into() });
	}

	Ok(())
}

/// Strip the literal `.json` suffix a path segment carries when it is the final segment of a
/// route (spec §6 wire contract); a missing suffix is treated as malformed input.
pub(crate) fn strip_json_suffix(segment: &str) -> crate::Result<&str> {
	segment.strip_suffix(".json").ok_or_else(|| Error::Validation {
		field: "path",
		reason: format!("Expected '{segment}' to end in '.json'."),
	})
}

/// Serialise `body`, compute its ETag under `salt`, and honour `If-None-Match` (spec §4.6, §8
/// property 6): returns an empty `304 Not Modified` on match, otherwise `200` with the payload,
/// an `ETag` header, and a `Cache-Control: public, max-age=N` header.
pub(crate) fn respond_with_etag<T: Serialize>(
	headers: &HeaderMap,
	salt: &str,
	cache_max_age_secs: u64,
	body: &T,
) -> crate::Result<Response> {
	let payload = serde_json::to_vec(body)?;
	let tag = etag::compute(&payload, salt);
	let if_none_match = headers.get(header::IF_NONE_MATCH).and_then(|value| value.to_str().ok());

	if etag::if_none_match_satisfied(if_none_match, &tag) {
		return Ok(Response::builder()
			.status(StatusCode::NOT_MODIFIED)
			.header(header::ETAG, tag)
			.body(Body::empty())
			.expect("static response is well-formed"));
	}

	Ok(Response::builder()
		.status(StatusCode::OK)
		.header(header::CONTENT_TYPE, "application/json")
		.header(header::ETAG, tag)
		.header(header::CACHE_CONTROL, format!("public, max-age={cache_max_age_secs}"))
		.body(Body::from(payload))
		.expect("static response is well-formed"))
}

/// Build a `200` JSON response tagged `Cache-Control: no-store` (spec §4.6 "non-cacheable" path).
pub(crate) fn respond_uncacheable<T: Serialize>(body: &T) -> crate::Result<Response> {
	let payload = serde_json::to_vec(body)?;

	Ok(Response::builder()
		.status(StatusCode::OK)
		.header(header::CONTENT_TYPE, "application/json")
		.header(header::CACHE_CONTROL, "no-store")
		.body(Body::from(payload))
		.expect("static response is well-formed"))
}
