//! Meta endpoint (spec §4.6): accepts an IMDb-shaped id (`tt` + 7-10 digits), a typed
//! `database:numeric` id, or a bare numeric id. Series requests additionally fetch episode
//! listings and localised logos in parallel with the details call.

// std
use std::time::Duration;
// crates.io
use axum::{
	extract::{Path, State},
	http::HeaderMap,
	response::Response,
};
use serde::Serialize;
// self
use crate::{
	app::AppState,
	config::STALE_GRACE_MULTIPLIER,
	enrichment::{self, CatalogItem, EnrichmentContext},
	error::{Error, ErrorKind},
	fingerprint::Fingerprint,
	handlers::{self, AppError, Kind},
	upstream::{UpstreamClient, UpstreamErrorKind, UpstreamResponse},
};

/// Base freshness window for a meta response before the spec's ×2.5 stale-grace multiplier.
pub const META_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Serialize)]
pub struct MetaResponse {
	pub meta: CatalogItem,
	#[serde(rename = "cacheMaxAge")]
	pub cache_max_age: u64,
	#[serde(rename = "staleRevalidate")]
	pub stale_revalidate: u64,
	/// Window during which a stale entry may still be served after an upstream error (spec §7
	/// "if cache has a stale entry within grace, serve it").
	#[serde(rename = "staleError")]
	pub stale_error: u64,
}

pub async fn get(
	State(state): State<AppState>,
	Path((user_id, kind_raw, meta_segment)): Path<(String, String, String)>,
	headers: HeaderMap,
) -> Result<Response, AppError> {
	let meta_id = handlers::strip_json_suffix(&meta_segment)?.to_string();

	respond(state, user_id, kind_raw, meta_id, headers).await
}

pub async fn get_with_extra(
	State(state): State<AppState>,
	Path((user_id, kind_raw, meta_segment, extra_segment)): Path<(String, String, String, String)>,
	headers: HeaderMap,
) -> Result<Response, AppError> {
	// The extra segment is accepted for wire-contract symmetry with the catalog endpoint (spec
	// §6); meta responses have nothing left to filter once the id is resolved, so it is parsed
	// only to validate its shape and otherwise ignored.
	let extra_raw = handlers::strip_json_suffix(&extra_segment)?;

	let _ = handlers::extra::parse(extra_raw);

	respond(state, user_id, kind_raw, meta_segment, headers).await
}

async fn respond(
	state: AppState,
	user_id: String,
	kind_raw: String,
	meta_id: String,
	headers: HeaderMap,
) -> Result<Response, AppError> {
	handlers::validate_segment("userId", &user_id)?;
	let kind = handlers::parse_kind(&kind_raw)?;
	validate_meta_id(&meta_id)?;

	let user_config = state.config_cache.get(&user_id).await?.ok_or_else(|| Error::Validation {
		field: "userId",
		reason: "No configuration found for this user.".into(),
	})?;

	#[cfg(feature = "metrics")]
	state.metrics.record_request("meta");

	let display_language = user_config.display_language.clone();
	let fingerprint =
		Fingerprint::compute("meta", &[("kind", kind.as_str()), ("id", &meta_id)], &display_language);

	let producer = build_producer(state.upstream.clone(), kind, meta_id.clone(), display_language.clone());

	let item = match state.response_cache.get_or_fetch(&fingerprint, META_TTL, producer).await {
		Ok(bytes) => serde_json::from_slice::<CatalogItem>(&bytes[..]).map_err(Error::from)?,
		Err(err) => {
			return match err.kind() {
				ErrorKind::DependencyDegraded | ErrorKind::Internal => Ok(handlers::respond_uncacheable(
					&MetaResponse {
						meta: empty_meta(&meta_id),
						cache_max_age: 0,
						stale_revalidate: 0,
						stale_error: 0,
					},
				)?),
				_ => Err(err.into()),
			};
		},
	};

	let ctx = EnrichmentContext {
		ratings: &state.ratings,
		excluded_categories: &user_config.excluded_categories,
		cross_reference_hints: &user_config.cross_reference_hints,
		catalog_id: &meta_id,
		poster_overrides: &user_config.poster_overrides,
		poster_service_global_default: true,
		placeholder_poster_url: &state.config.placeholder_poster_url,
		shuffle_enabled: false,
		date_window: None,
	};
	let mut page = enrichment::CatalogPage { items: vec![item], total_results: 1 };
	page = enrichment::enrich_page(page, &ctx);
	let meta = page.items.into_iter().next().unwrap_or_else(|| empty_meta(&meta_id));

	let grace_secs = (META_TTL.as_secs() as f64 * STALE_GRACE_MULTIPLIER) as u64;
	let body = MetaResponse {
		meta,
		cache_max_age: META_TTL.as_secs(),
		stale_revalidate: grace_secs,
		stale_error: grace_secs,
	};

	Ok(handlers::respond_with_etag(
		&headers,
		&format!("{user_id}:meta:{}:{meta_id}", kind.as_str()),
		META_TTL.as_secs(),
		&body,
	)?)
}

fn empty_meta(meta_id: &str) -> CatalogItem {
	CatalogItem {
		id: meta_id.to_string(),
		categories: Vec::new(),
		poster: None,
		external_id: None,
		rating: None,
		popularity_rank: 0,
		extra: std::collections::HashMap::new(),
	}
}

/// Validate the three accepted id forms (spec §4.6): `tt` + 7-10 digits, `database:numeric`, or a
/// bare numeric id.
fn validate_meta_id(raw: &str) -> crate::Result<()> {
	if let Some(digits) = raw.strip_prefix("tt")
		&& (7..=10).contains(&digits.len())
		&& digits.bytes().all(|b| b.is_ascii_digit())
	{
		return Ok(());
	}

	if let Some((database, numeric)) = raw.split_once(':')
		&& !database.is_empty()
		&& !numeric.is_empty()
		&& numeric.bytes().all(|b| b.is_ascii_digit())
	{
		return Ok(());
	}

	if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
		return Ok(());
	}

	Err(Error::Validation { field: "id", reason: format!("'{raw}' is not a recognised id form.") })
}

fn build_producer(
	upstream: std::sync::Arc<UpstreamClient>,
	kind: Kind,
	meta_id: String,
	display_language: String,
) -> impl Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = std::result::Result<bytes::Bytes, (UpstreamErrorKind, Error)>> + Send>>
+ Clone
+ Send
+ Sync
+ 'static {
	move || {
		let upstream = upstream.clone();
		let meta_id = meta_id.clone();
		let display_language = display_language.clone();

		Box::pin(async move {
			let endpoint = format!("meta/{}/{meta_id}", kind.as_str());

			let item = if kind == Kind::Series {
				let episodes_endpoint = format!("meta/{}/{meta_id}/episodes", kind.as_str());
				let logo_endpoint = format!("meta/{}/{meta_id}/logo", kind.as_str());

				let (detail, episodes, logo) = tokio::join!(
					upstream.fetch(&endpoint, &[]),
					upstream.fetch(&episodes_endpoint, &[]),
					upstream.fetch(&logo_endpoint, &[("displayLanguage", display_language.as_str())]),
				);

				let mut item = parse_detail(detail, &endpoint)?;

				if let Ok(episodes) = episodes
					&& let Ok(value) = serde_json::from_slice(&episodes.payload[..])
				{
					item.extra.insert("videos".to_string(), value);
				}
				if let Ok(logo) = logo
					&& let Ok(value) = serde_json::from_slice(&logo.payload[..])
				{
					item.extra.insert("logo".to_string(), value);
				}

				item
			} else {
				parse_detail(upstream.fetch(&endpoint, &[]).await, &endpoint)?
			};

			Ok(bytes::Bytes::from(serde_json::to_vec(&item).map_err(|err| {
				(UpstreamErrorKind::Malformed, Error::from(err))
			})?))
		})
	}
}

fn parse_detail(
	result: std::result::Result<UpstreamResponse, UpstreamErrorKind>,
	endpoint: &str,
) -> std::result::Result<CatalogItem, (UpstreamErrorKind, Error)> {
	let response = result.map_err(|kind| {
		let err = kind.to_crate_error(format!("meta fetch failed for '{endpoint}'"));

		(kind, err)
	})?;

	serde_json::from_slice(&response.payload[..]).map_err(|err| (UpstreamErrorKind::Malformed, Error::from(err)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_imdb_shaped_id() {
		assert!(validate_meta_id("tt0133093").is_ok());
		assert!(validate_meta_id("tt123").is_err());
		assert!(validate_meta_id("tt12345678901").is_err());
	}

	#[test]
	fn accepts_typed_database_form() {
		assert!(validate_meta_id("trakt:12345").is_ok());
		assert!(validate_meta_id("trakt:").is_err());
	}

	#[test]
	fn accepts_bare_numeric_id() {
		assert!(validate_meta_id("42").is_ok());
		assert!(validate_meta_id("").is_err());
		assert!(validate_meta_id("not-numeric").is_err());
	}
}
