//! Catalog endpoint (spec §4.6): pagination/search/category filtering via the "extra" segment,
//! category-name resolution, and per-user enrichment of a shared, cached upstream page.

// std
use std::time::Duration;
// crates.io
use axum::{
	extract::{Path, State},
	http::HeaderMap,
	response::Response,
};
use serde::{Deserialize, Serialize};
// self
use crate::{
	app::AppState,
	config::STALE_GRACE_MULTIPLIER,
	enrichment::{self, CatalogItem, CatalogPage, EnrichmentContext},
	error::{Error, ErrorKind},
	fingerprint::Fingerprint,
	handlers::{self, AppError, Kind, extra::ExtraParams},
	upstream::UpstreamErrorKind,
};

/// Base freshness window for a catalog page before the spec's ×2.5 stale-grace multiplier.
pub const CATALOG_TTL: Duration = Duration::from_secs(5 * 60);

/// Items per upstream catalog page, used to turn a shuffle-drawn page index into a `skip` offset.
const SHUFFLE_PAGE_SIZE: u64 = 100;

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
	pub metas: Vec<CatalogItem>,
	#[serde(rename = "totalResults")]
	pub total_results: u64,
	#[serde(rename = "cacheMaxAge")]
	pub cache_max_age: u64,
	#[serde(rename = "staleRevalidate")]
	pub stale_revalidate: u64,
}

/// Upstream catalog wire schema, decoded once per miss and cached pre-enrichment.
#[derive(Deserialize)]
struct RawCatalogResponse {
	metas: Vec<CatalogItem>,
	#[serde(rename = "totalResults", default)]
	total_results: u64,
}

pub async fn get(
	State(state): State<AppState>,
	Path((user_id, kind_raw, catalog_segment)): Path<(String, String, String)>,
	headers: HeaderMap,
) -> Result<Response, AppError> {
	let catalog_id = handlers::strip_json_suffix(&catalog_segment)?.to_string();

	respond(state, user_id, kind_raw, catalog_id, ExtraParams::default(), headers).await
}

pub async fn get_with_extra(
	State(state): State<AppState>,
	Path((user_id, kind_raw, catalog_segment, extra_segment)): Path<(String, String, String, String)>,
	headers: HeaderMap,
) -> Result<Response, AppError> {
	let extra_raw = handlers::strip_json_suffix(&extra_segment)?;
	let extra = handlers::extra::parse(extra_raw);

	respond(state, user_id, kind_raw, catalog_segment, extra, headers).await
}

async fn respond(
	state: AppState,
	user_id: String,
	kind_raw: String,
	catalog_id: String,
	extra: ExtraParams,
	headers: HeaderMap,
) -> Result<Response, AppError> {
	handlers::validate_segment("userId", &user_id)?;
	let kind = handlers::parse_kind(&kind_raw)?;
	handlers::validate_segment("catalogId", &catalog_id)?;

	let user_config = state.config_cache.get(&user_id).await?.ok_or_else(|| Error::Validation {
		field: "userId",
		reason: "No configuration found for this user.".into(),
	})?;

	if !user_config.catalogs.iter().any(|id| id == &catalog_id) {
		return Err(Error::NotFound(format!("Catalog '{catalog_id}' is not configured for this user.")).into());
	}

	#[cfg(feature = "metrics")]
	state.metrics.record_request("catalog");

	let display_language = extra.display_language.clone().unwrap_or_else(|| user_config.display_language.clone());
	let category_id = extra.genre.first().and_then(|label| handlers::resolve_category_id(label, &display_language));

	// Total page count is not known until after the upstream fetch, so the draw is bounded by
	// MAX_SHUFFLE_PAGE directly rather than an actual page count (spec §4.5 tie-break rules).
	let skip = if user_config.shuffle_enabled {
		let page_index = enrichment::choose_shuffled_page_index(enrichment::MAX_SHUFFLE_PAGE);
		u64::from(page_index - 1) * SHUFFLE_PAGE_SIZE
	} else {
		extra.skip.unwrap_or(0)
	};
	let date_window = extra.date_preset.map(|preset| enrichment::dates::resolve(preset, chrono::Utc::now()));

	let fingerprint = Fingerprint::compute(
		"catalog",
		&[
			("kind", kind.as_str()),
			("catalogId", &catalog_id),
			("skip", &skip.to_string()),
			("search", extra.search.as_deref().unwrap_or("")),
			("genre", category_id.as_deref().unwrap_or("")),
		],
		&display_language,
	);

	let producer = build_producer(state.upstream.clone(), kind, catalog_id.clone(), skip, extra.search.clone(), category_id);

	let page = match state.response_cache.get_or_fetch(&fingerprint, CATALOG_TTL, producer).await {
		Ok(bytes) => serde_json::from_slice::<CatalogPage>(&bytes[..]).map_err(Error::from)?,
		Err(err) => {
			return match err.kind() {
				ErrorKind::DependencyDegraded | ErrorKind::Internal => Ok(handlers::respond_uncacheable(
					&CatalogResponse { metas: Vec::new(), total_results: 0, cache_max_age: 0, stale_revalidate: 0 },
				)?),
				_ => Err(err.into()),
			};
		},
	};

	let ctx = EnrichmentContext {
		ratings: &state.ratings,
		excluded_categories: &user_config.excluded_categories,
		cross_reference_hints: &user_config.cross_reference_hints,
		catalog_id: &catalog_id,
		poster_overrides: &user_config.poster_overrides,
		poster_service_global_default: true,
		placeholder_poster_url: &state.config.placeholder_poster_url,
		shuffle_enabled: user_config.shuffle_enabled,
		date_window,
	};
	let enriched = enrichment::enrich_page(page, &ctx);
	let stale_revalidate = (CATALOG_TTL.as_secs() as f64 * STALE_GRACE_MULTIPLIER) as u64;
	let body = CatalogResponse {
		metas: enriched.items,
		total_results: enriched.total_results,
		cache_max_age: CATALOG_TTL.as_secs(),
		stale_revalidate,
	};

	if user_config.shuffle_enabled {
		return Ok(handlers::respond_uncacheable(&body)?);
	}

	Ok(handlers::respond_with_etag(
		&headers,
		&format!("{user_id}:catalog:{}:{catalog_id}", kind.as_str()),
		CATALOG_TTL.as_secs(),
		&body,
	)?)
}

fn build_producer(
	upstream: std::sync::Arc<crate::upstream::UpstreamClient>,
	kind: Kind,
	catalog_id: String,
	skip: u64,
	search: Option<String>,
	category_id: Option<String>,
) -> impl Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = std::result::Result<bytes::Bytes, (UpstreamErrorKind, Error)>> + Send>>
+ Clone
+ Send
+ Sync
+ 'static {
	move || {
		let upstream = upstream.clone();
		let catalog_id = catalog_id.clone();
		let search = search.clone();
		let category_id = category_id.clone();

		Box::pin(async move {
			let endpoint = format!("catalog/{}/{catalog_id}", kind.as_str());
			let skip_value = skip.to_string();
			let mut params: Vec<(&str, &str)> = vec![("skip", &skip_value)];

			if let Some(search) = search.as_deref() {
				params.push(("search", search));
			}
			if let Some(category_id) = category_id.as_deref() {
				params.push(("genre", category_id));
			}

			let response = upstream.fetch(&endpoint, &params).await.map_err(|kind| {
				let err = kind.to_crate_error(format!("catalog fetch failed for '{endpoint}'"));

				(kind, err)
			})?;

			let raw: RawCatalogResponse = serde_json::from_slice(&response.payload[..])
				.map_err(|err| (UpstreamErrorKind::Malformed, Error::from(err)))?;
			let page = CatalogPage { items: raw.metas, total_results: raw.total_results };
			let bytes = serde_json::to_vec(&page).map_err(|err| (UpstreamErrorKind::Malformed, Error::from(err)))?;

			Ok(bytes::Bytes::from(bytes))
		})
	}
}
