//! Manifest endpoint (spec §4.6): shape depends on user config, enriched with localised category
//! names. Non-cacheable when the user opted into shuffled catalog order, otherwise subject to
//! conditional-response headers.

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
use crate::{app::AppState, error::Error, handlers, handlers::AppError};

/// Freshness window advertised for a cacheable (non-shuffled) manifest response.
pub const MANIFEST_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Serialize)]
pub struct ManifestCatalogEntry {
	pub id: String,
	pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ManifestResponse {
	pub id: String,
	pub version: String,
	pub name: String,
	pub catalogs: Vec<ManifestCatalogEntry>,
}

pub async fn get(
	State(state): State<AppState>,
	Path(user_id): Path<String>,
	headers: HeaderMap,
) -> Result<Response, AppError> {
	handlers::validate_segment("userId", &user_id)?;

	let user_config = state.config_cache.get(&user_id).await?.ok_or_else(|| Error::Validation {
		field: "userId",
		reason: "No configuration found for this user.".into(),
	})?;

	#[cfg(feature = "metrics")]
	state.metrics.record_request("manifest");

	let catalogs = user_config
		.catalogs
		.iter()
		.map(|id| ManifestCatalogEntry {
			id: id.clone(),
			name: handlers::localised_name(id, &user_config.display_language)
				.map(str::to_string)
				.unwrap_or_else(|| id.clone()),
		})
		.collect();

	let body = ManifestResponse {
		id: format!("catalog-cache.{user_id}"),
		version: env!("CARGO_PKG_VERSION").to_string(),
		name: "Personalised Catalog".to_string(),
		catalogs,
	};

	if user_config.shuffle_enabled {
		return Ok(handlers::respond_uncacheable(&body)?);
	}

	Ok(handlers::respond_with_etag(&headers, &format!("{user_id}:manifest"), MANIFEST_TTL.as_secs(), &body)?)
}
