//! Runtime configuration, assembled from environment variables and validated at startup.

// std
use std::env;
// crates.io
use url::Url;
// self
use crate::_prelude::*;

/// Default steady-state outbound rate toward the upstream content database.
pub const DEFAULT_RATE_LIMIT_PER_SEC: f64 = 35.0;
/// Default hard cap on in-process response cache entries.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 50_000;
/// Default minimum vote count retained during ratings ingest.
pub const DEFAULT_RATINGS_MIN_VOTES: u32 = 100;
/// Default interval between ratings ingest attempts.
pub const DEFAULT_RATINGS_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// Default accepted request body size.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 100 * 1024;
/// Grace-window multiplier applied to a cache entry's base TTL (spec standardises on ×2.5).
pub const STALE_GRACE_MULTIPLIER: f64 = 2.5;

/// Selects which backend implementation serves the Response Cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheBackendKind {
	/// Bounded in-process LRU map.
	#[default]
	InProcess,
	/// Remote key-value store, with transparent in-process fallback on failure.
	Shared,
}

/// Top-level configuration for the catalog cache service.
#[derive(Clone, Debug)]
pub struct Config {
	/// Base URL of the upstream content database.
	pub upstream_base_url: Url,
	/// Hostnames the upstream client is permitted to contact.
	pub upstream_allowed_domains: Vec<String>,
	/// Selected response cache backend.
	pub cache_backend: CacheBackendKind,
	/// Hard cap on in-process cache entries.
	pub cache_max_entries: usize,
	/// Redis connection string, required when `cache_backend` is `Shared`.
	pub redis_url: Option<String>,
	/// Selected ratings snapshot store backend.
	pub ratings_backend: CacheBackendKind,
	/// Minimum vote threshold applied during ratings ingest.
	pub ratings_min_votes: u32,
	/// Interval between scheduled ratings refreshes.
	pub ratings_refresh_interval: Duration,
	/// URL of the gzip-compressed IMDb ratings dataset.
	pub ratings_dataset_url: Url,
	/// Steady-state outbound request budget toward the upstream, in requests/second.
	pub rate_limit_per_sec: f64,
	/// Maximum accepted request body size, in bytes.
	pub body_limit_bytes: usize,
	/// 32-byte key used by the credential-encryption collaborator (opaque to this crate).
	pub encryption_key: Vec<u8>,
	/// Session secret used by the session/auth collaborator (opaque to this crate).
	pub session_secret: String,
	/// Placeholder poster URL substituted when an item has none.
	pub placeholder_poster_url: Url,
}
impl Config {
	/// Assemble configuration from process environment variables.
	pub fn from_env() -> Result<Self> {
		let upstream_base_url = required_env("CATALOG_UPSTREAM_BASE_URL")?;
		let upstream_base_url = Url::parse(&upstream_base_url)?;

		let ratings_dataset_url = env::var("CATALOG_RATINGS_DATASET_URL").unwrap_or_else(|_| {
			"https://datasets.imdbws.com/title.ratings.tsv.gz".to_string()
		});
		let ratings_dataset_url = Url::parse(&ratings_dataset_url)?;

		let placeholder_poster_url = env::var("CATALOG_PLACEHOLDER_POSTER_URL")
			.unwrap_or_else(|_| "https://example.invalid/placeholder-poster.png".to_string());
		let placeholder_poster_url = Url::parse(&placeholder_poster_url)?;

		let cache_backend = match env::var("CATALOG_CACHE_BACKEND").as_deref() {
			Ok("shared") => CacheBackendKind::Shared,
			Ok("inprocess") | Err(_) => CacheBackendKind::InProcess,
			Ok(other) =>
				return Err(Error::Validation {
					field: "CATALOG_CACHE_BACKEND",
					reason: format!("Unrecognised value '{other}'; expected 'shared' or 'inprocess'."),
				}),
		};

		let ratings_backend = match env::var("CATALOG_RATINGS_BACKEND").as_deref() {
			Ok("shared") => CacheBackendKind::Shared,
			Ok("inprocess") | Err(_) => CacheBackendKind::InProcess,
			Ok(other) =>
				return Err(Error::Validation {
					field: "CATALOG_RATINGS_BACKEND",
					reason: format!("Unrecognised value '{other}'; expected 'shared' or 'inprocess'."),
				}),
		};

		let encryption_key = match env::var("CATALOG_ENCRYPTION_KEY") {
			Ok(value) => base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &value)
				.map_err(|err| Error::Validation {
					field: "CATALOG_ENCRYPTION_KEY",
					reason: format!("Must be valid base64: {err}"),
				})?,
			Err(_) =>
				return Err(Error::Validation {
					field: "CATALOG_ENCRYPTION_KEY",
					reason: "Must be set; base64-encoded 32-byte key.".into(),
				}),
		};

		let config = Self {
			upstream_base_url,
			upstream_allowed_domains: crate::security::normalize_allowlist(
				env::var("CATALOG_UPSTREAM_ALLOWED_DOMAINS")
					.map(|value| value.split(',').map(str::to_string).collect())
					.unwrap_or_default(),
			),
			cache_backend,
			cache_max_entries: parse_env_or("CATALOG_CACHE_MAX_ENTRIES", DEFAULT_CACHE_MAX_ENTRIES)?,
			redis_url: env::var("CATALOG_REDIS_URL").ok(),
			ratings_backend,
			ratings_min_votes: parse_env_or("CATALOG_RATINGS_MIN_VOTES", DEFAULT_RATINGS_MIN_VOTES)?,
			ratings_refresh_interval: Duration::from_secs(parse_env_or(
				"CATALOG_RATINGS_REFRESH_INTERVAL_SECS",
				DEFAULT_RATINGS_REFRESH_INTERVAL.as_secs(),
			)?),
			ratings_dataset_url,
			rate_limit_per_sec: parse_env_or(
				"CATALOG_RATE_LIMIT_PER_SEC",
				DEFAULT_RATE_LIMIT_PER_SEC,
			)?,
			body_limit_bytes: parse_env_or("CATALOG_BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT_BYTES)?,
			encryption_key,
			session_secret: env::var("CATALOG_SESSION_SECRET").unwrap_or_default(),
			placeholder_poster_url,
		};

		config.validate()?;

		Ok(config)
	}

	/// Validate invariants named in the Configuration options table.
	pub fn validate(&self) -> Result<()> {
		crate::security::enforce_https(&self.upstream_base_url)?;

		if self.cache_max_entries == 0 {
			return Err(Error::Validation {
				field: "cache_max_entries",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.cache_backend == CacheBackendKind::Shared && self.redis_url.is_none() {
			return Err(Error::Validation {
				field: "redis_url",
				reason: "Must be set when cache_backend is 'shared'.".into(),
			});
		}
		if self.ratings_backend == CacheBackendKind::Shared && self.redis_url.is_none() {
			return Err(Error::Validation {
				field: "redis_url",
				reason: "Must be set when ratings_backend is 'shared'.".into(),
			});
		}
		if self.rate_limit_per_sec <= 0.0 {
			return Err(Error::Validation {
				field: "rate_limit_per_sec",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.body_limit_bytes == 0 {
			return Err(Error::Validation {
				field: "body_limit_bytes",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.encryption_key.len() != 32 {
			return Err(Error::Validation {
				field: "encryption_key",
				reason: format!(
					"Must decode to exactly 32 bytes, got {}.",
					self.encryption_key.len()
				),
			});
		}
		if self.session_secret.len() < 32 {
			return Err(Error::Validation {
				field: "session_secret",
				reason: "Must be at least 32 characters.".into(),
			});
		}

		Ok(())
	}
}

fn required_env(name: &'static str) -> Result<String> {
	env::var(name)
		.map_err(|_| Error::Validation { field: name, reason: "Must be set.".into() })
}

fn parse_env_or<T>(name: &'static str, default: T) -> Result<T>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	match env::var(name) {
		Ok(value) => value
			.parse()
			.map_err(|err| Error::Validation { field: name, reason: format!("{err}") }),
		Err(_) => Ok(default),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn base_config() -> Config {
		Config {
			upstream_base_url: Url::parse("https://content.example.invalid").unwrap(),
			upstream_allowed_domains: Vec::new(),
			cache_backend: CacheBackendKind::InProcess,
			cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
			redis_url: None,
			ratings_backend: CacheBackendKind::InProcess,
			ratings_min_votes: DEFAULT_RATINGS_MIN_VOTES,
			ratings_refresh_interval: DEFAULT_RATINGS_REFRESH_INTERVAL,
			ratings_dataset_url: Url::parse("https://datasets.imdbws.com/title.ratings.tsv.gz")
				.unwrap(),
			rate_limit_per_sec: DEFAULT_RATE_LIMIT_PER_SEC,
			body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
			encryption_key: vec![0u8; 32],
			session_secret: "x".repeat(32),
			placeholder_poster_url: Url::parse("https://example.invalid/p.png").unwrap(),
		}
	}

	#[test]
	fn rejects_short_session_secret() {
		let mut config = base_config();
		config.session_secret = "too-short".into();
		assert!(config.validate().is_err());
	}

	#[test]
	fn rejects_wrong_length_encryption_key() {
		let mut config = base_config();
		config.encryption_key = vec![0u8; 16];
		assert!(config.validate().is_err());
	}

	#[test]
	fn rejects_shared_backend_without_redis_url() {
		let mut config = base_config();
		config.cache_backend = CacheBackendKind::Shared;
		assert!(config.validate().is_err());
	}

	#[test]
	fn accepts_well_formed_config() {
		assert!(base_config().validate().is_ok());
	}
}
