//! SHARED-variant [`RatingsStore`]: a Redis-backed snapshot, staged under a distinct key and
//! atomically renamed into place (spec §4.4 "SHARED" variant), analogous to the teacher's Redis
//! persistence for JWKS documents.

// crates.io
use async_trait::async_trait;
use redis::AsyncCommands;
// self
use crate::{_prelude::*, ratings::{backend::RatingsStore, store::RatingsSnapshot}};

/// Redis-backed ratings snapshot store. `publish` writes to a staging key and renames it onto
/// the live key so concurrent readers never observe a partially-written snapshot.
pub struct SharedRatingsStore {
	client: redis::Client,
	live_key: String,
	staging_key: String,
}
impl SharedRatingsStore {
	/// Construct a store against the given Redis connection string.
	pub fn new(redis_url: &str) -> Result<Self> {
		Ok(Self {
			client: redis::Client::open(redis_url)?,
			live_key: "catalog-cache:ratings:live".to_string(),
			staging_key: "catalog-cache:ratings:staging".to_string(),
		})
	}

	async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
		Ok(self.client.get_multiplexed_async_connection().await?)
	}
}
#[async_trait]
impl RatingsStore for SharedRatingsStore {
	async fn publish(&self, snapshot: &RatingsSnapshot) -> Result<()> {
		let mut conn = self.connection().await?;
		let payload = serde_json::to_vec(snapshot)?;

		conn.set::<_, _, ()>(&self.staging_key, payload).await?;
		conn.rename::<_, ()>(&self.staging_key, &self.live_key).await?;

		Ok(())
	}

	async fn load(&self) -> Result<Option<RatingsSnapshot>> {
		let mut conn = self.connection().await?;
		let raw: Option<Vec<u8>> = conn.get(&self.live_key).await?;

		match raw {
			Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
			None => Ok(None),
		}
	}
}
