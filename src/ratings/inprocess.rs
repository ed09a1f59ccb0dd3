//! MEMORY-variant [`RatingsStore`]: no shared state, every instance ingests independently (spec
//! §4.4 "MEMORY" variant).

// crates.io
use async_trait::async_trait;
// self
use crate::{_prelude::*, ratings::{backend::RatingsStore, store::RatingsSnapshot}};

/// No-op store used when no shared ratings backend is configured. `publish` discards the
/// snapshot; `load` always reports nothing to adopt, so every instance runs its own ingest.
#[derive(Default)]
pub struct InProcessRatingsStore;
#[async_trait]
impl RatingsStore for InProcessRatingsStore {
	async fn publish(&self, _snapshot: &RatingsSnapshot) -> Result<()> {
		Ok(())
	}

	async fn load(&self) -> Result<Option<RatingsSnapshot>> {
		Ok(None)
	}
}
