//! Single-flight HTTP client to the upstream content database: rate limiting, retry-after
//! honouring, and error classification (spec §4.1).

pub mod classify;
pub mod client;
pub mod retry;
pub mod token_bucket;

pub use self::{
	classify::UpstreamErrorKind,
	client::{UpstreamClient, UpstreamResponse},
	token_bucket::TokenBucket,
};
