//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error taxonomy surfaced to callers (spec §7): `VALIDATION`,
/// `NOT_FOUND`, `UNAUTHORIZED`, `INTERNAL`, `DEPENDENCY_DEGRADED`.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[cfg(feature = "redis")]
	#[error(transparent)]
	Redis(#[from] redis::RedisError),

	/// Malformed caller input; never cached, never retried.
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
	/// Title, user, or provider not found (surfaced from a NOT_FOUND negative cache entry).
	#[error("Not found: {0}")]
	NotFound(String),
	/// Caller lacks a valid session/credential (surfaced from an AUTH negative cache entry).
	#[error("Unauthorized: {0}")]
	Unauthorized(String),
	/// A non-critical dependency is degraded and no stale entry could cover the request.
	#[error("Dependency degraded: {0}")]
	DependencyDegraded(String),
	/// Catch-all for conditions that should never surface details to callers.
	#[error("Internal error: {0}")]
	Internal(String),
}
impl Error {
	/// Coarse taxonomy tag used by handlers to shape HTTP responses.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Validation { .. } => ErrorKind::Validation,
			Error::NotFound(_) => ErrorKind::NotFound,
			Error::Unauthorized(_) => ErrorKind::Unauthorized,
			Error::DependencyDegraded(_) => ErrorKind::DependencyDegraded,
			Error::Io(_) | Error::Reqwest(_) | Error::Serde(_) | Error::Url(_) =>
				ErrorKind::Internal,
			#[cfg(feature = "redis")]
			Error::Redis(_) => ErrorKind::Internal,
			Error::Internal(_) => ErrorKind::Internal,
		}
	}
}
#[cfg(feature = "metrics")]
impl<T> From<metrics::SetRecorderError<T>> for Error
where
	T: std::fmt::Display,
{
	fn from(value: metrics::SetRecorderError<T>) -> Self {
		Self::Internal(value.to_string())
	}
}

/// Coarse error taxonomy (spec §7), independent of the concrete variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
	Validation,
	NotFound,
	Unauthorized,
	Internal,
	DependencyDegraded,
}
