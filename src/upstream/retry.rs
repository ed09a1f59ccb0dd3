//! Retry budgeting for upstream fetch attempts (grounded in the teacher's retry executor).

// crates.io
use tokio::time;
// self
use crate::_prelude::*;

/// Policy governing a single upstream fetch, including its bounded retry.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
	/// Maximum number of retry attempts after the initial try (spec §7: retried once).
	pub max_retries: u32,
	/// Per-attempt timeout; exceeding it yields TIMEOUT.
	pub attempt_timeout: Duration,
	/// Base backoff before a retry.
	pub base_backoff: Duration,
	/// Overall deadline across the initial attempt and all retries.
	pub deadline: Duration,
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 1,
			attempt_timeout: Duration::from_secs(5),
			base_backoff: Duration::from_millis(200),
			deadline: Duration::from_secs(10),
		}
	}
}

/// Tracks retry progress across a single logical fetch operation.
#[derive(Debug)]
pub struct RetryExecutor<'a> {
	policy: &'a RetryPolicy,
	deadline: Instant,
	retries_used: u32,
}
impl<'a> RetryExecutor<'a> {
	/// Start a new executor bound by the policy's overall deadline.
	pub fn new(policy: &'a RetryPolicy) -> Self {
		Self { policy, deadline: Instant::now() + policy.deadline, retries_used: 0 }
	}

	/// Timeout to apply to the next attempt, bounded by the remaining overall deadline.
	pub fn attempt_timeout(&self) -> Duration {
		self.remaining_budget().min(self.policy.attempt_timeout)
	}

	/// Whether another retry attempt is permitted.
	pub fn can_retry(&self) -> bool {
		self.retries_used < self.policy.max_retries && !self.remaining_budget().is_zero()
	}

	fn remaining_budget(&self) -> Duration {
		self.deadline.saturating_duration_since(Instant::now())
	}

	/// Sleep for a jittered backoff before the next retry, consuming one retry slot.
	pub async fn sleep_backoff(&mut self) {
		if !self.can_retry() {
			return;
		}

		self.retries_used += 1;

		let jitter = rand::random::<f64>() * 0.5 + 0.75;
		let delay = self.policy.base_backoff.mul_f64(jitter).min(self.remaining_budget());

		if !delay.is_zero() {
			time::sleep(delay).await;
		}
	}
}
