//! Cooperative token-bucket rate limiter guarding outbound calls to the upstream content database.

// crates.io
use tokio::{sync::Mutex, time::sleep};
// self
use crate::_prelude::*;

#[derive(Debug)]
struct BucketState {
	tokens: f64,
	last_refill: Instant,
}

/// Single-instance-per-upstream rate limiter (spec §3 `TokenBucket`, §4.1, §5).
///
/// `acquire` cooperatively suspends the caller until at least one token is available rather than
/// rejecting the call; cancellation of the waiting future simply drops the future without
/// consuming a token.
#[derive(Debug)]
pub struct TokenBucket {
	capacity: f64,
	refill_per_sec: f64,
	state: Mutex<BucketState>,
}
impl TokenBucket {
	/// Construct a bucket with the given capacity and steady-state refill rate.
	pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
		Self {
			capacity,
			refill_per_sec,
			state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
		}
	}

	/// Acquire a single token, suspending cooperatively until one becomes available.
	pub async fn acquire(&self) {
		loop {
			let wait = {
				let mut state = self.state.lock().await;

				self.refill_locked(&mut state);

				if state.tokens >= 1.0 {
					state.tokens -= 1.0;

					None
				} else {
					let deficit = 1.0 - state.tokens;

					Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
				}
			};

			match wait {
				None => return,
				Some(delay) => sleep(delay).await,
			}
		}
	}

	/// Drain the bucket to zero and hold it there until `until`, used when the upstream signals a
	/// retry-after delay that must act as an absolute lower bound on the next outbound call.
	pub async fn drain_until(&self, until: Instant) {
		let mut state = self.state.lock().await;

		state.tokens = 0.0;
		state.last_refill = until;
	}

	fn refill_locked(&self, state: &mut BucketState) {
		let now = Instant::now();
		let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();

		state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
		state.last_refill = now;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn acquire_never_exceeds_capacity() {
		let bucket = TokenBucket::new(2.0, 100.0);

		bucket.acquire().await;
		bucket.acquire().await;

		let remaining = {
			let mut state = bucket.state.lock().await;
			bucket.refill_locked(&mut state);
			state.tokens
		};

		assert!(remaining <= 2.0);
	}

	#[tokio::test]
	async fn acquire_suspends_until_refill_when_exhausted() {
		let bucket = TokenBucket::new(1.0, 1000.0);

		bucket.acquire().await;

		let start = Instant::now();

		bucket.acquire().await;

		assert!(start.elapsed() >= Duration::from_millis(1));
	}
}
