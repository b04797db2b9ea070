//! Bootstrap retry with exponential backoff.
//!
//! `retry` runs an effectful operation until it succeeds or a fixed attempt budget is
//! exhausted. The delay before each retry grows geometrically; there is no unbounded
//! retry and no jitter.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff settings for [`retry`].
#[derive(Debug, Clone)]
pub struct RetryOptions {
	/// Delay before the first retry.
	pub initial_delay: Duration,
	/// Multiplier applied to the delay after each retry.
	pub growth_factor: f64,
	/// Number of retries after the initial attempt. Zero means the first failure
	/// propagates immediately.
	pub max_attempts: u32,
}

impl Default for RetryOptions {
	fn default() -> Self {
		Self {
			initial_delay: Duration::from_secs(1),
			growth_factor: 3.0,
			max_attempts: 3,
		}
	}
}

/// Run `operation` until it succeeds, retrying up to `options.max_attempts` times.
///
/// The first attempt runs immediately. Each failure short of the budget waits the current
/// delay, multiplies it by the growth factor, and attempts again; once the budget is spent
/// the last error is returned. Attempts are strictly sequential.
pub async fn retry<T, E, F, Fut>(mut operation: F, options: RetryOptions) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: Display,
{
	let mut delay = options.initial_delay;
	let mut attempts = 0u32;

	loop {
		match operation().await {
			Ok(value) => return Ok(value),
			Err(error) => {
				if attempts >= options.max_attempts {
					return Err(error);
				}
				attempts += 1;
				warn!(
					"Attempt {} failed: {}; retrying in {:?}",
					attempts, error, delay
				);
				tokio::time::sleep(delay).await;
				delay = delay.mul_f64(options.growth_factor);
			}
		}
	}
}
