//! Retry and backoff policies for the retrying HTTP client
//!
//! A [`RetryPolicy`] decides, after each attempt, whether the request is worth
//! repeating. A [`BackoffPolicy`] decides how long to wait before the next attempt.
//!
//! # Delay Calculation
//!
//! ```text
//! linear:      min(min_wait + attempt * 100ms, max_wait) + jitter
//! exponential: min(min_wait * 2^attempt,       max_wait) + jitter
//! jitter:      uniform in [0, min_wait)
//! ```
//!
//! Jitter comes from a seeded random source owned by the policy, so a given seed
//! always produces the same sequence of delays.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Response;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Seed used when no jitter seed is configured
pub const DEFAULT_JITTER_SEED: u64 = 3230;

/// Step added per attempt by [`LinearBackoff`]
const LINEAR_STEP: Duration = Duration::from_millis(100);

/// Decides whether an attempt should be repeated
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// Inspects the outcome of one attempt; `true` asks for another attempt
    fn should_retry(&self, outcome: &Result<Response, reqwest::Error>) -> bool;
}

/// Retries transport errors and 5xx responses
///
/// Successful responses and 4xx responses are final.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry(&self, outcome: &Result<Response, reqwest::Error>) -> bool {
        match outcome {
            Ok(response) => response.status().is_server_error(),
            Err(_) => true,
        }
    }
}

/// Computes the wait before the next attempt
pub trait BackoffPolicy: Send + Sync + fmt::Debug {
    /// `attempt` is the zero-based index of the attempt that just failed
    fn delay(&self, min_wait: Duration, max_wait: Duration, attempt: u32) -> Duration;
}

/// Seeded source of uniform jitter in `[0, min_wait)`
#[derive(Debug)]
struct Jitter {
    rng: Mutex<StdRng>,
}

impl Jitter {
    fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn sample(&self, min_wait: Duration) -> Duration {
        let bound = duration_ms(min_wait);
        if bound == 0 {
            return Duration::ZERO;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Duration::from_millis(rng.gen_range(0..bound))
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Waits `min_wait + attempt * 100ms`, capped at `max_wait`, plus jitter
#[derive(Debug)]
pub struct LinearBackoff {
    jitter: Jitter,
}

impl LinearBackoff {
    pub fn new(seed: u64) -> Self {
        Self {
            jitter: Jitter::new(seed),
        }
    }

    /// The delay before jitter is added
    pub fn base_delay(min_wait: Duration, max_wait: Duration, attempt: u32) -> Duration {
        let step = LINEAR_STEP.saturating_mul(attempt);
        min_wait.saturating_add(step).min(max_wait)
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_JITTER_SEED)
    }
}

impl BackoffPolicy for LinearBackoff {
    fn delay(&self, min_wait: Duration, max_wait: Duration, attempt: u32) -> Duration {
        Self::base_delay(min_wait, max_wait, attempt) + self.jitter.sample(min_wait)
    }
}

/// Waits `min_wait * 2^attempt`, capped at `max_wait`, plus jitter
#[derive(Debug)]
pub struct ExponentialBackoff {
    jitter: Jitter,
}

impl ExponentialBackoff {
    pub fn new(seed: u64) -> Self {
        Self {
            jitter: Jitter::new(seed),
        }
    }

    /// The delay before jitter is added
    pub fn base_delay(min_wait: Duration, max_wait: Duration, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        min_wait.saturating_mul(factor).min(max_wait)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_JITTER_SEED)
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, min_wait: Duration, max_wait: Duration, attempt: u32) -> Duration {
        Self::base_delay(min_wait, max_wait, attempt) + self.jitter.sample(min_wait)
    }
}
