//! Global request rate limiting
//!
//! A token bucket holding at most one token, refilled at the configured number of
//! requests per second. With a bucket size of one, bursts are serialized instead of
//! being let through: after an idle period the first caller proceeds immediately and
//! every following caller is spaced one refill interval after the previous grant.

use crate::{FetchError, FetchResult};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Longest refill interval; slower rates are clamped to one request per day
pub const MAX_INTERVAL: Duration = Duration::from_secs(86_400);

/// Token bucket shared by every crawl branch
#[derive(Debug)]
pub struct RateLimiter {
    /// Time it takes to refill one token
    interval: Duration,

    /// Earliest instant the next token is available; `None` until the first grant
    next_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter granting at most `max_per_second` permits per second
    ///
    /// Rates too small to express as an interval, including zero and negative
    /// values, are clamped to [`MAX_INTERVAL`].
    pub fn new(max_per_second: f64) -> Self {
        let interval = Duration::try_from_secs_f64(1.0 / max_per_second)
            .unwrap_or(MAX_INTERVAL)
            .min(MAX_INTERVAL);
        Self {
            interval,
            next_grant: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until a token is available
    ///
    /// Returns [`FetchError::Cancelled`] as soon as `cancel` fires, without granting
    /// a token. Once cancelled, no further permits are ever granted.
    pub async fn wait(&self, cancel: &CancellationToken) -> FetchResult<()> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let grant_at = self.reserve();
        if grant_at <= Instant::now() {
            return Ok(());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            _ = tokio::time::sleep_until(grant_at) => Ok(()),
        }
    }

    /// Reserves the next free slot and returns when it starts
    fn reserve(&self) -> Instant {
        let mut next_grant = self
            .next_grant
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let now = Instant::now();
        let grant_at = match *next_grant {
            Some(at) if at > now => at,
            _ => now,
        };
        *next_grant = Some(grant_at + self.interval);
        grant_at
    }
}
