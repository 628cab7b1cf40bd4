//! Per-provider rate limiting.

use crate::models::config::RateLimitConfig;
use crate::Result;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// GCRA limiter allowing `requests` calls per `interval`, with a burst of
/// `requests`.
///
/// Callers that find no capacity wait for the next cell. Once `max_queue`
/// callers are already waiting, new callers fail fast with
/// `Error::RateLimited`.
pub struct RateLimiter {
    provider: String,
    limiter: DirectLimiter,
    max_queue: usize,
    waiting: AtomicUsize,
}

/// Decrements the waiter count when a waiting caller leaves, even if its
/// future is dropped.
struct WaitGuard<'a>(&'a AtomicUsize);

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn quota(config: RateLimitConfig) -> Quota {
    let burst = NonZeroU32::new(config.requests).unwrap_or(NonZeroU32::MIN);
    let period = Duration::from_millis(config.interval_ms.max(1)) / burst.get();
    Quota::with_period(period.max(Duration::from_micros(1)))
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

impl RateLimiter {
    pub fn new(provider: impl Into<String>, config: RateLimitConfig) -> Self {
        Self {
            provider: provider.into(),
            limiter: governor::RateLimiter::direct(quota(config)),
            max_queue: config.max_queue,
            waiting: AtomicUsize::new(0),
        }
    }

    /// Wait until a request may be sent.
    pub async fn acquire(&self) -> Result<()> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }

        let ahead = self.waiting.fetch_add(1, Ordering::SeqCst);
        let _guard = WaitGuard(&self.waiting);
        if ahead >= self.max_queue {
            tracing::warn!(
                "Rate limit queue full for {} ({} waiting)",
                self.provider,
                ahead
            );
            return Err(crate::Error::RateLimited {
                provider: self.provider.clone(),
            });
        }

        tracing::debug!("Rate limiting {}", self.provider);
        self.limiter.until_ready().await;
        Ok(())
    }

    /// Number of callers currently waiting for capacity.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("provider", &self.provider)
            .field("max_queue", &self.max_queue)
            .field("waiting", &self.waiting())
            .finish()
    }
}
