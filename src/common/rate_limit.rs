use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);
/// Above this many tracked clients, buckets that have fully refilled are dropped.
const PRUNE_AT: usize = 10_000;

/// Outcome of a request that was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allowed {
    pub limit: u32,
    pub remaining: u32,
}

/// A request over the limit, with how long until one token is back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limited {
    pub limit: u32,
    pub retry_after: Duration,
}

/// Token bucket holding `limit` requests that refills completely over one minute.
#[derive(Debug)]
struct Bucket {
    tokens: u128,
    last_refill: Instant,
}

impl Bucket {
    const TOKEN_SCALE: u128 = 1_000_000;

    fn full(capacity: u128, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, capacity: u128, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }
        let replenished = capacity
            .saturating_mul(elapsed.as_micros())
            .checked_div(WINDOW.as_micros());
        if let Some(amount) = replenished
            && amount > 0
        {
            self.tokens = (self.tokens + amount).min(capacity);
            self.last_refill = now;
        }
    }

    fn take(&mut self, capacity: u128, now: Instant) -> Result<u32, Duration> {
        self.refill(capacity, now);
        if self.tokens >= Self::TOKEN_SCALE {
            self.tokens -= Self::TOKEN_SCALE;
            let left = self.tokens / Self::TOKEN_SCALE;
            Ok(u32::try_from(left).unwrap_or(u32::MAX))
        } else {
            Err(self.retry_delay(capacity))
        }
    }

    fn retry_delay(&self, capacity: u128) -> Duration {
        if capacity == 0 {
            return Duration::MAX;
        }
        let deficit = Self::TOKEN_SCALE.saturating_sub(self.tokens);
        let micros = deficit
            .saturating_mul(WINDOW.as_micros())
            .div_ceil(capacity)
            .min(u128::from(u64::MAX));
        Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
    }

    fn is_idle(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_refill) >= WINDOW
    }
}

/// Per-client request budget, keyed on the peer IP address. A limit of zero
/// turns the limiter off.
#[derive(Clone, Debug)]
pub struct ClientRateLimiter {
    limit: u32,
    buckets: Arc<Mutex<HashMap<IpAddr, Bucket>>>,
}

impl ClientRateLimiter {
    pub fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            buckets: Arc::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    pub fn check(&self, client: IpAddr) -> Result<Allowed, Limited> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> Result<Allowed, Limited> {
        if !self.is_enabled() {
            return Ok(Allowed {
                limit: 0,
                remaining: u32::MAX,
            });
        }
        let capacity = u128::from(self.limit) * Bucket::TOKEN_SCALE;

        let mut buckets = self.buckets.lock();
        if buckets.len() >= PRUNE_AT {
            buckets.retain(|_, bucket| !bucket.is_idle(now));
        }
        buckets
            .entry(client)
            .or_insert_with(|| Bucket::full(capacity, now))
            .take(capacity, now)
            .map(|remaining| Allowed {
                limit: self.limit,
                remaining,
            })
            .map_err(|retry_after| Limited {
                limit: self.limit,
                retry_after,
            })
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// The two budgets the API enforces: resolving is cheap, downloading is not.
#[derive(Clone, Debug)]
pub struct RateLimits {
    pub resolve: ClientRateLimiter,
    pub download: ClientRateLimiter,
}

impl RateLimits {
    pub fn new(resolve_per_minute: u32, download_per_minute: u32) -> Self {
        Self {
            resolve: ClientRateLimiter::per_minute(resolve_per_minute),
            download: ClientRateLimiter::per_minute(download_per_minute),
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::new(0, 0)
    }
}
