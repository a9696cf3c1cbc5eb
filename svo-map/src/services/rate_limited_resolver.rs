//! Paced, retrying wrapper around a `GeocodeProvider`
//!
//! Pacing policy:
//! - at most one provider call per `min_delay` (token bucket, burst 1)
//! - transient failures are retried after `error_wait`, at most
//!   `max_retry_wait / error_wait` times, so the extra waiting per query is
//!   bounded by `max_retry_wait`
//! - anything else (not found, permanent error, retries exhausted) is
//!   reported as unresolved; errors never escape to the caller

use crate::models::Coordinates;
use crate::services::nominatim_client::GeocodeProvider;
use governor::{Quota, RateLimiter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use svo_common::config::GeocodingConfig;
use tracing::{debug, warn};

type DirectLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Pacing and retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    pub min_delay: Duration,
    pub error_wait: Duration,
    pub max_retry_wait: Duration,
}

impl PacingConfig {
    /// No spacing and no retries
    pub fn unpaced() -> Self {
        Self {
            min_delay: Duration::ZERO,
            error_wait: Duration::ZERO,
            max_retry_wait: Duration::ZERO,
        }
    }

    /// Retries allowed for one query
    pub fn max_retries(&self) -> u32 {
        if self.error_wait.is_zero() {
            return 0;
        }
        let retries = self.max_retry_wait.as_millis() / self.error_wait.as_millis().max(1);
        u32::try_from(retries).unwrap_or(u32::MAX)
    }
}

impl From<&GeocodingConfig> for PacingConfig {
    fn from(config: &GeocodingConfig) -> Self {
        Self {
            min_delay: Duration::from_millis(config.min_delay_ms),
            error_wait: Duration::from_millis(config.error_wait_ms),
            max_retry_wait: Duration::from_millis(config.max_retry_wait_ms),
        }
    }
}

/// Rate-limited resolver over any provider
pub struct RateLimitedResolver<P> {
    provider: P,
    pacing: PacingConfig,
    /// `None` when `min_delay` is zero
    rate_limiter: Option<DirectLimiter>,
    provider_calls: AtomicUsize,
}

impl<P: GeocodeProvider> RateLimitedResolver<P> {
    pub fn new(provider: P, pacing: PacingConfig) -> Self {
        let rate_limiter = Quota::with_period(pacing.min_delay).map(RateLimiter::direct);

        Self {
            provider,
            pacing,
            rate_limiter,
            provider_calls: AtomicUsize::new(0),
        }
    }

    /// Resolve a free-text query; `None` means unresolved
    ///
    /// Blocks (async) for pacing, the provider round trip and any retry
    /// waits.
    pub async fn resolve(&self, query: &str) -> Option<Coordinates> {
        let max_retries = self.pacing.max_retries();
        let mut retries = 0u32;

        loop {
            if let Some(limiter) = &self.rate_limiter {
                limiter.until_ready().await;
            }

            self.provider_calls.fetch_add(1, Ordering::Relaxed);

            match self.provider.geocode(query).await {
                Ok(Some(coordinates)) => {
                    debug!(
                        query = %query,
                        lat = coordinates.latitude,
                        lon = coordinates.longitude,
                        "Geocoded"
                    );
                    return Some(coordinates);
                }
                Ok(None) => {
                    debug!(query = %query, "Location not found");
                    return None;
                }
                Err(e) if e.is_transient() && retries < max_retries => {
                    retries += 1;
                    warn!(
                        query = %query,
                        error = %e,
                        retry = retries,
                        max_retries,
                        wait_ms = self.pacing.error_wait.as_millis() as u64,
                        "Transient geocoding failure, will retry"
                    );
                    tokio::time::sleep(self.pacing.error_wait).await;
                }
                Err(e) => {
                    warn!(
                        query = %query,
                        error = %e,
                        retries,
                        "Geocoding failed, recording as unresolved"
                    );
                    return None;
                }
            }
        }
    }

    /// Provider calls made so far (including retries)
    pub fn provider_calls(&self) -> usize {
        self.provider_calls.load(Ordering::Relaxed)
    }
}
