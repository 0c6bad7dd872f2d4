//! The four protective components of one source, bundled for injection,
//! health reporting and maintenance resets.

use serde::Serialize;

use crate::cache::{CacheManager, CacheStats};
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::config::AcquisitionConfig;
use crate::gate::ConcurrencyGate;
use crate::models::ListingPage;
use crate::rate_limiter::RateLimiter;

/// Shared safeguards for one upstream source.
///
/// Every field is a cheap handle onto shared state, so clones observe and
/// mutate the same cache, windows, breaker and slots.
#[derive(Clone)]
pub struct Safeguards {
    pub cache: CacheManager<ListingPage>,
    pub limiter: RateLimiter,
    pub breaker: CircuitBreaker,
    pub gate: ConcurrencyGate,
}

/// Point-in-time view of a source's safeguards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub cache: CacheStats,
    pub current_limit: u32,
    pub limit_ceiling: u32,
    pub limit_floor: u32,
    pub breaker_state: CircuitState,
    pub failure_count: u32,
    pub last_error: Option<String>,
    /// Seconds until an open breaker admits a trial call.
    pub retry_after_secs: Option<u64>,
    pub active_fetches: usize,
    pub max_concurrent: usize,
}

impl HealthSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.breaker_state == CircuitState::Closed
    }
}

impl Safeguards {
    pub fn new(name: &str, config: &AcquisitionConfig) -> Self {
        Self {
            cache: CacheManager::new(config.cache.clone()),
            limiter: RateLimiter::new(config.rate_limiter.clone()),
            breaker: CircuitBreaker::new(name, config.circuit_breaker.clone()),
            gate: ConcurrencyGate::new(config.max_concurrent),
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let breaker = self.breaker.stats();
        let limits = self.limiter.config();
        HealthSnapshot {
            cache: self.cache.stats(),
            current_limit: self.limiter.current_limit(),
            limit_ceiling: limits.ceiling,
            limit_floor: limits.floor,
            breaker_state: breaker.state,
            failure_count: breaker.failure_count,
            last_error: breaker.last_error,
            retry_after_secs: breaker
                .time_until_half_open
                .map(|d| d.as_secs_f64().ceil() as u64),
            active_fetches: self.gate.active(),
            max_concurrent: self.gate.max_concurrent(),
        }
    }

    /// Clear the cache, restore the rate limit, drop rate windows and close the breaker.
    ///
    /// In-flight fetches keep their gate slots.
    pub fn reset(&self) {
        self.cache.clear();
        self.limiter.reset();
        self.breaker.reset();
        tracing::info!(source = %self.breaker.name(), "Safeguards reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::PaginationInfo;

    fn page() -> ListingPage {
        ListingPage {
            records: vec![],
            pagination: PaginationInfo {
                current_page: 1,
                items_per_page: 50,
                total_items: 0,
                total_pages: 0,
                has_more: false,
            },
            warning: None,
        }
    }

    #[test]
    fn fresh_snapshot_is_healthy() {
        let guards = Safeguards::new("vinted", &AcquisitionConfig::default());
        let snap = guards.snapshot();
        assert!(snap.is_healthy());
        assert_eq!(snap.current_limit, 20);
        assert_eq!(snap.limit_floor, 5);
        assert_eq!(snap.failure_count, 0);
        assert_eq!(snap.active_fetches, 0);
        assert_eq!(snap.max_concurrent, 2);
        assert!(snap.retry_after_secs.is_none());
    }

    #[test]
    fn reset_restores_everything() {
        let guards = Safeguards::new("vinted", &AcquisitionConfig::default());
        guards.cache.set("k", page());
        guards.cache.get("k");
        guards.limiter.adapt(0.0);
        for _ in 0..3 {
            guards
                .breaker
                .record_failure(&AppError::NetworkError("down".into()));
        }
        let before = guards.snapshot();
        assert!(!before.is_healthy());
        assert!(before.retry_after_secs.is_some());
        assert_eq!(before.current_limit, 16);

        guards.reset();

        let after = guards.snapshot();
        assert!(after.is_healthy());
        assert_eq!(after.failure_count, 0);
        assert_eq!(after.current_limit, 20);
        assert_eq!(after.cache.size, 0);
        assert_eq!(after.cache.hits, 0);
    }

    #[test]
    fn clones_share_state() {
        let guards = Safeguards::new("vinted", &AcquisitionConfig::default());
        let other = guards.clone();
        other.cache.set("k", page());
        assert!(guards.cache.get("k").is_some());
    }
}
