//! Sliding-window admission control with an adaptive limit.
//!
//! Every caller identity gets its own window of recent request timestamps.
//! The limit applied to all windows moves between a floor and a ceiling
//! based on how well upstream has been answering: [`RateLimiter::adapt`]
//! is fed one success rate per orchestrated request, never per sub-request,
//! so the limit does not oscillate.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::AppError;

/// Configuration for the rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Upper bound for the limit, and its starting value.
    pub ceiling: u32,
    /// Lower bound the limit backs off to.
    pub floor: u32,
    /// Length of the sliding window.
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            ceiling: 20,
            floor: 5,
            window: Duration::from_secs(60),
        }
    }
}

/// What to do when a caller is over its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitPolicy {
    /// Fail immediately with [`AppError::RateLimitExceeded`].
    Reject,
    /// Sleep until a slot frees up, giving up after `max_wait`.
    Wait { max_wait: Duration },
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        RateLimitPolicy::Wait {
            max_wait: Duration::from_secs(60),
        }
    }
}

/// Adaptive sliding-window rate limiter keyed by caller identity.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    current_limit: Arc<AtomicU32>,
    windows: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl RateLimiter {
    pub fn new(mut config: RateLimiterConfig) -> Self {
        config.ceiling = config.ceiling.max(1);
        config.floor = config.floor.clamp(1, config.ceiling);
        Self {
            current_limit: Arc::new(AtomicU32::new(config.ceiling)),
            windows: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    pub fn current_limit(&self) -> u32 {
        self.current_limit.load(Ordering::Acquire)
    }

    fn lock_windows(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.windows.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned rate limiter mutex");
            poisoned.into_inner()
        })
    }

    fn prune(window: &mut VecDeque<Instant>, now: Instant, length: Duration) {
        while let Some(&oldest) = window.front() {
            if now.saturating_duration_since(oldest) >= length {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit one request for `identity` if it is under the current limit.
    ///
    /// Admission records the request; refusal records nothing.
    pub fn allow(&self, identity: &str) -> bool {
        let limit = self.current_limit() as usize;
        let now = Instant::now();
        let mut windows = self.lock_windows();
        let window = windows.entry(identity.to_string()).or_default();
        Self::prune(window, now, self.config.window);

        if window.len() < limit {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    /// How long `identity` must wait before [`allow`](Self::allow) can succeed.
    pub fn wait_time(&self, identity: &str) -> Duration {
        let limit = self.current_limit() as usize;
        let now = Instant::now();
        let mut windows = self.lock_windows();
        let Some(window) = windows.get_mut(identity) else {
            return Duration::ZERO;
        };
        Self::prune(window, now, self.config.window);

        if window.len() < limit {
            return Duration::ZERO;
        }
        // The limit may have shrunk below the window size; wait until enough
        // entries age out to leave room for one more.
        let blocking = window[window.len() - limit];
        (blocking + self.config.window).saturating_duration_since(now)
    }

    /// Admit according to `policy`, sleeping between attempts when waiting.
    pub async fn admit(&self, identity: &str, policy: RateLimitPolicy) -> Result<(), AppError> {
        let max_wait = match policy {
            RateLimitPolicy::Reject => {
                return if self.allow(identity) {
                    Ok(())
                } else {
                    Err(AppError::RateLimitExceeded)
                };
            }
            RateLimitPolicy::Wait { max_wait } => max_wait,
        };

        let started = Instant::now();
        loop {
            if self.allow(identity) {
                return Ok(());
            }
            // A zero wait means another caller raced us to the freed slot.
            let wait = self.wait_time(identity).max(Duration::from_millis(1));
            if started.elapsed() + wait > max_wait {
                tracing::warn!(
                    %identity,
                    wait_ms = %wait.as_millis(),
                    "Rate limit wait would exceed the allowed maximum"
                );
                return Err(AppError::RateLimitExceeded);
            }
            tracing::debug!(%identity, wait_ms = %wait.as_millis(), "Rate limiting: waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Move the limit according to a batch success rate in `[0, 1]`.
    ///
    /// `>= 0.8` grows it by 20% (at least 1), `< 0.5` shrinks it by 20%.
    /// Both round down and clamp to `[floor, ceiling]`.
    pub fn adapt(&self, success_rate: f64) {
        let RateLimiterConfig { ceiling, floor, .. } = self.config;
        let previous = self
            .current_limit
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let next = if success_rate >= 0.8 {
                    let grown = (f64::from(current) * 1.2).floor() as u32;
                    ceiling.min(grown.max(current.saturating_add(1)))
                } else if success_rate < 0.5 {
                    floor.max((f64::from(current) * 0.8).floor() as u32)
                } else {
                    current
                };
                Some(next.clamp(floor, ceiling))
            });

        if let Ok(previous) = previous {
            let current = self.current_limit();
            if previous != current {
                tracing::debug!(previous, current, success_rate, "Adapted rate limit");
            }
        }
    }

    /// Restore the limit to its ceiling and forget every window.
    pub fn reset(&self) {
        self.current_limit
            .store(self.config.ceiling, Ordering::Release);
        self.lock_windows().clear();
    }
}
