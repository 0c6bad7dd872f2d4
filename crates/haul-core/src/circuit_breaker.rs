//! Circuit breaker guarding upstream marketplace calls.
//!
//! # Circuit States
//!
//! ```text
//! CLOSED (healthy) --[N failures]--> OPEN (rejecting) --[timeout]--> HALF_OPEN (one trial)
//!                                                                         |
//!                                       <--[failure]--                    |
//!                                                                         |
//! CLOSED <---------------------------[success]----------------------------+
//! ```
//!
//! The failure count only returns to zero when the circuit closes (or on a
//! manual reset); successes while already closed leave it untouched.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::AppError;

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed - requests flow normally.
    Closed,
    /// Circuit is open - requests are rejected immediately.
    Open,
    /// Circuit is half-open - a single trial request is allowed through.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit.
    pub failure_threshold: u32,

    /// Time to wait before transitioning from Open to Half-Open.
    pub recovery_timeout: Duration,

    /// When upstream answers 429, multiply recovery_timeout by this factor.
    pub rate_limit_backoff_multiplier: f32,

    /// Maximum recovery timeout after rate limit backoffs.
    pub max_recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(120),
            rate_limit_backoff_multiplier: 2.0,
            max_recovery_timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug)]
struct CircuitBreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    last_error_message: Option<String>,
    current_recovery_timeout: Duration,
    trial_in_flight: bool,
}

impl CircuitBreakerInner {
    fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            last_error_message: None,
            current_recovery_timeout: config.recovery_timeout,
            trial_in_flight: false,
        }
    }

    fn retry_after(&self) -> Duration {
        self.last_failure_time
            .map(|t| self.current_recovery_timeout.saturating_sub(t.elapsed()))
            .unwrap_or(self.current_recovery_timeout)
    }

    fn close(&mut self, base_timeout: Duration) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.last_error_message = None;
        self.current_recovery_timeout = base_timeout;
        self.trial_in_flight = false;
    }
}

/// Statistics about circuit breaker state for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_error: Option<String>,
    pub time_until_half_open: Option<Duration>,
}

/// Error type for circuit breaker operations.
#[derive(Debug)]
pub enum CircuitBreakerError {
    /// Circuit is open - request was rejected without calling the service.
    Open { name: String, retry_after: Duration },
    /// The inner operation failed.
    Inner(AppError),
}

impl std::fmt::Display for CircuitBreakerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerError::Open { name, retry_after } => {
                write!(
                    f,
                    "Circuit breaker '{}' is open. Retry after {} seconds.",
                    name,
                    retry_after.as_secs()
                )
            }
            CircuitBreakerError::Inner(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CircuitBreakerError {}

impl From<CircuitBreakerError> for AppError {
    fn from(err: CircuitBreakerError) -> Self {
        match err {
            CircuitBreakerError::Open { name, retry_after } => AppError::CircuitOpen {
                name,
                retry_after_secs: retry_after.as_secs_f64().ceil() as u64,
            },
            CircuitBreakerError::Inner(e) => e,
        }
    }
}

/// Thread-safe circuit breaker shared by every call through one orchestrator.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<CircuitBreakerInner>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let inner = CircuitBreakerInner::new(&config);
        Self {
            name: name.into(),
            config,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires the inner mutex lock, recovering from poison if necessary.
    fn lock_inner(&self) -> std::sync::MutexGuard<'_, CircuitBreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(circuit = %self.name, "Recovered from poisoned mutex");
            poisoned.into_inner()
        })
    }

    /// Returns the current state, handling lazy Open → HalfOpen transitions.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock_inner();
        self.maybe_transition_to_half_open(&mut inner);
        inner.state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock_inner().failure_count
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let mut inner = self.lock_inner();
        self.maybe_transition_to_half_open(&mut inner);

        let time_until_half_open = if inner.state == CircuitState::Open {
            Some(inner.retry_after())
        } else {
            None
        };

        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            last_error: inner.last_error_message.clone(),
            time_until_half_open,
        }
    }

    /// Executes the given operation through the circuit breaker.
    ///
    /// - Closed: executes operation, tracks failures
    /// - Open: returns `CircuitBreakerError::Open` without running it
    /// - HalfOpen: runs it as the single trial; concurrent callers are
    ///   rejected until the trial settles
    pub async fn call<F, T, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let _trial = {
            let mut inner = self.lock_inner();
            self.maybe_transition_to_half_open(&mut inner);

            match inner.state {
                CircuitState::Open => {
                    return Err(CircuitBreakerError::Open {
                        name: self.name.clone(),
                        retry_after: inner.retry_after(),
                    });
                }
                CircuitState::HalfOpen if inner.trial_in_flight => {
                    return Err(CircuitBreakerError::Open {
                        name: self.name.clone(),
                        retry_after: Duration::ZERO,
                    });
                }
                CircuitState::HalfOpen => {
                    inner.trial_in_flight = true;
                    Some(TrialSlot { breaker: self })
                }
                CircuitState::Closed => None,
            }
        };

        let result = operation().await;

        match &result {
            Ok(_) => self.record_success(),
            Err(e) => self.record_failure(e),
        }

        result.map_err(CircuitBreakerError::Inner)
    }

    pub fn record_success(&self) {
        let mut inner = self.lock_inner();

        if inner.state == CircuitState::HalfOpen {
            tracing::info!(circuit = %self.name, "Circuit breaker closing after successful trial");
            inner.close(self.config.recovery_timeout);
        }
    }

    pub fn record_failure(&self, error: &AppError) {
        let mut inner = self.lock_inner();
        let is_rate_limit = error.is_upstream_rate_limit();

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                inner.last_failure_time = Some(Instant::now());
                inner.last_error_message = Some(error.to_string());

                if inner.failure_count >= self.config.failure_threshold {
                    tracing::warn!(
                        circuit = %self.name,
                        failures = inner.failure_count,
                        error = %error,
                        "Circuit breaker opening after {} failures",
                        inner.failure_count
                    );
                    inner.state = CircuitState::Open;
                    if is_rate_limit {
                        self.extend_recovery_timeout(&mut inner);
                    }
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(
                    circuit = %self.name,
                    error = %error,
                    "Circuit breaker trial failed, returning to open state"
                );
                inner.state = CircuitState::Open;
                inner.failure_count += 1;
                inner.last_failure_time = Some(Instant::now());
                inner.last_error_message = Some(error.to_string());
                inner.trial_in_flight = false;
                if is_rate_limit {
                    self.extend_recovery_timeout(&mut inner);
                }
            }
            CircuitState::Open => {
                inner.last_error_message = Some(error.to_string());
            }
        }
    }

    pub fn reset(&self) {
        let mut inner = self.lock_inner();
        tracing::info!(circuit = %self.name, "Circuit breaker manually reset");
        inner.close(self.config.recovery_timeout);
        inner.last_failure_time = None;
    }

    fn extend_recovery_timeout(&self, inner: &mut CircuitBreakerInner) {
        inner.current_recovery_timeout = std::cmp::min(
            Duration::from_secs_f32(
                inner.current_recovery_timeout.as_secs_f32()
                    * self.config.rate_limit_backoff_multiplier,
            ),
            self.config.max_recovery_timeout,
        );
        tracing::info!(
            circuit = %self.name,
            recovery_timeout_secs = inner.current_recovery_timeout.as_secs(),
            "Extended recovery timeout due to upstream rate limit"
        );
    }

    fn maybe_transition_to_half_open(&self, inner: &mut CircuitBreakerInner) {
        if inner.state == CircuitState::Open
            && let Some(last_failure) = inner.last_failure_time
            && last_failure.elapsed() > inner.current_recovery_timeout
        {
            tracing::info!(
                circuit = %self.name,
                "Circuit breaker transitioning to half-open state"
            );
            inner.state = CircuitState::HalfOpen;
            inner.trial_in_flight = false;
        }
    }
}

/// Frees the half-open trial slot even if the trial future is dropped.
struct TrialSlot<'a> {
    breaker: &'a CircuitBreaker,
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        self.breaker.lock_inner().trial_in_flight = false;
    }
}
