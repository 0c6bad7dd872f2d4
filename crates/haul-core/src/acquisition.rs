//! The acquisition pipeline: cache → gate → rate limit → breaker-guarded
//! fetch and extract → paginate → cache, with a placeholder fallback.

use std::time::Duration;

use crate::config::AcquisitionConfig;
use crate::error::AppError;
use crate::models::{Acquisition, ListingPage, Origin, SearchRequest};
use crate::pagination::{StabilizationConfig, build_page, fallback_pagination};
use crate::rate_limiter::RateLimitPolicy;
use crate::safeguards::Safeguards;
use crate::single_flight::KeyedLocks;
use crate::traits::{Extractor, Fetcher, SampleDataProvider};

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Events emitted while serving one acquisition.
#[derive(Debug)]
pub enum AcquisitionEvent<'a> {
    CacheHit {
        source: &'a str,
        cache_key: &'a str,
    },
    CacheMiss {
        source: &'a str,
        cache_key: &'a str,
    },
    /// A concurrent caller filled the cache while this one waited on the key.
    Coalesced {
        source: &'a str,
        cache_key: &'a str,
    },
    Fetched {
        source: &'a str,
        records: usize,
        total_items: u64,
    },
    /// The guarded path failed and placeholder data was served instead.
    Degraded {
        source: &'a str,
        error: &'a AppError,
    },
    /// The guarded path failed and the error is returned to the caller.
    Failed {
        source: &'a str,
        error: &'a AppError,
    },
    TimedOut {
        source: &'a str,
        deadline: Duration,
    },
}

impl AcquisitionEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            AcquisitionEvent::CacheHit { .. } => "cache_hit",
            AcquisitionEvent::CacheMiss { .. } => "cache_miss",
            AcquisitionEvent::Coalesced { .. } => "coalesced",
            AcquisitionEvent::Fetched { .. } => "fetched",
            AcquisitionEvent::Degraded { .. } => "degraded",
            AcquisitionEvent::Failed { .. } => "failed",
            AcquisitionEvent::TimedOut { .. } => "timed_out",
        }
    }
}

/// Observer for acquisition events. The default implementation ignores them.
pub trait AcquisitionReporter: Send + Sync {
    fn report(&self, event: AcquisitionEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl AcquisitionReporter for TracingReporter {
    fn report(&self, event: AcquisitionEvent<'_>) {
        match event {
            AcquisitionEvent::CacheHit { source, cache_key } => {
                tracing::debug!(%source, %cache_key, "Cache hit");
            }
            AcquisitionEvent::CacheMiss { source, cache_key } => {
                tracing::debug!(%source, %cache_key, "Cache miss");
            }
            AcquisitionEvent::Coalesced { source, cache_key } => {
                tracing::debug!(%source, %cache_key, "Served by concurrent fetch");
            }
            AcquisitionEvent::Fetched {
                source,
                records,
                total_items,
            } => {
                tracing::info!(%source, records, total_items, "Fetched listings");
            }
            AcquisitionEvent::Degraded { source, error } => {
                tracing::warn!(
                    %source,
                    error = %error,
                    kind = error.kind(),
                    "Serving placeholder listings"
                );
            }
            AcquisitionEvent::Failed { source, error } => {
                tracing::warn!(%source, error = %error, kind = error.kind(), "Acquisition failed");
            }
            AcquisitionEvent::TimedOut { source, deadline } => {
                tracing::warn!(
                    %source,
                    deadline_ms = %deadline.as_millis(),
                    "Acquisition timed out"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Serves listing searches for one upstream source.
///
/// Generic over the fetch, extract and placeholder strategies so the same
/// orchestration runs against any marketplace, or against mocks in tests.
pub struct AcquisitionService<F, E, P, R = TracingReporter>
where
    F: Fetcher,
    E: Extractor,
    P: SampleDataProvider,
    R: AcquisitionReporter,
{
    source: String,
    fetcher: F,
    extractor: E,
    samples: P,
    safeguards: Safeguards,
    policy: RateLimitPolicy,
    stabilization: StabilizationConfig,
    degrade_on_failure: bool,
    in_flight: Option<KeyedLocks>,
    reporter: R,
}

impl<F, E, P> AcquisitionService<F, E, P, TracingReporter>
where
    F: Fetcher,
    E: Extractor,
    P: SampleDataProvider,
{
    /// Create a service with its own freshly built safeguards.
    pub fn new(
        source: impl Into<String>,
        fetcher: F,
        extractor: E,
        samples: P,
        config: &AcquisitionConfig,
    ) -> Self {
        let source = source.into();
        Self {
            safeguards: Safeguards::new(&source, config),
            source,
            fetcher,
            extractor,
            samples,
            policy: config.rate_limit_policy,
            stabilization: config.stabilization.clone(),
            degrade_on_failure: config.degrade_on_failure,
            in_flight: config.coalesce_misses.then(KeyedLocks::default),
            reporter: TracingReporter,
        }
    }
}

impl<F, E, P, R> AcquisitionService<F, E, P, R>
where
    F: Fetcher,
    E: Extractor,
    P: SampleDataProvider,
    R: AcquisitionReporter,
{
    /// Replace the safeguards, e.g. to share them with another handle.
    pub fn with_safeguards(mut self, safeguards: Safeguards) -> Self {
        self.safeguards = safeguards;
        self
    }

    pub fn with_reporter<R2>(self, reporter: R2) -> AcquisitionService<F, E, P, R2>
    where
        R2: AcquisitionReporter,
    {
        AcquisitionService {
            source: self.source,
            fetcher: self.fetcher,
            extractor: self.extractor,
            samples: self.samples,
            safeguards: self.safeguards,
            policy: self.policy,
            stabilization: self.stabilization,
            degrade_on_failure: self.degrade_on_failure,
            in_flight: self.in_flight,
            reporter,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn safeguards(&self) -> &Safeguards {
        &self.safeguards
    }

    /// Serve one page of listings.
    ///
    /// The request is already validated by its builder. Failures on the
    /// guarded path degrade to placeholder data (cached under the same key)
    /// unless `degrade_on_failure` is off or the error is fatal.
    pub async fn acquire(&self, request: &SearchRequest) -> Result<Acquisition, AppError> {
        let cache_key = request.cache_key(&self.source);

        if let Some(page) = self.safeguards.cache.get(&cache_key) {
            self.reporter.report(AcquisitionEvent::CacheHit {
                source: &self.source,
                cache_key: &cache_key,
            });
            return Ok(Acquisition::from_page(page, Origin::Cached));
        }
        self.reporter.report(AcquisitionEvent::CacheMiss {
            source: &self.source,
            cache_key: &cache_key,
        });

        let Some(locks) = &self.in_flight else {
            return self.acquire_uncached(request, &cache_key).await;
        };

        let _key_guard = locks.lock(&cache_key).await;
        // Already counted as a miss above.
        if let Some(page) = self.safeguards.cache.peek(&cache_key) {
            self.reporter.report(AcquisitionEvent::Coalesced {
                source: &self.source,
                cache_key: &cache_key,
            });
            return Ok(Acquisition::from_page(page, Origin::Cached));
        }
        self.acquire_uncached(request, &cache_key).await
    }

    /// [`acquire`](Self::acquire) bounded by `deadline`.
    ///
    /// On expiry the in-flight work is dropped: its gate slot is released
    /// and nothing is cached.
    pub async fn acquire_within(
        &self,
        request: &SearchRequest,
        deadline: Duration,
    ) -> Result<Acquisition, AppError> {
        match tokio::time::timeout(deadline, self.acquire(request)).await {
            Ok(result) => result,
            Err(_) => {
                self.reporter.report(AcquisitionEvent::TimedOut {
                    source: &self.source,
                    deadline,
                });
                Err(AppError::Timeout(deadline.as_secs_f64().ceil() as u64))
            }
        }
    }

    async fn acquire_uncached(
        &self,
        request: &SearchRequest,
        cache_key: &str,
    ) -> Result<Acquisition, AppError> {
        match self.fetch_page(request).await {
            Ok(page) => {
                self.safeguards.limiter.adapt(1.0);
                self.reporter.report(AcquisitionEvent::Fetched {
                    source: &self.source,
                    records: page.records.len(),
                    total_items: page.pagination.total_items,
                });
                self.safeguards.cache.set(cache_key, page.clone());
                Ok(Acquisition::from_page(page, Origin::Fresh))
            }
            Err(error) => {
                self.safeguards.limiter.adapt(0.0);

                if !self.degrade_on_failure || error.is_fatal() {
                    self.reporter.report(AcquisitionEvent::Failed {
                        source: &self.source,
                        error: &error,
                    });
                    return Err(error);
                }

                self.reporter.report(AcquisitionEvent::Degraded {
                    source: &self.source,
                    error: &error,
                });
                let page = self.fallback_page(request, &error);
                self.safeguards.cache.set(cache_key, page.clone());
                Ok(Acquisition::from_page(page, Origin::Fallback))
            }
        }
    }

    /// The guarded path. The gate slot is held for the whole attempt,
    /// including any rate-limit wait.
    async fn fetch_page(&self, request: &SearchRequest) -> Result<ListingPage, AppError> {
        let _permit = self.safeguards.gate.acquire().await?;
        self.safeguards
            .limiter
            .admit(&self.source, self.policy)
            .await?;

        let fetcher = &self.fetcher;
        let extractor = &self.extractor;
        let extracted = self
            .safeguards
            .breaker
            .call(move || async move {
                let raw = fetcher.fetch(request).await?;
                extractor.extract(&raw, request)
            })
            .await?;

        Ok(build_page(extracted, request, &self.stabilization))
    }

    fn fallback_page(&self, request: &SearchRequest, error: &AppError) -> ListingPage {
        let records = self.samples.samples(request);
        ListingPage {
            pagination: fallback_pagination(records.len()),
            records,
            warning: Some(format!("Showing sample listings: {error}")),
        }
    }
}
