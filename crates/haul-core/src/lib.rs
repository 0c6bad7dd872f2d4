pub mod acquisition;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod gate;
pub mod models;
pub mod pagination;
pub mod rate_limiter;
pub mod safeguards;
mod single_flight;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use acquisition::{AcquisitionEvent, AcquisitionReporter, AcquisitionService, TracingReporter};
pub use cache::{CacheConfig, CacheManager, CacheStats};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitState,
};
pub use config::AcquisitionConfig;
pub use error::AppError;
pub use gate::{ConcurrencyGate, GatePermit};
pub use models::{
    Acquisition, Extracted, ListingPage, ListingStatus, MAX_PAGE_SIZE, Origin, PaginationHint,
    PaginationInfo, ProductRecord, RawResponse, SearchRequest, SearchRequestBuilder,
};
pub use pagination::StabilizationConfig;
pub use rate_limiter::{RateLimitPolicy, RateLimiter, RateLimiterConfig};
pub use safeguards::{HealthSnapshot, Safeguards};
pub use traits::{Extractor, Fetcher, SampleDataProvider};
