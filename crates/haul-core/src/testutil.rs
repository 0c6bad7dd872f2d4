//! Test utilities: mock implementations of the acquisition traits.
//!
//! Handwritten mocks for dependency injection in unit and integration
//! tests. All mocks use `Arc<Mutex<_>>` or atomics for interior
//! mutability, so clones handed to a service can still be inspected.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::acquisition::{AcquisitionEvent, AcquisitionReporter};
use crate::error::AppError;
use crate::models::{Extracted, ProductRecord, RawResponse, SearchRequest};
use crate::traits::{Extractor, Fetcher, SampleDataProvider};

/// `n` records titled `item 0..n` and priced `£10..`.
pub fn numbered_records(n: usize) -> Vec<ProductRecord> {
    (0..n)
        .map(|i| ProductRecord {
            title: format!("item {i}"),
            price: format!("£{}", 10 + i),
            brand: "Test".into(),
            link: format!("https://example.com/items/{i}"),
            ..Default::default()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher with a queue of responses and a call counter.
#[derive(Clone)]
pub struct MockFetcher {
    /// Each call pops the first element. Once empty, returns `default_body`.
    responses: Arc<Mutex<Vec<Result<RawResponse, AppError>>>>,
    default_body: String,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight count when a fetch ends or is cancelled.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockFetcher {
    pub fn new(body: &str) -> Self {
        Self::with_responses(vec![]).with_default_body(body)
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<RawResponse, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            default_body: "{}".to_string(),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_default_body(mut self, body: &str) -> Self {
        self.default_body = body.to_string();
        self
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most fetches ever running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, _request: &SearchRequest) -> Result<RawResponse, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(Arc::clone(&self.in_flight));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(RawResponse::new("mock://upstream", self.default_body.clone()))
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that ignores the payload and returns configured results.
#[derive(Clone)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<Result<Extracted, AppError>>>>,
    default: Extracted,
}

impl MockExtractor {
    /// Always returns `extracted`.
    pub fn new(extracted: Extracted) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![])),
            default: extracted,
        }
    }

    /// Fails once with `error`, then returns empty extractions.
    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<Extracted, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            default: Extracted::default(),
        }
    }
}

impl Extractor for MockExtractor {
    fn extract(&self, _raw: &RawResponse, _request: &SearchRequest) -> Result<Extracted, AppError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default.clone())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// FixedSamples
// ---------------------------------------------------------------------------

/// Placeholder provider returning `n` obviously fake records.
#[derive(Clone)]
pub struct FixedSamples {
    records: Vec<ProductRecord>,
}

impl FixedSamples {
    pub fn new(n: usize) -> Self {
        Self {
            records: (0..n)
                .map(|i| ProductRecord {
                    title: format!("[sample] item {i}"),
                    price: "£0".into(),
                    seller: format!("sample_seller_{i}"),
                    ..Default::default()
                })
                .collect(),
        }
    }
}

impl SampleDataProvider for FixedSamples {
    fn samples(&self, _request: &SearchRequest) -> Vec<ProductRecord> {
        self.records.clone()
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records event names in order.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingReporter {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

impl AcquisitionReporter for RecordingReporter {
    fn report(&self, event: AcquisitionEvent<'_>) {
        self.events.lock().unwrap().push(event.name());
    }
}
