use std::future::Future;

use crate::error::AppError;
use crate::models::{Extracted, ProductRecord, RawResponse, SearchRequest};

/// Retrieves a raw upstream response for a search.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        request: &SearchRequest,
    ) -> impl Future<Output = Result<RawResponse, AppError>> + Send;
}

/// Turns a raw upstream response into normalized records.
///
/// Implementations are site-specific strategies; the orchestrator never
/// inspects markup itself.
pub trait Extractor: Send + Sync + Clone {
    fn extract(&self, raw: &RawResponse, request: &SearchRequest) -> Result<Extracted, AppError>;
}

/// Supplies placeholder listings when the upstream cannot be reached.
///
/// Records must be recognisable as placeholders by whoever reads them.
pub trait SampleDataProvider: Send + Sync + Clone {
    fn samples(&self, request: &SearchRequest) -> Vec<ProductRecord>;
}
