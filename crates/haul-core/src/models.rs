use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Largest page size a caller may ask for.
pub const MAX_PAGE_SIZE: usize = 500;

/// Whether a search targets live listings or completed sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    #[default]
    Active,
    Sold,
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingStatus::Active => write!(f, "active"),
            ListingStatus::Sold => write!(f, "sold"),
        }
    }
}

impl std::str::FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(ListingStatus::Active),
            "sold" => Ok(ListingStatus::Sold),
            other => Err(format!("Invalid listing status: '{other}'")),
        }
    }
}

/// A validated, immutable search against one marketplace.
///
/// Build it with [`SearchRequest::builder`]; invalid shapes are rejected
/// by [`SearchRequestBuilder::build`] before any component runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    query: String,
    page: usize,
    page_size: usize,
    min_price: Option<f64>,
    max_price: Option<f64>,
    region: String,
    status: ListingStatus,
}

impl SearchRequest {
    pub fn builder(query: impl Into<String>) -> SearchRequestBuilder {
        SearchRequestBuilder {
            query: query.into(),
            page: 1,
            page_size: 50,
            min_price: None,
            max_price: None,
            region: "uk".to_string(),
            status: ListingStatus::Active,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn min_price(&self) -> Option<f64> {
        self.min_price
    }

    pub fn max_price(&self) -> Option<f64> {
        self.max_price
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn status(&self) -> ListingStatus {
        self.status
    }

    /// Absolute index of the first record on the requested page.
    pub fn offset(&self) -> usize {
        (self.page - 1) * self.page_size
    }

    pub fn has_price_filter(&self) -> bool {
        self.min_price.is_some() || self.max_price.is_some()
    }

    /// Derive a cache key covering every field that changes the result.
    ///
    /// Free-text fields are debug-quoted so separators inside a query
    /// cannot make two different requests produce the same key.
    pub fn cache_key(&self, source: &str) -> String {
        format!(
            "{source}:{status}:{query:?}:{page}:{page_size}:{region:?}:{min}:{max}",
            status = self.status,
            query = self.query,
            page = self.page,
            page_size = self.page_size,
            region = self.region,
            min = fmt_bound(self.min_price),
            max = fmt_bound(self.max_price),
        )
    }
}

fn fmt_bound(bound: Option<f64>) -> String {
    bound.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Builder for [`SearchRequest`].
#[derive(Debug, Clone)]
pub struct SearchRequestBuilder {
    query: String,
    page: usize,
    page_size: usize,
    min_price: Option<f64>,
    max_price: Option<f64>,
    region: String,
    status: ListingStatus,
}

impl SearchRequestBuilder {
    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn min_price(mut self, min_price: Option<f64>) -> Self {
        self.min_price = min_price;
        self
    }

    pub fn max_price(mut self, max_price: Option<f64>) -> Self {
        self.max_price = max_price;
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn status(mut self, status: ListingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Result<SearchRequest, AppError> {
        if self.page == 0 {
            return Err(AppError::InvalidRequest("page must be at least 1".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(AppError::InvalidRequest(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        // offset() and the end of the page must both fit in a usize
        if (self.page - 1)
            .checked_mul(self.page_size)
            .and_then(|offset| offset.checked_add(self.page_size))
            .is_none()
        {
            return Err(AppError::InvalidRequest(format!(
                "page {} is out of range for page_size {}",
                self.page, self.page_size
            )));
        }
        for (name, bound) in [("min_price", self.min_price), ("max_price", self.max_price)] {
            if let Some(v) = bound
                && (!v.is_finite() || v < 0.0)
            {
                return Err(AppError::InvalidRequest(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price)
            && min > max
        {
            return Err(AppError::InvalidRequest(
                "min_price must not exceed max_price".into(),
            ));
        }
        let region = self.region.trim().to_ascii_lowercase();
        if region.is_empty() {
            return Err(AppError::InvalidRequest("region must not be empty".into()));
        }

        Ok(SearchRequest {
            query: self.query.trim().to_string(),
            page: self.page,
            page_size: self.page_size,
            min_price: self.min_price,
            max_price: self.max_price,
            region,
            status: self.status,
        })
    }
}

/// A normalized marketplace listing.
///
/// Serialized with the field names the public API has always used.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductRecord {
    pub title: String,
    /// Currency-tagged display price, e.g. `£4,250`.
    pub price: String,
    pub brand: String,
    pub size: String,
    pub image: String,
    pub link: String,
    pub condition: String,
    pub seller: String,
    pub original_price: String,
    pub discount: String,
}

/// Pagination block returned alongside every page of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub current_page: usize,
    pub items_per_page: usize,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_more: bool,
}

/// What an extractor knows about pagination besides the records themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaginationHint {
    /// Total item count reported by upstream, if any. May be noisy.
    pub total_items: Option<u64>,
    /// Absolute index of the first extracted record.
    pub offset: usize,
}

/// Raw upstream payload handed from a fetcher to an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub url: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content_type: None,
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Output of an extractor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extracted {
    pub records: Vec<ProductRecord>,
    pub hint: PaginationHint,
}

/// Where an acquisition's payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Fresh,
    Cached,
    Fallback,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Fresh => write!(f, "fresh"),
            Origin::Cached => write!(f, "cached"),
            Origin::Fallback => write!(f, "fallback"),
        }
    }
}

/// A complete page of results; the unit the cache stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingPage {
    pub records: Vec<ProductRecord>,
    pub pagination: PaginationInfo,
    /// Set when the page is placeholder data standing in for a failed fetch.
    pub warning: Option<String>,
}

/// Result of one orchestrated acquisition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Acquisition {
    pub records: Vec<ProductRecord>,
    pub pagination: PaginationInfo,
    pub warning: Option<String>,
    pub origin: Origin,
}

impl Acquisition {
    pub(crate) fn from_page(page: ListingPage, origin: Origin) -> Self {
        Self {
            records: page.records,
            pagination: page.pagination,
            warning: page.warning,
            origin,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.origin == Origin::Fallback || self.warning.is_some()
    }
}
