use serde::{Deserialize, Serialize};

use haul_core::error::AppError;
use haul_core::models::{Acquisition, ListingStatus, PaginationInfo, ProductRecord, SearchRequest};
use haul_core::safeguards::HealthSnapshot;

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Free-text search terms
    pub q: Option<String>,
    /// 1-based page number (default 1)
    pub page: Option<usize>,
    /// Records per page (default 50, max 500)
    pub per_page: Option<usize>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Marketplace region, e.g. "uk" or "fr" (default "uk")
    pub region: Option<String>,
    /// "active" (default) or "sold"
    pub status: Option<String>,
}

impl SearchQuery {
    pub fn into_request(self) -> Result<SearchRequest, AppError> {
        let mut builder = SearchRequest::builder(self.q.unwrap_or_default())
            .min_price(self.min_price)
            .max_price(self.max_price);
        if let Some(page) = self.page {
            builder = builder.page(page);
        }
        if let Some(per_page) = self.per_page {
            builder = builder.page_size(per_page);
        }
        if let Some(region) = self.region {
            builder = builder.region(region);
        }
        if let Some(status) = self.status {
            let status = status
                .parse::<ListingStatus>()
                .map_err(AppError::InvalidRequest)?;
            builder = builder.status(status);
        }
        builder.build()
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PaginationResponse {
    pub current_page: usize,
    pub items_per_page: usize,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_more: bool,
}

impl From<PaginationInfo> for PaginationResponse {
    fn from(p: PaginationInfo) -> Self {
        Self {
            current_page: p.current_page,
            items_per_page: p.items_per_page,
            total_items: p.total_items,
            total_pages: p.total_pages,
            has_more: p.has_more,
        }
    }
}

/// Search envelope. `success` is false when the records are placeholder
/// data, in which case `error` explains why.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SearchResponse {
    pub success: bool,
    /// Listings keyed Title, Price, Brand, Size, Image, Link, Condition,
    /// Seller, OriginalPrice, Discount
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<ProductRecord>,
    pub count: usize,
    pub pagination: PaginationResponse,
    pub error: Option<String>,
    /// "fresh", "cached" or "fallback"
    pub origin: String,
}

impl From<Acquisition> for SearchResponse {
    fn from(a: Acquisition) -> Self {
        Self {
            success: !a.is_degraded(),
            count: a.records.len(),
            data: a.records,
            pagination: a.pagination.into(),
            error: a.warning,
            origin: a.origin.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: u64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SourceHealthResponse {
    pub name: String,
    pub healthy: bool,
    /// "closed", "open" or "half-open"
    pub breaker_state: String,
    pub failure_count: u32,
    pub last_error: Option<String>,
    pub retry_after_secs: Option<u64>,
    pub current_limit: u32,
    pub limit_ceiling: u32,
    pub limit_floor: u32,
    pub active_fetches: usize,
    pub max_concurrent: usize,
    pub cache: CacheStatsResponse,
}

impl SourceHealthResponse {
    pub fn new(name: &str, s: HealthSnapshot) -> Self {
        Self {
            name: name.to_string(),
            healthy: s.is_healthy(),
            breaker_state: s.breaker_state.to_string(),
            failure_count: s.failure_count,
            last_error: s.last_error,
            retry_after_secs: s.retry_after_secs,
            current_limit: s.current_limit,
            limit_ceiling: s.limit_ceiling,
            limit_floor: s.limit_floor,
            active_fetches: s.active_fetches,
            max_concurrent: s.max_concurrent,
            cache: CacheStatsResponse {
                hits: s.cache.hits,
                misses: s.cache.misses,
                hit_rate: s.cache.hit_rate,
                size: s.cache.size,
            },
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// "healthy" when every breaker is closed, otherwise "degraded"
    pub status: &'static str,
    pub sources: Vec<SourceHealthResponse>,
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ResetResponse {
    /// Sources whose safeguards were reset
    pub reset: Vec<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
