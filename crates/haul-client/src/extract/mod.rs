//! Site-specific extraction strategies.

mod catalog;
mod search_api;

pub use catalog::{CatalogPageExtractor, CatalogSelectors};
pub use search_api::SearchApiExtractor;

use haul_core::error::AppError;
use haul_core::models::{Extracted, RawResponse, SearchRequest};
use haul_core::traits::Extractor;
use url::Url;

/// The extraction strategy configured for a source.
#[derive(Clone)]
pub enum ListingExtractor {
    SearchApi(SearchApiExtractor),
    CatalogPage(CatalogPageExtractor),
}

impl Extractor for ListingExtractor {
    fn extract(&self, raw: &RawResponse, request: &SearchRequest) -> Result<Extracted, AppError> {
        match self {
            ListingExtractor::SearchApi(e) => e.extract(raw, request),
            ListingExtractor::CatalogPage(e) => e.extract(raw, request),
        }
    }
}

impl From<SearchApiExtractor> for ListingExtractor {
    fn from(e: SearchApiExtractor) -> Self {
        ListingExtractor::SearchApi(e)
    }
}

impl From<CatalogPageExtractor> for ListingExtractor {
    fn from(e: CatalogPageExtractor) -> Self {
        ListingExtractor::CatalogPage(e)
    }
}

/// Resolve a possibly relative item link against the storefront URL.
/// Empty or unresolvable links become an empty string.
pub(crate) fn resolve_link(base: &Url, link: &str) -> String {
    let link = link.trim();
    if link.is_empty() {
        return String::new();
    }
    base.join(link).map(String::from).unwrap_or_default()
}

/// `4250` → `4,250`.
pub(crate) fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Collapse runs of whitespace into single spaces.
pub(crate) fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
