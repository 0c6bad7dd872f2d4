//! Turning an extracted record set into one stable page.
//!
//! Upstream total counts jitter around a few values across identical
//! calls. Snapping them to known boundaries keeps `total_pages` and
//! `has_more` deterministic for repeated queries.

use crate::models::{Extracted, ListingPage, PaginationInfo, ProductRecord, SearchRequest};

/// Boundaries that noisy upstream totals are snapped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilizationConfig {
    pub boundaries: Vec<u64>,
    /// Maximum distance from a boundary that still snaps to it.
    pub tolerance: u64,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            boundaries: vec![500, 1000, 5000, 10000],
            tolerance: 10,
        }
    }
}

impl StabilizationConfig {
    /// Snap `raw` to the nearest boundary within tolerance, else return it unchanged.
    pub fn stabilize(&self, raw: u64) -> u64 {
        self.boundaries
            .iter()
            .copied()
            .filter(|b| b.abs_diff(raw) <= self.tolerance)
            .min_by_key(|b| b.abs_diff(raw))
            .unwrap_or(raw)
    }
}

/// Pull the numeric amount out of a display price such as `£4,250` or `12,50 €`.
pub fn parse_price_amount(price: &str) -> Option<f64> {
    let start = price.find(|c: char| c.is_ascii_digit())?;
    let run: String = price[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let run = run.trim_end_matches([',', '.']);

    let normalized = if run.contains('.') {
        run.replace(',', "")
    } else if let Some(idx) = run.rfind(',') {
        // A trailing group of exactly three digits is a thousands separator.
        if run.len() - idx - 1 == 3 {
            run.replace(',', "")
        } else {
            run.replace(',', ".")
        }
    } else {
        run.to_string()
    };

    normalized.parse().ok()
}

/// Keep records whose price lies within `[min, max]`; unparseable prices are dropped.
pub fn filter_by_price(
    records: Vec<ProductRecord>,
    min: Option<f64>,
    max: Option<f64>,
) -> Vec<ProductRecord> {
    records
        .into_iter()
        .filter(|record| match parse_price_amount(&record.price) {
            Some(amount) => {
                min.is_none_or(|lo| amount >= lo) && max.is_none_or(|hi| amount <= hi)
            }
            None => false,
        })
        .collect()
}

/// Build the requested page from an extraction.
///
/// With a price filter the total is recomputed from the filtered set;
/// otherwise the upstream total is stabilized, and never reported below
/// the number of records actually seen.
pub fn build_page(
    extracted: Extracted,
    request: &SearchRequest,
    stabilization: &StabilizationConfig,
) -> ListingPage {
    let Extracted { records, hint } = extracted;
    let seen = (hint.offset + records.len()) as u64;

    let (records, total) = if request.has_price_filter() {
        let filtered = filter_by_price(records, request.min_price(), request.max_price());
        let total = (hint.offset + filtered.len()) as u64;
        (filtered, total)
    } else {
        let total = hint
            .total_items
            .map(|raw| stabilization.stabilize(raw).max(seen))
            .unwrap_or(seen);
        (records, total)
    };

    slice_page(records, hint.offset, total, request)
}

/// Cut `[start, start + page_size)` out of records that begin at absolute index `offset`.
pub fn slice_page(
    mut records: Vec<ProductRecord>,
    offset: usize,
    total: u64,
    request: &SearchRequest,
) -> ListingPage {
    let page_size = request.page_size();
    let start = request.offset();
    let end = start + page_size;

    let page_records = if start as u64 >= total {
        Vec::new()
    } else {
        let local_start = start.saturating_sub(offset).min(records.len());
        let local_end = end.saturating_sub(offset).min(records.len());
        records.truncate(local_end);
        records.split_off(local_start)
    };

    ListingPage {
        records: page_records,
        pagination: PaginationInfo {
            current_page: request.page(),
            items_per_page: page_size,
            total_items: total,
            total_pages: total.div_ceil(page_size as u64),
            has_more: (end as u64) < total,
        },
        warning: None,
    }
}

/// Pagination for a placeholder set: one page holding exactly `count` items.
pub fn fallback_pagination(count: usize) -> PaginationInfo {
    PaginationInfo {
        current_page: 1,
        items_per_page: count,
        total_items: count as u64,
        total_pages: 1,
        has_more: false,
    }
}
