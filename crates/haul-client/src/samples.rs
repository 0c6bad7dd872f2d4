use haul_core::models::{ProductRecord, SearchRequest};
use haul_core::traits::SampleDataProvider;

use crate::extract::format_amount;

const SAMPLE_COUNT: usize = 23;

const BRANDS: &[&str] = &[
    "Chanel",
    "Louis Vuitton",
    "Hermès",
    "Gucci",
    "Dior",
    "Prada",
    "Bottega Veneta",
    "Saint Laurent",
    "Celine",
];
const ITEMS: &[&str] = &[
    "Handbag",
    "Tote Bag",
    "Crossbody Bag",
    "Shoulder Bag",
    "Clutch",
    "Backpack",
    "Hobo Bag",
];
const CONDITIONS: &[&str] = &["Excellent", "Very Good", "Good", "Fair"];
const SIZES: &[&str] = &["Small", "Medium", "Large", "One Size"];

/// Deterministic placeholder listings served when a source cannot be reached.
///
/// Every title starts with `[sample]` and every seller is
/// `sample_seller_<n>`, so the records can never pass for live data.
#[derive(Debug, Clone)]
pub struct PlaceholderCatalog {
    site: String,
}

impl PlaceholderCatalog {
    /// `site` is the storefront the placeholder links point into.
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into().trim_end_matches('/').to_string(),
        }
    }
}

impl SampleDataProvider for PlaceholderCatalog {
    fn samples(&self, _request: &SearchRequest) -> Vec<ProductRecord> {
        (0..SAMPLE_COUNT)
            .map(|i| {
                let brand = BRANDS[i % BRANDS.len()];
                let item = ITEMS[(i * 3) % ITEMS.len()];
                let price = 450 + (i as u64 * 733) % 4_000;
                let original = price * 6 / 5;
                let discount = ((original - price) * 100 + original / 2) / original;

                ProductRecord {
                    title: format!("[sample] {brand} {item}"),
                    price: format!("£{}", format_amount(price)),
                    brand: brand.to_string(),
                    size: SIZES[i % SIZES.len()].to_string(),
                    image: String::new(),
                    link: format!("{}/items/sample-{i}", self.site),
                    condition: CONDITIONS[i % CONDITIONS.len()].to_string(),
                    seller: format!("sample_seller_{i}"),
                    original_price: format!("£{}", format_amount(original)),
                    discount: format!("{discount}%"),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<ProductRecord> {
        let request = SearchRequest::builder("bag").build().unwrap();
        PlaceholderCatalog::new("https://www.vinted.co.uk/").samples(&request)
    }

    #[test]
    fn samples_are_recognisable_placeholders() {
        let records = samples();
        assert_eq!(records.len(), 23);
        for (i, record) in records.iter().enumerate() {
            assert!(record.title.starts_with("[sample] "), "{}", record.title);
            assert_eq!(record.seller, format!("sample_seller_{i}"));
            assert_eq!(
                record.link,
                format!("https://www.vinted.co.uk/items/sample-{i}")
            );
        }
    }

    #[test]
    fn samples_are_deterministic() {
        assert_eq!(samples(), samples());
    }

    #[test]
    fn prices_carry_a_consistent_discount() {
        let first = &samples()[0];
        assert_eq!(first.price, "£450");
        assert_eq!(first.original_price, "£540");
        assert_eq!(first.discount, "17%");

        let big = samples().into_iter().find(|r| r.price.contains(',')).unwrap();
        assert!(big.price.starts_with('£'));
    }
}
