//! Extraction for JSON product-search APIs.
//!
//! The API only returns `id`, `name`, `description` and a relative `link`
//! per item; brand, price, size, condition and seller are recovered from
//! the free-text description with small pattern tables.

use std::sync::Arc;

use haul_core::error::AppError;
use haul_core::models::{Extracted, PaginationHint, ProductRecord, RawResponse, SearchRequest};
use haul_core::traits::Extractor;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use super::{format_amount, resolve_link};

/// Numbers at or below this in a description are treated as sizes or
/// measurements rather than prices.
const MIN_PLAUSIBLE_PRICE: u64 = 100;

const BRANDS: &[(&str, &[&str])] = &[
    ("Chanel", &["chanel"]),
    ("Louis Vuitton", &["louis vuitton", "lv"]),
    ("Hermès", &["hermès", "hermes"]),
    ("Gucci", &["gucci"]),
    ("Dior", &["dior"]),
    ("Prada", &["prada"]),
    ("Bottega Veneta", &["bottega veneta"]),
    ("Saint Laurent", &["saint laurent", "ysl"]),
    ("Celine", &["celine", "céline"]),
    ("Balenciaga", &["balenciaga"]),
    ("Fendi", &["fendi"]),
    ("Givenchy", &["givenchy"]),
    ("Valentino", &["valentino"]),
    ("Versace", &["versace"]),
    ("Burberry", &["burberry"]),
];

/// First match wins, so stronger phrasings come first.
const CONDITIONS: &[(&str, &[&str])] = &[
    (
        "Excellent",
        &["excellent condition", "perfect condition", "like new", "mint condition"],
    ),
    (
        "Very Good",
        &["very good condition", "great condition", "excellent"],
    ),
    ("Good", &["good condition", "used but good", "fairly good"]),
    (
        "Fair",
        &["fair condition", "acceptable condition", "worn but fair"],
    ),
    ("Poor", &["poor condition", "heavily worn", "damaged"]),
];

/// `(pattern, currency symbol)`; capture group 1 holds the amount.
const PRICES: &[(&str, &str)] = &[
    (r"£\s?(\d+(?:,\d{3})*)", "£"),
    (r"(\d+(?:,\d{3})*)\s?£", "£"),
    (r"€\s?(\d+(?:,\d{3})*)", "€"),
    (r"(\d+(?:,\d{3})*)\s?€", "€"),
    (r"\$\s?(\d+(?:,\d{3})*)", "$"),
    (r"(?i)\b(?:price|cost)[:\s]*(\d+(?:,\d{3})*)", "£"),
    (r"(?i)\b(\d{1,6})\s*(?:pounds?|gbp)\b", "£"),
    (r"(?i)\b(\d{1,6})\s*(?:eur|euros?)\b", "€"),
    (r"(?i)\b(\d{1,6})\s*usd\b", "$"),
];

const SELLERS: &[&str] = &[
    r"(?i)\bsold by\s+([^\s.,]+)",
    r"(?i)\bseller[:\s]+([^\s.,]+)",
    r"(?i)\bfrom\s+([^\s.,]+)\s+shop\b",
];

const SIZES: &[&str] = &[
    r"(?i)\b(?:uk|eu|us)\s*size\s+(\w+)",
    r"(?i)\bsize[:\s]+([a-z0-9]+)\b",
];

const IMAGE_URL: &str = r#"https://[\w.-]+/[^\s)"']+\.(?:jpe?g|png|webp)"#;

struct PatternTables {
    brands: Vec<(&'static str, Regex)>,
    prices: Vec<(Regex, &'static str)>,
    sellers: Vec<Regex>,
    sizes: Vec<Regex>,
    image: Regex,
}

fn compile(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(pattern)
        .map_err(|e| AppError::ConfigError(format!("Invalid pattern {pattern}: {e}")))
}

impl PatternTables {
    fn build() -> Result<Self, AppError> {
        let brands = BRANDS
            .iter()
            .map(|(name, aliases)| {
                let alternation = aliases
                    .iter()
                    .map(|a| regex::escape(a))
                    .collect::<Vec<_>>()
                    .join("|");
                Ok((*name, compile(&format!(r"(?i)\b(?:{alternation})\b"))?))
            })
            .collect::<Result<_, AppError>>()?;

        Ok(Self {
            brands,
            prices: PRICES
                .iter()
                .map(|(p, symbol)| Ok((compile(p)?, *symbol)))
                .collect::<Result<_, AppError>>()?,
            sellers: SELLERS.iter().map(|p| compile(p)).collect::<Result<_, _>>()?,
            sizes: SIZES.iter().map(|p| compile(p)).collect::<Result<_, _>>()?,
            image: compile(IMAGE_URL)?,
        })
    }

    fn brand(&self, title: &str, description: &str) -> Option<&'static str> {
        self.brands
            .iter()
            .find(|(_, re)| re.is_match(title) || re.is_match(description))
            .map(|(name, _)| *name)
    }

    fn price(&self, description: &str) -> Option<String> {
        self.prices.iter().find_map(|(re, symbol)| {
            re.captures_iter(description).find_map(|caps| {
                let amount: u64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
                (amount > MIN_PLAUSIBLE_PRICE)
                    .then(|| format!("{symbol}{}", format_amount(amount)))
            })
        })
    }

    fn seller(&self, description: &str) -> Option<String> {
        self.sellers
            .iter()
            .find_map(|re| re.captures(description))
            .and_then(|caps| caps.get(1))
            .map(|m| capitalize(m.as_str()))
    }

    fn size(&self, description: &str) -> Option<String> {
        self.sizes
            .iter()
            .find_map(|re| re.captures(description))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_ascii_uppercase())
    }

    fn image(&self, description: &str) -> Option<String> {
        self.image.find(description).map(|m| m.as_str().to_string())
    }
}

fn condition(description: &str) -> Option<&'static str> {
    let lower = description.to_lowercase();
    CONDITIONS
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|p| lower.contains(p)))
        .map(|(name, _)| *name)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

// ---- API response types ----

#[derive(Deserialize)]
struct SearchApiResponse {
    items: Option<Vec<ApiItem>>,
    #[serde(rename = "paginationStats")]
    pagination_stats: Option<PaginationStats>,
}

#[derive(Deserialize)]
struct ApiItem {
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    link: String,
}

#[derive(Deserialize)]
struct PaginationStats {
    #[serde(rename = "totalCount")]
    total_count: Option<u64>,
}

/// Extractor for `{items: [...], paginationStats: {totalCount}}` search APIs.
///
/// The API pages server-side, so records start at the request's offset.
#[derive(Clone)]
pub struct SearchApiExtractor {
    site: Url,
    image_template: Option<String>,
    default_seller: String,
    patterns: Arc<PatternTables>,
}

impl SearchApiExtractor {
    /// `site` is the public storefront that relative item links resolve against.
    pub fn new(site: &str) -> Result<Self, AppError> {
        let site = Url::parse(site)
            .map_err(|e| AppError::ConfigError(format!("Invalid site URL '{site}': {e}")))?;
        Ok(Self {
            site,
            image_template: None,
            default_seller: "marketplace_seller".to_string(),
            patterns: Arc::new(PatternTables::build()?),
        })
    }

    /// Image URL used when the description carries none; `{id}` is replaced
    /// by the item id.
    pub fn with_image_template(mut self, template: impl Into<String>) -> Self {
        self.image_template = Some(template.into());
        self
    }

    pub fn with_default_seller(mut self, seller: impl Into<String>) -> Self {
        self.default_seller = seller.into();
        self
    }

    fn record(&self, item: ApiItem) -> Option<ProductRecord> {
        let title = item.name.trim().to_string();
        if title.is_empty() {
            return None;
        }
        let id = match &item.id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        let p = &self.patterns;
        let description = item.description.as_str();
        let price = p
            .price(description)
            .unwrap_or_else(|| "Price not available".to_string());
        let image = p.image(description).unwrap_or_else(|| {
            match (&self.image_template, id.is_empty()) {
                (Some(template), false) => template.replace("{id}", &id),
                _ => String::new(),
            }
        });

        Some(ProductRecord {
            brand: p.brand(&title, description).unwrap_or("Unknown").to_string(),
            size: p.size(description).unwrap_or_else(|| "N/A".to_string()),
            image,
            link: resolve_link(&self.site, &item.link),
            condition: condition(description).unwrap_or("Good").to_string(),
            seller: p
                .seller(description)
                .unwrap_or_else(|| self.default_seller.clone()),
            original_price: price.clone(),
            discount: "0%".to_string(),
            price,
            title,
        })
    }
}

impl Extractor for SearchApiExtractor {
    fn extract(&self, raw: &RawResponse, request: &SearchRequest) -> Result<Extracted, AppError> {
        let response: SearchApiResponse = serde_json::from_str(&raw.body)
            .map_err(|e| AppError::ExtractionError(format!("Invalid search API payload: {e}")))?;
        let items = response.items.ok_or_else(|| {
            AppError::ExtractionError("Search API payload has no 'items' field".into())
        })?;

        let returned = items.len();
        let records: Vec<ProductRecord> =
            items.into_iter().filter_map(|i| self.record(i)).collect();
        if records.len() < returned {
            tracing::debug!(
                skipped = returned - records.len(),
                "Skipped search API items without a name"
            );
        }

        Ok(Extracted {
            records,
            hint: PaginationHint {
                total_items: response.pagination_stats.and_then(|s| s.total_count),
                offset: request.offset(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "items": [
            {
                "id": 123456,
                "name": "Chanel Classic Flap Bag",
                "description": "Medium flap in excellent condition. Price £4,250. Sold by parisboutique. Size M",
                "link": "/women-bags/handbags/chanel/classic-flap-123456.shtml"
            },
            {
                "id": "789012",
                "name": "Neverfull MM",
                "description": "LV tote, good condition, 1180 GBP, see https://images.example.com/p/789012.jpg",
                "link": "/women-bags/tote/louis-vuitton/neverfull-789012.shtml"
            },
            {
                "id": 3,
                "name": "Mystery pouch",
                "description": "Pouch, 20cm wide",
                "link": ""
            },
            {"id": 4, "name": "   ", "description": "", "link": "/x"}
        ],
        "paginationStats": {"totalCount": 1003}
    }"#;

    fn extractor() -> SearchApiExtractor {
        SearchApiExtractor::new("https://www.vestiairecollective.co.uk")
            .unwrap()
            .with_image_template("https://images.example.com/produit/{id}_1.jpg")
    }

    fn request(page: usize) -> SearchRequest {
        SearchRequest::builder("bag")
            .page(page)
            .page_size(50)
            .build()
            .unwrap()
    }

    #[test]
    fn parses_fixture_items() {
        let out = extractor()
            .extract(&RawResponse::new("https://api", FIXTURE), &request(1))
            .unwrap();

        assert_eq!(out.records.len(), 3);

        let flap = &out.records[0];
        assert_eq!(flap.title, "Chanel Classic Flap Bag");
        assert_eq!(flap.brand, "Chanel");
        assert_eq!(flap.price, "£4,250");
        assert_eq!(flap.original_price, "£4,250");
        assert_eq!(flap.discount, "0%");
        assert_eq!(flap.condition, "Excellent");
        assert_eq!(flap.seller, "Parisboutique");
        assert_eq!(flap.size, "M");
        assert_eq!(
            flap.link,
            "https://www.vestiairecollective.co.uk/women-bags/handbags/chanel/classic-flap-123456.shtml"
        );
        assert_eq!(flap.image, "https://images.example.com/produit/123456_1.jpg");

        let tote = &out.records[1];
        assert_eq!(tote.brand, "Louis Vuitton");
        assert_eq!(tote.price, "£1,180");
        assert_eq!(tote.condition, "Good");
        assert_eq!(tote.image, "https://images.example.com/p/789012.jpg");
        assert_eq!(tote.seller, "marketplace_seller");
    }

    #[test]
    fn unknowns_fall_back_to_defaults() {
        let out = extractor()
            .extract(&RawResponse::new("https://api", FIXTURE), &request(1))
            .unwrap();
        let pouch = &out.records[2];
        assert_eq!(pouch.brand, "Unknown");
        assert_eq!(pouch.price, "Price not available");
        assert_eq!(pouch.size, "N/A");
        assert_eq!(pouch.link, "");
    }

    #[test]
    fn brand_aliases_match_whole_words_only() {
        let tables = PatternTables::build().unwrap();
        assert_eq!(tables.brand("Silver necklace", ""), None);
        assert_eq!(tables.brand("Vintage YSL clutch", ""), Some("Saint Laurent"));
    }

    #[test]
    fn reports_upstream_total_and_offset() {
        let out = extractor()
            .extract(&RawResponse::new("https://api", FIXTURE), &request(3))
            .unwrap();
        assert_eq!(out.hint.total_items, Some(1003));
        assert_eq!(out.hint.offset, 100);
    }

    #[test]
    fn empty_items_is_not_an_error() {
        let out = extractor()
            .extract(&RawResponse::new("https://api", r#"{"items": []}"#), &request(1))
            .unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.hint.total_items, None);
    }

    #[test]
    fn malformed_payloads_are_extraction_errors() {
        for body in ["<html>blocked</html>", r#"{"error": "forbidden"}"#] {
            let err = extractor()
                .extract(&RawResponse::new("https://api", body), &request(1))
                .unwrap_err();
            assert!(matches!(err, AppError::ExtractionError(_)), "{body}");
        }
    }
}
