//! Extraction for server-rendered HTML catalog pages.

use haul_core::error::AppError;
use haul_core::models::{Extracted, PaginationHint, ProductRecord, RawResponse, SearchRequest};
use haul_core::pagination::parse_price_amount;
use haul_core::traits::Extractor;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{normalize_text, resolve_link};

/// CSS selector lists for one catalog layout. For each field the first
/// selector that matches inside an item card wins.
#[derive(Debug, Clone)]
pub struct CatalogSelectors {
    pub item: Vec<String>,
    pub title: Vec<String>,
    pub price: Vec<String>,
    pub original_price: Vec<String>,
    pub brand: Vec<String>,
    pub size: Vec<String>,
    pub condition: Vec<String>,
    pub seller: Vec<String>,
    pub image: Vec<String>,
    pub link: Vec<String>,
    /// Element holding the catalog-wide result count, searched document-wide.
    pub total: Vec<String>,
}

fn list(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| s.to_string()).collect()
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            item: list(&[
                "[data-testid=\"grid-item\"]",
                ".feed-grid__item",
                ".new-item-box__container",
            ]),
            title: list(&[
                "[data-testid$=\"--description-title\"]",
                ".new-item-box__title",
            ]),
            price: list(&[
                "[data-testid$=\"--price-text\"]",
                ".new-item-box__price",
                ".price",
            ]),
            original_price: list(&[
                "[data-testid$=\"--original-price\"]",
                ".new-item-box__original-price",
            ]),
            brand: list(&["[data-testid$=\"--brand\"]", ".new-item-box__brand"]),
            size: list(&["[data-testid$=\"--size\"]", ".new-item-box__size"]),
            condition: list(&["[data-testid$=\"--status\"]", ".new-item-box__status"]),
            seller: list(&["[data-testid$=\"--owner-name\"]", ".new-item-box__owner"]),
            image: list(&["img[data-testid$=\"--image--img\"]", "img"]),
            link: list(&["a[data-testid$=\"--overlay-link\"]", "a[href]"]),
            total: list(&["[data-testid=\"catalog-total\"]", ".catalog__total"]),
        }
    }
}

#[derive(Debug)]
struct CompiledSelectors {
    item: Vec<Selector>,
    title: Vec<Selector>,
    price: Vec<Selector>,
    original_price: Vec<Selector>,
    brand: Vec<Selector>,
    size: Vec<Selector>,
    condition: Vec<Selector>,
    seller: Vec<Selector>,
    image: Vec<Selector>,
    link: Vec<Selector>,
    total: Vec<Selector>,
}

fn parse_all(field: &str, selectors: &[String]) -> Result<Vec<Selector>, AppError> {
    selectors
        .iter()
        .map(|s| {
            Selector::parse(s).map_err(|e| {
                AppError::ConfigError(format!("Invalid {field} selector '{s}': {e}"))
            })
        })
        .collect()
}

impl CompiledSelectors {
    fn compile(s: &CatalogSelectors) -> Result<Self, AppError> {
        Ok(Self {
            item: parse_all("item", &s.item)?,
            title: parse_all("title", &s.title)?,
            price: parse_all("price", &s.price)?,
            original_price: parse_all("original_price", &s.original_price)?,
            brand: parse_all("brand", &s.brand)?,
            size: parse_all("size", &s.size)?,
            condition: parse_all("condition", &s.condition)?,
            seller: parse_all("seller", &s.seller)?,
            image: parse_all("image", &s.image)?,
            link: parse_all("link", &s.link)?,
            total: parse_all("total", &s.total)?,
        })
    }
}

fn first_match<'a>(scope: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|s| scope.select(s).next())
}

fn first_text(scope: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|s| {
        scope
            .select(s)
            .map(|el| normalize_text(&el.text().collect::<String>()))
            .find(|t| !t.is_empty())
    })
}

fn first_attr(scope: ElementRef<'_>, selectors: &[Selector], attrs: &[&str]) -> Option<String> {
    let el = first_match(scope, selectors)?;
    attrs
        .iter()
        .find_map(|a| el.value().attr(a))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// First run of digits (with thousands separators) in `text`.
fn parse_count(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | ' ' | '\u{a0}'))
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()
}

fn discount(price: &str, original: &str) -> String {
    match (parse_price_amount(price), parse_price_amount(original)) {
        (Some(p), Some(o)) if o > p && o > 0.0 => format!("{}%", ((1.0 - p / o) * 100.0).round()),
        _ => "0%".to_string(),
    }
}

/// Extractor for HTML catalog pages, driven by [`CatalogSelectors`].
///
/// The page holds every item from the start of the catalog, so records are
/// reported at offset 0 and sliced by the caller.
#[derive(Clone)]
pub struct CatalogPageExtractor {
    site: Url,
    selectors: std::sync::Arc<CompiledSelectors>,
}

impl CatalogPageExtractor {
    pub fn new(site: &str) -> Result<Self, AppError> {
        Self::with_selectors(site, &CatalogSelectors::default())
    }

    pub fn with_selectors(site: &str, selectors: &CatalogSelectors) -> Result<Self, AppError> {
        let site = Url::parse(site)
            .map_err(|e| AppError::ConfigError(format!("Invalid site URL '{site}': {e}")))?;
        Ok(Self {
            site,
            selectors: std::sync::Arc::new(CompiledSelectors::compile(selectors)?),
        })
    }

    fn record(&self, card: ElementRef<'_>, base: &Url) -> Option<ProductRecord> {
        let s = &self.selectors;
        let title = first_text(card, &s.title)
            .or_else(|| first_attr(card, &s.link, &["title"]))
            .or_else(|| first_attr(card, &s.image, &["alt"]))?;

        let price = first_text(card, &s.price).unwrap_or_else(|| "Price not available".into());
        let original_price = first_text(card, &s.original_price).unwrap_or_else(|| price.clone());
        let link = first_attr(card, &s.link, &["href"])
            .map(|href| resolve_link(base, &href))
            .unwrap_or_default();

        Some(ProductRecord {
            brand: first_text(card, &s.brand).unwrap_or_else(|| "Unknown".into()),
            size: first_text(card, &s.size).unwrap_or_else(|| "N/A".into()),
            image: first_attr(card, &s.image, &["src", "data-src"]).unwrap_or_default(),
            condition: first_text(card, &s.condition).unwrap_or_else(|| "Unknown".into()),
            seller: first_text(card, &s.seller).unwrap_or_else(|| "unknown_seller".into()),
            discount: discount(&price, &original_price),
            original_price,
            price,
            link,
            title,
        })
    }
}

impl Extractor for CatalogPageExtractor {
    fn extract(&self, raw: &RawResponse, _request: &SearchRequest) -> Result<Extracted, AppError> {
        if raw.body.trim().is_empty() {
            return Err(AppError::ExtractionError("Catalog page is empty".into()));
        }

        let document = Html::parse_document(&raw.body);
        let root = document.root_element();
        let base = Url::parse(&raw.url).unwrap_or_else(|_| self.site.clone());

        let cards: Vec<ElementRef<'_>> = self
            .selectors
            .item
            .iter()
            .map(|s| root.select(s).collect::<Vec<_>>())
            .find(|cards| !cards.is_empty())
            .unwrap_or_default();

        let records: Vec<ProductRecord> = cards
            .into_iter()
            .filter_map(|card| self.record(card, &base))
            .collect();

        let total_items = first_text(root, &self.selectors.total).and_then(|t| parse_count(&t));
        tracing::debug!(records = records.len(), ?total_items, "Parsed catalog page");

        Ok(Extracted {
            records,
            hint: PaginationHint {
                total_items,
                offset: 0,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        <html><body>
          <div data-testid="catalog-total">1,234 results</div>
          <div class="feed-grid">
            <div data-testid="grid-item">
              <a data-testid="product-1--overlay-link" href="/items/1-gucci-belt" title="Gucci belt, brand: Gucci"></a>
              <img data-testid="product-1--image--img" src="https://images.vinted.net/1.jpg" alt="Gucci belt">
              <p data-testid="product-1--description-title">  Gucci   belt </p>
              <p data-testid="product-1--brand">Gucci</p>
              <p data-testid="product-1--size">M</p>
              <p data-testid="product-1--status">Very good</p>
              <p data-testid="product-1--price-text">£80.00</p>
              <p data-testid="product-1--original-price">£100.00</p>
              <span data-testid="product-1--owner-name">closet_anna</span>
            </div>
            <div data-testid="grid-item">
              <a data-testid="product-2--overlay-link" href="https://www.vinted.co.uk/items/2-tee" title="Plain tee"></a>
              <p data-testid="product-2--price-text">£5.00</p>
            </div>
            <div data-testid="grid-item">
              <p>ad slot</p>
            </div>
          </div>
        </body></html>
    "#;

    fn extract(body: &str) -> Result<Extracted, AppError> {
        let extractor = CatalogPageExtractor::new("https://www.vinted.co.uk").unwrap();
        let raw = RawResponse::new("https://www.vinted.co.uk/catalog?search_text=belt", body);
        let request = SearchRequest::builder("belt").page(2).build().unwrap();
        extractor.extract(&raw, &request)
    }

    #[test]
    fn parses_item_cards() {
        let out = extract(FIXTURE).unwrap();
        assert_eq!(out.records.len(), 2);

        let belt = &out.records[0];
        assert_eq!(belt.title, "Gucci belt");
        assert_eq!(belt.brand, "Gucci");
        assert_eq!(belt.size, "M");
        assert_eq!(belt.condition, "Very good");
        assert_eq!(belt.price, "£80.00");
        assert_eq!(belt.original_price, "£100.00");
        assert_eq!(belt.discount, "20%");
        assert_eq!(belt.seller, "closet_anna");
        assert_eq!(belt.image, "https://images.vinted.net/1.jpg");
        assert_eq!(belt.link, "https://www.vinted.co.uk/items/1-gucci-belt");
    }

    #[test]
    fn sparse_cards_get_defaults_and_title_from_link() {
        let out = extract(FIXTURE).unwrap();
        let tee = &out.records[1];
        assert_eq!(tee.title, "Plain tee");
        assert_eq!(tee.brand, "Unknown");
        assert_eq!(tee.original_price, "£5.00");
        assert_eq!(tee.discount, "0%");
        assert_eq!(tee.link, "https://www.vinted.co.uk/items/2-tee");
    }

    #[test]
    fn full_set_is_reported_from_offset_zero() {
        let out = extract(FIXTURE).unwrap();
        assert_eq!(out.hint.offset, 0);
        assert_eq!(out.hint.total_items, Some(1234));
    }

    #[test]
    fn page_without_cards_is_empty_not_an_error() {
        let out = extract("<html><body><p>No results</p></body></html>").unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.hint.total_items, None);
    }

    #[test]
    fn blank_body_is_an_extraction_error() {
        assert!(matches!(extract("  "), Err(AppError::ExtractionError(_))));
    }

    #[test]
    fn custom_selectors_are_validated() {
        let selectors = CatalogSelectors {
            item: vec!["[[not css".into()],
            ..Default::default()
        };
        let err = CatalogPageExtractor::with_selectors("https://shop.example.com", &selectors)
            .err()
            .unwrap();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn parse_count_ignores_separators() {
        assert_eq!(parse_count("1,234 results"), Some(1234));
        assert_eq!(parse_count("Showing 12 345 items"), Some(12345));
        assert_eq!(parse_count("none"), None);
    }
}
