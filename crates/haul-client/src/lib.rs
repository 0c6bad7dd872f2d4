pub mod extract;
pub mod fetcher;
pub mod samples;
pub mod sources;

pub use extract::{CatalogPageExtractor, CatalogSelectors, ListingExtractor, SearchApiExtractor};
pub use fetcher::{HttpFetcher, RequestStyle};
pub use samples::PlaceholderCatalog;
pub use sources::{MarketplaceService, SourceProfile};
