//! Built-in marketplace profiles and the wiring that turns one into a service.

use std::time::Duration;

use haul_core::acquisition::AcquisitionService;
use haul_core::config::AcquisitionConfig;
use haul_core::error::AppError;

use crate::extract::{CatalogPageExtractor, ListingExtractor, SearchApiExtractor};
use crate::fetcher::{HttpFetcher, RequestStyle};
use crate::samples::PlaceholderCatalog;

/// The acquisition service every built-in source runs on.
pub type MarketplaceService = AcquisitionService<HttpFetcher, ListingExtractor, PlaceholderCatalog>;

const VESTIAIRE_IMAGE_TEMPLATE: &str =
    "https://images.vestiairecollective.com/images/resized/w=256,q=75,f=auto/produit/{id}_1.jpg";

/// Where and how to search one marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProfile {
    pub name: String,
    /// Search endpoint the fetcher talks to.
    pub endpoint: String,
    /// Public storefront; item links resolve against it.
    pub site: String,
    pub style: RequestStyle,
    pub image_template: Option<String>,
    pub timeout: Option<Duration>,
}

impl SourceProfile {
    pub fn vestiaire() -> Self {
        Self {
            name: "vestiaire".into(),
            endpoint: "https://search.vestiairecollective.com/v1/product/search".into(),
            site: "https://www.vestiairecollective.co.uk".into(),
            style: RequestStyle::SearchApi,
            image_template: Some(VESTIAIRE_IMAGE_TEMPLATE.into()),
            timeout: None,
        }
    }

    pub fn vinted() -> Self {
        Self {
            name: "vinted".into(),
            endpoint: "https://www.vinted.co.uk/catalog".into(),
            site: "https://www.vinted.co.uk".into(),
            style: RequestStyle::CatalogPage,
            image_template: None,
            timeout: None,
        }
    }

    /// Built-in profiles with endpoints overridden from the environment
    /// (`HAUL_VESTIAIRE_URL`, `HAUL_VINTED_URL`).
    pub fn from_env() -> Vec<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<L>(lookup: L) -> Vec<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        [Self::vestiaire(), Self::vinted()]
            .into_iter()
            .map(|mut profile| {
                let key = format!("HAUL_{}_URL", profile.name.to_ascii_uppercase());
                if let Some(endpoint) = lookup(&key).filter(|v| !v.trim().is_empty()) {
                    profile.endpoint = endpoint.trim().to_string();
                }
                profile
            })
            .collect()
    }

    /// Point the profile at a different endpoint, e.g. a local mock.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn fetcher(&self) -> Result<HttpFetcher, AppError> {
        let fetcher = match self.timeout {
            Some(timeout) => HttpFetcher::with_timeout(&self.endpoint, self.style, timeout)?,
            None => HttpFetcher::new(&self.endpoint, self.style)?,
        };
        fetcher.with_site(&self.site)
    }

    pub fn extractor(&self) -> Result<ListingExtractor, AppError> {
        Ok(match self.style {
            RequestStyle::SearchApi => {
                let mut extractor = SearchApiExtractor::new(&self.site)?;
                if let Some(template) = &self.image_template {
                    extractor = extractor.with_image_template(template.clone());
                }
                extractor.into()
            }
            RequestStyle::CatalogPage => CatalogPageExtractor::new(&self.site)?.into(),
        })
    }

    /// Assemble a service with its own safeguards.
    pub fn build_service(&self, config: &AcquisitionConfig) -> Result<MarketplaceService, AppError> {
        config.validate()?;
        tracing::debug!(
            source = %self.name,
            endpoint = %self.endpoint,
            style = ?self.style,
            "Building marketplace service"
        );
        Ok(AcquisitionService::new(
            self.name.clone(),
            self.fetcher()?,
            self.extractor()?,
            PlaceholderCatalog::new(&self.site),
            config,
        ))
    }
}
