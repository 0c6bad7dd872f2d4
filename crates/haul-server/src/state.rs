use std::collections::BTreeMap;
use std::time::Duration;

use haul_client::{MarketplaceService, SourceProfile};
use haul_core::config::AcquisitionConfig;
use haul_core::error::AppError;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    /// One service per source, keyed by source name.
    pub sources: BTreeMap<String, MarketplaceService>,
    /// Bearer token for maintenance endpoints (None = maintenance disabled).
    pub admin_token: Option<String>,
    /// Upper bound on a single search, fallback included.
    pub request_timeout: Option<Duration>,
}

impl AppState {
    /// Build one service per profile, each with its own safeguards.
    pub fn from_profiles(
        profiles: &[SourceProfile],
        config: &AcquisitionConfig,
    ) -> Result<Self, AppError> {
        let sources = profiles
            .iter()
            .map(|profile| Ok((profile.name.clone(), profile.build_service(config)?)))
            .collect::<Result<BTreeMap<_, _>, AppError>>()?;

        Ok(Self {
            sources,
            admin_token: None,
            request_timeout: None,
        })
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn source(&self, name: &str) -> Option<&MarketplaceService> {
        self.sources.get(&name.to_ascii_lowercase())
    }
}
