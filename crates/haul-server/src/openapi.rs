use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "haul API",
        version = "0.1.0",
        description = "Rate-limited, cached marketplace listing search with placeholder fallback."
    ),
    paths(
        crate::routes::search,
        crate::routes::reset,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::SearchResponse,
        crate::dto::PaginationResponse,
        crate::dto::HealthResponse,
        crate::dto::SourceHealthResponse,
        crate::dto::CacheStatsResponse,
        crate::dto::ResetResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "search", description = "Marketplace listing search"),
        (name = "maintenance", description = "Safeguard resets"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the Bearer admin token scheme to the document.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .description(Some(
                            "Admin token. Set via HAUL_ADMIN_TOKEN environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in ["/v1/sources/{source}/search", "/v1/maintenance/reset", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
