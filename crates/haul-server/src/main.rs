use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use haul_client::SourceProfile;
use haul_core::config::AcquisitionConfig;
use haul_server::routes;
use haul_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("haul=info".parse()?))
        .with_target(false)
        .init();

    let port = std::env::var("HAUL_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");
    let admin_token = std::env::var("HAUL_ADMIN_TOKEN").ok();
    let request_timeout = match std::env::var("HAUL_REQUEST_TIMEOUT_SECS") {
        Ok(v) => Some(Duration::from_secs(
            v.parse()
                .with_context(|| format!("HAUL_REQUEST_TIMEOUT_SECS: invalid value '{v}'"))?,
        )),
        Err(_) => None,
    };

    let config = AcquisitionConfig::from_env()?;
    let profiles = SourceProfile::from_env();
    let state = AppState::from_profiles(&profiles, &config)?
        .with_admin_token(admin_token)
        .with_request_timeout(request_timeout);

    if state.admin_token.is_none() {
        tracing::warn!("HAUL_ADMIN_TOKEN not set; maintenance endpoints are disabled");
    }
    for profile in &profiles {
        tracing::info!(source = %profile.name, endpoint = %profile.endpoint, "Source configured");
    }

    let app = routes::router(Arc::new(state)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
