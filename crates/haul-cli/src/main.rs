use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use haul_client::SourceProfile;
use haul_core::config::AcquisitionConfig;
use haul_core::models::{Acquisition, ListingStatus, SearchRequest};

#[derive(Parser)]
#[command(name = "haul", version, about = "Second-hand marketplace listing search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search one marketplace and print the result envelope as JSON
    Search {
        /// Source name (see `haul sources`)
        #[arg(short, long)]
        source: String,

        /// Search terms
        #[arg(short, long)]
        query: String,

        /// 1-based page number
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Records per page (max 500)
        #[arg(long, default_value_t = 50)]
        per_page: usize,

        #[arg(long)]
        min_price: Option<f64>,

        #[arg(long)]
        max_price: Option<f64>,

        /// Marketplace region, e.g. "uk" or "fr"
        #[arg(short, long, env = "HAUL_REGION", default_value = "uk")]
        region: String,

        /// Search completed sales instead of active listings
        #[arg(long, default_value_t = false)]
        sold: bool,

        /// Exit with an error instead of printing placeholder data
        #[arg(long, default_value_t = false)]
        no_fallback: bool,
    },

    /// List configured sources and their endpoints
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("haul=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            source,
            query,
            page,
            per_page,
            min_price,
            max_price,
            region,
            sold,
            no_fallback,
        } => {
            let request = SearchRequest::builder(query)
                .page(page)
                .page_size(per_page)
                .min_price(min_price)
                .max_price(max_price)
                .region(region)
                .status(if sold {
                    ListingStatus::Sold
                } else {
                    ListingStatus::Active
                })
                .build()?;
            cmd_search(&source, &request, no_fallback).await?;
        }
        Commands::Sources => cmd_sources(),
    }

    Ok(())
}

async fn cmd_search(source: &str, request: &SearchRequest, no_fallback: bool) -> Result<()> {
    let profile = SourceProfile::from_env()
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(source))
        .with_context(|| format!("Unknown source '{source}'. Run `haul sources` to list them."))?;

    let mut config = AcquisitionConfig::from_env().context("Invalid HAUL_* configuration")?;
    if no_fallback {
        config.degrade_on_failure = false;
    }
    let service = profile.build_service(&config)?;

    tracing::info!(
        source = %profile.name,
        query = request.query(),
        page = request.page(),
        "Searching"
    );
    let acquisition = service.acquire(request).await?;
    if let Some(warning) = &acquisition.warning {
        tracing::warn!("{warning}");
    }

    println!("{}", serde_json::to_string_pretty(&envelope(acquisition))?);
    Ok(())
}

/// Same shape the HTTP server answers with.
fn envelope(acquisition: Acquisition) -> serde_json::Value {
    serde_json::json!({
        "success": !acquisition.is_degraded(),
        "count": acquisition.records.len(),
        "data": acquisition.records,
        "pagination": acquisition.pagination,
        "error": acquisition.warning,
        "origin": acquisition.origin,
    })
}

fn cmd_sources() {
    for profile in SourceProfile::from_env() {
        println!(
            "{:<12} {:<14} {}",
            profile.name,
            format!("{:?}", profile.style),
            profile.endpoint
        );
    }
}
