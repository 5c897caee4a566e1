use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod crawler;
mod discover;
mod documents;
mod error;
mod extract;
mod fetcher;
mod models;
mod report;
mod scope;
mod subdomains;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::build_config()?;

    let scope = scope::TargetScope::from_root_url(&config.target)?;
    info!(
        "Mapping the contact surface of {} (root {})",
        scope.base_domain, scope.root_url
    );

    let fetcher = Arc::new(fetcher::ContentFetcher::new(config.clone())?);

    let subdomain_seeds =
        subdomains::discover_subdomains(fetcher.http_client(), &scope, &config).await;
    info!("Seeding {} subdomain candidates", subdomain_seeds.len());

    let seeds = crawler::seed_urls(&scope, &config, subdomain_seeds);

    let engine = crawler::Crawler::new(config.clone(), scope.clone(), fetcher);
    let summary = engine.run(seeds).await?;
    let records = engine.records().await;

    let writer = report::ReportWriter::create(&config.output_dir, &scope.base_domain)?;
    writer.write_all(&records, &summary)?;

    info!(
        "Done: {} unique records from {} pages and {} documents. Reports in {}",
        summary.total_records,
        summary.pages_fetched,
        summary.documents_seen,
        writer.run_dir().display()
    );

    Ok(())
}
