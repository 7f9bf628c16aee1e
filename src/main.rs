use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use nifty_history::api::{ApiRateLimiter, NseClient, YahooClient};
use nifty_history::data_collector::DataCollector;
use nifty_history::enricher::VolumeEnricher;
use nifty_history::history::HistoryStore;
use nifty_history::models::Config;

/// Append today's NIFTY 50 quotes, with Yahoo Finance volumes, to the local history.
///
/// Takes no arguments; everything is configured through the environment or `.env`.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {}

#[tokio::main]
async fn main() -> Result<()> {
    let _cli = Cli::parse();

    // Diagnostics go to stderr; stdout carries the progress lines
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nifty_history=info")),
        )
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to install log subscriber");
    }

    if let Err(e) = run().await {
        error!("Collection failed: {:#}", e);
        return Err(e);
    }

    Ok(())
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;
    info!("📋 Configuration loaded: index {:?}", config.index_name);

    let nse_client = NseClient::new(&config)?;
    let yahoo_client = YahooClient::new(&config)?;

    let enricher = VolumeEnricher::new(
        yahoo_client,
        config.ticker_suffix.clone(),
        config.excluded_symbols.clone(),
        ApiRateLimiter::new(config.rate_limit_per_minute),
    );
    let history = HistoryStore::new(&config.history_csv_path, &config.snapshot_json_path);

    let collector = DataCollector::new(nse_client, enricher, history);
    let today = chrono::Local::now().date_naive();
    collector.run(today).await?;

    Ok(())
}
