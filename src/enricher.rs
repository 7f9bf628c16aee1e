use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiRateLimiter, VolumeProvider};
use crate::models::QuoteRecord;

/// Why a single symbol ended up without a volume.
///
/// These never abort a run; they are collected into [`EnrichmentReport`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VolumeLookupError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("{ticker} returned HTTP {status}")]
    Status { ticker: String, status: u16 },
    #[error("unreadable response: {0}")]
    Parse(String),
    #[error("unknown ticker {0}")]
    NotFound(String),
    #[error("no trading bars for {0}")]
    NoBars(String),
}

/// Outcome of one enrichment pass
#[derive(Debug, Default)]
pub struct EnrichmentReport {
    /// symbol -> volume of the latest bar
    pub volumes: HashMap<String, i64>,
    pub failures: Vec<(String, VolumeLookupError)>,
    /// Pseudo-symbols that were never queried
    pub skipped: Vec<String>,
}

/// Best-effort volume lookup for every tradable symbol in a quote table
pub struct VolumeEnricher<V> {
    provider: V,
    ticker_suffix: String,
    excluded_symbols: Vec<String>,
    rate_limiter: ApiRateLimiter,
}

impl<V: VolumeProvider + Send + Sync> VolumeEnricher<V> {
    pub fn new(
        provider: V,
        ticker_suffix: impl Into<String>,
        excluded_symbols: Vec<String>,
        rate_limiter: ApiRateLimiter,
    ) -> Self {
        Self {
            provider,
            ticker_suffix: ticker_suffix.into(),
            excluded_symbols,
            rate_limiter,
        }
    }

    pub fn is_excluded(&self, symbol: &str) -> bool {
        self.excluded_symbols.iter().any(|s| s == symbol)
    }

    fn ticker_for(&self, symbol: &str) -> String {
        format!("{}{}", symbol, self.ticker_suffix)
    }

    /// Look up every symbol one after another, collecting what succeeds.
    pub async fn collect_volumes(&self, quotes: &[QuoteRecord]) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();
        let mut queried = false;

        for quote in quotes {
            if self.is_excluded(&quote.symbol) {
                debug!("Skipping pseudo-symbol {}", quote.symbol);
                report.skipped.push(quote.symbol.clone());
                continue;
            }

            if queried {
                self.rate_limiter.wait().await;
            }
            queried = true;

            let ticker = self.ticker_for(&quote.symbol);
            match self.provider.latest_volume(&ticker).await {
                Ok(volume) => {
                    debug!("{}: volume {}", ticker, volume);
                    report.volumes.insert(quote.symbol.clone(), volume);
                }
                Err(e) => {
                    warn!("No volume for {}: {}", ticker, e);
                    report.failures.push((quote.symbol.clone(), e));
                }
            }
        }

        info!(
            "Volume lookup finished: {} found, {} failed, {} skipped",
            report.volumes.len(),
            report.failures.len(),
            report.skipped.len()
        );
        report
    }

    /// Fill the volume column from the lookups; anything unmapped becomes `None`.
    pub async fn enrich(&self, mut quotes: Vec<QuoteRecord>) -> (Vec<QuoteRecord>, EnrichmentReport) {
        let report = self.collect_volumes(&quotes).await;
        apply_volumes(&mut quotes, &report.volumes);
        (quotes, report)
    }
}

/// Set each record's volume from `volumes`, clearing it for unmapped symbols.
pub fn apply_volumes(quotes: &mut [QuoteRecord], volumes: &HashMap<String, i64>) {
    for quote in quotes.iter_mut() {
        quote.volume = volumes.get(&quote.symbol).copied();
    }
}
