use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::api::{QuoteProvider, VolumeProvider};
use crate::enricher::VolumeEnricher;
use crate::history::HistoryStore;

/// What one collection run did
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSummary {
    pub date: NaiveDate,
    pub fetched: usize,
    pub volumes_found: usize,
    pub volume_failures: usize,
    pub skipped: usize,
    pub history_rows: usize,
}

/// Runs fetch -> enrich -> merge for a single day
pub struct DataCollector<Q, V> {
    quotes: Q,
    enricher: VolumeEnricher<V>,
    history: HistoryStore,
}

impl<Q, V> DataCollector<Q, V>
where
    Q: QuoteProvider + Send + Sync,
    V: VolumeProvider + Send + Sync,
{
    pub fn new(quotes: Q, enricher: VolumeEnricher<V>, history: HistoryStore) -> Self {
        Self {
            quotes,
            enricher,
            history,
        }
    }

    /// Collect `date`'s quotes into the history.
    ///
    /// A failed quote fetch or a failed save aborts the run; volume lookups
    /// never do.
    pub async fn run(&self, date: NaiveDate) -> Result<CollectionSummary> {
        info!("📊 Collecting index quotes for {}", date);

        let quotes = self.quotes.get_index_quotes(date).await?;
        let fetched = quotes.len();
        println!("Fetched {} stock records", fetched);

        println!("Fetching Volume from Yahoo Finance...");
        let (quotes, report) = self.enricher.enrich(quotes).await;
        debug!("Volume failures: {:?}", report.failures);

        let history = self.history.merge_and_save(quotes)?;
        println!("Saved to {}", self.history.csv_path().display());
        println!("Saved JSON for cloud access");

        let summary = CollectionSummary {
            date,
            fetched,
            volumes_found: report.volumes.len(),
            volume_failures: report.failures.len(),
            skipped: report.skipped.len(),
            history_rows: history.len(),
        };
        info!("✅ Collection finished: {:?}", summary);
        Ok(summary)
    }
}
