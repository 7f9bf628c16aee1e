use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use reqwest::{Client, header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE}};
use std::time::Duration;

use crate::enricher::VolumeLookupError;
use crate::models::{Config, QuoteRecord};

pub mod nse_client;
pub mod yahoo_client;
pub use nse_client::NseClient;
pub use yahoo_client::YahooClient;

/// Fixed pacing between sequential API requests
pub struct ApiRateLimiter {
    delay_ms: u64,
}

impl ApiRateLimiter {
    /// `0` requests per minute disables pacing.
    pub fn new(requests_per_minute: u32) -> Self {
        let delay_ms = if requests_per_minute > 0 {
            60_000 / requests_per_minute as u64
        } else {
            0
        };

        Self { delay_ms }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub async fn wait(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(self.delay()).await;
        }
    }
}

/// Source of the day's index constituent quotes
#[async_trait::async_trait]
pub trait QuoteProvider {
    /// Quotes for every row the index endpoint returns, stamped with `as_of`
    /// and with `volume` left empty.
    async fn get_index_quotes(&self, as_of: NaiveDate) -> Result<Vec<QuoteRecord>>;
}

/// Source of per-ticker daily trading volume
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VolumeProvider {
    /// Volume of the most recent daily bar for an exchange-qualified ticker.
    async fn latest_volume(&self, ticker: &str) -> std::result::Result<i64, VolumeLookupError>;
}

/// Build the shared HTTP client: cookie store on, browser-like headers.
pub fn build_http_client(config: &Config) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_str(&config.accept_language)
            .map_err(|e| anyhow!("Invalid ACCEPT_LANGUAGE header value: {}", e))?,
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .cookie_store(true)
        .build()?;

    Ok(client)
}
