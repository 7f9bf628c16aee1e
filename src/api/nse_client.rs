use anyhow::{Result, anyhow, Context};
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::models::{Config, QuoteRecord};
use super::{build_http_client, QuoteProvider};

/// Prefix the exchange puts in front of the `identifier` field
const IDENTIFIER_PREFIX: &str = "NSE:";

/// NSE index quotes client
pub struct NseClient {
    client: Client,
    base_url: String,
    index_name: String,
}

impl NseClient {
    /// Create a new NSE client with its own cookie-carrying HTTP client
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_client(build_http_client(config)?, config))
    }

    pub fn with_client(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.nse_base_url.trim_end_matches('/').to_string(),
            index_name: config.index_name.clone(),
        }
    }

    fn quotes_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/api/equity-stockIndices", self.base_url))?;
        // set_query percent-encodes the space as %20, which the exchange expects
        url.set_query(Some(&format!("index={}", self.index_name)));
        Ok(url)
    }

    /// Hit the site root so the session picks up the cookies the API insists on.
    async fn prime_session(&self) -> Result<()> {
        debug!("Priming session at: {}", self.base_url);

        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .with_context(|| format!("Priming request to {} failed", self.base_url))?;

        if !response.status().is_success() {
            warn!("Priming request returned status {}, continuing", response.status());
        }

        Ok(())
    }

    async fn fetch_index_json(&self) -> Result<Value> {
        self.prime_session().await?;

        let url = self.quotes_url()?;
        debug!("Making request to: {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Quote request to {} failed", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Quote request failed with status {}: {}", status, error_text));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| anyhow!("Error parsing quote response JSON: {}", e))
    }
}

#[async_trait::async_trait]
impl QuoteProvider for NseClient {
    async fn get_index_quotes(&self, as_of: NaiveDate) -> Result<Vec<QuoteRecord>> {
        let data = self.fetch_index_json().await?;
        let quotes = parse_index_quotes(&data, as_of)?;

        info!("Retrieved {} quotes for index {}", quotes.len(), self.index_name);
        Ok(quotes)
    }
}

/// Turn the `equity-stockIndices` body into quote rows.
///
/// The `data` list and each entry's `symbol` are required; every other field
/// is best effort and becomes `None` when absent or unreadable.
pub fn parse_index_quotes(data: &Value, as_of: NaiveDate) -> Result<Vec<QuoteRecord>> {
    let entries = data
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("Quote response has no `data` list"))?;

    let mut quotes = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        let symbol = entry
            .get("symbol")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Quote entry {} has no symbol", i))?;

        let company = entry
            .get("identifier")
            .and_then(|v| v.as_str())
            .map(strip_identifier_prefix)
            .unwrap_or_default();

        quotes.push(QuoteRecord {
            date: as_of,
            symbol: symbol.to_string(),
            company,
            open: number_field(entry, "open"),
            day_high: number_field(entry, "dayHigh"),
            day_low: number_field(entry, "dayLow"),
            last_price: number_field(entry, "lastPrice"),
            previous_close: number_field(entry, "previousClose"),
            change: number_field(entry, "change"),
            p_change: number_field(entry, "pChange"),
            volume: None,
        });
    }

    Ok(quotes)
}

fn strip_identifier_prefix(identifier: &str) -> String {
    identifier.replace(IDENTIFIER_PREFIX, "")
}

/// Numbers arrive either as JSON numbers or as strings like `"1,234.50"`.
fn number_field(entry: &Value, key: &str) -> Option<f64> {
    match entry.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite()),
        _ => None,
    }
}
