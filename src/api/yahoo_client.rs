//! Yahoo Finance chart API, used only for the latest daily volume of a ticker.

use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::enricher::VolumeLookupError;
use crate::models::Config;
use super::{build_http_client, VolumeProvider};

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooClient {
    client: Client,
    base_url: String,
}

impl YahooClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_client(build_http_client(config)?, config))
    }

    pub fn with_client(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.yahoo_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Chart URL asking for the single most recent daily bar.
    fn chart_url(&self, ticker: &str) -> std::result::Result<Url, VolumeLookupError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| VolumeLookupError::Request(format!("invalid base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| VolumeLookupError::Request("base url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", ticker]);
        url.query_pairs_mut()
            .append_pair("range", "1d")
            .append_pair("interval", "1d");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl VolumeProvider for YahooClient {
    async fn latest_volume(&self, ticker: &str) -> std::result::Result<i64, VolumeLookupError> {
        let url = self.chart_url(ticker)?;
        debug!("Making request to: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| VolumeLookupError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(VolumeLookupError::NotFound(ticker.to_string()));
        }
        if !status.is_success() {
            return Err(VolumeLookupError::Status {
                ticker: ticker.to_string(),
                status: status.as_u16(),
            });
        }

        let chart: ChartResponse = response
            .json()
            .await
            .map_err(|e| VolumeLookupError::Parse(format!("{ticker}: {e}")))?;

        latest_volume_from_chart(ticker, chart)
    }
}

fn latest_volume_from_chart(
    ticker: &str,
    resp: ChartResponse,
) -> std::result::Result<i64, VolumeLookupError> {
    let result = match resp.chart.result {
        Some(result) => result,
        None => {
            return Err(match resp.chart.error {
                Some(err) if err.code == "Not Found" => {
                    VolumeLookupError::NotFound(ticker.to_string())
                }
                Some(err) => VolumeLookupError::Parse(format!("{}: {}", err.code, err.description)),
                None => VolumeLookupError::Parse("empty result with no error".into()),
            });
        }
    };

    // Holidays come back as all-null bars; the latest bar that carries a volume wins.
    result
        .into_iter()
        .next()
        .and_then(|data| data.indicators.quote.into_iter().next())
        .and_then(|quote| quote.volume.into_iter().rev().flatten().find(|v| v.is_finite()))
        .map(|v| v as i64)
        .ok_or_else(|| VolumeLookupError::NoBars(ticker.to_string()))
}
