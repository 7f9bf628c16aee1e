use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// One quote row for one symbol on one trading day.
///
/// Field names on the wire match the history file header
/// (`Date,Symbol,Company,Open,...`) so files written by earlier tooling load as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Open")]
    pub open: Option<f64>,
    #[serde(rename = "DayHigh")]
    pub day_high: Option<f64>,
    #[serde(rename = "DayLow")]
    pub day_low: Option<f64>,
    #[serde(rename = "LastPrice")]
    pub last_price: Option<f64>,
    #[serde(rename = "PreviousClose")]
    pub previous_close: Option<f64>,
    #[serde(rename = "Change")]
    pub change: Option<f64>,
    #[serde(rename = "PChange")]
    pub p_change: Option<f64>,
    #[serde(rename = "Volume", default, deserialize_with = "deserialize_volume")]
    pub volume: Option<i64>,
}

/// Dedup key of the history table
pub type RecordKey<'a> = (NaiveDate, &'a str);

impl QuoteRecord {
    pub fn key(&self) -> RecordKey<'_> {
        (self.date, self.symbol.as_str())
    }
}

/// Accepts a volume written as an integer, as a float (`12345.0`, which is
/// what dataframe tools emit once the column holds nulls), or as text.
fn deserialize_volume<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawVolume {
        Int(i64),
        Float(f64),
        Text(String),
    }

    let volume = match Option::<RawVolume>::deserialize(deserializer)? {
        None => None,
        Some(RawVolume::Int(v)) => Some(v),
        Some(RawVolume::Float(v)) if !v.is_finite() => None,
        Some(RawVolume::Float(v)) => Some(whole_volume(v).ok_or_else(|| {
            serde::de::Error::custom(format!("fractional volume value: {v}"))
        })?),
        Some(RawVolume::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                let parsed = text
                    .parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(whole_volume));
                match parsed {
                    Some(v) => Some(v),
                    None => {
                        return Err(serde::de::Error::custom(format!(
                            "invalid volume value: {text}"
                        )))
                    }
                }
            }
        }
    };

    Ok(volume)
}

/// `12345.0` is a volume, `12.7` is not
fn whole_volume(v: f64) -> Option<i64> {
    (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub nse_base_url: String,
    pub index_name: String,
    pub yahoo_base_url: String,
    pub ticker_suffix: String,
    pub excluded_symbols: Vec<String>,
    pub history_csv_path: PathBuf,
    pub snapshot_json_path: PathBuf,
    pub user_agent: String,
    pub accept_language: String,
    pub request_timeout_secs: u64,
    pub rate_limit_per_minute: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nse_base_url: "https://www.nseindia.com".to_string(),
            index_name: "NIFTY 50".to_string(),
            yahoo_base_url: "https://query1.finance.yahoo.com".to_string(),
            ticker_suffix: ".NS".to_string(),
            excluded_symbols: vec!["NIFTY 50".to_string(), "50".to_string()],
            history_csv_path: PathBuf::from("nifty50_history.csv"),
            snapshot_json_path: PathBuf::from("nifty50.json"),
            user_agent: "Mozilla/5.0".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            request_timeout_secs: 30,
            rate_limit_per_minute: 0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        Ok(Config {
            nse_base_url: lookup("NSE_BASE_URL").unwrap_or(defaults.nse_base_url),
            index_name: lookup("NSE_INDEX_NAME").unwrap_or(defaults.index_name),
            yahoo_base_url: lookup("YAHOO_BASE_URL").unwrap_or(defaults.yahoo_base_url),
            ticker_suffix: lookup("TICKER_SUFFIX").unwrap_or(defaults.ticker_suffix),
            excluded_symbols: lookup("EXCLUDED_SYMBOLS")
                .map(|list| parse_symbol_list(&list))
                .unwrap_or(defaults.excluded_symbols),
            history_csv_path: lookup("HISTORY_CSV_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.history_csv_path),
            snapshot_json_path: lookup("SNAPSHOT_JSON_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_json_path),
            user_agent: lookup("USER_AGENT").unwrap_or(defaults.user_agent),
            accept_language: lookup("ACCEPT_LANGUAGE").unwrap_or(defaults.accept_language),
            request_timeout_secs: match lookup("REQUEST_TIMEOUT_SECS") {
                Some(v) => v.trim().parse().map_err(|_| {
                    anyhow::anyhow!("REQUEST_TIMEOUT_SECS must be a whole number of seconds, got {v:?}")
                })?,
                None => defaults.request_timeout_secs,
            },
            rate_limit_per_minute: match lookup("RATE_LIMIT_PER_MINUTE") {
                Some(v) => v.trim().parse().map_err(|_| {
                    anyhow::anyhow!("RATE_LIMIT_PER_MINUTE must be a whole number, got {v:?}")
                })?,
                None => defaults.rate_limit_per_minute,
            },
        })
    }
}

fn parse_symbol_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
