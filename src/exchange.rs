use crate::error::FetchError;
use crate::funding_rates::FundingQuote;
use crate::{binance, bybit, mexc, okx};
use async_trait::async_trait;
use futures_util::future::join_all;
use log::{info, warn};
use serde_json::Value;
use std::{str::FromStr, sync::Arc, time::Duration};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, PartialEq, Ord, Eq, PartialOrd, Copy, Hash, Display, EnumString, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Exchange {
    Binance,
    Bybit,
    #[strum(to_string = "OKX")]
    Okx,
    #[strum(to_string = "MEXC")]
    Mexc,
}

impl<'de> serde::Deserialize<'de> for Exchange {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Exchange::from_str(name.trim())
            .map_err(|_| serde::de::Error::custom(format!("unknown exchange: {}", name)))
    }
}

/// A public funding-rate source.
///
/// Implementations issue exactly one request per call and map the native
/// response into [`FundingQuote`]s. Timeouts are applied by the caller.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn exchange(&self) -> Exchange;
    async fn fetch(&self) -> Result<Vec<FundingQuote>, FetchError>;
}

/// Quotes gathered in one cycle plus the exchanges that contributed nothing.
#[derive(Debug, Default)]
pub struct Collection {
    pub quotes: Vec<FundingQuote>,
    pub failures: Vec<(Exchange, FetchError)>,
}

impl Collection {
    pub fn failed(&self, exchange: Exchange) -> bool {
        self.failures.iter().any(|(failed, _)| *failed == exchange)
    }
}

pub fn build_adapters(
    exchanges: &[Exchange],
    client: &reqwest::Client,
    quote_suffix: &str,
) -> Vec<Arc<dyn ExchangeAdapter>> {
    let mut adapters: Vec<Arc<dyn ExchangeAdapter>> = Vec::new();
    for exchange in exchanges {
        match exchange {
            Exchange::Binance => adapters.push(Arc::new(binance::BinanceAdapter::new(client.clone()))),
            Exchange::Bybit => adapters.push(Arc::new(bybit::BybitAdapter::new(
                client.clone(),
                quote_suffix,
            ))),
            Exchange::Okx => adapters.push(Arc::new(okx::OkxAdapter::new(client.clone()))),
            Exchange::Mexc => adapters.push(Arc::new(mexc::MexcAdapter::new(client.clone()))),
        }
    }
    adapters
}

/// Fetches every adapter concurrently. A failing or slow exchange only loses
/// its own contribution.
pub async fn collect_all(adapters: &[Arc<dyn ExchangeAdapter>], timeout: Duration) -> Collection {
    let fetches = adapters.iter().map(|adapter| async move {
        let start = tokio::time::Instant::now();
        let result = match tokio::time::timeout(timeout, adapter.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        };
        (adapter.exchange(), start.elapsed(), result)
    });
    let mut collection = Collection::default();
    for (exchange, elapsed, result) in join_all(fetches).await {
        match result {
            Ok(mut quotes) => {
                info!(
                    "Obtained {} rates from {} in {} ms",
                    quotes.len(),
                    exchange,
                    elapsed.as_millis()
                );
                collection.quotes.append(&mut quotes);
            }
            Err(e) => {
                warn!("{} contributed no funding rates this cycle: {}", exchange, e);
                collection.failures.push((exchange, e));
            }
        }
    }
    collection
}

pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<Value, FetchError> {
    let response = client.get(url).query(query).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    let contents = response.text().await?;
    Ok(serde_json::from_str(&contents)?)
}

pub(crate) fn list_under<'a>(json: &'a Value, key: &str) -> Result<&'a Vec<Value>, FetchError> {
    json[key]
        .as_array()
        .ok_or_else(|| FetchError::schema(format!("expected a list under `{}`", key)))
}

pub(crate) fn field_str<'a>(record: &'a Value, key: &str) -> Result<&'a str, FetchError> {
    record[key]
        .as_str()
        .ok_or_else(|| FetchError::schema(format!("missing string field `{}`", key)))
}

/// Exchanges send numbers both as JSON numbers and as strings.
pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn field_f64(record: &Value, key: &str) -> Result<f64, FetchError> {
    as_f64(&record[key]).ok_or_else(|| FetchError::schema(format!("missing numeric field `{}`", key)))
}

pub(crate) fn field_i64(record: &Value, key: &str) -> Result<i64, FetchError> {
    as_i64(&record[key]).ok_or_else(|| FetchError::schema(format!("missing integer field `{}`", key)))
}

/// Values past 10^11 cannot be seconds for any plausible date, so they are millis.
pub fn epoch_seconds(raw: i64) -> i64 {
    if raw > 100_000_000_000 {
        raw / 1000
    } else {
        raw
    }
}
