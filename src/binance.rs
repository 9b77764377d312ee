use crate::error::FetchError;
use crate::exchange::{epoch_seconds, field_f64, field_i64, field_str, get_json, Exchange, ExchangeAdapter};
use crate::funding_rates::FundingQuote;
use crate::settings::BINANCE_REST_API_URL_LIVE;
use async_trait::async_trait;
use log::debug;
use serde_json::Value;

const PREMIUM_INDEX_ENDPOINT: &str = "/fapi/v1/premiumIndex";

pub struct BinanceAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, BINANCE_REST_API_URL_LIVE)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    async fn fetch(&self) -> Result<Vec<FundingQuote>, FetchError> {
        let url = format!("{}{}", self.base_url, PREMIUM_INDEX_ENDPOINT);
        let json = get_json(&self.client, &url, &[]).await?;
        parse_funding_rates(&json)
    }
}

/// `premiumIndex` returns a bare list, or a single object when queried by symbol.
/// Delivery contracts in the list carry an empty `lastFundingRate` and are skipped.
pub fn parse_funding_rates(json: &Value) -> Result<Vec<FundingQuote>, FetchError> {
    match json {
        Value::Array(perpetuals) => perpetuals
            .iter()
            .map(from_binance)
            .filter_map(Result::transpose)
            .collect(),
        Value::Object(_) => Ok(from_binance(json)?.into_iter().collect()),
        _ => Err(FetchError::schema("expected a list of premium index entries")),
    }
}

fn from_binance(data: &Value) -> Result<Option<FundingQuote>, FetchError> {
    let symbol = field_str(data, "symbol")?;
    let unset = match &data["lastFundingRate"] {
        Value::Null => true,
        Value::String(rate) => rate.trim().is_empty(),
        _ => false,
    };
    if unset {
        debug!("Skipping {} without a funding rate", symbol);
        return Ok(None);
    }
    FundingQuote::new(
        Exchange::Binance,
        symbol,
        field_f64(data, "lastFundingRate")?,
        epoch_seconds(field_i64(data, "nextFundingTime")?),
    )
    .map(Some)
}
