use crate::error::FetchError;
use crate::exchange::{as_f64, field_str, get_json, Exchange, ExchangeAdapter};
use crate::funding_rates::{next_funding_boundary, FundingQuote};
use crate::settings::BYBIT_REST_API_URL_LIVE;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

const TICKERS_ENDPOINT: &str = "/v2/public/tickers";

pub struct BybitAdapter {
    client: reqwest::Client,
    base_url: String,
    quote_suffix: String,
}

impl BybitAdapter {
    pub fn new(client: reqwest::Client, quote_suffix: &str) -> Self {
        Self::with_base_url(client, BYBIT_REST_API_URL_LIVE, quote_suffix)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str, quote_suffix: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            quote_suffix: quote_suffix.to_string(),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for BybitAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Bybit
    }

    async fn fetch(&self) -> Result<Vec<FundingQuote>, FetchError> {
        let url = format!("{}{}", self.base_url, TICKERS_ENDPOINT);
        let json = get_json(&self.client, &url, &[]).await?;
        parse_funding_rates(&json, &self.quote_suffix, Utc::now())
    }
}

/// Tickers carry no settlement time, so every quote settles at the next
/// eight-hour mark after `now`. A ticker without a rate counts as 0.0.
pub fn parse_funding_rates(
    json: &Value,
    quote_suffix: &str,
    now: DateTime<Utc>,
) -> Result<Vec<FundingQuote>, FetchError> {
    let tickers = match &json["result"] {
        Value::Array(tickers) => tickers,
        result => result["list"]
            .as_array()
            .ok_or_else(|| FetchError::schema("expected a list under `result`"))?,
    };
    let next_funding = next_funding_boundary(now);
    let mut output_vec = Vec::new();
    for ticker in tickers {
        let symbol = field_str(ticker, "symbol")?;
        if !symbol.ends_with(quote_suffix) {
            continue;
        }
        let rate = as_f64(&ticker["funding_rate"])
            .or_else(|| as_f64(&ticker["fundingRate"]))
            .unwrap_or(0.0);
        output_vec.push(FundingQuote::new(Exchange::Bybit, symbol, rate, next_funding)?);
    }
    Ok(output_vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample() -> Value {
        json!({
            "ret_code": 0,
            "result": [
                {"symbol": "BTCUSDT", "funding_rate": "0.0001", "last_price": "43000"},
                {"symbol": "ETHUSDT", "funding_rate": -0.0002},
                {"symbol": "BTCUSD", "funding_rate": "0.0003"},
                {"symbol": "XRPUSDT"}
            ]
        })
    }

    #[test]
    fn keeps_quote_suffix_and_defaults_missing_rate() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap();
        let quotes = parse_funding_rates(&sample(), "USDT", now).unwrap();
        let symbols: Vec<&str> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT", "XRPUSDT"]);
        assert_eq!(quotes[1].funding_rate, -0.0002);
        assert_eq!(quotes[2].funding_rate, 0.0);
        let sixteen = Utc.with_ymd_and_hms(2024, 3, 1, 16, 0, 0).unwrap().timestamp();
        assert!(quotes.iter().all(|q| q.next_funding_time == sixteen));
    }

    #[test]
    fn reads_nested_list_and_camel_case_rate() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 23, 50, 0).unwrap();
        let json = json!({"result": {"category": "linear", "list": [{"symbol": "SOLUSDT", "fundingRate": "0.0005"}]}});
        let quotes = parse_funding_rates(&json, "USDT", now).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].funding_rate, 0.0005);
        let midnight = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap().timestamp();
        assert_eq!(quotes[0].next_funding_time, midnight);
    }

    #[test]
    fn missing_result_is_a_schema_error() {
        let now = Utc::now();
        assert!(matches!(
            parse_funding_rates(&json!({"ret_code": 10001, "ret_msg": "error"}), "USDT", now),
            Err(FetchError::Schema(_))
        ));
        assert!(parse_funding_rates(&json!({"result": [{"funding_rate": "0.1"}]}), "USDT", now).is_err());
    }

    #[tokio::test]
    async fn fetches_tickers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TICKERS_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample()))
            .expect(1)
            .mount(&server)
            .await;
        let adapter = BybitAdapter::with_base_url(reqwest::Client::new(), &server.uri(), "USDT");
        let quotes = adapter.fetch().await.unwrap();
        assert_eq!(quotes.len(), 3);
        let now = Utc::now().timestamp();
        assert!(quotes.iter().all(|q| q.next_funding_time > now));
    }
}
