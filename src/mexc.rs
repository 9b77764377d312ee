use crate::error::FetchError;
use crate::exchange::{as_i64, field_f64, field_str, get_json, list_under, Exchange, ExchangeAdapter};
use crate::funding_rates::FundingQuote;
use crate::settings::MEXC_REST_API_URL_LIVE;
use async_trait::async_trait;
use serde_json::Value;

const FUNDING_RATE_ENDPOINT: &str = "/api/v1/contract/funding_rate";

pub struct MexcAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl MexcAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, MEXC_REST_API_URL_LIVE)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for MexcAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Mexc
    }

    async fn fetch(&self) -> Result<Vec<FundingQuote>, FetchError> {
        let url = format!("{}{}", self.base_url, FUNDING_RATE_ENDPOINT);
        let json = get_json(&self.client, &url, &[]).await?;
        parse_funding_rates(&json)
    }
}

pub fn parse_funding_rates(json: &Value) -> Result<Vec<FundingQuote>, FetchError> {
    list_under(json, "data")?.iter().map(from_mexc).collect()
}

fn from_mexc(data: &Value) -> Result<FundingQuote, FetchError> {
    let settle_ms = as_i64(&data["nextSettleTime"])
        .or_else(|| as_i64(&data["nextFundingTime"]))
        .ok_or_else(|| FetchError::schema("missing `nextSettleTime`"))?;
    FundingQuote::new(
        Exchange::Mexc,
        field_str(data, "symbol")?,
        field_f64(data, "fundingRate")?,
        settle_ms / 1000,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample() -> Value {
        json!({
            "success": true,
            "code": 0,
            "data": [
                {"symbol": "BTC_USDT", "fundingRate": 0.000125, "maxFundingRate": 0.003, "collectCycle": 8, "nextSettleTime": 1_700_006_400_999_i64},
                {"symbol": "PEPE_USDT", "fundingRate": -0.0015, "nextFundingTime": 1_700_006_400_000_i64}
            ]
        })
    }

    #[test]
    fn maps_settle_time_to_seconds() {
        let quotes = parse_funding_rates(&sample()).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol, "BTC_USDT");
        assert_eq!(quotes[0].next_funding_time, 1_700_006_400);
        assert_eq!(quotes[1].next_funding_time, 1_700_006_400);
        assert_eq!(quotes[1].funding_rate, -0.0015);
        assert!(quotes.iter().all(|q| q.exchange == Exchange::Mexc));
    }

    #[test]
    fn missing_fields_are_schema_errors() {
        assert!(parse_funding_rates(&json!({"success": false, "code": 510})).is_err());
        assert!(parse_funding_rates(&json!({"data": [{"symbol": "BTC_USDT", "fundingRate": 0.0001}]})).is_err());
    }

    #[tokio::test]
    async fn fetches_contract_funding_rates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(FUNDING_RATE_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample()))
            .expect(1)
            .mount(&server)
            .await;
        let adapter = MexcAdapter::with_base_url(reqwest::Client::new(), &server.uri());
        assert_eq!(adapter.fetch().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn slow_response_is_cut_off_by_the_collector() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(sample())
                    .set_delay(std::time::Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
        let adapters: Vec<std::sync::Arc<dyn ExchangeAdapter>> = vec![std::sync::Arc::new(
            MexcAdapter::with_base_url(reqwest::Client::new(), &server.uri()),
        )];
        let collection =
            crate::exchange::collect_all(&adapters, std::time::Duration::from_millis(200)).await;
        assert!(collection.quotes.is_empty());
        assert!(collection.failed(Exchange::Mexc));
    }
}
