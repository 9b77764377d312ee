use crate::error::FetchError;
use crate::exchange::{epoch_seconds, field_f64, field_str, get_json, list_under, Exchange, ExchangeAdapter};
use crate::funding_rates::FundingQuote;
use crate::settings::OKX_REST_API_URL_LIVE;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

const FUNDING_RATE_ENDPOINT: &str = "/api/v5/public/funding-rate";

pub struct OkxAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OkxAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, OKX_REST_API_URL_LIVE)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for OkxAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Okx
    }

    async fn fetch(&self) -> Result<Vec<FundingQuote>, FetchError> {
        let url = format!("{}{}", self.base_url, FUNDING_RATE_ENDPOINT);
        let json = get_json(&self.client, &url, &[("instType", "SWAP")]).await?;
        parse_funding_rates(&json)
    }
}

pub fn parse_funding_rates(json: &Value) -> Result<Vec<FundingQuote>, FetchError> {
    list_under(json, "data")?.iter().map(from_okx).collect()
}

fn from_okx(data: &Value) -> Result<FundingQuote, FetchError> {
    let funding_time = match &data["fundingTime"] {
        Value::String(time) => parse_funding_time(time)?,
        Value::Number(ms) => ms
            .as_i64()
            .map(epoch_seconds)
            .ok_or_else(|| FetchError::schema("non-integer `fundingTime`"))?,
        _ => return Err(FetchError::schema("missing `fundingTime`")),
    };
    FundingQuote::new(
        Exchange::Okx,
        field_str(data, "instId")?,
        field_f64(data, "fundingRate")?,
        funding_time,
    )
}

/// ISO-8601 UTC (`2024-01-01T08:00:00Z`, fractional seconds and offsets
/// allowed), or a bare millisecond timestamp.
fn parse_funding_time(time: &str) -> Result<i64, FetchError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(time) {
        return Ok(parsed.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc().timestamp());
    }
    time.parse::<i64>()
        .map(epoch_seconds)
        .map_err(|_| FetchError::schema(format!("unparseable `fundingTime`: {}", time)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample() -> Value {
        json!({
            "code": "0",
            "msg": "",
            "data": [
                {"instId": "BTC-USDT-SWAP", "instType": "SWAP", "fundingRate": "0.0001", "fundingTime": "2023-11-15T00:00:00Z"},
                {"instId": "ETH-USDT-SWAP", "instType": "SWAP", "fundingRate": "-0.00031", "fundingTime": "1700006400000"}
            ]
        })
    }

    #[test]
    fn parses_iso_and_millisecond_times() {
        let quotes = parse_funding_rates(&sample()).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol, "BTC-USDT-SWAP");
        assert_eq!(quotes[0].next_funding_time, 1_700_006_400);
        assert_eq!(quotes[1].next_funding_time, 1_700_006_400);
        assert_eq!(quotes[1].funding_rate, -0.00031);
    }

    #[test]
    fn funding_time_formats() {
        assert_eq!(parse_funding_time("2023-11-15T00:00:00Z").unwrap(), 1_700_006_400);
        assert_eq!(parse_funding_time("2023-11-15T00:00:00.000Z").unwrap(), 1_700_006_400);
        assert_eq!(parse_funding_time("2023-11-15T08:00:00+08:00").unwrap(), 1_700_006_400);
        assert_eq!(parse_funding_time("2023-11-15T00:00:00").unwrap(), 1_700_006_400);
        assert!(parse_funding_time("next tuesday").is_err());
    }

    #[test]
    fn missing_data_is_a_schema_error() {
        assert!(matches!(
            parse_funding_rates(&json!({"code": "50011", "msg": "Too Many Requests"})),
            Err(FetchError::Schema(_))
        ));
        assert!(parse_funding_rates(&json!({"data": [{"instId": "BTC-USDT-SWAP", "fundingRate": "0.1"}]})).is_err());
    }

    #[tokio::test]
    async fn requests_swap_instruments() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(FUNDING_RATE_ENDPOINT))
            .and(query_param("instType", "SWAP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample()))
            .expect(1)
            .mount(&server)
            .await;
        let adapter = OkxAdapter::with_base_url(reqwest::Client::new(), &server.uri());
        assert_eq!(adapter.fetch().await.unwrap().len(), 2);
    }
}
