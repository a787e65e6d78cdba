use crate::core::config::NumberLocale;
use crate::core::{Currency, CurrencyRateProvider};
use crate::providers::util::{http_client, number_from_json, rate_from_json};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Latest rates from exchangerate.host, used as the fallback rate source.
pub struct ExchangeRateHostProvider {
    base_url: String,
    access_key: Option<String>,
    locale: Option<NumberLocale>,
    client: reqwest::Client,
}

impl ExchangeRateHostProvider {
    pub fn new(base_url: &str, access_key: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.to_string(),
            access_key: access_key.map(str::to_string),
            locale: None,
            client: http_client(timeout)?,
        })
    }

    /// Fixes the locale of string rates instead of guessing it per value.
    pub fn with_locale(mut self, locale: Option<NumberLocale>) -> Self {
        self.locale = locale;
        self
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    rates: HashMap<String, Value>,
}

#[async_trait]
impl CurrencyRateProvider for ExchangeRateHostProvider {
    #[instrument(name = "ExchangeRateHostFetch", skip(self))]
    async fn get_rate(&self, from: Currency, to: Currency) -> Result<f64> {
        let mut url = format!(
            "{}/latest?base={}&symbols={}",
            self.base_url,
            from.code(),
            to.code()
        );
        if let Some(key) = &self.access_key {
            url.push_str("&access_key=");
            url.push_str(key);
        }
        debug!("Requesting currency rate from {}/latest", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Request error for currency pair: {from}{to}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for currency pair: {}{}",
                response.status(),
                from,
                to
            ));
        }

        let data: LatestResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response for {from}{to}"))?;

        let raw = data
            .rates
            .get(to.code())
            .ok_or_else(|| anyhow!("No rate data found for currency pair: {}{}", from, to))?;
        let rate = match self.locale {
            Some(locale) => number_from_json(raw, locale)?,
            None => rate_from_json(raw)?,
        };
        if rate <= 0.0 {
            return Err(anyhow!("Invalid rate {} for currency pair: {}{}", rate, from, to));
        }
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::util::DEFAULT_TIMEOUT;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("base", "EUR"))
            .and(query_param("symbols", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_server = create_mock_server(r#"{"base": "EUR", "rates": {"USD": 1.0842}}"#).await;
        let provider =
            ExchangeRateHostProvider::new(&mock_server.uri(), None, DEFAULT_TIMEOUT).unwrap();

        let rate = provider.get_rate(Currency::Eur, Currency::Usd).await.unwrap();
        assert_eq!(rate, 1.0842);
    }

    #[tokio::test]
    async fn test_string_rate_with_comma() {
        let mock_server = create_mock_server(r#"{"rates": {"USD": "1,0842"}}"#).await;
        let provider =
            ExchangeRateHostProvider::new(&mock_server.uri(), None, DEFAULT_TIMEOUT).unwrap();

        let rate = provider.get_rate(Currency::Eur, Currency::Usd).await.unwrap();
        assert_eq!(rate, 1.0842);
    }

    #[tokio::test]
    async fn test_small_comma_rate_is_not_grouping() {
        let mock_server = create_mock_server(r#"{"rates": {"USD": "1,085"}}"#).await;
        let provider =
            ExchangeRateHostProvider::new(&mock_server.uri(), None, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            provider.get_rate(Currency::Eur, Currency::Usd).await.unwrap(),
            1.085
        );

        let mock_server = create_mock_server(r#"{"rates": {"USD": "1,085"}}"#).await;
        let provider = ExchangeRateHostProvider::new(&mock_server.uri(), None, DEFAULT_TIMEOUT)
            .unwrap()
            .with_locale(Some(NumberLocale::En));
        assert_eq!(
            provider.get_rate(Currency::Eur, Currency::Usd).await.unwrap(),
            1085.0
        );
    }

    #[tokio::test]
    async fn test_access_key_is_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("access_key", "k3y"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"rates": {"USD": 1.1}}"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider =
            ExchangeRateHostProvider::new(&mock_server.uri(), Some("k3y"), DEFAULT_TIMEOUT)
                .unwrap();
        assert_eq!(
            provider.get_rate(Currency::Eur, Currency::Usd).await.unwrap(),
            1.1
        );
    }

    #[tokio::test]
    async fn test_missing_rate() {
        let mock_server =
            create_mock_server(r#"{"success": false, "error": {"code": 101}}"#).await;
        let provider =
            ExchangeRateHostProvider::new(&mock_server.uri(), None, DEFAULT_TIMEOUT).unwrap();

        let result = provider.get_rate(Currency::Eur, Currency::Usd).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No rate data found for currency pair: EURUSD"
        );
    }
}
