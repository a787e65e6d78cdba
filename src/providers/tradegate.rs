use crate::core::config::NumberLocale;
use crate::core::{Currency, PriceProvider, PriceSeries, Source};
use crate::providers::util::{http_client, number_from_json};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// Real-time last price from the Tradegate refresh endpoint. Values come back
/// as German-formatted strings, e.g. `{"last": "12,34", "delta": "+1,05"}`.
pub struct TradegateProvider {
    base_url: String,
    currency: Currency,
    client: reqwest::Client,
}

impl TradegateProvider {
    pub fn new(base_url: &str, currency: Currency, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.to_string(),
            currency,
            client: http_client(timeout)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    last: Option<Value>,
    delta: Option<Value>,
}

#[async_trait]
impl PriceProvider for TradegateProvider {
    #[instrument(name = "TradegatePriceFetch", skip(self), fields(isin = %isin))]
    async fn fetch_price(&self, isin: &str) -> Result<PriceSeries> {
        let url = format!("{}/refresh.php?isin={}", self.base_url, isin);
        debug!("Requesting price data from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request for ISIN: {isin}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for ISIN: {}",
                response.status(),
                isin
            ));
        }

        let response_text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for ISIN: {isin}"))?;

        if response_text.trim().is_empty() {
            return Err(anyhow!("Received empty response for ISIN: {}", isin));
        }

        let data: RefreshResponse = serde_json::from_str(&response_text).with_context(|| {
            format!("Failed to parse Tradegate response for ISIN: {isin}. Response: '{response_text}'")
        })?;
        debug!(?data, "Received Tradegate response");

        let last = data
            .last
            .as_ref()
            .ok_or_else(|| anyhow!("No last price for ISIN: {}", isin))
            .and_then(|v| number_from_json(v, NumberLocale::De))?;
        let delta = data
            .delta
            .as_ref()
            .ok_or_else(|| anyhow!("No delta for ISIN: {}", isin))
            .and_then(|v| number_from_json(v, NumberLocale::De))?;

        if last <= 0.0 || delta <= -100.0 {
            return Err(anyhow!(
                "Implausible quote for {}: last {} delta {}%",
                isin,
                last,
                delta
            ));
        }

        Ok(PriceSeries::from_change(
            last,
            delta,
            self.currency,
            Source::Tradegate,
            Utc::now(),
        ))
    }
}
