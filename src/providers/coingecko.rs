use crate::core::{Currency, PriceProvider, PriceSeries, Source};
use crate::providers::util::http_client;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Real-time price for a coin id (e.g. `bitcoin`) from the CoinGecko simple
/// price endpoint, quoted in a fixed currency.
pub struct CoinGeckoProvider {
    base_url: String,
    currency: Currency,
    client: reqwest::Client,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str, currency: Currency, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.to_string(),
            currency,
            client: http_client(timeout)?,
        })
    }
}

// {"bitcoin": {"usd": 67000.0, "usd_24h_change": 1.23}}
type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    #[instrument(name = "CoinGeckoPriceFetch", skip(self), fields(coin = %coin_id))]
    async fn fetch_price(&self, coin_id: &str) -> Result<PriceSeries> {
        let vs = self.currency.code().to_lowercase();
        let url = format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies={}&include_24hr_change=true",
            self.base_url, coin_id, vs
        );
        debug!("Requesting price data from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request for coin: {coin_id}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for coin: {}",
                response.status(),
                coin_id
            ));
        }

        let data: SimplePriceResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse CoinGecko response for coin: {coin_id}"))?;

        let fields = data
            .get(coin_id)
            .ok_or_else(|| anyhow!("No price data found for coin: {}", coin_id))?;
        let price = fields
            .get(&vs)
            .copied()
            .flatten()
            .ok_or_else(|| anyhow!("No {} price for coin: {}", self.currency, coin_id))?;
        let change = fields
            .get(&format!("{vs}_24h_change"))
            .copied()
            .flatten()
            .ok_or_else(|| anyhow!("No 24h change for coin: {}", coin_id))?;

        if price <= 0.0 || change <= -100.0 {
            return Err(anyhow!(
                "Implausible quote for {}: price {} change {}%",
                coin_id,
                price,
                change
            ));
        }

        Ok(PriceSeries::from_change(
            price,
            change,
            self.currency,
            Source::CoinGecko,
            Utc::now(),
        ))
    }
}
