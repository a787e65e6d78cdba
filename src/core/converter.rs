//! Currency conversion with a single fallback provider.

use crate::core::currency::{Currency, CurrencyRateProvider, ExchangeRate};
use crate::core::error::BotError;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Asks the primary provider, then the secondary once. There is no retry
/// beyond that; callers treat `RateUnavailable` as "show native price only".
pub struct CurrencyConverter {
    primary: Arc<dyn CurrencyRateProvider>,
    secondary: Option<Arc<dyn CurrencyRateProvider>>,
}

impl CurrencyConverter {
    pub fn new(
        primary: Arc<dyn CurrencyRateProvider>,
        secondary: Option<Arc<dyn CurrencyRateProvider>>,
    ) -> Self {
        Self { primary, secondary }
    }

    pub async fn rate(&self, from: Currency, to: Currency) -> Result<ExchangeRate> {
        if from == to {
            return Ok(ExchangeRate {
                from,
                to,
                rate: 1.0,
                as_of: Utc::now(),
            });
        }

        let providers = std::iter::once(&self.primary).chain(self.secondary.iter());
        for (attempt, provider) in providers.enumerate() {
            match provider.get_rate(from, to).await {
                Ok(rate) => {
                    debug!(%from, %to, rate, attempt, "Resolved exchange rate");
                    return Ok(ExchangeRate {
                        from,
                        to,
                        rate,
                        as_of: Utc::now(),
                    });
                }
                Err(e) => warn!(%from, %to, attempt, error = %e, "Rate provider failed"),
            }
        }

        Err(BotError::RateUnavailable { from, to }.into())
    }

    pub async fn convert(&self, amount: f64, from: Currency, to: Currency) -> Result<f64> {
        Ok(amount * self.rate(from, to).await?.rate)
    }
}
