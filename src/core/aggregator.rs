//! Resolves a full [`PricePoint`] for the configured instrument.

use crate::core::cache::RateCache;
use crate::core::converter::CurrencyConverter;
use crate::core::currency::Currency;
use crate::core::error::BotError;
use crate::core::price::{PricePoint, PriceProvider, Quote, VenueProvider, percent_change};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct PriceAggregator {
    symbol: String,
    provider: Arc<dyn PriceProvider>,
    converter: Arc<CurrencyConverter>,
    display_currency: Option<Currency>,
    rate_cache: RateCache,
    venue: Option<Arc<dyn VenueProvider>>,
}

impl PriceAggregator {
    pub fn new(
        symbol: &str,
        provider: Arc<dyn PriceProvider>,
        converter: Arc<CurrencyConverter>,
        rate_cache: RateCache,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            provider,
            converter,
            display_currency: None,
            rate_cache,
            venue: None,
        }
    }

    pub fn with_display_currency(mut self, currency: Option<Currency>) -> Self {
        self.display_currency = currency;
        self
    }

    pub fn with_venue(mut self, venue: Option<Arc<dyn VenueProvider>>) -> Self {
        self.venue = venue;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn rate_cache(&self) -> &RateCache {
        &self.rate_cache
    }

    /// Fetches the two latest closes, converts the last one and reads the
    /// secondary venue if one is configured.
    ///
    /// Fails only with [`BotError::NoData`] or a provider error. A failed
    /// conversion leaves `converted` empty and the rate cache untouched.
    #[instrument(skip(self), fields(symbol = %self.symbol))]
    pub async fn fetch_price_point(&self) -> Result<PricePoint> {
        let (series, venue) = futures::join!(self.provider.fetch_price(&self.symbol), async {
            match &self.venue {
                Some(venue) => Some(venue.fetch_venue().await),
                None => None,
            }
        });
        let series = series?;

        let (previous, last) = series.last_two().ok_or_else(|| BotError::NoData {
            symbol: self.symbol.clone(),
            observations: series.closes.len(),
        })?;

        let native = Quote {
            value: last.value,
            currency: series.currency,
            as_of: last.at,
            source: series.source,
        };
        let converted = self.convert(&native).await;

        Ok(PricePoint {
            percent_change: percent_change(last.value, previous.value),
            previous_close: previous.value,
            native,
            converted,
            venue,
        })
    }

    async fn convert(&self, native: &Quote) -> Option<Quote> {
        let target = self.display_currency.filter(|c| *c != native.currency)?;
        match self.converter.rate(native.currency, target).await {
            Ok(rate) => {
                let converted = Quote {
                    value: native.value * rate.rate,
                    currency: target,
                    as_of: rate.as_of,
                    source: native.source,
                };
                self.rate_cache.put(rate).await;
                Some(converted)
            }
            Err(e) => {
                warn!(error = %e, "Showing native price only");
                None
            }
        }
    }

    /// Latest close of an arbitrary symbol from the same provider.
    pub async fn latest_price(&self, symbol: &str) -> Result<Quote> {
        let series = self.provider.fetch_price(symbol).await?;
        let last = series.closes.last().ok_or_else(|| BotError::NoData {
            symbol: symbol.to_string(),
            observations: 0,
        })?;
        debug!(symbol, value = last.value, "Latest price");
        Ok(Quote {
            value: last.value,
            currency: series.currency,
            as_of: last.at,
            source: series.source,
        })
    }

    pub fn has_venue(&self) -> bool {
        self.venue.is_some()
    }
}
