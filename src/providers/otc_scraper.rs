//! Scrapes a labeled price off an OTC venue's HTML page.
//!
//! Third-party markup changes without notice, so every failure here is
//! reported as [`VenueReading::Unavailable`] rather than an error.

use crate::core::config::{NumberLocale, OtcVenueConfig};
use crate::core::price::VenueProvider;
use crate::core::{Currency, Quote, Source, VenueReading};
use crate::providers::util::{http_client, parse_decimal};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub struct OtcScraper {
    url: String,
    locale: NumberLocale,
    currency: Currency,
    pattern: Regex,
    client: reqwest::Client,
}

fn number_pattern(locale: NumberLocale) -> &'static str {
    // Grouped form first, then a plain run of digits.
    match locale {
        NumberLocale::En => r"[+-]?\d{1,3}(?:,\d{3})+(?:\.\d+)?|[+-]?\d+(?:\.\d+)?",
        NumberLocale::De => r"[+-]?\d{1,3}(?:\.\d{3})+(?:,\d+)?|[+-]?\d+(?:,\d+)?",
    }
}

/// Matches `label`, then any run of tags, whitespace, `&nbsp;` or colons, then a number.
fn field_pattern(label: &str, locale: NumberLocale) -> Result<Regex> {
    let pattern = format!(
        r"(?is){}(?:\s|:|&nbsp;|<[^>]*>)*({})",
        regex::escape(label),
        number_pattern(locale)
    );
    Regex::new(&pattern).with_context(|| format!("Invalid scrape pattern for label '{label}'"))
}

impl OtcScraper {
    pub fn new(config: &OtcVenueConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: config.url.clone(),
            locale: config.locale,
            currency: config.currency,
            pattern: field_pattern(&config.label, config.locale)?,
            client: http_client(timeout)?,
        })
    }

    /// Pulls the labeled number out of a page body.
    pub fn extract(&self, html: &str) -> Result<f64> {
        let raw = self
            .pattern
            .captures(html)
            .and_then(|c| c.get(1))
            .ok_or_else(|| anyhow!("Labeled field not found on page"))?;
        parse_decimal(raw.as_str(), self.locale)
    }

    async fn scrape(&self) -> Result<Quote> {
        debug!("Requesting OTC page from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("OTC page request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {} for OTC page", response.status()));
        }
        let html = response.text().await.context("Failed to read OTC page")?;
        let value = self.extract(&html)?;
        Ok(Quote {
            value,
            currency: self.currency,
            as_of: Utc::now(),
            source: Source::OtcScrape,
        })
    }
}

#[async_trait]
impl VenueProvider for OtcScraper {
    #[instrument(name = "OtcScrape", skip(self))]
    async fn fetch_venue(&self) -> VenueReading {
        match self.scrape().await {
            Ok(quote) => VenueReading::Available(quote),
            Err(e) => {
                warn!(error = %e, "OTC venue unavailable");
                VenueReading::Unavailable
            }
        }
    }
}
