//! Pricing abstractions and core types

use crate::core::currency::Currency;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Yahoo,
    CoinGecko,
    Tradegate,
    ExchangeRateHost,
    OtcScrape,
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Source::Yahoo => "Yahoo Finance",
                Source::CoinGecko => "CoinGecko",
                Source::Tradegate => "Tradegate",
                Source::ExchangeRateHost => "exchangerate.host",
                Source::OtcScrape => "OTC",
            }
        )
    }
}

/// A single normalized price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub value: f64,
    pub currency: Currency,
    pub as_of: DateTime<Utc>,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Close {
    pub at: DateTime<Utc>,
    pub value: f64,
}

/// Most recent trading-period closes for a symbol, oldest first.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub currency: Currency,
    pub source: Source,
    pub closes: Vec<Close>,
}

impl PriceSeries {
    /// Two-point series for real-time sources that report only the latest
    /// price and its percentage change against the previous close.
    pub fn from_change(
        last: f64,
        change_percent: f64,
        currency: Currency,
        source: Source,
        as_of: DateTime<Utc>,
    ) -> Self {
        let previous = last / (1.0 + change_percent / 100.0);
        PriceSeries {
            currency,
            source,
            closes: vec![
                Close {
                    at: as_of - chrono::Duration::days(1),
                    value: previous,
                },
                Close { at: as_of, value: last },
            ],
        }
    }

    /// The last close and the one before it, if at least two exist.
    pub fn last_two(&self) -> Option<(&Close, &Close)> {
        match self.closes.as_slice() {
            [.., previous, last] => Some((previous, last)),
            _ => None,
        }
    }
}

/// Outcome of a best-effort read from a secondary venue.
#[derive(Debug, Clone, PartialEq)]
pub enum VenueReading {
    Available(Quote),
    Unavailable,
}

/// A resolved price snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub native: Quote,
    pub previous_close: f64,
    pub percent_change: f64,
    /// Absent only when every rate provider failed.
    pub converted: Option<Quote>,
    /// Present only when the instrument has an OTC venue configured.
    pub venue: Option<VenueReading>,
}

pub fn percent_change(last: f64, previous: f64) -> f64 {
    (last - previous) / previous * 100.0
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_price(&self, symbol: &str) -> Result<PriceSeries>;
}

/// A best-effort secondary venue. Failures surface as `Unavailable`, never as errors.
#[async_trait]
pub trait VenueProvider: Send + Sync {
    async fn fetch_venue(&self) -> VenueReading;
}
