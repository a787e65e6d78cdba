//! Currency conversion abstractions

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
            Currency::Jpy => "¥",
        }
    }

    /// Decimals used when an amount is shown without a magnitude suffix.
    pub fn minor_digits(&self) -> usize {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }

    /// Whether large amounts are grouped by 10^4 (万) and 10^8 (億).
    pub fn groups_by_myriad(&self) -> bool {
        matches!(self, Currency::Jpy)
    }

    /// Finds the currency a leading or trailing symbol belongs to, e.g. `¥13,000`.
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '$' => Some(Currency::Usd),
            '€' => Some(Currency::Eur),
            '£' => Some(Currency::Gbp),
            '¥' | '￥' => Some(Currency::Jpy),
            _ => None,
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "JPY" => Ok(Currency::Jpy),
            _ => Err(anyhow!("Unsupported currency: {}", s)),
        }
    }
}

/// A rate observed at `as_of`: one unit of `from` buys `rate` units of `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from: Currency,
    pub to: Currency,
    pub rate: f64,
    pub as_of: DateTime<Utc>,
}

impl ExchangeRate {
    /// Converts `amount` expressed in `currency` across this pair, in either
    /// direction. Returns the converted amount and its currency.
    pub fn apply(&self, amount: f64, currency: Currency) -> Option<(f64, Currency)> {
        if currency == self.from {
            Some((amount * self.rate, self.to))
        } else if currency == self.to && self.rate != 0.0 {
            Some((amount / self.rate, self.from))
        } else {
            None
        }
    }
}

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn get_rate(&self, from: Currency, to: Currency) -> Result<f64>;
}
