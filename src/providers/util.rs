use crate::core::BotError;
use crate::core::config::NumberLocale;
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;

pub const USER_AGENT: &str = "tickerbot/0.1";

/// Per-request timeout used when the config does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the HTTP client shared by a provider. The timeout bounds each request
/// so a stuck upstream delays a tick instead of stalling it forever.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Parses a number as printed by a provider: optional leading `+`, optional
/// trailing `%`, grouping separators and a locale-specific decimal mark.
pub fn parse_decimal(raw: &str, locale: NumberLocale) -> Result<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('+')
        .trim_end_matches('%')
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let normalized = match locale {
        NumberLocale::En => cleaned.replace(',', ""),
        NumberLocale::De => cleaned.replace('.', "").replace(',', "."),
    };

    normalized.parse::<f64>().map_err(|e| {
        BotError::ParseFailure {
            field: format!("'{raw}'"),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Reads a JSON value that may be either a number or a formatted string.
pub fn number_from_json(value: &Value, locale: NumberLocale) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            BotError::ParseFailure {
                field: n.to_string(),
                reason: "not representable as f64".to_string(),
            }
            .into()
        }),
        Value::String(s) => parse_decimal(s, locale),
        other => Err(BotError::ParseFailure {
            field: other.to_string(),
            reason: "expected a number".to_string(),
        }
        .into()),
    }
}

/// Picks the locale whose decimal mark appears last, e.g. `1.234,5` is German
/// and `1,234.5` or `1.08` is English. A lone comma is a decimal mark
/// (`0,007`, `1,085`); only repeated commas read as grouping.
pub fn guess_locale(raw: &str) -> NumberLocale {
    match (raw.rfind(','), raw.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => NumberLocale::De,
        (Some(_), None) if raw.matches(',').count() == 1 => NumberLocale::De,
        _ => NumberLocale::En,
    }
}

/// Reads an exchange rate that a provider may print in either locale.
pub fn rate_from_json(value: &Value) -> Result<f64> {
    let locale = match value {
        Value::String(s) => guess_locale(s.trim()),
        _ => NumberLocale::En,
    };
    number_from_json(value, locale)
}
