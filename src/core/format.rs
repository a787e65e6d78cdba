//! Renders price snapshots into the one-line presence text.
//!
//! The output of [`format_status`] is compared byte-for-byte against the last
//! published line, so it must depend on nothing but the `PricePoint` itself.

use crate::core::currency::Currency;
use crate::core::price::{PricePoint, VenueReading};

/// Longest presence text the chat platform accepts.
pub const MAX_STATUS_CHARS: usize = 128;

const SEPARATOR: &str = "  ";
const MYRIAD: f64 = 10_000.0;
const HUNDRED_MILLION: f64 = 100_000_000.0;

pub fn format_amount(value: f64, currency: Currency) -> String {
    let symbol = currency.symbol();
    if currency.groups_by_myriad() {
        if value >= HUNDRED_MILLION {
            return format!("{symbol}{:.2}億", value / HUNDRED_MILLION);
        }
        if value >= MYRIAD {
            return format!("{symbol}{:.2}万", value / MYRIAD);
        }
    }
    format!("{symbol}{value:.prec$}", prec = currency.minor_digits())
}

/// Plain amount with thousands separators, e.g. `¥13,000` or `$1,234.50`.
pub fn format_grouped(value: f64, currency: Currency) -> String {
    let fixed = format!("{:.*}", currency.minor_digits(), value.abs());
    let (int_part, frac) = match fixed.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match frac {
        Some(frac) => format!("{sign}{}{grouped}.{frac}", currency.symbol()),
        None => format!("{sign}{}{grouped}", currency.symbol()),
    }
}

pub fn format_change(percent: f64) -> String {
    format!("{percent:+.2}%")
}

pub fn format_status(point: &PricePoint) -> String {
    let mut segments = vec![format_amount(point.native.value, point.native.currency)];
    if let Some(converted) = &point.converted {
        segments.push(format_amount(converted.value, converted.currency));
    }
    segments.push(format_change(point.percent_change));

    truncate_chars(&segments.join(SEPARATOR), MAX_STATUS_CHARS)
}

/// Multi-line reply for an explicit price query.
pub fn format_snapshot(symbol: &str, point: &PricePoint) -> String {
    let mut lines = vec![format!(
        "**{}**: {} ({}) via {}",
        symbol,
        format_amount(point.native.value, point.native.currency),
        format_change(point.percent_change),
        point.native.source
    )];
    lines.push(format!(
        "Previous close: {}",
        format_amount(point.previous_close, point.native.currency)
    ));
    if let Some(converted) = &point.converted {
        lines.push(format!(
            "In {}: {}",
            converted.currency,
            format_amount(converted.value, converted.currency)
        ));
    }
    match &point.venue {
        Some(VenueReading::Available(quote)) => lines.push(format!(
            "OTC: {}",
            format_amount(quote.value, quote.currency)
        )),
        Some(VenueReading::Unavailable) => lines.push("OTC: unavailable".to_string()),
        None => {}
    }
    lines.join("\n")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
