use crate::core::aggregator::PriceAggregator;
use crate::core::clock::{MarketCalendar, describe_wait};
use crate::core::format::format_status;
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Fetches one price point and prints the line the bot would publish
pub async fn print_status(aggregator: &PriceAggregator) -> Result<()> {
    let point = aggregator.fetch_price_point().await?;
    println!("{}  {}", aggregator.symbol(), format_status(&point));
    Ok(())
}

pub fn render_schedule(calendar: &MarketCalendar, now: DateTime<Utc>) -> String {
    let events = calendar.next_events(now);
    if events.is_empty() {
        return format!("The {} market is closed for the day.", calendar.venue());
    }
    events
        .iter()
        .map(|e| format!("{:<16} in {}", e.label, describe_wait(e.minutes_until)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn print_schedule(calendar: &MarketCalendar) {
    println!("{}", render_schedule(calendar, Utc::now()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SessionEvent;
    use chrono::{NaiveTime, TimeZone};

    #[test]
    fn test_render_schedule() {
        let calendar = MarketCalendar::new(
            "Frankfurt",
            chrono_tz::Europe::Berlin,
            vec![
                SessionEvent {
                    label: "Market Close".to_string(),
                    at: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                },
                SessionEvent {
                    label: "Market Open".to_string(),
                    at: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                },
            ],
            false,
        );

        let morning = chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2025, 3, 4, 7, 59, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            render_schedule(&calendar, morning),
            "Market Open      in 1 minute\nMarket Close     in 14 hours 1 minute"
        );

        let night = chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2025, 3, 4, 23, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            render_schedule(&calendar, night),
            "The Frankfurt market is closed for the day."
        );
    }
}
