//! Countdown to the labeled boundaries of a venue's trading day.

use crate::core::config::SessionConfig;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub label: String,
    #[serde(with = "hhmm")]
    pub at: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingEvent {
    pub label: String,
    pub minutes_until: i64,
}

#[derive(Debug, Clone)]
pub struct MarketCalendar {
    venue: String,
    timezone: Tz,
    events: Vec<SessionEvent>,
    roll_over_weekends: bool,
}

impl MarketCalendar {
    pub fn new(
        venue: &str,
        timezone: Tz,
        mut events: Vec<SessionEvent>,
        roll_over_weekends: bool,
    ) -> Self {
        events.sort_by_key(|e| e.at);
        Self {
            venue: venue.to_string(),
            timezone,
            events,
            roll_over_weekends,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let timezone: Tz = config
            .timezone
            .parse()
            .map_err(|e| anyhow!("Invalid session timezone '{}': {}", config.timezone, e))?;
        Ok(Self::new(
            &config.venue,
            timezone,
            config.events.clone(),
            config.roll_over_weekends,
        ))
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }

    /// Events strictly after `now`, in chronological order.
    ///
    /// Without weekend rollover only the current local day is considered and an
    /// empty result means the venue is done for the day. With rollover, Saturdays
    /// and Sundays carry no events and the search moves forward to the first
    /// trading weekday that still has something ahead of `now`.
    pub fn next_events(&self, now: DateTime<Utc>) -> Vec<UpcomingEvent> {
        let today = now.with_timezone(&self.timezone).date_naive();
        if !self.roll_over_weekends {
            return self.events_on(today, now);
        }

        let mut day = today;
        // Any 8 consecutive days contain a weekday with every event still ahead.
        for _ in 0..8 {
            if is_trading_day(day) {
                let upcoming = self.events_on(day, now);
                if !upcoming.is_empty() {
                    return upcoming;
                }
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        Vec::new()
    }

    fn events_on(&self, day: NaiveDate, now: DateTime<Utc>) -> Vec<UpcomingEvent> {
        self.events
            .iter()
            .filter_map(|event| {
                // Local times skipped by a DST transition have no instant.
                let at = self
                    .timezone
                    .from_local_datetime(&day.and_time(event.at))
                    .earliest()?
                    .with_timezone(&Utc);
                (at > now).then(|| UpcomingEvent {
                    label: event.label.clone(),
                    minutes_until: (at - now).num_minutes(),
                })
            })
            .collect()
    }
}

fn is_trading_day(day: NaiveDate) -> bool {
    !matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Renders a minute count as e.g. `2 hours 30 minutes`, `1 hour` or `0 minutes`.
pub fn describe_wait(minutes: i64) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{} hour{}", hours, if hours != 1 { "s" } else { "" }));
    }
    if mins > 0 || parts.is_empty() {
        parts.push(format!("{} minute{}", mins, if mins != 1 { "s" } else { "" }));
    }
    parts.join(" ")
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(s.trim(), FORMAT).map_err(de::Error::custom)
    }
}
