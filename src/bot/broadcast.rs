//! Periodic status broadcast, published only when the rendered text changes.

use crate::bot::chat::ChatPlatform;
use crate::core::BotError;
use crate::core::aggregator::PriceAggregator;
use crate::core::format::format_status;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Shortest cadence `run` accepts; `tokio::time::interval` panics on zero.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Published,
    Unchanged,
    /// No price this tick (NoData or a provider error).
    Skipped,
    PublishFailed,
}

pub struct Broadcaster {
    aggregator: Arc<PriceAggregator>,
    chat: Arc<dyn ChatPlatform>,
    last_published: Option<String>,
    interval: Duration,
    publish_timeout: Duration,
}

impl Broadcaster {
    pub fn new(
        aggregator: Arc<PriceAggregator>,
        chat: Arc<dyn ChatPlatform>,
        interval: Duration,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            aggregator,
            chat,
            last_published: None,
            interval,
            publish_timeout,
        }
    }

    pub fn last_published(&self) -> Option<&str> {
        self.last_published.as_deref()
    }

    /// One fetch, format and publish cycle. Never fails; every problem is
    /// logged and reported through the outcome.
    pub async fn tick(&mut self) -> TickOutcome {
        let point = match self.aggregator.fetch_price_point().await {
            Ok(point) => point,
            Err(e) => {
                match e.downcast_ref::<BotError>() {
                    Some(BotError::NoData { .. }) => info!("Skipping tick: {e}"),
                    _ => warn!(error = format!("{e:#}"), "Skipping tick"),
                }
                return TickOutcome::Skipped;
            }
        };

        let text = format_status(&point);
        if self.last_published.as_deref() == Some(text.as_str()) {
            debug!(status = %text, "Status unchanged");
            return TickOutcome::Unchanged;
        }

        match self.publish(&text).await {
            Ok(()) => {
                info!(status = %text, "Published status");
                self.last_published = Some(text);
                TickOutcome::Published
            }
            Err(e) => {
                // last_published stays as is so the next tick retries.
                warn!(error = %e, "Publish failed");
                TickOutcome::PublishFailed
            }
        }
    }

    async fn publish(&self, text: &str) -> Result<()> {
        match tokio::time::timeout(self.publish_timeout, self.chat.set_presence(text)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BotError::PublishFailure(format!("{e:#}")).into()),
            Err(_) => Err(BotError::PublishFailure(format!(
                "timed out after {}s",
                self.publish_timeout.as_secs()
            ))
            .into()),
        }
    }

    /// Ticks forever on a fixed cadence. A slow tick delays the next one;
    /// ticks never overlap.
    pub async fn run(mut self) {
        if self.interval < MIN_INTERVAL {
            warn!(
                interval = ?self.interval,
                "Broadcast interval too short, using {MIN_INTERVAL:?}"
            );
            self.interval = MIN_INTERVAL;
        }
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            symbol = self.aggregator.symbol(),
            interval_secs = self.interval.as_secs(),
            "Starting status broadcast"
        );
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::chat::testing::RecordingChat;
    use crate::core::cache::RateCache;
    use crate::core::converter::CurrencyConverter;
    use crate::core::currency::{Currency, CurrencyRateProvider};
    use crate::core::price::{Close, PriceProvider, PriceSeries, Source};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves whatever closes the test last set.
    #[derive(Default)]
    struct ScriptedSeries(Mutex<Vec<f64>>);

    impl ScriptedSeries {
        fn set(&self, closes: &[f64]) {
            *self.0.lock().unwrap() = closes.to_vec();
        }
    }

    #[async_trait]
    impl PriceProvider for ScriptedSeries {
        async fn fetch_price(&self, _symbol: &str) -> Result<PriceSeries> {
            let closes = self.0.lock().unwrap().clone();
            Ok(PriceSeries {
                currency: Currency::Usd,
                source: Source::Yahoo,
                closes: closes
                    .into_iter()
                    .map(|value| Close {
                        at: Utc::now(),
                        value,
                    })
                    .collect(),
            })
        }
    }

    struct NoRates;

    #[async_trait]
    impl CurrencyRateProvider for NoRates {
        async fn get_rate(&self, _from: Currency, _to: Currency) -> Result<f64> {
            Err(anyhow!("offline"))
        }
    }

    fn broadcaster(series: Arc<ScriptedSeries>, chat: Arc<RecordingChat>) -> Broadcaster {
        let converter = Arc::new(CurrencyConverter::new(Arc::new(NoRates), None));
        let aggregator = PriceAggregator::new("BTC-USD", series, converter, RateCache::new());
        Broadcaster::new(
            Arc::new(aggregator),
            chat,
            Duration::from_secs(15),
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_identical_ticks_publish_once() {
        let series = Arc::new(ScriptedSeries::default());
        series.set(&[100.0, 110.0]);
        let chat = Arc::new(RecordingChat::default());
        let mut b = broadcaster(series.clone(), chat.clone());

        assert_eq!(b.tick().await, TickOutcome::Published);
        assert_eq!(b.tick().await, TickOutcome::Unchanged);
        assert_eq!(b.tick().await, TickOutcome::Unchanged);
        assert_eq!(chat.presences(), vec!["$110.00  +10.00%".to_string()]);

        series.set(&[100.0, 105.0]);
        assert_eq!(b.tick().await, TickOutcome::Published);
        assert_eq!(chat.presences().len(), 2);
        assert_eq!(b.last_published(), Some("$105.00  +5.00%"));
    }

    #[tokio::test]
    async fn test_publish_failure_retries_next_tick() {
        let series = Arc::new(ScriptedSeries::default());
        series.set(&[100.0, 110.0]);
        let chat = Arc::new(RecordingChat::default());
        chat.set_fail_presence(true);
        let mut b = broadcaster(series, chat.clone());

        assert_eq!(b.tick().await, TickOutcome::PublishFailed);
        assert_eq!(b.last_published(), None);

        chat.set_fail_presence(false);
        assert_eq!(b.tick().await, TickOutcome::Published);
        assert_eq!(b.last_published(), Some("$110.00  +10.00%"));
        // The same text was attempted twice: once failed, once succeeded.
        assert_eq!(chat.presences().len(), 2);
    }

    #[tokio::test]
    async fn test_no_data_skips_tick() {
        let series = Arc::new(ScriptedSeries::default());
        series.set(&[110.0]);
        let chat = Arc::new(RecordingChat::default());
        let mut b = broadcaster(series.clone(), chat.clone());

        assert_eq!(b.tick().await, TickOutcome::Skipped);
        assert!(chat.presences().is_empty());

        series.set(&[100.0, 110.0]);
        assert_eq!(b.tick().await, TickOutcome::Published);
    }

    /// Takes `delay` per fetch and records how many fetches overlap. The first
    /// call has a single close so its tick is skipped.
    struct SlowSeries {
        delay: Duration,
        started: AtomicUsize,
        completed: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl SlowSeries {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                started: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PriceProvider for SlowSeries {
        async fn fetch_price(&self, _symbol: &str) -> Result<PriceSeries> {
            let call = self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.completed.fetch_add(1, Ordering::SeqCst);

            let closes = if call == 0 {
                vec![100.0]
            } else {
                vec![100.0, 100.0 + call as f64]
            };
            Ok(PriceSeries {
                currency: Currency::Usd,
                source: Source::Yahoo,
                closes: closes
                    .into_iter()
                    .map(|value| Close {
                        at: Utc::now(),
                        value,
                    })
                    .collect(),
            })
        }
    }

    fn slow_broadcaster(
        series: Arc<SlowSeries>,
        chat: Arc<RecordingChat>,
        interval: Duration,
    ) -> Broadcaster {
        let converter = Arc::new(CurrencyConverter::new(Arc::new(NoRates), None));
        let aggregator = PriceAggregator::new("BTC-USD", series, converter, RateCache::new());
        Broadcaster::new(Arc::new(aggregator), chat, interval, Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_ticks_never_overlap_and_loop_survives_failures() {
        // Fetches take 20s against a 15s cadence: they start at 0, 20, 40, 60
        // and 80 and complete at 20, 40, 60 and 80 before the 90s mark.
        let series = Arc::new(SlowSeries::new(Duration::from_secs(20)));
        let chat = Arc::new(RecordingChat::default());
        chat.set_fail_presence(true);
        let handle = tokio::spawn(
            slow_broadcaster(series.clone(), chat.clone(), Duration::from_secs(15)).run(),
        );

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert!(!handle.is_finished());
        handle.abort();

        assert_eq!(series.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(series.started.load(Ordering::SeqCst), 5);
        let completed = series.completed.load(Ordering::SeqCst);
        assert_eq!(completed, 4);
        // First tick skipped on NoData, every later one tried to publish and failed.
        assert_eq!(chat.presences().len(), completed - 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_does_not_stop_the_loop() {
        let series = Arc::new(SlowSeries::new(Duration::from_millis(10)));
        let chat = Arc::new(RecordingChat::default());
        let handle =
            tokio::spawn(slow_broadcaster(series.clone(), chat.clone(), Duration::ZERO).run());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!handle.is_finished());
        handle.abort();

        assert!(series.completed.load(Ordering::SeqCst) >= 2);
        assert!(!chat.presences().is_empty());
    }
}
