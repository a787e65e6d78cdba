pub mod bot;
pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::bot::console::ConsoleChat;
use crate::bot::{Broadcaster, CommandRouter, ModerationEngine};
use crate::core::aggregator::PriceAggregator;
use crate::core::cache::RateCache;
use crate::core::clock::MarketCalendar;
use crate::core::config::{AppConfig, SourceKind};
use crate::core::converter::CurrencyConverter;
use crate::core::price::VenueProvider;
use crate::core::{CurrencyRateProvider, PriceProvider};
use crate::providers::coingecko::CoinGeckoProvider;
use crate::providers::exchangerate_host::ExchangeRateHostProvider;
use crate::providers::otc_scraper::OtcScraper;
use crate::providers::tradegate::TradegateProvider;
use crate::providers::yahoo_finance::{YahooCurrencyProvider, YahooFinanceProvider};
use crate::store::ModerationStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

pub enum AppCommand {
    /// Broadcast loop plus message handling on the console
    Run,
    /// Print one status line
    Status,
    /// Print the remaining session events
    Wen,
}

fn build_price_provider(config: &AppConfig, timeout: Duration) -> Result<Arc<dyn PriceProvider>> {
    let instrument = &config.instrument;
    let provider: Arc<dyn PriceProvider> = match instrument.source {
        SourceKind::Yahoo => Arc::new(YahooFinanceProvider::new(
            config.providers.yahoo_url(),
            timeout,
        )?),
        SourceKind::CoinGecko => {
            let currency = instrument
                .currency
                .context("instrument.currency is required for the coingecko source")?;
            Arc::new(CoinGeckoProvider::new(
                config.providers.coingecko_url(),
                currency,
                timeout,
            )?)
        }
        SourceKind::Tradegate => {
            let currency = instrument
                .currency
                .context("instrument.currency is required for the tradegate source")?;
            Arc::new(TradegateProvider::new(
                config.providers.tradegate_url(),
                currency,
                timeout,
            )?)
        }
    };
    Ok(provider)
}

fn build_converter(config: &AppConfig, timeout: Duration) -> Result<CurrencyConverter> {
    let primary: Arc<dyn CurrencyRateProvider> = Arc::new(YahooCurrencyProvider::new(
        config.providers.yahoo_url(),
        timeout,
    )?);
    let secondary = match &config.providers.exchangerate_host {
        Some(fx) => Some(Arc::new(ExchangeRateHostProvider::new(
            &fx.base_url,
            fx.access_key.as_deref(),
            timeout,
        )?
        .with_locale(fx.locale)) as Arc<dyn CurrencyRateProvider>),
        None => None,
    };
    Ok(CurrencyConverter::new(primary, secondary))
}

fn build_aggregator(config: &AppConfig, timeout: Duration) -> Result<PriceAggregator> {
    let provider = build_price_provider(config, timeout)?;
    let converter = Arc::new(build_converter(config, timeout)?);
    let venue = match &config.instrument.otc {
        Some(otc) => Some(Arc::new(OtcScraper::new(otc, timeout)?) as Arc<dyn VenueProvider>),
        None => None,
    };

    Ok(
        PriceAggregator::new(&config.instrument.symbol, provider, converter, RateCache::new())
            .with_display_currency(config.instrument.display_currency)
            .with_venue(venue),
    )
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let calendar = MarketCalendar::from_config(&config.session)?;
    let timeout = Duration::from_secs(config.broadcast.request_timeout_secs);

    match command {
        AppCommand::Wen => {
            cli::status::print_schedule(&calendar);
            Ok(())
        }
        AppCommand::Status => {
            let aggregator = build_aggregator(&config, timeout)?;
            cli::status::print_status(&aggregator).await
        }
        AppCommand::Run => run_bot(config, calendar, timeout).await,
    }
}

async fn run_bot(config: AppConfig, calendar: MarketCalendar, timeout: Duration) -> Result<()> {
    info!(symbol = %config.instrument.symbol, "tickerbot starting...");

    let aggregator = Arc::new(build_aggregator(&config, timeout)?);
    let chat = Arc::new(ConsoleChat::new(config.moderation.admin_roles.clone()));
    let store = ModerationStore::load(config.moderation_store_path()?)?;
    let moderation = ModerationEngine::new(
        store,
        &config.moderation.audit_channel,
        config.moderation.enabled,
    );
    let router = Arc::new(CommandRouter::new(
        chat.clone(),
        Arc::clone(&aggregator),
        calendar,
        moderation,
        config.commands.clone(),
        config.moderation.admin_roles.clone(),
    ));

    let broadcaster = Broadcaster::new(
        aggregator,
        chat.clone(),
        Duration::from_secs(config.broadcast.interval_secs),
        timeout,
    );
    let broadcast = tokio::spawn(broadcaster.run());

    // Each message is handled on its own task so a slow reply never holds up
    // the next one.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if let Some(message) = chat.parse_line(&line) {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.dispatch(message).await });
        }
    }

    info!("Console input closed, broadcasting until interrupted");
    broadcast.await.context("Broadcast task failed")?;
    Ok(())
}
