//! Dispatches inbound messages: prefix commands, direct-message queries,
//! mentions, and moderation of everything else.

use crate::bot::chat::{ChatPlatform, InboundMessage};
use crate::bot::moderation::ModerationEngine;
use crate::core::aggregator::PriceAggregator;
use crate::core::clock::{MarketCalendar, describe_wait};
use crate::core::config::CommandsConfig;
use crate::core::format::{format_amount, format_grouped, format_snapshot};
use crate::core::{BotError, Currency};
use crate::store::{AddOutcome, RemoveOutcome};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const RATE_PENDING: &str = "Exchange rate not yet available. Please try again shortly.";
const DM_HELP: &str = "Send an amount to convert (e.g. 13000) or type `wen` for the market schedule.";

#[derive(Debug, PartialEq)]
enum Command<'a> {
    AddBad { channel: String, phrase: &'a str },
    RemoveBad { channel: String, phrase: &'a str },
    ListBad { channel: String },
    Convert(&'a str),
    Price,
    Compare(&'a str, &'a str),
    Usage(&'static str),
}

pub struct CommandRouter {
    chat: Arc<dyn ChatPlatform>,
    aggregator: Arc<PriceAggregator>,
    calendar: MarketCalendar,
    moderation: ModerationEngine,
    commands: CommandsConfig,
    admin_roles: Vec<String>,
}

/// Splits `#channel rest` into the channel and the rest. Falls back to the
/// current channel when the first word is not a channel reference.
fn channel_and_rest<'a>(message: &InboundMessage, args: &'a str) -> Option<(String, &'a str)> {
    match args.strip_prefix('#') {
        Some(tail) => {
            let (channel, rest) = tail.split_once(char::is_whitespace).unwrap_or((tail, ""));
            (!channel.is_empty()).then(|| (channel.to_string(), rest.trim()))
        }
        None if !message.is_direct_message => Some((message.channel.clone(), args)),
        None => None,
    }
}

/// Reads an amount like `13000`, `¥13,000` or `1,234.5€`.
pub fn parse_amount(text: &str) -> Option<(f64, Option<Currency>)> {
    let text = text.trim();
    let mut currency = None;
    let mut body = text;
    if let Some(first) = body.chars().next()
        && let Some(c) = Currency::from_symbol(first)
    {
        currency = Some(c);
        body = &body[first.len_utf8()..];
    } else if let Some(last) = body.chars().last()
        && let Some(c) = Currency::from_symbol(last)
    {
        currency = Some(c);
        body = &body[..body.len() - last.len_utf8()];
    }

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | '_') && !c.is_whitespace())
        .collect();
    let amount: f64 = cleaned.parse().ok()?;
    (amount.is_finite() && amount >= 0.0).then_some((amount, currency))
}

impl CommandRouter {
    pub fn new(
        chat: Arc<dyn ChatPlatform>,
        aggregator: Arc<PriceAggregator>,
        calendar: MarketCalendar,
        moderation: ModerationEngine,
        mut commands: CommandsConfig,
        admin_roles: Vec<String>,
    ) -> Self {
        // Content is lowercased before matching.
        commands.trigger_words = commands
            .trigger_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self {
            chat,
            aggregator,
            calendar,
            moderation,
            commands,
            admin_roles,
        }
    }

    /// Handles one message. Rejections meant for the user (missing role,
    /// unknown phrase, no price yet) are replied to and not returned as errors.
    pub async fn handle(&self, message: InboundMessage) -> Result<()> {
        if message.author.is_bot {
            return Ok(());
        }

        let result = match self.parse_command(&message) {
            Some(command) => self.run(&message, command).await,
            None if message.is_direct_message => self.handle_direct(&message).await,
            None => self.handle_public(&message).await,
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) => match e.downcast_ref::<BotError>() {
                Some(
                    err @ (BotError::PermissionDenied { .. }
                    | BotError::NotFound(_)
                    | BotError::NoData { .. }
                    | BotError::RateUnavailable { .. }),
                ) => {
                    info!(author = %message.author.name, "Rejected: {err}");
                    self.reply(&message, &err.to_string()).await
                }
                _ => Err(e),
            },
        }
    }

    /// Catch-and-log boundary around [`handle`](Self::handle).
    pub async fn dispatch(&self, message: InboundMessage) {
        let (author, channel) = (message.author.name.clone(), message.channel.clone());
        if let Err(e) = self.handle(message).await {
            error!(%author, %channel, error = format!("{e:#}"), "Message handler failed");
        }
    }

    fn parse_command<'a>(&self, message: &'a InboundMessage) -> Option<Command<'a>> {
        let body = message.content.trim().strip_prefix(&self.commands.prefix)?;
        let (name, args) = body
            .split_once(char::is_whitespace)
            .map_or((body, ""), |(n, a)| (n, a.trim()));

        let command = match name.to_lowercase().as_str() {
            "add-bad" => match channel_and_rest(message, args) {
                Some((channel, phrase)) if !phrase.is_empty() => Command::AddBad { channel, phrase },
                _ => Command::Usage("Usage: add-bad [#channel] <phrase>"),
            },
            "remove-bad" => match channel_and_rest(message, args) {
                Some((channel, phrase)) if !phrase.is_empty() => {
                    Command::RemoveBad { channel, phrase }
                }
                _ => Command::Usage("Usage: remove-bad [#channel] <phrase>"),
            },
            "list-bad" => match channel_and_rest(message, args) {
                Some((channel, _)) => Command::ListBad { channel },
                None => Command::Usage("Usage: list-bad [#channel]"),
            },
            "convert" if !args.is_empty() => Command::Convert(args),
            "convert" => Command::Usage("Usage: convert <amount>"),
            "price" => Command::Price,
            "compare" => match args.split_whitespace().collect::<Vec<_>>().as_slice() {
                [a, b] => Command::Compare(*a, *b),
                _ => Command::Usage("Usage: compare <symbol> <symbol>"),
            },
            _ => return None,
        };
        Some(command)
    }

    async fn run(&self, message: &InboundMessage, command: Command<'_>) -> Result<()> {
        debug!(author = %message.author.name, ?command, "Command received");
        match command {
            Command::AddBad { channel, phrase } => {
                self.require_admin(message)?;
                let reply = match self.moderation.store().add(&channel, phrase).await? {
                    AddOutcome::Added => format!("Added \"{}\" to #{}.", phrase.to_lowercase(), channel),
                    AddOutcome::AlreadyPresent => {
                        format!("\"{}\" is already banned in #{}.", phrase.to_lowercase(), channel)
                    }
                };
                self.reply(message, &reply).await
            }
            Command::RemoveBad { channel, phrase } => {
                self.require_admin(message)?;
                match self.moderation.store().remove(&channel, phrase).await? {
                    RemoveOutcome::Removed => {
                        let reply = format!("Removed \"{}\" from #{}.", phrase.to_lowercase(), channel);
                        self.reply(message, &reply).await
                    }
                    RemoveOutcome::NotPresent => Err(BotError::NotFound(format!(
                        "\"{}\" is not banned in #{}.",
                        phrase.to_lowercase(),
                        channel
                    ))
                    .into()),
                }
            }
            Command::ListBad { channel } => {
                self.require_admin(message)?;
                let phrases = self.moderation.store().list(&channel).await;
                let reply = if phrases.is_empty() {
                    format!("No banned phrases in #{channel}.")
                } else {
                    format!("Banned phrases in #{}: {}", channel, phrases.join(", "))
                };
                self.reply(message, &reply).await
            }
            Command::Convert(args) => match parse_amount(args) {
                Some((amount, currency)) => self.reply_conversion(message, amount, currency).await,
                None => self.reply(message, "Usage: convert <amount>").await,
            },
            Command::Price => {
                let point = self.aggregator.fetch_price_point().await?;
                let reply = format_snapshot(self.aggregator.symbol(), &point);
                self.reply(message, &reply).await
            }
            Command::Compare(a, b) => self.compare(message, a, b).await,
            Command::Usage(text) => self.reply(message, text).await,
        }
    }

    async fn handle_direct(&self, message: &InboundMessage) -> Result<()> {
        let content = message.content.trim().to_lowercase();
        if self.commands.trigger_words.iter().any(|w| *w == content) {
            let reply = self.schedule_reply(Utc::now());
            return self.reply(message, &reply).await;
        }
        match parse_amount(&message.content) {
            Some((amount, currency)) => self.reply_conversion(message, amount, currency).await,
            None => self.reply(message, DM_HELP).await,
        }
    }

    async fn handle_public(&self, message: &InboundMessage) -> Result<()> {
        if self.moderation.scan(self.chat.as_ref(), message).await {
            return Ok(());
        }
        let content = message.content.to_lowercase();
        if message.mentions_bot
            && self
                .commands
                .trigger_words
                .iter()
                .any(|w| content.contains(w.as_str()))
        {
            let reply = self.schedule_reply(Utc::now());
            return self.reply(message, &reply).await;
        }
        Ok(())
    }

    /// The nearest session event, or a closed notice.
    pub fn schedule_reply(&self, now: DateTime<Utc>) -> String {
        match self.calendar.next_events(now).first() {
            Some(next) => format!(
                "Next up: **{}** in **{}**.",
                next.label,
                describe_wait(next.minutes_until)
            ),
            None => format!("The {} market is closed for the day.", self.calendar.venue()),
        }
    }

    async fn reply_conversion(
        &self,
        message: &InboundMessage,
        amount: f64,
        currency: Option<Currency>,
    ) -> Result<()> {
        let Some(rate) = self.aggregator.rate_cache().get().await else {
            return self.reply(message, RATE_PENDING).await;
        };
        let from = currency.unwrap_or(rate.from);
        let reply = match rate.apply(amount, from) {
            Some((converted, to)) => format!(
                "{} is approximately {} {}.",
                format_grouped(amount, from),
                format_grouped(converted, to),
                to
            ),
            None => format!("I can only convert between {} and {}.", rate.from, rate.to),
        };
        self.reply(message, &reply).await
    }

    async fn compare(&self, message: &InboundMessage, a: &str, b: &str) -> Result<()> {
        if let Some(allowed) = &self.commands.compare_channel
            && !message.channel.eq_ignore_ascii_case(allowed)
        {
            let reply = format!("This command can only be used in the #{allowed} channel.");
            return self.reply(message, &reply).await;
        }

        let (a, b) = (a.to_uppercase(), b.to_uppercase());
        let prices = futures::try_join!(
            self.aggregator.latest_price(&a),
            self.aggregator.latest_price(&b)
        );
        let reply = match prices {
            Ok((first, second)) if second.value > 0.0 => format!(
                "**{} / {} = {:.2}**\n{}: {}\n{}: {}",
                a,
                b,
                first.value / second.value,
                a,
                format_amount(first.value, first.currency),
                b,
                format_amount(second.value, second.currency)
            ),
            Ok(_) => format!("No usable price for {b}."),
            Err(e) => {
                warn!(error = format!("{e:#}"), "Compare {a} / {b} failed");
                "Failed to fetch or compare ticker prices. Please check the symbols and try again."
                    .to_string()
            }
        };
        self.reply(message, &reply).await
    }

    fn require_admin(&self, message: &InboundMessage) -> Result<()> {
        if message.author.has_any_role(&self.admin_roles) {
            Ok(())
        } else {
            Err(BotError::PermissionDenied {
                required: self.admin_roles.clone(),
            }
            .into())
        }
    }

    async fn reply(&self, message: &InboundMessage, text: &str) -> Result<()> {
        if message.is_direct_message {
            self.chat.send_direct_message(&message.author.id, text).await
        } else {
            self.chat.send_message(&message.channel, text).await
        }
    }
}
