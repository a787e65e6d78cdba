//! Terminal stand-in for a chat platform.
//!
//! Each stdin line is one inbound message from the local operator:
//! `#general some text` posts in `general` (add `@bot` to mention the bot),
//! anything else is a direct message. Outbound calls are printed to stdout.

use crate::bot::chat::{Author, ChatPlatform, InboundMessage};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

const MENTION: &str = "@bot";

pub struct ConsoleChat {
    operator: Author,
    next_id: AtomicU64,
}

impl ConsoleChat {
    /// The operator holds every role in `roles`, so admin commands work locally.
    pub fn new(roles: Vec<String>) -> Self {
        Self {
            operator: Author {
                id: "console".to_string(),
                name: "operator".to_string(),
                roles,
                is_bot: false,
            },
            next_id: AtomicU64::new(1),
        }
    }

    pub fn parse_line(&self, line: &str) -> Option<InboundMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();

        let message = match line.strip_prefix('#') {
            Some(rest) => {
                let (channel, content) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                InboundMessage {
                    id,
                    author: self.operator.clone(),
                    channel: channel.to_lowercase(),
                    content: content.trim().to_string(),
                    is_direct_message: false,
                    mentions_bot: content.to_lowercase().contains(MENTION),
                }
            }
            None => InboundMessage {
                id,
                author: self.operator.clone(),
                channel: format!("dm-{}", self.operator.id),
                content: line.to_string(),
                is_direct_message: true,
                mentions_bot: false,
            },
        };
        Some(message)
    }
}

#[async_trait]
impl ChatPlatform for ConsoleChat {
    async fn set_presence(&self, text: &str) -> Result<()> {
        println!("[presence] {text}");
        Ok(())
    }

    async fn send_message(&self, channel: &str, text: &str) -> Result<()> {
        println!("[#{channel}] {text}");
        Ok(())
    }

    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<()> {
        println!("[dm:{user_id}] {text}");
        Ok(())
    }

    async fn delete_message(&self, message: &InboundMessage) -> Result<()> {
        info!(id = %message.id, channel = %message.channel, "Deleted message");
        println!("[deleted #{}] {}", message.channel, message.content);
        Ok(())
    }
}
