//! Chat platform boundary: the inbound message model and the outbound
//! capabilities the bot relies on.

use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub roles: Vec<String>,
    pub is_bot: bool,
}

impl Author {
    pub fn has_any_role(&self, allowed: &[String]) -> bool {
        self.roles
            .iter()
            .any(|r| allowed.iter().any(|a| a.eq_ignore_ascii_case(r)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: String,
    pub author: Author,
    /// Channel name; for direct messages, the conversation id.
    pub channel: String,
    pub content: String,
    pub is_direct_message: bool,
    pub mentions_bot: bool,
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn set_presence(&self, text: &str) -> Result<()>;

    async fn send_message(&self, channel: &str, text: &str) -> Result<()>;

    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<()>;

    async fn delete_message(&self, message: &InboundMessage) -> Result<()>;
}
