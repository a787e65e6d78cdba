//! Scans channel messages for banned phrases and enforces on a match.

use crate::bot::chat::{ChatPlatform, InboundMessage};
use crate::store::ModerationStore;
use tracing::{info, warn};

/// A matched message and the phrase that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enforcement {
    pub message: InboundMessage,
    pub phrase: String,
}

#[derive(Clone)]
pub struct ModerationEngine {
    store: ModerationStore,
    audit_channel: String,
    enabled: bool,
}

impl ModerationEngine {
    pub fn new(store: ModerationStore, audit_channel: &str, enabled: bool) -> Self {
        Self {
            store,
            audit_channel: audit_channel.to_string(),
            enabled,
        }
    }

    pub fn store(&self) -> &ModerationStore {
        &self.store
    }

    /// First phrase for the message's channel contained in its lowercased text.
    pub async fn inspect(&self, message: &InboundMessage) -> Option<Enforcement> {
        if !self.enabled || message.is_direct_message || message.author.is_bot {
            return None;
        }
        let content = message.content.to_lowercase();
        self.store
            .list(&message.channel)
            .await
            .into_iter()
            .find(|phrase| content.contains(phrase.as_str()))
            .map(|phrase| Enforcement {
                message: message.clone(),
                phrase,
            })
    }

    /// Deletes the message, tells the author and posts to the audit channel.
    /// The three calls run concurrently and each failure is only logged.
    pub async fn enforce(&self, chat: &dyn ChatPlatform, enforcement: &Enforcement) {
        let Enforcement { message, phrase } = enforcement;
        info!(
            author = %message.author.name,
            channel = %message.channel,
            %phrase,
            "Removing message with banned phrase"
        );

        let notice = format!(
            "Your message in #{} was removed because it contains a banned phrase: \"{}\"",
            message.channel, phrase
        );
        let audit = format!(
            "Deleted message from {} ({}) in #{}. Phrase: \"{}\". Original: {}",
            message.author.name, message.author.id, message.channel, phrase, message.content
        );

        let (deleted, notified, audited) = futures::join!(
            chat.delete_message(message),
            chat.send_direct_message(&message.author.id, &notice),
            chat.send_message(&self.audit_channel, &audit),
        );
        if let Err(e) = deleted {
            warn!(error = %e, "Failed to delete message");
        }
        if let Err(e) = notified {
            warn!(error = %e, author = %message.author.name, "Failed to notify author");
        }
        if let Err(e) = audited {
            warn!(error = %e, channel = %self.audit_channel, "Failed to post audit line");
        }
    }

    /// Inspects and, on a match, enforces. Returns whether the message was caught.
    pub async fn scan(&self, chat: &dyn ChatPlatform, message: &InboundMessage) -> bool {
        match self.inspect(message).await {
            Some(enforcement) => {
                self.enforce(chat, &enforcement).await;
                true
            }
            None => false,
        }
    }
}
