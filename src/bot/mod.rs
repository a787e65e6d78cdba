//! Long-running bot surfaces: the status broadcast and message handling.

pub mod broadcast;
pub mod chat;
pub mod console;
pub mod moderation;
pub mod router;

pub use broadcast::{Broadcaster, TickOutcome};
pub use chat::{Author, ChatPlatform, InboundMessage};
pub use moderation::{Enforcement, ModerationEngine};
pub use router::CommandRouter;
