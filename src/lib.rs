//! Dead-chat: rotates a single-holder "revived the chat" role on Discord and
//! purges a quarantine channel when a member is newly quarantined.

pub mod clock;
pub mod config;
pub mod deadchat;
pub mod error;
pub mod liveness;
pub mod messaging;
pub mod purge;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};

/// Discord snowflake aliases. The core never needs more than the raw id.
pub type GuildId = u64;
pub type ChannelId = u64;
pub type MessageId = u64;
pub type UserId = u64;
pub type RoleId = u64;

/// Author of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: UserId,
    /// True for bot accounts and other service identities (webhooks, system).
    pub bot: bool,
}

/// Guild membership snapshot carried by a message at creation time.
#[derive(Debug, Clone, Default)]
pub struct MemberContext {
    pub roles: Vec<RoleId>,
}

impl MemberContext {
    pub fn has_role(&self, role_id: RoleId) -> bool {
        self.roles.contains(&role_id)
    }
}

/// Message kinds the engine distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Regular,
    Reply,
    /// System "member joined" notice.
    MemberJoin,
    Other,
}

/// Inbound chat message, converted from the platform event.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// None for direct messages. Always set for guild channels.
    pub guild_id: Option<GuildId>,
    pub author: Author,
    /// None when the platform omitted the member payload.
    pub member: Option<MemberContext>,
    pub kind: MessageKind,
    pub content: String,
    pub attachment_count: usize,
    pub sticker_count: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// A message as returned by a history fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub id: MessageId,
    pub author_id: UserId,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Reference to a message the bot posted and may later edit or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// Role change on a guild member.
#[derive(Debug, Clone)]
pub struct MemberUpdate {
    pub guild_id: GuildId,
    pub user_id: UserId,
    /// Roles before the update, when the platform cache had them.
    pub old_roles: Option<Vec<RoleId>>,
    pub new_roles: Vec<RoleId>,
}

/// Guild membership event routed to the purge engine.
#[derive(Debug, Clone)]
pub enum MemberEvent {
    Updated(MemberUpdate),
    /// The member left or was removed from the guild.
    Left { guild_id: GuildId, user_id: UserId },
}
