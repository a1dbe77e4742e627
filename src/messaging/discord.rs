//! Discord adapter using serenity.
//!
//! [`DiscordPlatform`] wraps the REST client for outbound calls. [`Handler`]
//! receives gateway events, converts them into crate types and forwards them
//! to the engines over `mpsc`.

use crate::messaging::traits::Platform;
use crate::{
    Author, ChatMessage, HistoryMessage, MemberContext, MemberEvent, MemberUpdate, MessageKind,
    PostedMessage,
};

use anyhow::Context as _;
use async_trait::async_trait;
use serenity::all::{
    ChannelId, Context, CreateMessage, EditMessage, EventHandler, GatewayIntents, GetMessages,
    GuildId, GuildMemberUpdateEvent, Http, Member, Message, MessageId, MessageType, Ready, RoleId,
    Timestamp, User, UserId,
};
use tokio::sync::mpsc;

use std::sync::Arc;

/// Maximum page size of the guild member list endpoint.
const MEMBER_PAGE_SIZE: u64 = 1000;

/// Maximum ids accepted by one bulk-delete call.
const BULK_DELETE_MAX: usize = 100;

/// Audit log reason attached to role mutations.
const AUDIT_REASON: &str = "dead chat revived";

/// Gateway intents the bot needs: message content for classification and
/// guild members for role-change events and holder enumeration.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

/// Discord REST adapter state.
pub struct DiscordPlatform {
    http: Arc<Http>,
    self_id: crate::UserId,
}

impl DiscordPlatform {
    /// Resolve the bot's own identity and wrap the client.
    pub async fn connect(http: Arc<Http>) -> crate::Result<Self> {
        let current_user = http
            .get_current_user()
            .await
            .context("failed to resolve bot identity")?;

        tracing::info!(
            user_id = %current_user.id,
            username = %current_user.name,
            "discord identity resolved"
        );

        Ok(Self {
            http,
            self_id: current_user.id.get(),
        })
    }
}

impl Platform for DiscordPlatform {
    fn name(&self) -> &str {
        "discord"
    }

    fn current_user_id(&self) -> crate::UserId {
        self.self_id
    }

    async fn fetch_messages(
        &self,
        channel_id: crate::ChannelId,
        limit: u8,
    ) -> crate::Result<Vec<HistoryMessage>> {
        let messages = ChannelId::new(channel_id)
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await
            .context("failed to fetch discord channel history")?;

        Ok(messages
            .iter()
            .map(|message| HistoryMessage {
                id: message.id.get(),
                author_id: message.author.id.get(),
                timestamp: to_utc(message.timestamp),
            })
            .collect())
    }

    async fn bulk_delete(
        &self,
        channel_id: crate::ChannelId,
        message_ids: &[crate::MessageId],
    ) -> crate::Result<()> {
        let channel = ChannelId::new(channel_id);
        for chunk in message_ids.chunks(BULK_DELETE_MAX) {
            let ids: Vec<MessageId> = chunk.iter().map(|id| MessageId::new(*id)).collect();
            // A single id is routed to the plain delete endpoint by serenity.
            channel
                .delete_messages(&*self.http, ids)
                .await
                .context("failed to bulk delete discord messages")?;
        }
        Ok(())
    }

    async fn add_role(
        &self,
        guild_id: crate::GuildId,
        user_id: crate::UserId,
        role_id: crate::RoleId,
    ) -> crate::Result<()> {
        self.http
            .add_member_role(
                GuildId::new(guild_id),
                UserId::new(user_id),
                RoleId::new(role_id),
                Some(AUDIT_REASON),
            )
            .await
            .context("failed to add discord role")?;
        Ok(())
    }

    async fn remove_role(
        &self,
        guild_id: crate::GuildId,
        user_id: crate::UserId,
        role_id: crate::RoleId,
    ) -> crate::Result<()> {
        self.http
            .remove_member_role(
                GuildId::new(guild_id),
                UserId::new(user_id),
                RoleId::new(role_id),
                Some(AUDIT_REASON),
            )
            .await
            .context("failed to remove discord role")?;
        Ok(())
    }

    async fn members_with_role(
        &self,
        guild_id: crate::GuildId,
        role_id: crate::RoleId,
    ) -> crate::Result<Vec<crate::UserId>> {
        let guild = GuildId::new(guild_id);
        let role = RoleId::new(role_id);
        let mut holders = Vec::new();
        let mut after: Option<UserId> = None;

        loop {
            let page = guild
                .members(&*self.http, Some(MEMBER_PAGE_SIZE), after)
                .await
                .context("failed to list discord guild members")?;

            holders.extend(
                page.iter()
                    .filter(|member| member.roles.contains(&role))
                    .map(|member| member.user.id.get()),
            );

            after = page.last().map(|member| member.user.id);
            if (page.len() as u64) < MEMBER_PAGE_SIZE || after.is_none() {
                break;
            }
        }

        Ok(holders)
    }

    async fn reply(
        &self,
        channel_id: crate::ChannelId,
        message_id: crate::MessageId,
        content: &str,
    ) -> crate::Result<PostedMessage> {
        let channel = ChannelId::new(channel_id);
        let builder = CreateMessage::new()
            .content(content)
            .reference_message((channel, MessageId::new(message_id)));
        let posted = channel
            .send_message(&*self.http, builder)
            .await
            .context("failed to send discord reply")?;

        Ok(PostedMessage {
            channel_id,
            message_id: posted.id.get(),
        })
    }

    async fn send_message(
        &self,
        channel_id: crate::ChannelId,
        content: &str,
    ) -> crate::Result<PostedMessage> {
        let posted = ChannelId::new(channel_id)
            .say(&*self.http, content)
            .await
            .context("failed to send discord message")?;

        Ok(PostedMessage {
            channel_id,
            message_id: posted.id.get(),
        })
    }

    async fn edit_message(&self, message: PostedMessage, content: &str) -> crate::Result<()> {
        ChannelId::new(message.channel_id)
            .edit_message(
                &*self.http,
                MessageId::new(message.message_id),
                EditMessage::new().content(content),
            )
            .await
            .context("failed to edit discord message")?;
        Ok(())
    }

    async fn delete_message(&self, message: PostedMessage) -> crate::Result<()> {
        ChannelId::new(message.channel_id)
            .delete_message(&*self.http, MessageId::new(message.message_id))
            .await
            .context("failed to delete discord message")?;
        Ok(())
    }
}

/// Gateway event handler. Each enabled behavior gets its own queue; a
/// disabled behavior leaves its sender unset and the event is dropped.
pub struct Handler {
    messages: Option<mpsc::Sender<ChatMessage>>,
    member_events: Option<mpsc::Sender<MemberEvent>>,
}

impl Handler {
    pub fn new(
        messages: Option<mpsc::Sender<ChatMessage>>,
        member_events: Option<mpsc::Sender<MemberEvent>>,
    ) -> Self {
        Self {
            messages,
            member_events,
        }
    }

    async fn forward_member_event(&self, event: MemberEvent) {
        let Some(member_events) = &self.member_events else {
            return;
        };
        if let Err(error) = member_events.send(event).await {
            tracing::warn!(
                %error,
                "failed to forward member event (purge engine stopped)"
            );
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!(
            username = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord connected"
        );
    }

    async fn message(&self, _ctx: Context, message: Message) {
        let Some(messages) = &self.messages else {
            return;
        };

        if let Err(error) = messages.send(to_chat_message(&message)).await {
            tracing::warn!(
                %error,
                "failed to forward discord message (dead-chat engine stopped)"
            );
        }
    }

    async fn guild_member_update(
        &self,
        _ctx: Context,
        old_if_available: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        if self.member_events.is_none() {
            return;
        }

        let update = MemberUpdate {
            guild_id: event.guild_id.get(),
            user_id: event.user.id.get(),
            old_roles: old_if_available
                .map(|member| member.roles.iter().map(|role| role.get()).collect()),
            new_roles: event.roles.iter().map(|role| role.get()).collect(),
        };

        tracing::debug!(
            user_id = update.user_id,
            roles = ?update.new_roles,
            "guild member update received"
        );

        self.forward_member_event(MemberEvent::Updated(update)).await;
    }

    async fn guild_member_removal(
        &self,
        _ctx: Context,
        guild_id: GuildId,
        user: User,
        _member_data_if_available: Option<Member>,
    ) {
        tracing::debug!(user_id = %user.id, "guild member left");
        self.forward_member_event(MemberEvent::Left {
            guild_id: guild_id.get(),
            user_id: user.id.get(),
        })
        .await;
    }
}

fn to_chat_message(message: &Message) -> ChatMessage {
    let kind = match message.kind {
        MessageType::Regular => MessageKind::Regular,
        MessageType::InlineReply => MessageKind::Reply,
        MessageType::MemberJoin => MessageKind::MemberJoin,
        _ => MessageKind::Other,
    };

    ChatMessage {
        id: message.id.get(),
        channel_id: message.channel_id.get(),
        guild_id: message.guild_id.map(|guild| guild.get()),
        author: Author {
            id: message.author.id.get(),
            bot: message.author.bot,
        },
        member: message.member.as_ref().map(|member| MemberContext {
            roles: member.roles.iter().map(|role| role.get()).collect(),
        }),
        kind,
        content: message.content.clone(),
        attachment_count: message.attachments.len(),
        sticker_count: message.sticker_items.len(),
        timestamp: to_utc(message.timestamp),
    }
}

fn to_utc(timestamp: Timestamp) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(timestamp.unix_timestamp(), 0).unwrap_or_default()
}
