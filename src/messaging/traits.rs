//! Platform trait and dynamic dispatch companion.

use crate::error::Result;
use crate::{ChannelId, GuildId, HistoryMessage, MessageId, PostedMessage, RoleId, UserId};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`PlatformDyn`].
pub type PlatformFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Static trait for the chat platform and its member/role directory.
/// Use this for type-safe implementations.
pub trait Platform: Send + Sync + 'static {
    /// Unique name for this platform.
    fn name(&self) -> &str;

    /// Id of the bot's own account.
    fn current_user_id(&self) -> UserId;

    /// Fetch the most recent `limit` messages, newest first.
    fn fetch_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
    ) -> impl Future<Output = Result<Vec<HistoryMessage>>> + Send;

    /// Delete messages in one batched call. Fails when any id is past the
    /// platform's bulk-delete age ceiling.
    fn bulk_delete(
        &self,
        channel_id: ChannelId,
        message_ids: &[MessageId],
    ) -> impl Future<Output = Result<()>> + Send;

    fn add_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> impl Future<Output = Result<()>> + Send;

    fn remove_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Every member currently holding `role_id`.
    fn members_with_role(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
    ) -> impl Future<Output = Result<Vec<UserId>>> + Send;

    /// Post `content` as a reply to an existing message.
    fn reply(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> impl Future<Output = Result<PostedMessage>> + Send;

    /// Post `content` as a standalone message.
    fn send_message(
        &self,
        channel_id: ChannelId,
        content: &str,
    ) -> impl Future<Output = Result<PostedMessage>> + Send;

    fn edit_message(
        &self,
        message: PostedMessage,
        content: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_message(&self, message: PostedMessage) -> impl Future<Output = Result<()>> + Send;
}

/// Dynamic trait for runtime polymorphism.
/// Use this when you need `Arc<dyn PlatformDyn>`.
pub trait PlatformDyn: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn current_user_id(&self) -> UserId;

    fn fetch_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
    ) -> PlatformFuture<'_, Vec<HistoryMessage>>;

    fn bulk_delete<'a>(
        &'a self,
        channel_id: ChannelId,
        message_ids: &'a [MessageId],
    ) -> PlatformFuture<'a, ()>;

    fn add_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId)
    -> PlatformFuture<'_, ()>;

    fn remove_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> PlatformFuture<'_, ()>;

    fn members_with_role(&self, guild_id: GuildId, role_id: RoleId)
    -> PlatformFuture<'_, Vec<UserId>>;

    fn reply<'a>(
        &'a self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &'a str,
    ) -> PlatformFuture<'a, PostedMessage>;

    fn send_message<'a>(
        &'a self,
        channel_id: ChannelId,
        content: &'a str,
    ) -> PlatformFuture<'a, PostedMessage>;

    fn edit_message<'a>(&'a self, message: PostedMessage, content: &'a str)
    -> PlatformFuture<'a, ()>;

    fn delete_message(&self, message: PostedMessage) -> PlatformFuture<'_, ()>;
}

/// Blanket implementation: any type implementing Platform automatically implements PlatformDyn.
impl<T: Platform> PlatformDyn for T {
    fn name(&self) -> &str {
        Platform::name(self)
    }

    fn current_user_id(&self) -> UserId {
        Platform::current_user_id(self)
    }

    fn fetch_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
    ) -> PlatformFuture<'_, Vec<HistoryMessage>> {
        Box::pin(Platform::fetch_messages(self, channel_id, limit))
    }

    fn bulk_delete<'a>(
        &'a self,
        channel_id: ChannelId,
        message_ids: &'a [MessageId],
    ) -> PlatformFuture<'a, ()> {
        Box::pin(Platform::bulk_delete(self, channel_id, message_ids))
    }

    fn add_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> PlatformFuture<'_, ()> {
        Box::pin(Platform::add_role(self, guild_id, user_id, role_id))
    }

    fn remove_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> PlatformFuture<'_, ()> {
        Box::pin(Platform::remove_role(self, guild_id, user_id, role_id))
    }

    fn members_with_role(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
    ) -> PlatformFuture<'_, Vec<UserId>> {
        Box::pin(Platform::members_with_role(self, guild_id, role_id))
    }

    fn reply<'a>(
        &'a self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &'a str,
    ) -> PlatformFuture<'a, PostedMessage> {
        Box::pin(Platform::reply(self, channel_id, message_id, content))
    }

    fn send_message<'a>(
        &'a self,
        channel_id: ChannelId,
        content: &'a str,
    ) -> PlatformFuture<'a, PostedMessage> {
        Box::pin(Platform::send_message(self, channel_id, content))
    }

    fn edit_message<'a>(
        &'a self,
        message: PostedMessage,
        content: &'a str,
    ) -> PlatformFuture<'a, ()> {
        Box::pin(Platform::edit_message(self, message, content))
    }

    fn delete_message(&self, message: PostedMessage) -> PlatformFuture<'_, ()> {
        Box::pin(Platform::delete_message(self, message))
    }
}
