//! In-memory platform and fixtures for unit tests.

use crate::clock::Clock;
use crate::error::Result;
use crate::messaging::Platform;
use crate::{
    Author, ChannelId, ChatMessage, GuildId, HistoryMessage, MemberContext, MessageId, MessageKind,
    PostedMessage, RoleId, UserId,
};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use std::collections::{BTreeMap, HashMap, HashSet};

pub const TEST_GUILD: GuildId = 1;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Clock pinned to a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(base_time())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A plain guild text message from a member with no roles.
pub fn chat_message(id: MessageId, channel_id: ChannelId, author_id: UserId, content: &str) -> ChatMessage {
    ChatMessage {
        id,
        channel_id,
        guild_id: Some(TEST_GUILD),
        author: Author {
            id: author_id,
            bot: false,
        },
        member: Some(MemberContext::default()),
        kind: MessageKind::Regular,
        content: content.to_string(),
        attachment_count: 0,
        sticker_count: 0,
        timestamp: base_time(),
    }
}

pub fn history_message(id: MessageId, author_id: UserId, timestamp: DateTime<Utc>) -> HistoryMessage {
    HistoryMessage {
        id,
        author_id,
        timestamp,
    }
}

#[derive(Debug)]
struct Posted {
    content: String,
    reply_to: Option<MessageId>,
    deleted: bool,
}

#[derive(Debug, Default)]
struct MockState {
    roles: BTreeMap<UserId, HashSet<RoleId>>,
    history: HashMap<ChannelId, Vec<HistoryMessage>>,
    posted: BTreeMap<MessageId, Posted>,
    next_message_id: MessageId,
    failing_removals: HashSet<UserId>,
    fail_additions: bool,
    fail_deletes: bool,
    removal_count: usize,
    bulk_delete_calls: usize,
}

/// Records every call and applies it to in-memory state.
#[derive(Debug)]
pub struct MockPlatform {
    self_id: UserId,
    state: Mutex<MockState>,
}

impl MockPlatform {
    pub fn new(self_id: UserId) -> Self {
        Self {
            self_id,
            state: Mutex::new(MockState {
                next_message_id: 1_000_000,
                ..MockState::default()
            }),
        }
    }

    pub fn grant(&self, _guild_id: GuildId, user_id: UserId, role_id: RoleId) {
        self.state
            .lock()
            .roles
            .entry(user_id)
            .or_default()
            .insert(role_id);
    }

    /// Sorted ids of members holding `role_id`.
    pub fn holders(&self, role_id: RoleId) -> Vec<UserId> {
        self.state
            .lock()
            .roles
            .iter()
            .filter(|(_, roles)| roles.contains(&role_id))
            .map(|(user_id, _)| *user_id)
            .collect()
    }

    pub fn fail_removal_for(&self, user_id: UserId) {
        self.state.lock().failing_removals.insert(user_id);
    }

    pub fn fail_additions(&self) {
        self.state.lock().fail_additions = true;
    }

    pub fn fail_deletes(&self) {
        self.state.lock().fail_deletes = true;
    }

    pub fn set_history(&self, channel_id: ChannelId, messages: Vec<HistoryMessage>) {
        self.state.lock().history.insert(channel_id, messages);
    }

    pub fn remaining_history(&self, channel_id: ChannelId) -> Vec<MessageId> {
        self.state
            .lock()
            .history
            .get(&channel_id)
            .map(|messages| messages.iter().map(|message| message.id).collect())
            .unwrap_or_default()
    }

    pub fn content_of(&self, message_id: MessageId) -> Option<String> {
        self.state
            .lock()
            .posted
            .get(&message_id)
            .map(|posted| posted.content.clone())
    }

    pub fn reply_target(&self, message_id: MessageId) -> Option<MessageId> {
        self.state
            .lock()
            .posted
            .get(&message_id)
            .and_then(|posted| posted.reply_to)
    }

    pub fn was_deleted(&self, message_id: MessageId) -> bool {
        self.state
            .lock()
            .posted
            .get(&message_id)
            .is_some_and(|posted| posted.deleted)
    }

    pub fn last_posted(&self) -> Option<MessageId> {
        self.state.lock().posted.keys().next_back().copied()
    }

    pub fn posted_count(&self) -> usize {
        self.state.lock().posted.len()
    }

    pub fn removal_count(&self) -> usize {
        self.state.lock().removal_count
    }

    pub fn bulk_delete_calls(&self) -> usize {
        self.state.lock().bulk_delete_calls
    }

    fn post(&self, channel_id: ChannelId, content: &str, reply_to: Option<MessageId>) -> PostedMessage {
        let mut state = self.state.lock();
        state.next_message_id += 1;
        let message_id = state.next_message_id;
        state.posted.insert(
            message_id,
            Posted {
                content: content.to_string(),
                reply_to,
                deleted: false,
            },
        );
        PostedMessage {
            channel_id,
            message_id,
        }
    }
}

impl Platform for MockPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    fn current_user_id(&self) -> UserId {
        self.self_id
    }

    async fn fetch_messages(&self, channel_id: ChannelId, limit: u8) -> Result<Vec<HistoryMessage>> {
        Ok(self
            .state
            .lock()
            .history
            .get(&channel_id)
            .map(|messages| messages.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn bulk_delete(&self, channel_id: ChannelId, message_ids: &[MessageId]) -> Result<()> {
        let mut state = self.state.lock();
        state.bulk_delete_calls += 1;
        if let Some(messages) = state.history.get_mut(&channel_id) {
            messages.retain(|message| !message_ids.contains(&message.id));
        }
        Ok(())
    }

    async fn add_role(&self, _guild_id: GuildId, user_id: UserId, role_id: RoleId) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_additions {
            return Err(anyhow::anyhow!("missing permissions to add role").into());
        }
        state.roles.entry(user_id).or_default().insert(role_id);
        Ok(())
    }

    async fn remove_role(&self, _guild_id: GuildId, user_id: UserId, role_id: RoleId) -> Result<()> {
        let mut state = self.state.lock();
        if state.failing_removals.contains(&user_id) {
            return Err(anyhow::anyhow!("member {user_id} is above the bot's role").into());
        }
        state.removal_count += 1;
        if let Some(roles) = state.roles.get_mut(&user_id) {
            roles.remove(&role_id);
        }
        Ok(())
    }

    async fn members_with_role(&self, _guild_id: GuildId, role_id: RoleId) -> Result<Vec<UserId>> {
        Ok(self.holders(role_id))
    }

    async fn reply(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> Result<PostedMessage> {
        Ok(self.post(channel_id, content, Some(message_id)))
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<PostedMessage> {
        Ok(self.post(channel_id, content, None))
    }

    async fn edit_message(&self, message: PostedMessage, content: &str) -> Result<()> {
        let mut state = self.state.lock();
        let posted = state
            .posted
            .get_mut(&message.message_id)
            .ok_or_else(|| anyhow::anyhow!("unknown message {}", message.message_id))?;
        posted.content = content.to_string();
        Ok(())
    }

    async fn delete_message(&self, message: PostedMessage) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_deletes {
            return Err(anyhow::anyhow!("message delete rejected").into());
        }
        if let Some(posted) = state.posted.get_mut(&message.message_id) {
            posted.deleted = true;
        }
        Ok(())
    }
}
