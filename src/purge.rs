//! Quarantine purge: clears the quarantine channel up to the bot's own last
//! message whenever a member newly receives the quarantine role.
//!
//! The bot's latest message in the channel is the anchor. Everything at or
//! before it (and still young enough for bulk deletion) goes; everything
//! after it survives. Without an anchor nothing is deleted.

use crate::clock::Clock;
use crate::config::PurgeConfig;
use crate::error::Result;
use crate::messaging::PlatformDyn;
use crate::{ChannelId, HistoryMessage, MemberEvent, MemberUpdate, MessageId, UserId};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};

use std::collections::HashSet;
use std::sync::Arc;

/// Messages fetched per purge.
pub const PURGE_PAGE_SIZE: u8 = 100;

/// Oldest message age the platform accepts in a bulk delete.
pub fn bulk_delete_ceiling() -> chrono::Duration {
    chrono::Duration::days(14)
}

/// Most recent message authored by `self_id`.
///
/// Ordering uses the timestamp, tie-broken by the (monotonic) message id, so
/// the result does not depend on the order the batch was returned in.
pub fn find_anchor(batch: &[HistoryMessage], self_id: UserId) -> Option<&HistoryMessage> {
    batch
        .iter()
        .filter(|message| message.author_id == self_id)
        .max_by_key(|message| (message.timestamp, message.id))
}

/// Ids to delete: every message at or before the anchor that is still inside
/// the bulk-delete ceiling. Empty when the batch holds no anchor.
pub fn select_for_purge(
    batch: &[HistoryMessage],
    self_id: UserId,
    now: DateTime<Utc>,
) -> Vec<MessageId> {
    let Some(anchor) = find_anchor(batch, self_id) else {
        return Vec::new();
    };
    let boundary = (anchor.timestamp, anchor.id);
    let ceiling = bulk_delete_ceiling();

    batch
        .iter()
        .filter(|message| (message.timestamp, message.id) <= boundary)
        .filter(|message| now - message.timestamp < ceiling)
        .map(|message| message.id)
        .collect()
}

/// Result of one member update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    /// Not a fresh quarantine assignment.
    Skipped,
    /// No anchor in the fetched history, or nothing young enough to delete.
    NothingDeleted,
    Purged { deleted: usize },
}

pub struct PurgeEngine {
    config: PurgeConfig,
    platform: Arc<dyn PlatformDyn>,
    clock: Arc<dyn Clock>,
    /// Members last seen holding the quarantine role. Consulted only when the
    /// platform cannot supply the member's previous roles.
    quarantined: HashSet<UserId>,
}

impl std::fmt::Debug for PurgeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurgeEngine")
            .field("config", &self.config)
            .field("quarantined", &self.quarantined.len())
            .finish_non_exhaustive()
    }
}

impl PurgeEngine {
    pub fn new(config: PurgeConfig, platform: Arc<dyn PlatformDyn>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            platform,
            clock,
            quarantined: HashSet::new(),
        }
    }

    /// Edge trigger: true only when the member went from not holding the
    /// quarantine role to holding it.
    pub fn is_new_quarantine(&mut self, update: &MemberUpdate) -> bool {
        let role_id = self.config.quarantine_role_id;
        let holds_now = update.new_roles.contains(&role_id);
        let held_before = match &update.old_roles {
            Some(roles) => roles.contains(&role_id),
            None => self.quarantined.contains(&update.user_id),
        };

        if holds_now {
            self.quarantined.insert(update.user_id);
        } else {
            self.quarantined.remove(&update.user_id);
        }

        holds_now && !held_before
    }

    /// Forget a member who left the guild.
    pub fn member_left(&mut self, user_id: UserId) {
        if self.quarantined.remove(&user_id) {
            tracing::debug!(user_id, "quarantined member left");
        }
    }

    /// Delete everything up to the anchor in `channel_id`. Returns the number
    /// of deleted messages.
    pub async fn purge_up_to(&self, channel_id: ChannelId) -> Result<usize> {
        let batch = self
            .platform
            .fetch_messages(channel_id, PURGE_PAGE_SIZE)
            .await?;
        tracing::debug!(channel_id, fetched = batch.len(), "fetched purge candidates");

        let self_id = self.platform.current_user_id();
        let ids = select_for_purge(&batch, self_id, self.clock.now());
        if ids.is_empty() {
            return Ok(0);
        }

        self.platform.bulk_delete(channel_id, &ids).await?;
        Ok(ids.len())
    }

    pub async fn handle_update(&mut self, update: &MemberUpdate) -> Result<PurgeOutcome> {
        if !self.is_new_quarantine(update) {
            return Ok(PurgeOutcome::Skipped);
        }

        tracing::info!(
            user_id = update.user_id,
            channel_id = self.config.channel_id,
            "member quarantined, purging channel"
        );

        let deleted = self.purge_up_to(self.config.channel_id).await?;
        if deleted == 0 {
            tracing::info!(channel_id = self.config.channel_id, "nothing to purge");
            return Ok(PurgeOutcome::NothingDeleted);
        }

        tracing::info!(channel_id = self.config.channel_id, deleted, "channel purged");
        Ok(PurgeOutcome::Purged { deleted })
    }

    /// Process member events until the queue closes or shutdown is signalled.
    pub async fn run(
        mut self,
        mut event_rx: mpsc::Receiver<MemberEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        tracing::info!(channel_id = self.config.channel_id, "purge engine started");

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    let Some(event) = event else {
                        tracing::info!("purge event queue closed");
                        break;
                    };
                    match event {
                        MemberEvent::Updated(update) => {
                            if let Err(error) = self.handle_update(&update).await {
                                tracing::error!(%error, user_id = update.user_id, "purge failed");
                            }
                        }
                        MemberEvent::Left { user_id, .. } => self.member_left(user_id),
                    }
                }
                _ = async { let _ = shutdown_rx.wait_for(|shutdown| *shutdown).await; } => {
                    tracing::info!("purge engine shutting down");
                    break;
                }
            }
        }
    }
}
