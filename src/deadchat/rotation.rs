//! Marker role transfer and the debounced announcement.

use crate::error::Result;
use crate::messaging::PlatformDyn;
use crate::{ChatMessage, GuildId, PostedMessage, RoleId, UserId};

use futures::future::join_all;

/// Posted immediately in reply to the reviving message.
pub const PLACEHOLDER_TEXT: &str = "Hang on a second…";

/// Final announcement the placeholder is edited into.
pub fn announcement_text(role_id: RoleId) -> String {
    format!("You've stolen the <@&{role_id}> role.")
}

/// What a rotation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    Rotated {
        new_holder: UserId,
        /// Previous holders the role was removed from.
        removed: Vec<UserId>,
        /// Previous holders whose removal failed. The holder set stays
        /// inconsistent until a later rotation clears them.
        failed: Vec<UserId>,
    },
    /// The trigger author was already the sole holder.
    AlreadyHolder,
}

/// Moves the marker role onto a new holder and keeps at most one live
/// announcement in the channel.
#[derive(Debug)]
pub struct RotationExecutor {
    marker_role_id: RoleId,
    pending_announcement: Option<PostedMessage>,
}

impl RotationExecutor {
    pub fn new(marker_role_id: RoleId) -> Self {
        Self {
            marker_role_id,
            pending_announcement: None,
        }
    }

    pub fn pending_announcement(&self) -> Option<PostedMessage> {
        self.pending_announcement
    }

    pub async fn rotate(
        &mut self,
        platform: &dyn PlatformDyn,
        guild_id: GuildId,
        trigger: &ChatMessage,
    ) -> Result<RotationOutcome> {
        let new_holder = trigger.author.id;
        let role_id = self.marker_role_id;
        let previous = self.pending_announcement.take();

        let retract_previous = async {
            if let Some(previous) = previous {
                if let Err(error) = platform.delete_message(previous).await {
                    tracing::warn!(
                        %error,
                        message_id = previous.message_id,
                        "failed to delete previous announcement"
                    );
                }
            }
        };

        let (placeholder, ()) = tokio::join!(
            platform.reply(trigger.channel_id, trigger.id, PLACEHOLDER_TEXT),
            retract_previous
        );
        let placeholder = placeholder?;

        let holders = match platform.members_with_role(guild_id, role_id).await {
            Ok(holders) => holders,
            Err(error) => {
                // Proceed with the addition; stale holders get cleared by a later rotation.
                tracing::warn!(%error, role_id, "failed to list current marker holders");
                Vec::new()
            }
        };

        if holders == [new_holder] {
            tracing::debug!(user_id = new_holder, "trigger author already holds the marker");
            if let Err(error) = platform.delete_message(placeholder).await {
                tracing::warn!(%error, "failed to delete unused placeholder");
            }
            return Ok(RotationOutcome::AlreadyHolder);
        }

        let stale: Vec<UserId> = holders
            .into_iter()
            .filter(|holder| *holder != new_holder)
            .collect();

        let removals = join_all(stale.iter().map(|&user_id| async move {
            let result = platform.remove_role(guild_id, user_id, role_id).await;
            (user_id, result)
        }));

        let (added, removals) = tokio::join!(
            platform.add_role(guild_id, new_holder, role_id),
            removals
        );

        let mut removed = Vec::new();
        let mut failed = Vec::new();
        for (user_id, result) in removals {
            match result {
                Ok(()) => {
                    tracing::info!(user_id, role_id, "removed marker role from previous holder");
                    removed.push(user_id);
                }
                Err(error) => {
                    tracing::warn!(%error, user_id, role_id, "failed to remove marker role");
                    failed.push(user_id);
                }
            }
        }

        if let Err(error) = added {
            tracing::error!(
                %error,
                user_id = new_holder,
                role_id,
                "failed to assign marker role, announcement left as placeholder"
            );
            return Err(error);
        }

        if let Err(error) = platform
            .edit_message(placeholder, &announcement_text(role_id))
            .await
        {
            tracing::warn!(%error, "failed to edit placeholder into announcement");
        }
        self.pending_announcement = Some(placeholder);

        tracing::info!(
            user_id = new_holder,
            removed = removed.len(),
            failed = failed.len(),
            "marker role rotated"
        );

        Ok(RotationOutcome::Rotated {
            new_holder,
            removed,
            failed,
        })
    }
}
