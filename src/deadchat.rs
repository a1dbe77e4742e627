//! Dead-chat engine: hands the marker role to whoever revives a quiet channel.
//!
//! One engine owns one monitored channel. It runs as a single task fed by an
//! `mpsc` queue, so every qualifying message is evaluated against the window
//! strictly one at a time and two back-to-back messages can never both revive
//! the chat.

pub mod classifier;
pub mod revival;
pub mod rotation;

pub use classifier::{Classifier, Verdict};
pub use revival::{RevivalWindow, Transition};
pub use rotation::{RotationExecutor, RotationOutcome};

use crate::clock::{Clock, Timer};
use crate::config::DeadChatConfig;
use crate::error::{ConfigError, EngineError, Result};
use crate::messaging::PlatformDyn;
use crate::{ChatMessage, RoleId};

use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant};

use std::sync::Arc;

/// Upper bound on a single idle sleep when no hint is armed.
const IDLE_SLEEP: Duration = Duration::from_secs(3600);

/// Posted when the channel has been quiet for the hint duration.
pub fn hint_text(role_id: RoleId) -> String {
    format!("Chat's been dead for a while. Say something to steal the <@&{role_id}> role.")
}

/// What the engine did with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Rejected by the classifier.
    Ignored(Verdict),
    /// The author already holds the marker.
    CurrentHolder,
    /// The chat was alive; the deadline slid forward.
    Alive,
    Rotated(RotationOutcome),
}

pub struct DeadChatEngine {
    config: DeadChatConfig,
    classifier: Classifier,
    window: RevivalWindow,
    rotation: RotationExecutor,
    hint: Timer,
    platform: Arc<dyn PlatformDyn>,
}

impl std::fmt::Debug for DeadChatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadChatEngine")
            .field("channel_id", &self.config.channel_id)
            .field("deadline", &self.window.deadline())
            .finish_non_exhaustive()
    }
}

impl DeadChatEngine {
    pub fn new(
        config: DeadChatConfig,
        platform: Arc<dyn PlatformDyn>,
        clock: &dyn Clock,
    ) -> Result<Self> {
        let window_length = chrono::Duration::from_std(config.window).map_err(|error| {
            ConfigError::Invalid(format!("dead-chat window out of range: {error}"))
        })?;

        let window = RevivalWindow::new(clock.now(), window_length);
        tracing::info!(
            channel_id = config.channel_id,
            first_deadline = %window.deadline(),
            "dead-chat engine ready"
        );

        Ok(Self {
            classifier: Classifier::from_config(&config),
            rotation: RotationExecutor::new(config.marker_role_id),
            window,
            hint: Timer::new(),
            platform,
            config,
        })
    }

    pub fn window(&self) -> &RevivalWindow {
        &self.window
    }

    pub fn hint_timer(&self) -> &Timer {
        &self.hint
    }

    pub fn rotation(&self) -> &RotationExecutor {
        &self.rotation
    }

    /// Evaluate one inbound message.
    pub async fn handle_message(&mut self, message: &ChatMessage) -> Result<Outcome> {
        let verdict = self.classifier.classify(message);
        if !verdict.is_activity() {
            tracing::trace!(message_id = message.id, %verdict, "message ignored");
            return Ok(Outcome::Ignored(verdict));
        }

        let guild_id = message.guild_id.ok_or(EngineError::MissingContext {
            message_id: message.id,
            missing: "guild",
        })?;
        let member = message.member.as_ref().ok_or(EngineError::MissingContext {
            message_id: message.id,
            missing: "member",
        })?;

        if let Some(hint) = self.config.hint {
            self.hint.arm(Instant::now(), hint);
        }

        let holds_marker = member.has_role(self.config.marker_role_id);
        match self.window.observe(holds_marker, message.timestamp) {
            Transition::CurrentHolder => {
                tracing::debug!(user_id = message.author.id, "current holder spoke");
                Ok(Outcome::CurrentHolder)
            }
            Transition::Alive { next_deadline } => {
                tracing::debug!(%next_deadline, "chat is alive, deadline moved");
                Ok(Outcome::Alive)
            }
            Transition::Revived { next_deadline } => {
                tracing::info!(
                    user_id = message.author.id,
                    message_id = message.id,
                    %next_deadline,
                    "chat revived"
                );
                let outcome = self
                    .rotation
                    .rotate(self.platform.as_ref(), guild_id, message)
                    .await?;
                Ok(Outcome::Rotated(outcome))
            }
        }
    }

    /// Announce that the marker is up for grabs. Advisory only.
    pub async fn announce_hint(&self) -> Result<()> {
        let text = hint_text(self.config.marker_role_id);
        self.platform
            .send_message(self.config.channel_id, &text)
            .await?;
        tracing::info!(channel_id = self.config.channel_id, "inactivity hint posted");
        Ok(())
    }

    /// Process messages until the queue closes or shutdown is signalled.
    pub async fn run(
        mut self,
        mut message_rx: mpsc::Receiver<ChatMessage>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        tracing::info!(channel_id = self.config.channel_id, "dead-chat engine started");

        loop {
            let generation = self.hint.generation();
            let sleep_duration = self.hint.sleep_duration(Instant::now());

            tokio::select! {
                message = message_rx.recv() => {
                    let Some(message) = message else {
                        tracing::info!("dead-chat message queue closed");
                        break;
                    };
                    match self.handle_message(&message).await {
                        Ok(outcome) => {
                            tracing::trace!(message_id = message.id, ?outcome, "message handled");
                        }
                        Err(error) => {
                            tracing::error!(%error, message_id = message.id, "error handling message");
                        }
                    }
                }
                _ = tokio::time::sleep(sleep_duration.unwrap_or(IDLE_SLEEP)), if self.hint.is_armed() => {
                    if self.hint.take_due(Instant::now(), generation) {
                        if let Err(error) = self.announce_hint().await {
                            tracing::warn!(%error, "failed to post inactivity hint");
                        }
                    }
                }
                _ = async { let _ = shutdown_rx.wait_for(|shutdown| *shutdown).await; } => {
                    tracing::info!("dead-chat engine shutting down");
                    break;
                }
            }
        }
    }
}
