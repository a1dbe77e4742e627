//! Decides whether a message counts as channel activity.

use crate::config::DeadChatConfig;
use crate::{ChannelId, ChatMessage, MessageKind, UserId};

use regex::Regex;

use std::sync::LazyLock;

/// Text made only of custom emotes, pictographic emoji (with their modifiers,
/// presentation selectors, joiners and flag halves) and whitespace.
static EMOJI_ONLY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:<a?:\w+:\d+>|\p{Extended_Pictographic}|\p{Emoji_Modifier}|\p{Regional_Indicator}|\x{FE0F}|\x{200D}|\x{20E3}|\s)+$",
    )
    .expect("hardcoded emoji-only regex")
});

/// Why a message was or was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Activity,
    FromBot,
    OtherChannel,
    JoinNotice,
    EmojiOnly,
    MediaOnly,
    IgnoredAuthor,
}

impl Verdict {
    pub fn is_activity(self) -> bool {
        self == Verdict::Activity
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Activity => write!(f, "activity"),
            Verdict::FromBot => write!(f, "from_bot"),
            Verdict::OtherChannel => write!(f, "other_channel"),
            Verdict::JoinNotice => write!(f, "join_notice"),
            Verdict::EmojiOnly => write!(f, "emoji_only"),
            Verdict::MediaOnly => write!(f, "media_only"),
            Verdict::IgnoredAuthor => write!(f, "ignored_author"),
        }
    }
}

/// Pure activity filter for the monitored channel.
#[derive(Debug, Clone)]
pub struct Classifier {
    channel_id: ChannelId,
    ignored_authors: Vec<UserId>,
}

impl Classifier {
    pub fn new(channel_id: ChannelId, ignored_authors: Vec<UserId>) -> Self {
        Self {
            channel_id,
            ignored_authors,
        }
    }

    pub fn from_config(config: &DeadChatConfig) -> Self {
        Self::new(config.channel_id, config.ignored_authors.clone())
    }

    pub fn classify(&self, message: &ChatMessage) -> Verdict {
        if message.author.bot {
            return Verdict::FromBot;
        }
        if message.channel_id != self.channel_id {
            return Verdict::OtherChannel;
        }
        if message.kind == MessageKind::MemberJoin {
            return Verdict::JoinNotice;
        }

        let text = message.content.trim();
        let has_media = message.attachment_count > 0 || message.sticker_count > 0;

        if !has_media && !text.is_empty() && EMOJI_ONLY_REGEX.is_match(text) {
            return Verdict::EmojiOnly;
        }
        if has_media && text.is_empty() {
            return Verdict::MediaOnly;
        }

        if self.ignored_authors.contains(&message.author.id) {
            return Verdict::IgnoredAuthor;
        }

        Verdict::Activity
    }
}
