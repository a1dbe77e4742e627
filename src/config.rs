//! Configuration loading and validation.
//!
//! Values come from the environment, optionally overlaid on a TOML file. The
//! file uses the lowercased environment variable names as keys, with ids as
//! quoted strings:
//!
//! ```toml
//! discord_bot_token = "..."
//! general_channel_id = "123456789012345678"
//! deadchat_role_id = "234567890123456789"
//! deadchat_window_secs = "900"
//! ```
//!
//! Only the bot token is fatal when missing. Each behavior validates its own
//! identifiers and is disabled (with an error log) when they are absent or
//! malformed, so one misconfigured behavior never takes down the other.

use crate::error::{ConfigError, Result};
use crate::{ChannelId, RoleId, UserId};

use serde::Deserialize;

use std::path::Path;
use std::time::Duration;

/// Default inactivity window before the chat counts as dead.
const DEFAULT_WINDOW_SECS: u64 = 15 * 60;

/// Longest accepted window or hint duration (one year).
const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Default address the liveness probe binds to.
const DEFAULT_LIVENESS_BIND: &str = "0.0.0.0";

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,

    /// None when the dead-chat behavior is disabled.
    pub dead_chat: Option<DeadChatConfig>,

    /// None when the quarantine purge behavior is disabled.
    pub purge: Option<PurgeConfig>,

    pub liveness: Option<LivenessConfig>,
}

/// Dead-chat role rotation settings.
#[derive(Debug, Clone)]
pub struct DeadChatConfig {
    /// Channel whose inactivity is tracked.
    pub channel_id: ChannelId,

    /// The scarce single-holder role.
    pub marker_role_id: RoleId,

    /// Authors whose messages never count as activity.
    pub ignored_authors: Vec<UserId>,

    /// Silence required before the next message revives the chat.
    pub window: Duration,

    /// Silence after which the role is announced as up for grabs.
    /// None disables the hint.
    pub hint: Option<Duration>,
}

/// Quarantine purge settings.
#[derive(Debug, Clone, Copy)]
pub struct PurgeConfig {
    /// Channel purged when a member is newly quarantined.
    pub channel_id: ChannelId,

    pub quarantine_role_id: RoleId,
}

/// Liveness HTTP probe settings.
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    pub bind: String,
    pub port: u16,
}

/// Unvalidated values as read from the file and environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub discord_bot_token: Option<String>,
    pub general_channel_id: Option<String>,
    pub deadchat_role_id: Option<String>,
    pub ignore_user_id: Option<String>,
    pub deadchat_window_secs: Option<String>,
    pub deadchat_hint_secs: Option<String>,
    pub quarantine_channel_id: Option<String>,
    pub quarantine_role_id: Option<String>,
    pub liveness_bind: Option<String>,
    pub liveness_port: Option<String>,
}

impl RawConfig {
    /// Overwrite fields with any value `lookup` returns for the matching
    /// environment variable.
    pub fn overlay(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields: [(&str, &mut Option<String>); 10] = [
            ("DISCORD_BOT_TOKEN", &mut self.discord_bot_token),
            ("GENERAL_CHANNEL_ID", &mut self.general_channel_id),
            ("DEADCHAT_ROLE_ID", &mut self.deadchat_role_id),
            ("IGNORE_USER_ID", &mut self.ignore_user_id),
            ("DEADCHAT_WINDOW_SECS", &mut self.deadchat_window_secs),
            ("DEADCHAT_HINT_SECS", &mut self.deadchat_hint_secs),
            ("QUARANTINE_CHANNEL_ID", &mut self.quarantine_channel_id),
            ("QUARANTINE_ROLE_ID", &mut self.quarantine_role_id),
            ("LIVENESS_BIND", &mut self.liveness_bind),
            ("LIVENESS_PORT", &mut self.liveness_port),
        ];

        for (key, field) in fields {
            if let Some(value) = lookup(key).filter(|value| !value.trim().is_empty()) {
                *field = Some(value);
            }
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let mut raw = RawConfig::default();
        raw.overlay(|key| std::env::var(key).ok());
        Self::from_raw(raw)
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Load {
            path: path.display().to_string(),
            source: std::sync::Arc::new(error),
        })?;

        let mut raw: RawConfig = toml::from_str(&content).map_err(|error| ConfigError::Parse {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
        raw.overlay(|key| std::env::var(key).ok());
        Self::from_raw(raw)
    }

    /// Validate raw values. Behavior-level problems are logged and disable
    /// that behavior; only a missing token is returned as an error.
    pub fn from_raw(raw: RawConfig) -> Result<Self> {
        let discord_token = raw
            .discord_bot_token
            .clone()
            .ok_or_else(|| ConfigError::MissingKey("DISCORD_BOT_TOKEN".into()))?;

        let dead_chat = match DeadChatConfig::from_raw(&raw) {
            Ok(config) => Some(config),
            Err(error) => {
                tracing::error!(%error, "dead-chat behavior disabled");
                None
            }
        };

        let purge = match PurgeConfig::from_raw(&raw) {
            Ok(config) => Some(config),
            Err(error) => {
                tracing::error!(%error, "quarantine purge behavior disabled");
                None
            }
        };

        let liveness = match LivenessConfig::from_raw(&raw) {
            Ok(config) => config,
            Err(error) => {
                tracing::error!(%error, "liveness probe disabled");
                None
            }
        };

        Ok(Self {
            discord_token,
            dead_chat,
            purge,
            liveness,
        })
    }
}

impl DeadChatConfig {
    fn from_raw(raw: &RawConfig) -> std::result::Result<Self, ConfigError> {
        let channel_id = required_id("GENERAL_CHANNEL_ID", raw.general_channel_id.as_deref())?;
        let marker_role_id = required_id("DEADCHAT_ROLE_ID", raw.deadchat_role_id.as_deref())?;

        let ignored_authors = match raw.ignore_user_id.as_deref() {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| parse_id("IGNORE_USER_ID", id))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let window = match raw.deadchat_window_secs.as_deref() {
            Some(value) => parse_duration("DEADCHAT_WINDOW_SECS", value)?,
            None => Duration::from_secs(DEFAULT_WINDOW_SECS),
        };

        let hint = match raw.deadchat_hint_secs.as_deref() {
            Some(value) => match parse_hint(value, window) {
                Ok(hint) => Some(hint),
                Err(error) => {
                    tracing::error!(%error, "inactivity hint disabled");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            channel_id,
            marker_role_id,
            ignored_authors,
            window,
            hint,
        })
    }
}

/// The hint only makes sense once the chat is already dead.
fn parse_hint(value: &str, window: Duration) -> std::result::Result<Duration, ConfigError> {
    let hint = parse_duration("DEADCHAT_HINT_SECS", value)?;
    if hint <= window {
        return Err(ConfigError::Invalid(format!(
            "DEADCHAT_HINT_SECS ({}) must be longer than DEADCHAT_WINDOW_SECS ({})",
            hint.as_secs(),
            window.as_secs()
        )));
    }
    Ok(hint)
}

impl PurgeConfig {
    fn from_raw(raw: &RawConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            channel_id: required_id("QUARANTINE_CHANNEL_ID", raw.quarantine_channel_id.as_deref())?,
            quarantine_role_id: required_id("QUARANTINE_ROLE_ID", raw.quarantine_role_id.as_deref())?,
        })
    }
}

impl LivenessConfig {
    fn from_raw(raw: &RawConfig) -> std::result::Result<Option<Self>, ConfigError> {
        let Some(port) = raw.liveness_port.as_deref() else {
            return Ok(None);
        };

        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|error| ConfigError::Invalid(format!("LIVENESS_PORT '{port}': {error}")))?;

        Ok(Some(Self {
            bind: raw
                .liveness_bind
                .clone()
                .unwrap_or_else(|| DEFAULT_LIVENESS_BIND.into()),
            port,
        }))
    }
}

fn required_id(key: &str, value: Option<&str>) -> std::result::Result<u64, ConfigError> {
    let value = value.ok_or_else(|| ConfigError::MissingKey(key.into()))?;
    parse_id(key, value)
}

fn parse_id(key: &str, value: &str) -> std::result::Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid(format!("{key} must not be zero"))),
        Ok(id) => Ok(id),
        Err(error) => Err(ConfigError::Invalid(format!("{key} '{value}': {error}"))),
    }
}

fn parse_duration(key: &str, value: &str) -> std::result::Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid(format!("{key} must be positive"))),
        Ok(secs) if secs > MAX_DURATION_SECS => Err(ConfigError::Invalid(format!(
            "{key} must not exceed {MAX_DURATION_SECS} seconds"
        ))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(error) => Err(ConfigError::Invalid(format!("{key} '{value}': {error}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, RawConfig};
    use std::collections::HashMap;
    use std::time::Duration;

    fn raw_from(pairs: &[(&str, &str)]) -> RawConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        let mut raw = RawConfig::default();
        raw.overlay(|key| env.get(key).cloned());
        raw
    }

    #[test]
    fn missing_token_is_fatal() {
        let raw = raw_from(&[("GENERAL_CHANNEL_ID", "1"), ("DEADCHAT_ROLE_ID", "2")]);
        assert!(Config::from_raw(raw).is_err());
    }

    #[test]
    fn full_environment_enables_everything() {
        let raw = raw_from(&[
            ("DISCORD_BOT_TOKEN", "token"),
            ("GENERAL_CHANNEL_ID", "100"),
            ("DEADCHAT_ROLE_ID", "200"),
            ("IGNORE_USER_ID", "300, 301"),
            ("DEADCHAT_WINDOW_SECS", "600"),
            ("DEADCHAT_HINT_SECS", "3600"),
            ("QUARANTINE_CHANNEL_ID", "400"),
            ("QUARANTINE_ROLE_ID", "500"),
            ("LIVENESS_PORT", "3000"),
        ]);
        let config = Config::from_raw(raw).expect("config should load");

        let dead_chat = config.dead_chat.expect("dead chat enabled");
        assert_eq!(dead_chat.channel_id, 100);
        assert_eq!(dead_chat.marker_role_id, 200);
        assert_eq!(dead_chat.ignored_authors, vec![300, 301]);
        assert_eq!(dead_chat.window, Duration::from_secs(600));
        assert_eq!(dead_chat.hint, Some(Duration::from_secs(3600)));

        let purge = config.purge.expect("purge enabled");
        assert_eq!(purge.channel_id, 400);
        assert_eq!(purge.quarantine_role_id, 500);

        let liveness = config.liveness.expect("liveness enabled");
        assert_eq!(liveness.port, 3000);
        assert_eq!(liveness.bind, "0.0.0.0");
    }

    #[test]
    fn missing_identifiers_disable_only_their_behavior() {
        let raw = raw_from(&[
            ("DISCORD_BOT_TOKEN", "token"),
            ("GENERAL_CHANNEL_ID", "100"),
            ("QUARANTINE_CHANNEL_ID", "400"),
            ("QUARANTINE_ROLE_ID", "500"),
        ]);
        let config = Config::from_raw(raw).expect("config should load");

        assert!(config.dead_chat.is_none());
        assert!(config.purge.is_some());
        assert!(config.liveness.is_none());
    }

    #[test]
    fn defaults_window_and_disables_hint() {
        let raw = raw_from(&[
            ("DISCORD_BOT_TOKEN", "token"),
            ("GENERAL_CHANNEL_ID", "100"),
            ("DEADCHAT_ROLE_ID", "200"),
        ]);
        let dead_chat = Config::from_raw(raw)
            .expect("config should load")
            .dead_chat
            .expect("dead chat enabled");

        assert_eq!(dead_chat.window, Duration::from_secs(900));
        assert_eq!(dead_chat.hint, None);
        assert!(dead_chat.ignored_authors.is_empty());
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let raw = raw_from(&[
            ("DISCORD_BOT_TOKEN", "token"),
            ("GENERAL_CHANNEL_ID", "general"),
            ("DEADCHAT_ROLE_ID", "200"),
        ]);
        assert!(Config::from_raw(raw).expect("token present").dead_chat.is_none());
    }

    #[test]
    fn short_hint_disables_only_the_hint() {
        let raw = raw_from(&[
            ("DISCORD_BOT_TOKEN", "token"),
            ("GENERAL_CHANNEL_ID", "100"),
            ("DEADCHAT_ROLE_ID", "200"),
            ("DEADCHAT_WINDOW_SECS", "900"),
            ("DEADCHAT_HINT_SECS", "60"),
        ]);
        let dead_chat = Config::from_raw(raw)
            .expect("token present")
            .dead_chat
            .expect("dead chat still enabled");

        assert_eq!(dead_chat.window, Duration::from_secs(900));
        assert_eq!(dead_chat.hint, None);
    }

    #[test]
    fn oversized_window_disables_dead_chat() {
        let raw = raw_from(&[
            ("DISCORD_BOT_TOKEN", "token"),
            ("GENERAL_CHANNEL_ID", "100"),
            ("DEADCHAT_ROLE_ID", "200"),
            ("DEADCHAT_WINDOW_SECS", "10000000000000"),
        ]);
        assert!(Config::from_raw(raw).expect("token present").dead_chat.is_none());

        let raw = raw_from(&[
            ("DISCORD_BOT_TOKEN", "token"),
            ("GENERAL_CHANNEL_ID", "100"),
            ("DEADCHAT_ROLE_ID", "200"),
            ("DEADCHAT_WINDOW_SECS", "31536000"),
        ]);
        let dead_chat = Config::from_raw(raw)
            .expect("token present")
            .dead_chat
            .expect("one-year window accepted");
        assert_eq!(dead_chat.window, Duration::from_secs(31_536_000));
    }

    #[test]
    fn parses_toml_file_values() {
        let raw: RawConfig = toml::from_str(
            r#"
            discord_bot_token = "token"
            general_channel_id = "100"
            deadchat_role_id = "200"
            "#,
        )
        .expect("valid toml");
        let config = Config::from_raw(raw).expect("config should load");

        assert_eq!(config.discord_token, "token");
        assert!(config.dead_chat.is_some());
    }
}
