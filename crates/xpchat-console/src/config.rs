use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use xpchat_feed::{ComposerConfig, FeedConfig};
use xpchat_types::models::RoomRef;

/// Everything the console reads from the environment.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub room: RoomRef,
    pub feed: FeedConfig,
    pub composer: ComposerConfig,
    pub ai_endpoint: Option<String>,
    pub media_endpoint: Option<String>,
    pub db_path: PathBuf,
    /// Invite codes seeded for the configured space at startup.
    pub invites: Vec<String>,
    pub user: Option<String>,
    pub screen_rows: usize,
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let feed_defaults = FeedConfig::default();
        let composer_defaults = ComposerConfig::default();

        let stick_window = millis(&var, "XPCHAT_STICK_MS", feed_defaults.stick_window)?;
        let feed = FeedConfig {
            near_bottom_px: parsed(&var, "XPCHAT_NEAR_BOTTOM_PX", feed_defaults.near_bottom_px)?,
            stick_window,
            own_send_window: stick_window,
            ..feed_defaults
        };
        let composer = ComposerConfig {
            max_body_len: parsed(&var, "XPCHAT_MAX_MESSAGE_LEN", composer_defaults.max_body_len)?,
            cooldown: millis(&var, "XPCHAT_SEND_COOLDOWN_MS", composer_defaults.cooldown)?,
            ai_timeout: millis(&var, "XPCHAT_AI_TIMEOUT_MS", composer_defaults.ai_timeout)?,
        };

        let invites = var("XPCHAT_INVITES")
            .map(|raw| {
                raw.split(',')
                    .map(|code| code.trim().to_uppercase())
                    .filter(|code| !code.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            room: RoomRef::new(
                var("XPCHAT_SPACE_ID").unwrap_or_else(|| "europe".into()),
                var("XPCHAT_ROOM_ID").unwrap_or_else(|| "general".into()),
            ),
            feed,
            composer,
            ai_endpoint: var("XPCHAT_AI_ENDPOINT"),
            media_endpoint: var("XPCHAT_MEDIA_ENDPOINT"),
            db_path: var("XPCHAT_DB_PATH").unwrap_or_else(|| "xpchat.db".into()).into(),
            invites,
            user: var("XPCHAT_USER"),
            screen_rows: parsed(&var, "XPCHAT_SCREEN_ROWS", 20)?,
        })
    }
}

fn parsed<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw.parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn millis(var: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    let ms = parsed(var, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}
