use std::time::Duration;

use xpchat_types::models::MAX_BODY_LEN;

/// Inbound feed tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Distance from the bottom (px) under which the reader counts as "at bottom".
    pub near_bottom_px: f64,
    /// Forced-follow window after connecting or jumping to the latest message.
    pub stick_window: Duration,
    /// Forced-follow window after the local user's own message lands.
    pub own_send_window: Duration,
    /// First resubscription delay after a stream fault.
    pub reconnect_base: Duration,
    /// Upper bound for the resubscription delay.
    pub reconnect_max: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            near_bottom_px: 180.0,
            stick_window: Duration::from_millis(1200),
            own_send_window: Duration::from_millis(1200),
            reconnect_base: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
        }
    }
}

/// Outbound composer tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerConfig {
    pub max_body_len: usize,
    /// Client-side slow mode between two writes.
    pub cooldown: Duration,
    /// Bound on a single assistant call.
    pub ai_timeout: Duration,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_body_len: MAX_BODY_LEN,
            cooldown: Duration::from_millis(2500),
            ai_timeout: Duration::from_secs(20),
        }
    }
}
