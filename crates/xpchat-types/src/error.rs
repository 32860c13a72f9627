use std::time::Duration;

/// Local input checks that fail before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("message is empty")]
    EmptyBody,
    #[error("message too long ({len}/{max})")]
    BodyTooLong { len: usize, max: usize },
    #[error("assistant prompt is empty")]
    EmptyPrompt,
    #[error("not an image ({mime})")]
    NotImage { mime: String },
    #[error("image too large ({size} bytes, max {max})")]
    MediaTooLarge { size: usize, max: usize },
    #[error("invite code required")]
    CodeRequired,
    #[error("unknown reaction")]
    InvalidReaction,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyBody => "EMPTY_MESSAGE",
            Self::BodyTooLong { .. } => "MESSAGE_TOO_LONG",
            Self::EmptyPrompt => "AI_USAGE",
            Self::NotImage { .. } => "NOT_IMAGE",
            Self::MediaTooLarge { .. } => "IMAGE_TOO_LARGE",
            Self::CodeRequired => "CODE_REQUIRED",
            Self::InvalidReaction => "BAD_REACTION",
        }
    }
}

/// Every failure the console can surface to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("authentication required")]
    AuthRequired,

    #[error("access denied: invite required")]
    AccessDenied,

    #[error("slow mode, retry in {}ms", retry_after.as_millis())]
    RateLimited { retry_after: Duration },

    #[error(transparent)]
    ValidationFailed(#[from] ValidationError),

    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("backend rejected request ({code}): {message}")]
    BackendRejected { code: String, message: String },

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("invite code invalid")]
    InviteInvalid,
}

impl ChatError {
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendRejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Stable upper-case code shown in inline feed notices.
    pub fn code(&self) -> &str {
        match self {
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::RateLimited { .. } => "SLOWMODE",
            Self::ValidationFailed(v) => v.code(),
            Self::NetworkUnavailable(_) => "NETWORK_UNAVAILABLE",
            Self::Timeout => "TIMEOUT",
            Self::BackendRejected { code, .. } => code,
            Self::MalformedEvent(_) => "MALFORMED_EVENT",
            Self::InviteInvalid => "CODE_INVALID",
        }
    }

    /// Failures where the same request may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable(_) | Self::Timeout | Self::BackendRejected { .. }
        )
    }
}
