use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};
use xpchat_types::api::{Ack, CompletionRequest};
use xpchat_types::collab::{Assistant, MediaStore, MessageStore, validate_image};
use xpchat_types::models::{Draft, MediaFile, MessageId, NewMessage, ReactionKind};
use xpchat_types::{ChatError, ValidationError};

use crate::command::{Command, HELP, assistant_echo};
use crate::config::ComposerConfig;
use crate::driver::FeedHandle;
use crate::session::SessionContext;

/// Label of the typing trailer while the assistant works.
pub const ASSISTANT_TYPING_LABEL: &str = "IA";

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Sent(MessageId),
    /// The prompt was posted to the room. `outcome` is the assistant call;
    /// its reply arrives later as a regular message.
    Assistant {
        message_id: MessageId,
        outcome: Result<Ack, ChatError>,
    },
    /// Local output, nothing was written.
    Info(String),
}

/// Validates drafts and writes them to the room.
///
/// Never renders anything: a sent message shows up when its `added` change
/// comes back through the subscription. The draft is only cleared on success.
pub struct Composer {
    session: SessionContext,
    store: Arc<dyn MessageStore>,
    assistant: Option<Arc<dyn Assistant>>,
    media: Option<Arc<dyn MediaStore>>,
    feed: Option<FeedHandle>,
    config: ComposerConfig,
    last_write: Option<Instant>,
}

impl Composer {
    pub fn new(session: SessionContext, store: Arc<dyn MessageStore>, config: ComposerConfig) -> Self {
        Self {
            session,
            store,
            assistant: None,
            media: None,
            feed: None,
            config,
            last_write: None,
        }
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn Assistant>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    pub fn with_media(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_feed(mut self, feed: FeedHandle) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Attach or detach the feed that shows the assistant typing trailer.
    pub fn set_feed(&mut self, feed: Option<FeedHandle>) {
        self.feed = feed;
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Time left before the next write is allowed.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<std::time::Duration> {
        let last = self.last_write?;
        self.config
            .cooldown
            .checked_sub(now.duration_since(last))
            .filter(|left| !left.is_zero())
    }

    pub async fn submit(&mut self, draft: &mut Draft) -> Result<Submission, ChatError> {
        if draft.is_blank() {
            return Err(ValidationError::EmptyBody.into());
        }
        if let Some(file) = draft.media.clone() {
            return self.send_media(draft, file).await;
        }

        let body = draft.body.clone();
        match Command::parse(&body) {
            Command::Help => {
                draft.clear();
                Ok(Submission::Info(HELP.to_string()))
            }
            Command::Assistant(prompt) => self.ask(draft, prompt).await,
            Command::Say(text) => self.say(draft, text).await,
        }
    }

    /// Toggle the session user's reaction on a message.
    pub async fn react(&self, message_id: &str, emoji: &str) -> Result<(), ChatError> {
        let kind = ReactionKind::from_emoji(emoji).ok_or(ValidationError::InvalidReaction)?;
        self.authorize()?;
        let room = self.session.room();
        self.store
            .react(&room, message_id, &self.session.identity().id, kind)
            .await
    }

    /// The removal reaches the feed as a `removed` change.
    pub async fn delete(&self, message_id: &str) -> Result<(), ChatError> {
        if !self.session.is_active() {
            return Err(ChatError::AuthRequired);
        }
        let room = self.session.room();
        self.store.delete(&room, message_id).await
    }

    async fn say(&mut self, draft: &mut Draft, text: &str) -> Result<Submission, ChatError> {
        self.check_length(text)?;
        self.authorize()?;
        let previous = self.begin_write()?;

        let room = self.session.room();
        let message = NewMessage::from_identity(self.session.identity(), text);
        match self.store.send(&room, message).await {
            Ok(id) => {
                draft.clear();
                info!("Sent message {id} to {room}");
                Ok(Submission::Sent(id))
            }
            Err(err) => {
                self.last_write = previous;
                warn!("Send to {room} failed: {err}");
                Err(err)
            }
        }
    }

    async fn ask(&mut self, draft: &mut Draft, prompt: &str) -> Result<Submission, ChatError> {
        if prompt.is_empty() {
            return Err(ValidationError::EmptyPrompt.into());
        }
        let echo = assistant_echo(prompt);
        self.check_length(&echo)?;
        self.authorize()?;
        let previous = self.begin_write()?;

        let room = self.session.room();
        let identity = self.session.identity().clone();
        let message = NewMessage::from_identity(&identity, echo);
        let message_id = match self.store.send(&room, message).await {
            Ok(id) => id,
            Err(err) => {
                self.last_write = previous;
                warn!("Forwarding prompt to {room} failed: {err}");
                return Err(err);
            }
        };
        draft.clear();

        if let Some(feed) = &self.feed {
            feed.show_typing(ASSISTANT_TYPING_LABEL);
        }
        let request = CompletionRequest {
            room,
            identity,
            prompt: prompt.to_string(),
        };
        let outcome = self.call_assistant(request).await;
        if let Err(err) = &outcome {
            warn!("Assistant call failed: {err}");
            if let Some(feed) = &self.feed {
                feed.hide_typing();
            }
        }
        Ok(Submission::Assistant {
            message_id,
            outcome,
        })
    }

    async fn call_assistant(&self, request: CompletionRequest) -> Result<Ack, ChatError> {
        let Some(assistant) = &self.assistant else {
            return Err(ChatError::backend("AI_DISABLED", "no assistant configured"));
        };
        let ack = tokio::time::timeout(self.config.ai_timeout, assistant.complete(request))
            .await
            .map_err(|_| ChatError::Timeout)??;
        if !ack.ok {
            return Err(ChatError::backend("AI_FAILED", "assistant declined the request"));
        }
        Ok(ack)
    }

    async fn send_media(&mut self, draft: &mut Draft, file: MediaFile) -> Result<Submission, ChatError> {
        let caption = draft.body.trim().to_string();
        self.check_length(&caption)?;
        validate_image(&file, self.session.is_online())?;
        self.authorize()?;
        let Some(media) = self.media.clone() else {
            return Err(ChatError::backend("MEDIA_DISABLED", "no media store configured"));
        };
        let previous = self.begin_write()?;

        let room = self.session.room();
        let identity = self.session.identity().clone();
        let result: Result<MessageId, ChatError> = async {
            let url = media.upload(&room, &identity, file).await?;
            let message = NewMessage::from_identity(&identity, caption).with_media(url);
            self.store.send(&room, message).await
        }
        .await;

        match result {
            Ok(id) => {
                draft.clear();
                info!("Sent image message {id} to {room}");
                Ok(Submission::Sent(id))
            }
            Err(err) => {
                self.last_write = previous;
                warn!("Image send to {room} failed: {err}");
                Err(err)
            }
        }
    }

    fn check_length(&self, text: &str) -> Result<(), ChatError> {
        let len = text.chars().count();
        if len > self.config.max_body_len {
            return Err(ValidationError::BodyTooLong {
                len,
                max: self.config.max_body_len,
            }
            .into());
        }
        Ok(())
    }

    fn authorize(&self) -> Result<(), ChatError> {
        if !self.session.is_active() {
            return Err(ChatError::AuthRequired);
        }
        if !self.session.is_member() {
            return Err(ChatError::AccessDenied);
        }
        Ok(())
    }

    /// Stamp the cooldown for a write about to be attempted. Returns the
    /// previous stamp so a failed write can roll it back.
    fn begin_write(&mut self) -> Result<Option<Instant>, ChatError> {
        let now = Instant::now();
        if let Some(retry_after) = self.cooldown_remaining(now) {
            return Err(ChatError::RateLimited { retry_after });
        }
        Ok(self.last_write.replace(now))
    }
}
