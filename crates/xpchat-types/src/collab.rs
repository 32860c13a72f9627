//! Contracts of the external collaborators the console consumes.
//!
//! The console never talks to a backend directly: every remote concern goes
//! through one of these traits so the feed and composer can run against the
//! in-memory hub in tests and against real endpoints in production.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use tokio::sync::watch;

use crate::api::{Ack, CompletionRequest, InviteOutcome};
use crate::error::{ChatError, ValidationError};
use crate::events::{ChangeEvent, StreamFault};
use crate::models::{Identity, MAX_IMAGE_BYTES, MediaFile, MessageId, NewMessage, ReactionKind, RoomRef};

/// Ordered change stream for one room. Dropping it unsubscribes.
///
/// After yielding a [`StreamFault`] the stream ends; it never retries on its
/// own. Resubscription is the consumer's job.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ChangeEvent, StreamFault>> + Send>>;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self) -> Result<Identity, ChatError>;

    async fn sign_out(&self) -> Result<(), ChatError>;

    /// Current identity, updated on every sign-in/sign-out.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn is_member(&self, space_id: &str, identity_id: &str) -> Result<bool, ChatError>;

    /// Fails with `AuthRequired`, `ValidationFailed(CodeRequired)`,
    /// `InviteInvalid` or `NetworkUnavailable`.
    async fn redeem_invite(
        &self,
        space_id: &str,
        code: &str,
        identity: Option<&Identity>,
    ) -> Result<InviteOutcome, ChatError>;
}

/// The message store behind a room: its change subscription plus writes.
#[async_trait]
pub trait MessageStore: Send + Sync {
    fn subscribe(&self, room: &RoomRef) -> EventStream;

    /// Resolves once the write is acknowledged. The message itself reaches
    /// clients through their subscriptions.
    async fn send(&self, room: &RoomRef, message: NewMessage) -> Result<MessageId, ChatError>;

    async fn delete(&self, room: &RoomRef, id: &str) -> Result<(), ChatError>;

    /// Toggle `reactor`'s reaction of `kind` on message `id`.
    async fn react(
        &self,
        room: &RoomRef,
        id: &str,
        reactor: &str,
        kind: ReactionKind,
    ) -> Result<(), ChatError>;
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload an image and return its public URL.
    async fn upload(
        &self,
        room: &RoomRef,
        uploader: &Identity,
        file: MediaFile,
    ) -> Result<String, ChatError>;
}

#[async_trait]
pub trait Assistant: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Ack, ChatError>;
}

/// Checks run before any upload is attempted.
pub fn validate_image(file: &MediaFile, online: bool) -> Result<(), ChatError> {
    if !online {
        return Err(ChatError::NetworkUnavailable("OFFLINE".into()));
    }
    if !file.mime.starts_with("image/") {
        return Err(ValidationError::NotImage {
            mime: file.mime.clone(),
        }
        .into());
    }
    if file.size() > MAX_IMAGE_BYTES {
        return Err(ValidationError::MediaTooLarge {
            size: file.size(),
            max: MAX_IMAGE_BYTES,
        }
        .into());
    }
    Ok(())
}

/// Storage path for an uploaded chat image:
/// `chat/{space}/{room}/{uploader}/{millis}.{ext}` with unsafe chars replaced.
pub fn media_path(room: &RoomRef, uploader: &Identity, file: &MediaFile, millis: i64) -> String {
    format!(
        "chat/{}/{}/{}/{}.{}",
        path_segment(&room.space_id, "space"),
        path_segment(&room.room_id, "room"),
        path_segment(&uploader.id, "user"),
        millis,
        path_segment(&file.extension(), "jpg"),
    )
}

fn path_segment(raw: &str, fallback: &str) -> String {
    if raw.is_empty() {
        return fallback.to_string();
    }
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Invite codes are compared trimmed and upper-cased.
pub fn normalize_invite_code(code: &str) -> Result<String, ChatError> {
    let normalized = code.trim().to_uppercase();
    if normalized.is_empty() {
        return Err(ValidationError::CodeRequired.into());
    }
    Ok(normalized)
}
