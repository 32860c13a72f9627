use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ActorKind, Message, MessageId, Reactions};

/// Kind of change delivered by a room subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// Stored message document as carried by `added`/`modified` changes.
/// Every field is optional on the wire so partial documents still decode.
/// Stored documents name the author `uid`, the avatar `photoURL`, the body
/// `text` and the attachment `imageUrl`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(default, alias = "uid")]
    pub author_id: String,
    pub actor: Option<ActorKind>,
    pub display_name: Option<String>,
    #[serde(alias = "photoURL")]
    pub avatar_ref: Option<String>,
    #[serde(default, alias = "text")]
    pub body: String,
    #[serde(alias = "imageUrl")]
    pub media_ref: Option<String>,
    #[serde(default)]
    pub reactions: Reactions,
    pub created_at: Option<DateTime<Utc>>,
}

impl MessagePayload {
    /// Build a message from the document. A missing `created_at` (pending
    /// server timestamp) resolves to `fallback_created_at`.
    pub fn into_message(self, id: MessageId, fallback_created_at: DateTime<Utc>) -> Message {
        let actor = self
            .actor
            .unwrap_or_else(|| ActorKind::from_author_id(&self.author_id));

        Message {
            id,
            author_id: self.author_id,
            actor,
            display_name: self.display_name,
            avatar_ref: self.avatar_ref,
            body: self.body,
            media_ref: self.media_ref,
            reactions: self.reactions,
            created_at: self.created_at.unwrap_or(fallback_created_at),
        }
    }
}

impl From<&Message> for MessagePayload {
    fn from(msg: &Message) -> Self {
        Self {
            author_id: msg.author_id.clone(),
            actor: Some(msg.actor),
            display_name: msg.display_name.clone(),
            avatar_ref: msg.avatar_ref.clone(),
            body: msg.body.clone(),
            media_ref: msg.media_ref.clone(),
            reactions: msg.reactions.clone(),
            created_at: Some(msg.created_at),
        }
    }
}

/// One change delivered by a room subscription.
///
/// `position_hint` is the index of the document in the backend's sort order at
/// emission time. It is advisory and may be stale by the time it is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub id: Option<MessageId>,
    pub payload: Option<MessagePayload>,
    pub position_hint: Option<usize>,
}

impl ChangeEvent {
    pub fn added(msg: &Message, position_hint: Option<usize>) -> Self {
        Self {
            kind: ChangeKind::Added,
            id: Some(msg.id.clone()),
            payload: Some(MessagePayload::from(msg)),
            position_hint,
        }
    }

    pub fn modified(msg: &Message, position_hint: Option<usize>) -> Self {
        Self {
            kind: ChangeKind::Modified,
            id: Some(msg.id.clone()),
            payload: Some(MessagePayload::from(msg)),
            position_hint,
        }
    }

    pub fn removed(id: impl Into<MessageId>) -> Self {
        Self {
            kind: ChangeKind::Removed,
            id: Some(id.into()),
            payload: None,
            position_hint: None,
        }
    }
}

/// Transport failure reported by a subscription. The stream ends after it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct StreamFault {
    pub code: String,
    pub message: String,
}

impl StreamFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
