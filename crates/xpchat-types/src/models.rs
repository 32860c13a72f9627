use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type MessageId = String;

/// Author id the assistant backend writes its replies under.
pub const ASSISTANT_AUTHOR_ID: &str = "AI_BOT";
/// Author id of the automated moderator.
pub const SYSTEM_AUTHOR_ID: &str = "KEYMASTER";

/// Server-enforced ceiling on message bodies, in chars.
pub const MAX_BODY_LEN: usize = 800;
/// Hard cap on reactors per reaction kind (anti-spam).
pub const MAX_REACTORS: usize = 80;
/// 8 MB upload limit for chat images
pub const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    #[default]
    Human,
    Assistant,
    System,
}

impl ActorKind {
    /// Fallback for payloads written before `actor` was part of the document.
    pub fn from_author_id(author_id: &str) -> Self {
        match author_id {
            ASSISTANT_AUTHOR_ID => Self::Assistant,
            SYSTEM_AUTHOR_ID => Self::System,
            _ => Self::Human,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Love,
    Laugh,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 3] = [Self::Like, Self::Love, Self::Laugh];

    pub fn from_emoji(emoji: &str) -> Option<Self> {
        match emoji {
            "👍" => Some(Self::Like),
            "❤️" | "❤" => Some(Self::Love),
            "😂" => Some(Self::Laugh),
            _ => None,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Like => "👍",
            Self::Love => "❤️",
            Self::Laugh => "😂",
        }
    }
}

/// Reactor sets keyed by reaction kind. Each set keeps insertion order and
/// never exceeds [`MAX_REACTORS`] entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reactions(BTreeMap<ReactionKind, Vec<String>>);

impl Reactions {
    pub fn reactors(&self, kind: ReactionKind) -> &[String] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, kind: ReactionKind) -> usize {
        self.reactors(kind).len()
    }

    pub fn contains(&self, kind: ReactionKind, reactor: &str) -> bool {
        self.reactors(kind).iter().any(|r| r == reactor)
    }

    /// Toggle a reaction: removes if present, appends if not.
    /// Returns true when the reactor is present afterwards. An append past the
    /// cap is ignored and reported as absent.
    pub fn toggle(&mut self, kind: ReactionKind, reactor: &str) -> bool {
        let set = self.0.entry(kind).or_default();
        if let Some(pos) = set.iter().position(|r| r == reactor) {
            set.remove(pos);
            if set.is_empty() {
                self.0.remove(&kind);
            }
            return false;
        }
        if set.len() >= MAX_REACTORS {
            return false;
        }
        set.push(reactor.to_string());
        true
    }

    /// Non-empty reaction groups in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (ReactionKind, &[String])> {
        self.0
            .iter()
            .filter(|(_, users)| !users.is_empty())
            .map(|(kind, users)| (*kind, users.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// A persisted chat message as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author_id: String,
    pub actor: ActorKind,
    pub display_name: Option<String>,
    pub avatar_ref: Option<String>,
    pub body: String,
    pub media_ref: Option<String>,
    pub reactions: Reactions,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_from(&self, identity_id: &str) -> bool {
        self.author_id == identity_id
    }
}

/// A message as submitted by a client. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub author_id: String,
    pub actor: ActorKind,
    pub display_name: Option<String>,
    pub avatar_ref: Option<String>,
    pub body: String,
    pub media_ref: Option<String>,
}

impl NewMessage {
    pub fn from_identity(identity: &Identity, body: impl Into<String>) -> Self {
        Self {
            author_id: identity.id.clone(),
            actor: ActorKind::Human,
            display_name: Some(identity.display_name.clone()),
            avatar_ref: identity.avatar_ref.clone(),
            body: body.into(),
            media_ref: None,
        }
    }

    pub fn with_media(mut self, media_ref: impl Into<String>) -> Self {
        self.media_ref = Some(media_ref.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
}

impl Identity {
    /// Display names are shown upper-cased in the console.
    pub fn new(id: impl Into<String>, display_name: &str) -> Self {
        let name = display_name.trim();
        Self {
            id: id.into(),
            display_name: if name.is_empty() { "USER".into() } else { name.to_uppercase() },
            avatar_ref: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomRef {
    pub space_id: String,
    pub room_id: String,
}

impl RoomRef {
    pub fn new(space_id: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            space_id: space_id.into(),
            room_id: room_id.into(),
        }
    }
}

impl fmt::Display for RoomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.space_id, self.room_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub name: String,
    pub mime: String,
    pub data: Bytes,
}

impl MediaFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Lower-cased file extension, `jpg` when the name has none.
    pub fn extension(&self) -> String {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "jpg".into())
    }
}

/// The composer input: text and an optional attached image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub body: String,
    pub media: Option<MediaFile>,
}

impl Draft {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            media: None,
        }
    }

    pub fn image(file: MediaFile) -> Self {
        Self {
            body: String::new(),
            media: Some(file),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.body.trim().is_empty() && self.media.is_none()
    }

    pub fn clear(&mut self) {
        self.body.clear();
        self.media = None;
    }
}
