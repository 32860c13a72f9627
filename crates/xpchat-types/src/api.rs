use serde::{Deserialize, Serialize};

use crate::models::{Identity, RoomRef};

// -- Assistant --

/// Request handed to the assistant collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub room: RoomRef,
    pub identity: Identity,
    pub prompt: String,
}

/// JSON body posted to the assistant endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionBody<'a> {
    pub space_id: &'a str,
    pub room_id: &'a str,
    pub uid: &'a str,
    pub display_name: &'a str,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<&'a str>,
    pub prompt: &'a str,
}

impl<'a> From<&'a CompletionRequest> for CompletionBody<'a> {
    fn from(req: &'a CompletionRequest) -> Self {
        Self {
            space_id: &req.room.space_id,
            room_id: &req.room.room_id,
            uid: &req.identity.id,
            display_name: &req.identity.display_name,
            photo_url: req.identity.avatar_ref.as_deref(),
            prompt: &req.prompt,
        }
    }
}

/// Acknowledgement of an accepted assistant request. The reply itself arrives
/// later as a regular message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

// -- Endpoints --

/// Body returned by HTTP endpoints. Failures carry `ok: false` with a code.
#[derive(Debug, Default, Deserialize)]
pub struct EndpointReply {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// -- Media --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}

// -- Invites --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteOutcome {
    /// The identity was already a member; nothing was written.
    pub already: bool,
}
