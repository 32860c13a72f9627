use xpchat_types::models::{ActorKind, Message, MessageId, ReactionKind};

/// Fixed avatar shown for assistant messages.
pub const ASSISTANT_AVATAR: &str = "./assets/img/photoia.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Avatar {
    Image(String),
    /// First letter of the display name, upper-cased.
    Letter(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionChip {
    pub kind: ReactionKind,
    pub emoji: &'static str,
    pub count: usize,
    /// Whether the viewer is one of the reactors.
    pub mine: bool,
}

/// Render model for one message, resolved for a given viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub id: MessageId,
    pub actor: ActorKind,
    pub author_name: String,
    pub avatar: Avatar,
    pub badge: Option<&'static str>,
    pub is_mine: bool,
    pub body: String,
    pub media_ref: Option<String>,
    pub reactions: Vec<ReactionChip>,
}

impl MessageView {
    pub fn new(msg: &Message, viewer: Option<&str>) -> Self {
        let author_name = msg
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("USER")
            .to_string();

        let avatar = match (msg.actor, &msg.avatar_ref) {
            (ActorKind::Assistant, _) => Avatar::Image(ASSISTANT_AVATAR.to_string()),
            (_, Some(url)) => Avatar::Image(url.clone()),
            (_, None) => Avatar::Letter(
                author_name
                    .chars()
                    .next()
                    .map(|c| c.to_uppercase().next().unwrap_or(c))
                    .unwrap_or('U'),
            ),
        };

        let badge = match msg.actor {
            ActorKind::Assistant => Some("IA"),
            ActorKind::System => Some("KEYMASTER"),
            ActorKind::Human => None,
        };

        let reactions = msg
            .reactions
            .iter()
            .map(|(kind, users)| ReactionChip {
                kind,
                emoji: kind.emoji(),
                count: users.len(),
                mine: viewer.is_some_and(|me| users.iter().any(|u| u == me)),
            })
            .collect();

        Self {
            id: msg.id.clone(),
            actor: msg.actor,
            author_name,
            avatar,
            badge,
            is_mine: viewer.is_some_and(|me| msg.is_from(me)),
            body: msg.body.clone(),
            media_ref: msg.media_ref.clone(),
            reactions,
        }
    }
}
