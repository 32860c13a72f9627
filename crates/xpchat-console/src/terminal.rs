use std::io::Write;

use bytes::Bytes;
use xpchat_feed::{Reconciler, ScrollMode, TextSurface};
use xpchat_types::models::{MediaFile, ReactionKind, RoomRef};

/// Height of one terminal line on the simulated surface.
pub const LINE_HEIGHT: f64 = 1.0;

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Draft(String),
    /// Resubmit the draft kept after the last failed send.
    Retry,
    Join(String),
    /// `room` in the current space, or `space/room`.
    Room(String),
    React { id: String, emoji: String },
    Delete(String),
    Image(String),
    /// Scroll the viewport up (negative) or down by this many lines.
    Scroll(f64),
    Bottom,
    Login,
    Logout,
    Quit,
    Unknown(String),
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(':') else {
            return Self::Draft(line.to_string());
        };
        let mut parts = rest.split_whitespace();
        let verb = parts.next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = parts.collect();

        match (verb.as_str(), args.as_slice()) {
            ("retry", []) => Self::Retry,
            ("join", [code]) => Self::Join(code.to_string()),
            ("room", [room]) => Self::Room(room.to_string()),
            ("react", [id, emoji]) => Self::React {
                id: id.to_string(),
                emoji: reaction_alias(emoji).to_string(),
            },
            ("delete", [id]) => Self::Delete(id.to_string()),
            ("image", [path]) => Self::Image(path.to_string()),
            ("up", []) => Self::Scroll(-5.0),
            ("down", []) => Self::Scroll(5.0),
            ("up" | "down", [n]) => match n.parse::<f64>() {
                Ok(n) if verb == "up" => Self::Scroll(-n),
                Ok(n) => Self::Scroll(n),
                Err(_) => Self::Unknown(line.to_string()),
            },
            ("bottom", []) => Self::Bottom,
            ("login", []) => Self::Login,
            ("logout", []) => Self::Logout,
            ("quit" | "q", []) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// `like`, `love` and `laugh` are accepted in place of the emoji.
fn reaction_alias(raw: &str) -> &str {
    ReactionKind::ALL
        .into_iter()
        .find(|kind| format!("{kind:?}").eq_ignore_ascii_case(raw))
        .map_or(raw, |kind| kind.emoji())
}

/// Target of `:room`, resolved against the current room.
pub fn room_target(current: &RoomRef, raw: &str) -> Option<RoomRef> {
    let (space, room) = raw.split_once('/').unwrap_or((current.space_id.as_str(), raw));
    let (space, room) = (space.trim(), room.trim());
    if space.is_empty() || room.is_empty() || room.contains('/') {
        return None;
    }
    Some(RoomRef::new(space, room))
}

/// Image attachment from a local file.
pub async fn load_image(path: &str) -> std::io::Result<MediaFile> {
    let data = tokio::fs::read(path).await?;
    let name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let mime = match name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };
    Ok(MediaFile {
        name,
        mime: mime.to_string(),
        data: Bytes::from(data),
    })
}

/// Full screen for the current feed: header, visible rows, footer.
pub fn render(room: &RoomRef, reconciler: &Reconciler<TextSurface>) -> String {
    let surface = reconciler.feed().surface();
    let mode = match reconciler.scroll().mode() {
        ScrollMode::Following => "LIVE",
        ScrollMode::Reading => "READING",
    };

    let mut out = format!("== {room} [{mode}] ==\n");
    for line in surface.visible_lines() {
        out.push_str(line);
        out.push('\n');
    }
    if surface.new_messages_visible() {
        out.push_str("   [new messages] :bottom\n");
    }
    out
}

/// Redraws the terminal after every feed change.
pub fn redraw() -> impl Fn(&RoomRef, &Reconciler<TextSurface>) + Send + Sync + 'static {
    |room: &RoomRef, reconciler: &Reconciler<TextSurface>| {
        let screen = render(room, reconciler);
        let mut stdout = std::io::stdout().lock();
        // A closed stdout only loses the redraw.
        let _ = write!(stdout, "\x1b[2J\x1b[H{screen}> ");
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;
    use xpchat_feed::FeedConfig;
    use xpchat_types::events::{ChangeEvent, ChangeKind, MessagePayload};

    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!(Input::parse("  hello "), Input::Draft("hello".into()));
        assert_eq!(Input::parse(":join welcome-1"), Input::Join("welcome-1".into()));
        assert_eq!(
            Input::parse(":react m1 LIKE"),
            Input::React {
                id: "m1".into(),
                emoji: "👍".into()
            }
        );
        assert_eq!(
            Input::parse(":react m1 😂"),
            Input::React {
                id: "m1".into(),
                emoji: "😂".into()
            }
        );
        assert_eq!(Input::parse(":up 3"), Input::Scroll(-3.0));
        assert_eq!(Input::parse(":down"), Input::Scroll(5.0));
        assert_eq!(Input::parse(":Q"), Input::Quit);
        assert_eq!(Input::parse(":join"), Input::Unknown(":join".into()));
        assert_eq!(Input::parse(":retry"), Input::Retry);
        assert_eq!(Input::parse(":room random"), Input::Room("random".into()));
    }

    #[test]
    fn room_targets() {
        let current = RoomRef::new("europe", "general");
        assert_eq!(room_target(&current, "random"), Some(RoomRef::new("europe", "random")));
        assert_eq!(room_target(&current, "asia/lobby"), Some(RoomRef::new("asia", "lobby")));
        assert_eq!(room_target(&current, "asia/"), None);
        assert_eq!(room_target(&current, "a/b/c"), None);
    }

    #[test]
    fn render_shows_mode_and_affordance() {
        let room = RoomRef::new("europe", "general");
        let mut reconciler = Reconciler::new(
            TextSurface::with_row_height(3.0, LINE_HEIGHT),
            Some("u1".into()),
            FeedConfig::default(),
        );
        for (i, body) in ["one", "two", "three", "four"].into_iter().enumerate() {
            let event = ChangeEvent {
                kind: ChangeKind::Added,
                id: Some(format!("m{i}")),
                payload: Some(MessagePayload {
                    author_id: "u2".into(),
                    display_name: Some("BO".into()),
                    body: body.into(),
                    ..Default::default()
                }),
                position_hint: None,
            };
            reconciler.apply(event, Instant::now());
        }

        let screen = render(&room, &reconciler);
        assert!(screen.starts_with("== europe/general [LIVE] =="));
        assert!(screen.contains("BO: four"));
        assert!(!screen.contains("BO: one"));
        assert!(!screen.contains("[new messages]"));
    }
}
