use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use xpchat_console::{Collaborators, Console, ConsoleConfig, LocalAuth};
use xpchat_db::{Database, SqliteMembership};
use xpchat_feed::{Submission, TextSurface};
use xpchat_hub::{Hub, MemoryMediaStore};
use xpchat_types::ChatError;
use xpchat_types::collab::{EventStream, MessageStore};
use xpchat_types::models::{Draft, MessageId, NewMessage, ReactionKind, RoomRef};

/// Hub whose writes fail while `offline` is set.
struct FlakyStore {
    hub: Hub,
    offline: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<(), ChatError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ChatError::NetworkUnavailable("offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for FlakyStore {
    fn subscribe(&self, room: &RoomRef) -> EventStream {
        self.hub.subscribe(room)
    }

    async fn send(&self, room: &RoomRef, message: NewMessage) -> Result<MessageId, ChatError> {
        self.check()?;
        self.hub.send(room, message).await
    }

    async fn delete(&self, room: &RoomRef, id: &str) -> Result<(), ChatError> {
        self.check()?;
        self.hub.delete(room, id).await
    }

    async fn react(
        &self,
        room: &RoomRef,
        id: &str,
        reactor: &str,
        kind: ReactionKind,
    ) -> Result<(), ChatError> {
        self.check()?;
        self.hub.react(room, id, reactor, kind).await
    }
}

struct Setup {
    console: Console<TextSurface>,
    hub: Hub,
    db: Arc<Database>,
    store: Arc<FlakyStore>,
}

fn setup(user: &str) -> Setup {
    let config = ConsoleConfig::from_lookup(|key| match key {
        "XPCHAT_SEND_COOLDOWN_MS" => Some("0".into()),
        _ => None,
    })
    .unwrap();

    let db = Arc::new(Database::open_in_memory().unwrap());
    db.upsert_invite("WELCOME-1", "europe", "member", true).unwrap();
    let hub = Hub::new();
    let store = Arc::new(FlakyStore {
        hub: hub.clone(),
        offline: AtomicBool::new(false),
    });

    let services = Collaborators {
        auth: Arc::new(LocalAuth::new(user)),
        membership: Arc::new(SqliteMembership::new(db.clone())),
        store: store.clone(),
        media: Some(Arc::new(MemoryMediaStore::new())),
        assistant: None,
    };
    let console = Console::new(&config, services, || TextSurface::with_row_height(400.0, 40.0));
    Setup {
        console,
        hub,
        db,
        store,
    }
}

fn has(console: &Console<TextSurface>, notice: &str) -> bool {
    console.transcript().iter().any(|n| n == notice)
}

#[tokio::test]
async fn invite_flow_opens_the_feed() {
    let Setup { mut console, hub, .. } = setup("ana");

    console.sign_in().await.unwrap();
    assert!(has(&console, "AUTH_OK: ANA"));
    assert!(has(&console, "ACCESS_DENIED: invite required"));
    assert!(console.feed().is_none());

    let err = console.submit(&mut Draft::text("hi")).await.unwrap_err();
    assert_eq!(err, ChatError::AccessDenied);
    assert!(hub.messages(console.room()).await.is_empty());

    assert_eq!(console.join("nope").await.unwrap_err(), ChatError::InviteInvalid);
    assert!(has(&console, "INVITE_FAILED: CODE_INVALID"));

    console.join(" welcome-1 ").await.unwrap();
    assert!(has(&console, "INVITE_OK"));
    assert!(console.feed().is_some());

    let mut draft = Draft::text("hello");
    let Submission::Sent(id) = console.submit(&mut draft).await.unwrap() else {
        panic!("expected a plain send");
    };
    assert!(draft.is_blank());

    let snap = console.snapshot().await.unwrap();
    assert_eq!(snap.order, vec![id]);
    assert!(snap.connected);
}

#[tokio::test]
async fn members_connect_and_disconnect() {
    let Setup { mut console, db, .. } = setup("ana");
    db.add_member("europe", "local-ana", "ANA", "member").unwrap();

    console.sign_in().await.unwrap();
    assert!(has(&console, "ACCESS_OK"));
    assert!(console.snapshot().await.unwrap().connected);

    console.sign_out().await;
    assert!(has(&console, "DISCONNECTED"));
    assert!(console.session().is_none());
    assert!(console.feed().is_none());

    let err = console.submit(&mut Draft::text("hi")).await.unwrap_err();
    assert_eq!(err, ChatError::AuthRequired);
    assert_eq!(console.transcript().last().map(String::as_str), Some("AUTH_REQUIRED."));
}

#[tokio::test]
async fn notices_reactions_and_failures_land_in_the_feed() {
    let Setup { mut console, db, .. } = setup("ana");
    db.add_member("europe", "local-ana", "ANA", "member").unwrap();
    console.sign_in().await.unwrap();

    let Submission::Sent(id) = console.submit(&mut Draft::text("hello")).await.unwrap() else {
        panic!("expected a plain send");
    };
    console.react(&id, "👍").await.unwrap();
    assert_eq!(
        console.react(&id, "🙃").await.unwrap_err().code(),
        "BAD_REACTION"
    );
    console.delete("missing").await.unwrap_err();

    let submission = console.submit(&mut Draft::text("/help")).await.unwrap();
    assert!(matches!(submission, Submission::Info(_)));

    let Submission::Assistant { outcome, .. } = console.submit(&mut Draft::text("@ia hola")).await.unwrap()
    else {
        panic!("expected an assistant submission");
    };
    assert_eq!(outcome.unwrap_err().code(), "AI_DISABLED");

    let reconciler = console.shutdown().await.unwrap();
    assert!(reconciler.feed().is_consistent());
    let lines = reconciler.feed().surface().lines();
    assert_eq!(lines[0], "-- CONNECTED");
    assert!(lines.contains(&"> ANA: hello 👍1*"));
    assert!(lines.contains(&"-- REACTION_FAILED: BAD_REACTION"));
    assert!(lines.contains(&"-- DELETE_FAILED: NOT_FOUND"));
    assert!(lines.iter().any(|l| l.starts_with("-- COMMANDS:")));
    assert!(lines.contains(&"> ANA: @IA: hola"));
    assert!(lines.contains(&"-- AI_FAILED: AI_DISABLED"));
    assert!(!lines.iter().any(|l| l.contains("is typing")));
}

#[tokio::test]
async fn room_switch_moves_sends_with_the_feed() {
    let Setup { mut console, hub, db, .. } = setup("ana");
    db.add_member("europe", "local-ana", "ANA", "member").unwrap();
    console.sign_in().await.unwrap();

    let general = RoomRef::new("europe", "general");
    let random = RoomRef::new("europe", "random");
    console.switch_room(random.clone()).await;
    assert_eq!(console.room(), &random);
    assert_eq!(console.session().unwrap().room(), random);

    let Submission::Sent(id) = console.submit(&mut Draft::text("hello")).await.unwrap() else {
        panic!("expected a plain send");
    };

    let snap = console.snapshot().await.unwrap();
    assert_eq!(snap.room, random);
    assert_eq!(snap.order, vec![id]);
    assert!(hub.messages(&general).await.is_empty());
    assert_eq!(hub.messages(&random).await.len(), 1);
    assert!(has(&console, "ROOM_CONNECTED: random"));
}

#[tokio::test]
async fn switching_space_checks_membership_again() {
    let Setup { mut console, db, .. } = setup("ana");
    db.add_member("europe", "local-ana", "ANA", "member").unwrap();
    console.sign_in().await.unwrap();
    assert!(console.feed().is_some());

    console.switch_room(RoomRef::new("asia", "lobby")).await;
    assert!(console.feed().is_none());
    assert!(!console.session().unwrap().is_member());
    assert_eq!(
        console.transcript().iter().filter(|n| *n == "ACCESS_DENIED: invite required").count(),
        1
    );

    let err = console.submit(&mut Draft::text("hi")).await.unwrap_err();
    assert_eq!(err, ChatError::AccessDenied);
}

#[tokio::test]
async fn failed_send_keeps_the_draft_for_retry() {
    let Setup {
        mut console,
        db,
        store,
        ..
    } = setup("ana");
    db.add_member("europe", "local-ana", "ANA", "member").unwrap();
    console.sign_in().await.unwrap();

    store.offline.store(true, Ordering::SeqCst);
    let err = console.submit(&mut Draft::text("hello")).await.unwrap_err();
    assert_eq!(err.code(), "NETWORK_UNAVAILABLE");
    assert!(has(&console, "SEND_FAILED: NETWORK_UNAVAILABLE"));
    assert_eq!(console.pending(), Some(&Draft::text("hello")));

    store.offline.store(false, Ordering::SeqCst);
    let Submission::Sent(id) = console.retry().await.unwrap() else {
        panic!("expected a plain send");
    };
    assert!(console.pending().is_none());
    assert_eq!(console.snapshot().await.unwrap().order, vec![id]);

    assert!(console.retry().await.is_err());
    assert!(has(&console, "NOTHING_TO_RETRY"));
}
