use std::sync::Arc;
use std::time::Duration;

use xpchat_feed::{
    Composer, ComposerConfig, FeedConfig, FeedDriver, FeedHandle, Reconciler, ScrollMode,
    SessionContext, Submission, TextSurface,
};
use xpchat_hub::Hub;
use xpchat_types::collab::MessageStore;
use xpchat_types::events::{ChangeEvent, ChangeKind, MessagePayload};
use xpchat_types::models::{Draft, Identity, NewMessage, ReactionKind, Reactions, RoomRef};

fn general() -> RoomRef {
    RoomRef::new("europe", "general")
}

fn other() -> Identity {
    Identity::new("u2", "bo")
}

fn me() -> Identity {
    Identity::new("u1", "ana")
}

/// 5 rows visible, 50px per row.
fn start(hub: &Hub, room: RoomRef) -> (FeedHandle, tokio::task::JoinHandle<Reconciler<TextSurface>>) {
    let reconciler = Reconciler::new(
        TextSurface::with_row_height(250.0, 50.0),
        Some(me().id),
        FeedConfig::default(),
    );
    let (driver, handle) = FeedDriver::new(Arc::new(hub.clone()), room, reconciler, FeedConfig::default());
    (handle, driver.spawn())
}

async fn post(hub: &Hub, n: usize) {
    for i in 0..n {
        hub.send(&general(), NewMessage::from_identity(&other(), format!("msg {i}")))
            .await
            .unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn added_then_removed_on_empty_room() {
    let hub = Hub::new();
    let (feed, task) = start(&hub, general());
    feed.snapshot().await.unwrap();

    let hi = ChangeEvent {
        kind: ChangeKind::Added,
        id: Some("m1".into()),
        payload: Some(MessagePayload {
            author_id: "u2".into(),
            body: "hi".into(),
            ..Default::default()
        }),
        position_hint: None,
    };
    hub.inject(&general(), hi).await;

    let snap = feed.snapshot().await.unwrap();
    assert_eq!(snap.order, vec!["m1".to_string()]);
    assert_eq!(snap.metrics.distance_from_bottom(), 0.0);

    hub.inject(&general(), ChangeEvent::removed("m1")).await;
    hub.inject(&general(), ChangeEvent::removed("m1")).await;
    let snap = feed.snapshot().await.unwrap();
    assert!(snap.order.is_empty());

    feed.shutdown();
    let reconciler = task.await.unwrap();
    assert!(reconciler.feed().is_consistent());
    assert_eq!(reconciler.feed().surface().lines(), vec!["-- CONNECTED"]);
}

#[tokio::test(start_paused = true)]
async fn modification_of_unseen_message_is_inserted() {
    let hub = Hub::new();
    let (feed, _task) = start(&hub, general());
    feed.snapshot().await.unwrap();

    let mut reactions = Reactions::default();
    reactions.toggle(ReactionKind::Like, "u1");
    hub.inject(
        &general(),
        ChangeEvent {
            kind: ChangeKind::Modified,
            id: Some("m1".into()),
            payload: Some(MessagePayload {
                reactions,
                ..Default::default()
            }),
            position_hint: None,
        },
    )
    .await;

    assert_eq!(feed.snapshot().await.unwrap().order, vec!["m1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn snapshot_burst_arrives_in_store_order() {
    let hub = Hub::new();
    post(&hub, 12).await;
    let expected: Vec<_> = hub.messages(&general()).await.into_iter().map(|m| m.id).collect();

    let (feed, _task) = start(&hub, general());
    let snap = feed.snapshot().await.unwrap();
    assert_eq!(snap.order, expected);
    assert_eq!(snap.mode, ScrollMode::Following);
    assert_eq!(snap.metrics.distance_from_bottom(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn forced_window_keeps_feed_glued() {
    let hub = Hub::new();
    post(&hub, 10).await;
    let (feed, _task) = start(&hub, general());
    feed.snapshot().await.unwrap();

    // Past the connect window, the reader scrolls to the top.
    tokio::time::advance(Duration::from_millis(1500)).await;
    feed.user_scrolled(0.0);
    assert_eq!(feed.snapshot().await.unwrap().mode, ScrollMode::Reading);

    // New-messages button forces follow for 1200ms, even if the reader
    // scrolls away again inside the window.
    feed.jump_to_latest();
    tokio::time::advance(Duration::from_millis(1000)).await;
    feed.user_scrolled(0.0);
    feed.snapshot().await.unwrap();
    post(&hub, 1).await;
    let snap = feed.snapshot().await.unwrap();
    assert_eq!(snap.metrics.distance_from_bottom(), 0.0);
    assert!(!snap.new_messages_visible);

    // Once the window is over, reading position is preserved.
    tokio::time::advance(Duration::from_millis(300)).await;
    feed.user_scrolled(0.0);
    feed.snapshot().await.unwrap();
    post(&hub, 1).await;
    let snap = feed.snapshot().await.unwrap();
    assert_eq!(snap.mode, ScrollMode::Reading);
    assert_eq!(snap.metrics.scroll_top, 0.0);
    assert!(snap.new_messages_visible);
    assert_eq!(snap.order.len(), 12);
}

#[tokio::test(start_paused = true)]
async fn fault_triggers_clean_resubscription() {
    let hub = Hub::new();
    post(&hub, 3).await;
    let (feed, task) = start(&hub, general());
    feed.snapshot().await.unwrap();

    hub.inject_fault(&general(), "UNAVAILABLE").await;
    let snap = feed.snapshot().await.unwrap();
    assert!(!snap.connected);
    assert_eq!(snap.faults, 1);
    assert_eq!(snap.order.len(), 3);

    post(&hub, 1).await;
    tokio::time::advance(Duration::from_millis(600)).await;
    let snap = feed.snapshot().await.unwrap();
    assert!(snap.connected);
    assert_eq!(snap.order.len(), 4);

    feed.shutdown();
    let reconciler = task.await.unwrap();
    assert!(reconciler.feed().is_consistent());
    let lines = reconciler.feed().surface().lines();
    assert_eq!(lines[0], "-- CONNECTED");
    assert!(!lines.iter().any(|l| l.contains("CONNECTION_ERROR")));
}

#[tokio::test(start_paused = true)]
async fn room_switch_starts_from_empty_feed() {
    let hub = Hub::new();
    post(&hub, 2).await;
    let random = RoomRef::new("europe", "random");
    hub.send(&random, NewMessage::from_identity(&other(), "elsewhere"))
        .await
        .unwrap();

    let (feed, _task) = start(&hub, general());
    assert_eq!(feed.snapshot().await.unwrap().order.len(), 2);

    feed.switch_room(random.clone());
    let snap = feed.snapshot().await.unwrap();
    assert_eq!(snap.room, random);
    assert_eq!(snap.order.len(), 1);
    assert_eq!(hub.subscriber_count(&general()).await, 0);
}

#[tokio::test(start_paused = true)]
async fn own_send_lands_through_the_subscription() {
    let hub = Hub::new();
    post(&hub, 10).await;
    let (feed, _task) = start(&hub, general());
    feed.snapshot().await.unwrap();
    tokio::time::advance(Duration::from_secs(5)).await;
    feed.user_scrolled(0.0);
    assert_eq!(feed.snapshot().await.unwrap().mode, ScrollMode::Reading);

    let session = SessionContext::new(me(), general(), true);
    let mut composer =
        Composer::new(session, Arc::new(hub.clone()), ComposerConfig::default()).with_feed(feed.clone());

    let mut draft = Draft::text("hello");
    let Submission::Sent(id) = composer.submit(&mut draft).await.unwrap() else {
        panic!("expected a plain send");
    };

    let snap = feed.snapshot().await.unwrap();
    assert_eq!(snap.order.last(), Some(&id));
    assert_eq!(snap.order.iter().filter(|o| **o == id).count(), 1);
    assert_eq!(snap.mode, ScrollMode::Following);
    assert_eq!(snap.metrics.distance_from_bottom(), 0.0);
}
