use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use xpchat_types::ChatError;
use xpchat_types::collab::{EventStream, MessageStore};
use xpchat_types::events::{ChangeEvent, StreamFault};
use xpchat_types::models::{MAX_BODY_LEN, Message, MessageId, NewMessage, ReactionKind, RoomRef};

/// Per-room broadcast capacity. A subscriber that falls further behind is
/// cut off with a `LAGGED` fault.
const ROOM_CHANNEL_CAPACITY: usize = 1024;

/// A new subscription starts with at most this many of the latest messages.
pub const SNAPSHOT_WINDOW: usize = 120;

#[derive(Debug, Clone)]
enum RoomSignal {
    Change(ChangeEvent),
    Fault(StreamFault),
}

struct RoomLog {
    /// Sorted by `created_at`.
    messages: Vec<Message>,
    tx: broadcast::Sender<RoomSignal>,
    last_created_at: Option<DateTime<Utc>>,
}

impl RoomLog {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            messages: Vec::new(),
            tx,
            last_created_at: None,
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    /// Strictly increasing server timestamp.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let at = match self.last_created_at {
            Some(last) if now <= last => last + ChronoDuration::milliseconds(1),
            _ => now,
        };
        self.last_created_at = Some(at);
        at
    }

    fn publish(&self, signal: RoomSignal) {
        // No subscribers is fine.
        let _ = self.tx.send(signal);
    }
}

/// Shared in-memory message store. Clones share the same rooms.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    rooms: RwLock<HashMap<RoomRef, RoomLog>>,
    capacity: usize,
    max_body_len: usize,
}

impl Hub {
    pub fn new() -> Self {
        Self::with_capacity(ROOM_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                rooms: RwLock::new(HashMap::new()),
                capacity,
                max_body_len: MAX_BODY_LEN,
            }),
        }
    }

    /// Messages of a room in order.
    pub async fn messages(&self, room: &RoomRef) -> Vec<Message> {
        self.inner
            .rooms
            .read()
            .await
            .get(room)
            .map(|log| log.messages.clone())
            .unwrap_or_default()
    }

    pub async fn subscriber_count(&self, room: &RoomRef) -> usize {
        self.inner
            .rooms
            .read()
            .await
            .get(room)
            .map_or(0, |log| log.tx.receiver_count())
    }

    /// Deliver a raw change to every subscriber without touching the log.
    pub async fn inject(&self, room: &RoomRef, event: ChangeEvent) {
        self.with_room(room, |log| log.publish(RoomSignal::Change(event)))
            .await;
    }

    /// Fail every current subscription of `room` with `code`.
    pub async fn inject_fault(&self, room: &RoomRef, code: &str) {
        warn!("Injecting fault {code} into room {room}");
        let fault = StreamFault::new(code, "injected transport failure");
        self.with_room(room, |log| log.publish(RoomSignal::Fault(fault)))
            .await;
    }

    async fn with_room<T>(&self, room: &RoomRef, f: impl FnOnce(&mut RoomLog) -> T) -> T {
        let mut rooms = self.inner.rooms.write().await;
        let log = rooms
            .entry(room.clone())
            .or_insert_with(|| RoomLog::new(self.inner.capacity));
        f(log)
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for Hub {
    fn subscribe(&self, room: &RoomRef) -> EventStream {
        let inner = self.inner.clone();
        let room = room.clone();

        Box::pin(async_stream::stream! {
            // Snapshot and receiver are taken under the same lock so no change
            // is missed or seen twice.
            let (snapshot, mut rx) = {
                let mut rooms = inner.rooms.write().await;
                let log = rooms
                    .entry(room.clone())
                    .or_insert_with(|| RoomLog::new(inner.capacity));
                let start = log.messages.len().saturating_sub(SNAPSHOT_WINDOW);
                (log.messages[start..].to_vec(), log.tx.subscribe())
            };
            debug!("Subscriber joined {room} ({} messages in snapshot)", snapshot.len());

            for (index, message) in snapshot.iter().enumerate() {
                yield Ok(ChangeEvent::added(message, Some(index)));
            }

            loop {
                match rx.recv().await {
                    Ok(RoomSignal::Change(event)) => yield Ok(event),
                    Ok(RoomSignal::Fault(fault)) => {
                        yield Err(fault);
                        break;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Subscriber of {room} lagged by {missed} changes");
                        yield Err(StreamFault::new("LAGGED", format!("missed {missed} changes")));
                        break;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn send(&self, room: &RoomRef, message: NewMessage) -> Result<MessageId, ChatError> {
        let len = message.body.chars().count();
        if len > self.inner.max_body_len {
            return Err(ChatError::backend(
                "MESSAGE_TOO_LONG",
                format!("{len} chars, max {}", self.inner.max_body_len),
            ));
        }
        if message.body.trim().is_empty() && message.media_ref.is_none() {
            return Err(ChatError::backend("EMPTY_MESSAGE", "body or image required"));
        }

        let id = Uuid::new_v4().to_string();
        self.with_room(room, |log| {
            let stored = Message {
                id: id.clone(),
                author_id: message.author_id,
                actor: message.actor,
                display_name: message.display_name,
                avatar_ref: message.avatar_ref,
                body: message.body,
                media_ref: message.media_ref,
                reactions: Default::default(),
                created_at: log.next_created_at(),
            };
            log.messages.push(stored);
            let index = log.messages.len() - 1;
            log.publish(RoomSignal::Change(ChangeEvent::added(
                &log.messages[index],
                Some(index),
            )));
        })
        .await;

        info!("Stored message {id} in {room}");
        Ok(id)
    }

    async fn delete(&self, room: &RoomRef, id: &str) -> Result<(), ChatError> {
        self.with_room(room, |log| {
            let index = log
                .position(id)
                .ok_or_else(|| ChatError::backend("NOT_FOUND", format!("no message {id}")))?;
            log.messages.remove(index);
            log.publish(RoomSignal::Change(ChangeEvent::removed(id)));
            Ok(())
        })
        .await
    }

    async fn react(
        &self,
        room: &RoomRef,
        id: &str,
        reactor: &str,
        kind: ReactionKind,
    ) -> Result<(), ChatError> {
        self.with_room(room, |log| {
            let index = log
                .position(id)
                .ok_or_else(|| ChatError::backend("NOT_FOUND", format!("no message {id}")))?;
            log.messages[index].reactions.toggle(kind, reactor);
            log.publish(RoomSignal::Change(ChangeEvent::modified(
                &log.messages[index],
                Some(index),
            )));
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use xpchat_types::events::ChangeKind;
    use xpchat_types::models::Identity;

    use super::*;

    fn room() -> RoomRef {
        RoomRef::new("europe", "general")
    }

    fn say(body: &str) -> NewMessage {
        NewMessage::from_identity(&Identity::new("u1", "ana"), body)
    }

    #[tokio::test]
    async fn snapshot_then_live_changes() {
        let hub = Hub::new();
        let first = hub.send(&room(), say("one")).await.unwrap();

        let mut stream = hub.subscribe(&room());
        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.kind, ChangeKind::Added);
        assert_eq!(event.id.as_deref(), Some(first.as_str()));
        assert_eq!(event.position_hint, Some(0));

        let second = hub.send(&room(), say("two")).await.unwrap();
        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.id, Some(second));
        assert_eq!(event.position_hint, Some(1));
    }

    #[tokio::test]
    async fn react_and_delete_are_broadcast() {
        let hub = Hub::new();
        let id = hub.send(&room(), say("hi")).await.unwrap();
        let mut stream = hub.subscribe(&room());
        stream.next().await.unwrap().unwrap();

        hub.react(&room(), &id, "u2", ReactionKind::Like).await.unwrap();
        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.kind, ChangeKind::Modified);
        assert_eq!(event.payload.unwrap().reactions.count(ReactionKind::Like), 1);

        hub.delete(&room(), &id).await.unwrap();
        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event, ChangeEvent::removed(id.clone()));

        let err = hub.delete(&room(), &id).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn fault_ends_the_stream() {
        let hub = Hub::new();
        let mut stream = hub.subscribe(&room());
        // Poll once so the subscription is registered.
        let pending = tokio::time::timeout(std::time::Duration::from_millis(10), stream.next()).await;
        assert!(pending.is_err());

        hub.inject_fault(&room(), "UNAVAILABLE").await;
        let fault = stream.next().await.unwrap().unwrap_err();
        assert_eq!(fault.code, "UNAVAILABLE");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn oversize_and_empty_bodies_are_rejected() {
        let hub = Hub::new();
        let err = hub.send(&room(), say(&"x".repeat(801))).await.unwrap_err();
        assert_eq!(err.code(), "MESSAGE_TOO_LONG");
        let err = hub.send(&room(), say("  ")).await.unwrap_err();
        assert_eq!(err.code(), "EMPTY_MESSAGE");
        assert!(hub.messages(&room()).await.is_empty());
    }

    #[tokio::test]
    async fn snapshot_is_limited_to_latest_window() {
        let hub = Hub::new();
        for i in 0..SNAPSHOT_WINDOW + 5 {
            hub.send(&room(), say(&i.to_string())).await.unwrap();
        }
        let stream = hub.subscribe(&room());
        let first: Vec<_> = stream.take(SNAPSHOT_WINDOW).collect().await;
        let first = first[0].as_ref().unwrap();
        assert_eq!(first.payload.as_ref().unwrap().body, "5");
        assert_eq!(first.position_hint, Some(0));
    }

    #[tokio::test]
    async fn created_at_is_strictly_increasing() {
        let hub = Hub::new();
        for i in 0..20 {
            hub.send(&room(), say(&i.to_string())).await.unwrap();
        }
        let messages = hub.messages(&room()).await;
        assert!(messages.windows(2).all(|w| w[0].created_at < w[1].created_at));
    }
}
