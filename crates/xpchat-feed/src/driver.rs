use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use xpchat_types::collab::MessageStore;
use xpchat_types::models::{MessageId, RoomRef};

use crate::config::FeedConfig;
use crate::reconciler::Reconciler;
use crate::scroll::ScrollMode;
use crate::surface::{ScrollMetrics, Surface};

/// Requests from the rest of the console. The driver is the only writer of
/// feed state; everything else goes through these.
#[derive(Debug)]
pub enum FeedCommand {
    /// Reader moved the viewport to this `scroll_top`.
    UserScrolled(f64),
    JumpToLatest,
    ShowTyping(String),
    HideTyping,
    Notice(String),
    Snapshot(oneshot::Sender<FeedSnapshot>),
    SwitchRoom(RoomRef),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub room: RoomRef,
    pub order: Vec<MessageId>,
    pub mode: ScrollMode,
    pub new_messages_visible: bool,
    pub trailer_visible: bool,
    pub metrics: ScrollMetrics,
    pub connected: bool,
    /// Subscriptions lost since the driver started.
    pub faults: u32,
}

/// Cloneable sender side of a running [`FeedDriver`].
#[derive(Debug, Clone)]
pub struct FeedHandle {
    tx: mpsc::UnboundedSender<FeedCommand>,
}

impl FeedHandle {
    /// A handle and the receiving end a driver would own.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FeedCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn user_scrolled(&self, top: f64) {
        self.send(FeedCommand::UserScrolled(top));
    }

    pub fn jump_to_latest(&self) {
        self.send(FeedCommand::JumpToLatest);
    }

    pub fn show_typing(&self, label: impl Into<String>) {
        self.send(FeedCommand::ShowTyping(label.into()));
    }

    pub fn hide_typing(&self) {
        self.send(FeedCommand::HideTyping);
    }

    pub fn notice(&self, text: impl Into<String>) {
        self.send(FeedCommand::Notice(text.into()));
    }

    pub fn switch_room(&self, room: RoomRef) {
        self.send(FeedCommand::SwitchRoom(room));
    }

    pub fn shutdown(&self) {
        self.send(FeedCommand::Shutdown);
    }

    /// `None` once the driver has stopped.
    pub async fn snapshot(&self) -> Option<FeedSnapshot> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(FeedCommand::Snapshot(tx)).is_err() {
            return None;
        }
        rx.await.ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: FeedCommand) {
        if self.tx.send(command).is_err() {
            debug!("Feed driver stopped, dropping command");
        }
    }
}

/// Called after every change the driver made to the feed.
pub type Observer<S> = Box<dyn FnMut(&Reconciler<S>) + Send>;

/// Owns the room subscription and the reconciler for the lifetime of a
/// session.
///
/// Every (re)subscription starts from a cleared feed. When the stream faults
/// or ends, the driver reports it inline and resubscribes with exponential
/// backoff, serving commands while it waits.
pub struct FeedDriver<S: Surface> {
    store: Arc<dyn MessageStore>,
    room: RoomRef,
    reconciler: Reconciler<S>,
    config: FeedConfig,
    commands: mpsc::UnboundedReceiver<FeedCommand>,
    observer: Option<Observer<S>>,
    connected: bool,
    faults: u32,
}

enum Flow {
    Continue,
    Resubscribe,
    Stop,
}

impl<S: Surface> FeedDriver<S> {
    pub fn new(
        store: Arc<dyn MessageStore>,
        room: RoomRef,
        reconciler: Reconciler<S>,
        config: FeedConfig,
    ) -> (Self, FeedHandle) {
        let (handle, commands) = FeedHandle::channel();
        let driver = Self {
            store,
            room,
            reconciler,
            config,
            commands,
            observer: None,
            connected: false,
            faults: 0,
        };
        (driver, handle)
    }

    pub fn with_observer(mut self, observer: impl FnMut(&Reconciler<S>) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Run until shutdown or until every handle is dropped. Returns the
    /// reconciler so callers can inspect the final feed.
    pub async fn run(mut self) -> Reconciler<S> {
        let mut backoff = Backoff::new(self.config.reconnect_base, self.config.reconnect_max);

        'session: loop {
            self.reconciler.reset(Instant::now());
            let mut stream = self.store.subscribe(&self.room);
            self.connected = true;
            info!("Subscribed to room {}", self.room);
            self.observe();

            let code = loop {
                tokio::select! {
                    // Pending changes are applied before any command is served.
                    biased;
                    item = stream.next() => match item {
                        Some(Ok(event)) => {
                            backoff.reset();
                            let outcome = self.reconciler.apply(event, Instant::now());
                            debug!(?outcome, "Applied change to {}", self.room);
                            self.observe();
                        }
                        Some(Err(fault)) => {
                            warn!("Subscription to {} failed: {}", self.room, fault);
                            break fault.code;
                        }
                        None => {
                            warn!("Subscription to {} closed", self.room);
                            break "STREAM_CLOSED".to_string();
                        }
                    },
                    command = self.commands.recv() => match self.handle(command) {
                        Flow::Continue => {}
                        Flow::Resubscribe => {
                            backoff.reset();
                            continue 'session;
                        }
                        Flow::Stop => break 'session,
                    },
                }
            };
            drop(stream);

            self.connected = false;
            self.faults += 1;
            self.reconciler.notice(&format!("CONNECTION_ERROR: {code}"));
            self.observe();

            let delay = backoff.next_delay();
            debug!("Resubscribing to {} in {:?}", self.room, delay);
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut sleep => break,
                    command = self.commands.recv() => match self.handle(command) {
                        Flow::Continue => {}
                        Flow::Resubscribe => {
                            backoff.reset();
                            continue 'session;
                        }
                        Flow::Stop => break 'session,
                    },
                }
            }
        }

        info!("Feed for room {} stopped", self.room);
        self.reconciler
    }

    pub fn spawn(self) -> JoinHandle<Reconciler<S>>
    where
        S: Send + 'static,
        S::Node: Send,
    {
        tokio::spawn(self.run())
    }

    fn handle(&mut self, command: Option<FeedCommand>) -> Flow {
        let now = Instant::now();
        match command {
            None | Some(FeedCommand::Shutdown) => return Flow::Stop,
            Some(FeedCommand::SwitchRoom(room)) => {
                info!("Switching feed from {} to {}", self.room, room);
                self.room = room;
                return Flow::Resubscribe;
            }
            Some(FeedCommand::UserScrolled(top)) => {
                let surface = self.reconciler.feed_mut().surface_mut();
                surface.user_scroll(top);
                let metrics = surface.metrics();
                self.reconciler.user_scrolled(metrics);
            }
            Some(FeedCommand::JumpToLatest) => self.reconciler.jump_to_latest(now),
            Some(FeedCommand::ShowTyping(label)) => self.reconciler.show_typing(&label, now),
            Some(FeedCommand::HideTyping) => self.reconciler.hide_typing(),
            Some(FeedCommand::Notice(text)) => self.reconciler.notice(&text),
            Some(FeedCommand::Snapshot(reply)) => {
                let _ = reply.send(self.snapshot());
                return Flow::Continue;
            }
        }
        self.observe();
        Flow::Continue
    }

    fn snapshot(&self) -> FeedSnapshot {
        let feed = self.reconciler.feed();
        FeedSnapshot {
            room: self.room.clone(),
            order: feed.order().to_vec(),
            mode: self.reconciler.scroll().mode(),
            new_messages_visible: self.reconciler.scroll().affordance_visible(),
            trailer_visible: feed.has_trailer(),
            metrics: feed.surface().metrics(),
            connected: self.connected,
            faults: self.faults,
        }
    }

    fn observe(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&self.reconciler);
        }
    }
}

/// Resubscription delays: doubling from `base`, capped at `max`.
#[derive(Debug, Clone)]
struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            current: base,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.base;
    }
}
