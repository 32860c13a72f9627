//! Console orchestration.
//!
//! The console follows the auth state: a sign-in opens a session, checks
//! membership and, for members, starts a [`FeedDriver`] on the configured
//! room. A room switch moves the session and the feed together. Inputs are routed to the session's [`Composer`] or to the feed
//! handle, and every failure is turned into an inline notice.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use xpchat_feed::command::Command;
use xpchat_feed::{
    Composer, ComposerConfig, FeedConfig, FeedDriver, FeedHandle, FeedSnapshot, Reconciler,
    SessionContext, Submission, Surface,
};
use xpchat_types::collab::{Assistant, AuthProvider, MediaStore, MembershipStore, MessageStore};
use xpchat_types::models::{Draft, Identity, RoomRef};
use xpchat_types::{ChatError, ValidationError};

use crate::config::ConsoleConfig;

pub const ACCESS_DENIED_NOTICE: &str = "ACCESS_DENIED: invite required";
pub const AUTH_REQUIRED_NOTICE: &str = "AUTH_REQUIRED.";

/// Remote collaborators the console is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub auth: Arc<dyn AuthProvider>,
    pub membership: Arc<dyn MembershipStore>,
    pub store: Arc<dyn MessageStore>,
    pub media: Option<Arc<dyn MediaStore>>,
    pub assistant: Option<Arc<dyn Assistant>>,
}

type SurfaceFactory<S> = Box<dyn Fn() -> S + Send + Sync>;
type SharedObserver<S> = Arc<dyn Fn(&RoomRef, &Reconciler<S>) + Send + Sync>;

struct Session<S: Surface> {
    context: SessionContext,
    composer: Composer,
    feed: Option<RunningFeed<S>>,
}

struct RunningFeed<S: Surface> {
    handle: FeedHandle,
    task: JoinHandle<Reconciler<S>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftKind {
    Text,
    Assistant,
    Image,
}

pub struct Console<S: Surface> {
    room: RoomRef,
    feed_config: FeedConfig,
    composer_config: ComposerConfig,
    services: Collaborators,
    surfaces: SurfaceFactory<S>,
    observer: Option<SharedObserver<S>>,
    session: Option<Session<S>>,
    /// Draft left over by the last failed submit.
    pending: Option<Draft>,
    transcript: Vec<String>,
}

impl<S> Console<S>
where
    S: Surface + Send + 'static,
    S::Node: Send,
{
    pub fn new(
        config: &ConsoleConfig,
        services: Collaborators,
        surfaces: impl Fn() -> S + Send + Sync + 'static,
    ) -> Self {
        Self {
            room: config.room.clone(),
            feed_config: config.feed.clone(),
            composer_config: config.composer.clone(),
            services,
            surfaces: Box::new(surfaces),
            observer: None,
            session: None,
            pending: None,
            transcript: Vec::new(),
        }
    }

    /// Called after every change a feed driver makes, with the session's
    /// current room.
    pub fn with_observer(
        mut self,
        observer: impl Fn(&RoomRef, &Reconciler<S>) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn boot(&mut self) {
        self.notice("BOOT_OK");
        self.notice("TIP: @ia <prompt> • /help");
    }

    /// Every notice raised so far, including the ones shown while no feed
    /// was running.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn room(&self) -> &RoomRef {
        &self.room
    }

    pub fn pending(&self) -> Option<&Draft> {
        self.pending.as_ref()
    }

    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref().map(|s| &s.context)
    }

    pub fn feed(&self) -> Option<&FeedHandle> {
        self.session.as_ref()?.feed.as_ref().map(|f| &f.handle)
    }

    pub async fn snapshot(&self) -> Option<FeedSnapshot> {
        self.feed()?.snapshot().await
    }

    pub async fn sign_in(&mut self) -> Result<(), ChatError> {
        if let Err(err) = self.services.auth.sign_in().await {
            warn!("Sign-in failed: {}", err);
            self.notice(&format!("AUTH_FAILED: {}", err.code()));
            return Err(err);
        }
        self.sync_auth().await;
        Ok(())
    }

    pub async fn sign_out(&mut self) {
        if let Err(err) = self.services.auth.sign_out().await {
            warn!("Sign-out failed: {}", err);
            self.notice("LOGOUT_FAILED");
        }
        self.sync_auth().await;
    }

    /// Apply the auth provider's current identity.
    pub async fn sync_auth(&mut self) {
        let current = self.services.auth.watch().borrow().clone();
        self.auth_changed(current).await;
    }

    pub async fn auth_changed(&mut self, identity: Option<Identity>) {
        let same = match (&self.session, &identity) {
            (Some(session), Some(identity)) => session.context.identity().id == identity.id,
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }

        if self.session.is_some() {
            self.end_session().await;
            self.notice("DISCONNECTED");
        }
        if let Some(identity) = identity {
            self.open_session(identity).await;
        }
    }

    /// Redeem an invite code for the signed-in identity, then start the feed.
    pub async fn join(&mut self, code: &str) -> Result<(), ChatError> {
        let Some(identity) = self.session.as_ref().map(|s| s.context.identity().clone()) else {
            self.notice(AUTH_REQUIRED_NOTICE);
            return Err(ChatError::AuthRequired);
        };

        let outcome = self
            .services
            .membership
            .redeem_invite(&self.room.space_id, code, Some(&identity))
            .await;
        match outcome {
            Ok(outcome) => {
                self.notice(if outcome.already { "ALREADY_MEMBER" } else { "INVITE_OK" });
                if let Some(session) = &self.session {
                    session.context.set_member(true);
                }
                self.start_feed();
                Ok(())
            }
            Err(err) => {
                warn!("Invite redemption for {} failed: {}", identity.id, err);
                self.notice(&format!("INVITE_FAILED: {}", err.code()));
                Err(err)
            }
        }
    }

    pub async fn submit(&mut self, draft: &mut Draft) -> Result<Submission, ChatError> {
        let Some(member) = self.session.as_ref().map(|s| s.context.is_member()) else {
            self.notice(AUTH_REQUIRED_NOTICE);
            return Err(ChatError::AuthRequired);
        };

        let kind = if draft.media.is_some() {
            DraftKind::Image
        } else if matches!(Command::parse(&draft.body), Command::Assistant(_)) {
            DraftKind::Assistant
        } else {
            DraftKind::Text
        };
        if kind == DraftKind::Image && member {
            self.notice("UPLOAD_IMAGE...");
        }

        let result = match self.session.as_mut() {
            Some(session) => session.composer.submit(draft).await,
            None => Err(ChatError::AuthRequired),
        };

        match &result {
            Ok(Submission::Sent(id)) => {
                debug!("Draft sent as {id}");
                if kind == DraftKind::Image {
                    self.notice("IMAGE_OK");
                }
            }
            Ok(Submission::Info(text)) => self.notice(text),
            Ok(Submission::Assistant { outcome, .. }) => match outcome {
                Ok(_) => self.notice("AI_OK"),
                Err(ChatError::Timeout) => self.notice("AI_TIMEOUT"),
                Err(err) => self.notice(&format!("AI_FAILED: {}", err.code())),
            },
            Err(err) => {
                if let Some(text) = failure_notice(kind, err) {
                    self.notice(&text);
                }
            }
        }
        self.pending = match &result {
            Err(_) if !draft.is_blank() => Some(draft.clone()),
            _ => None,
        };
        result
    }

    /// Submit the draft kept after the last failure again.
    pub async fn retry(&mut self) -> Result<Submission, ChatError> {
        let Some(mut draft) = self.pending.take() else {
            self.notice("NOTHING_TO_RETRY");
            return Err(ValidationError::EmptyBody.into());
        };
        self.submit(&mut draft).await
    }

    pub async fn react(&mut self, message_id: &str, emoji: &str) -> Result<(), ChatError> {
        let result = match &self.session {
            Some(session) => session.composer.react(message_id, emoji).await,
            None => Err(ChatError::AuthRequired),
        };
        if let Err(err) = &result {
            let text = access_notice(err).unwrap_or_else(|| format!("REACTION_FAILED: {}", err.code()));
            self.notice(&text);
        }
        result
    }

    pub async fn delete(&mut self, message_id: &str) -> Result<(), ChatError> {
        let result = match &self.session {
            Some(session) => session.composer.delete(message_id).await,
            None => Err(ChatError::AuthRequired),
        };
        if let Err(err) = &result {
            let text = access_notice(err).unwrap_or_else(|| format!("DELETE_FAILED: {}", err.code()));
            self.notice(&text);
        }
        result
    }

    pub fn scroll_to(&self, top: f64) {
        if let Some(feed) = self.feed() {
            feed.user_scrolled(top);
        }
    }

    pub fn jump_to_latest(&self) {
        if let Some(feed) = self.feed() {
            feed.jump_to_latest();
        }
    }

    pub fn set_online(&self, online: bool) {
        if let Some(session) = &self.session {
            session.context.set_online(online);
        }
    }

    /// Stop the feed and end the session. Returns the last reconciler, if a
    /// feed was running.
    pub async fn shutdown(&mut self) -> Option<Reconciler<S>> {
        let reconciler = self.end_session().await;
        info!("Console stopped");
        reconciler
    }

    async fn open_session(&mut self, identity: Identity) {
        self.notice(&format!("AUTH_OK: {}", identity.display_name));
        self.notice("CHECKING_ACCESS...");

        let member = self
            .services
            .membership
            .is_member(&self.room.space_id, &identity.id)
            .await;

        let context = SessionContext::new(identity, self.room.clone(), false);
        let mut composer = Composer::new(
            context.clone(),
            self.services.store.clone(),
            self.composer_config.clone(),
        );
        if let Some(assistant) = &self.services.assistant {
            composer = composer.with_assistant(assistant.clone());
        }
        if let Some(media) = &self.services.media {
            composer = composer.with_media(media.clone());
        }
        self.session = Some(Session {
            context: context.clone(),
            composer,
            feed: None,
        });

        self.apply_access(member);
    }

    /// Move the session to another room. The composer writes where the feed
    /// reads: both follow the shared session context. Changing space checks
    /// membership again.
    pub async fn switch_room(&mut self, room: RoomRef) {
        if room == self.room {
            return;
        }
        info!("Switching room from {} to {}", self.room, room);
        let space_changed = room.space_id != self.room.space_id;
        self.room = room.clone();

        let Some(session) = &self.session else {
            return;
        };
        session.context.set_room(room.clone());

        if space_changed {
            session.context.set_member(false);
            let user = session.context.identity().id.clone();
            self.stop_feed().await;
            let member = self.services.membership.is_member(&room.space_id, &user).await;
            self.apply_access(member);
        } else if let Some(feed) = &session.feed {
            feed.handle.switch_room(room.clone());
        }
        self.notice(&format!("ROOM_CONNECTED: {}", room.room_id));
    }

    fn apply_access(&mut self, member: Result<bool, ChatError>) {
        let Some(context) = self.session.as_ref().map(|s| s.context.clone()) else {
            return;
        };
        match member {
            Ok(true) => {
                context.set_member(true);
                self.notice("ACCESS_OK");
                self.start_feed();
            }
            Ok(false) => self.notice(ACCESS_DENIED_NOTICE),
            Err(err) => {
                warn!("Membership check failed: {}", err);
                self.notice("ACCESS_DENIED");
            }
        }
    }

    fn start_feed(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.feed.is_some() {
            return;
        }

        let viewer = Some(session.context.identity().id.clone());
        let reconciler = Reconciler::new((self.surfaces)(), viewer, self.feed_config.clone());
        let (mut driver, handle) = FeedDriver::new(
            self.services.store.clone(),
            session.context.room(),
            reconciler,
            self.feed_config.clone(),
        );
        if let Some(observer) = &self.observer {
            let observer = observer.clone();
            let context = session.context.clone();
            driver = driver.with_observer(move |reconciler| observer(&context.room(), reconciler));
        }

        session.composer.set_feed(Some(handle.clone()));
        session.feed = Some(RunningFeed {
            handle,
            task: driver.spawn(),
        });
        info!("Feed started for {}", session.context.room());
    }

    async fn end_session(&mut self) -> Option<Reconciler<S>> {
        let reconciler = self.stop_feed().await;
        if let Some(session) = self.session.take() {
            session.context.end();
        }
        reconciler
    }

    async fn stop_feed(&mut self) -> Option<Reconciler<S>> {
        let session = self.session.as_mut()?;
        session.composer.set_feed(None);

        let feed = session.feed.take()?;
        feed.handle.shutdown();
        match feed.task.await {
            Ok(reconciler) => Some(reconciler),
            Err(err) => {
                warn!("Feed task ended abnormally: {}", err);
                None
            }
        }
    }

    fn notice(&mut self, text: &str) {
        debug!("Notice: {text}");
        self.transcript.push(text.to_string());
        if let Some(feed) = self.feed() {
            feed.notice(text);
        }
    }
}

fn access_notice(err: &ChatError) -> Option<String> {
    match err {
        ChatError::AuthRequired => Some(AUTH_REQUIRED_NOTICE.into()),
        ChatError::AccessDenied => Some(ACCESS_DENIED_NOTICE.into()),
        _ => None,
    }
}

fn failure_notice(kind: DraftKind, err: &ChatError) -> Option<String> {
    if let Some(text) = access_notice(err) {
        return Some(text);
    }
    let text = match err {
        ChatError::ValidationFailed(ValidationError::EmptyBody) => return None,
        ChatError::ValidationFailed(ValidationError::EmptyPrompt) => "AI_USAGE: @ia <prompt>".into(),
        ChatError::RateLimited { retry_after } => {
            format!("SLOWMODE {:.1}s", retry_after.as_secs_f64())
        }
        _ => match kind {
            DraftKind::Image => format!("IMAGE_FAILED: {}", err.code()),
            DraftKind::Text | DraftKind::Assistant => format!("SEND_FAILED: {}", err.code()),
        },
    };
    Some(text)
}
