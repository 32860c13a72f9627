use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};
use xpchat_types::ChatError;
use xpchat_types::events::{ChangeEvent, ChangeKind};
use xpchat_types::models::ActorKind;

use crate::config::FeedConfig;
use crate::feed_state::FeedState;
use crate::scroll::{RenderDecision, ScrollMode, StickinessController};
use crate::surface::{ScrollMetrics, Surface};

/// What a single change did to the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted { index: usize },
    Repainted,
    Removed,
    /// `removed` for an id that is not in the feed.
    Ignored,
    Dropped(ChatError),
}

/// Applies room changes to the feed, one at a time and in delivery order,
/// then runs the scroll policy.
pub struct Reconciler<S: Surface> {
    feed: FeedState<S>,
    scroll: StickinessController,
    viewer: Option<String>,
    config: FeedConfig,
}

impl<S: Surface> Reconciler<S> {
    pub fn new(surface: S, viewer: Option<String>, config: FeedConfig) -> Self {
        Self {
            feed: FeedState::new(surface),
            scroll: StickinessController::new(config.near_bottom_px, config.stick_window),
            viewer,
            config,
        }
    }

    pub fn apply(&mut self, event: ChangeEvent, now: Instant) -> ApplyOutcome {
        let Some(id) = event.id.filter(|id| !id.is_empty()) else {
            warn!("Dropping {:?} change without id", event.kind);
            return ApplyOutcome::Dropped(ChatError::MalformedEvent("missing id".into()));
        };

        if event.kind == ChangeKind::Removed {
            let removed = self.feed.remove(&id);
            self.render_policy(now, false);
            return if removed {
                ApplyOutcome::Removed
            } else {
                debug!("Ignoring removal of unknown message {id}");
                ApplyOutcome::Ignored
            };
        }

        let Some(payload) = event.payload else {
            warn!("Dropping {:?} change for {id} without payload", event.kind);
            return ApplyOutcome::Dropped(ChatError::MalformedEvent(format!(
                "missing payload for {id}"
            )));
        };

        let message = payload.into_message(id.clone(), Utc::now());
        if message.actor == ActorKind::Assistant {
            self.feed.hide_trailer();
        }
        let own_send = event.kind == ChangeKind::Added
            && self.viewer.as_deref().is_some_and(|me| message.is_from(me));

        let node = self.feed.render(&message, self.viewer.as_deref());
        let outcome = if self.feed.has(&id) {
            self.feed.replace(message, node);
            ApplyOutcome::Repainted
        } else {
            if event.kind == ChangeKind::Modified {
                debug!("Modification of unseen message {id}, inserting");
            }
            let index = self.feed.insert_at(message, node, event.position_hint);
            ApplyOutcome::Inserted { index }
        };

        if own_send {
            self.scroll.force_stick(now, self.config.own_send_window);
        }
        let added = matches!(outcome, ApplyOutcome::Inserted { .. });
        self.render_policy(now, added);
        outcome
    }

    pub fn user_scrolled(&mut self, metrics: ScrollMetrics) -> ScrollMode {
        let mode = self.scroll.on_user_scroll(metrics);
        self.sync_affordance();
        mode
    }

    pub fn jump_to_latest(&mut self, now: Instant) {
        self.scroll.jump_to_latest(now);
        self.render_policy(now, false);
    }

    /// Inline system line. Notices always bring the reader to the bottom,
    /// which puts the controller back in Following.
    pub fn notice(&mut self, text: &str) {
        self.feed.push_notice(text);
        self.scroll.follow();
        self.feed.surface_mut().scroll_to_bottom();
        self.sync_affordance();
    }

    pub fn show_typing(&mut self, label: &str, now: Instant) {
        if self.feed.show_trailer(label) {
            self.render_policy(now, false);
        }
    }

    pub fn hide_typing(&mut self) {
        self.feed.hide_trailer();
    }

    /// Start over for a fresh subscription.
    pub fn reset(&mut self, now: Instant) {
        self.feed.clear();
        self.notice("CONNECTED");
        self.scroll.force_stick(now, self.config.stick_window);
        self.sync_affordance();
    }

    pub fn viewer(&self) -> Option<&str> {
        self.viewer.as_deref()
    }

    pub fn feed(&self) -> &FeedState<S> {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut FeedState<S> {
        &mut self.feed
    }

    pub fn scroll(&self) -> &StickinessController {
        &self.scroll
    }

    fn render_policy(&mut self, now: Instant, content_added: bool) {
        if self.scroll.after_batch(now, content_added) == RenderDecision::ScrollToBottom {
            self.feed.surface_mut().scroll_to_bottom();
        }
        self.sync_affordance();
    }

    fn sync_affordance(&mut self) {
        let visible = self.scroll.affordance_visible();
        self.feed.surface_mut().set_new_messages_visible(visible);
    }
}
