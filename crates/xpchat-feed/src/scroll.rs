use std::time::Duration;

use tokio::time::Instant;

use crate::surface::ScrollMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollMode {
    /// Viewport tracks new content.
    Following,
    /// Reader scrolled away; position is held.
    Reading,
}

/// What to do with the viewport after a reconciled change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderDecision {
    ScrollToBottom,
    Hold { show_affordance: bool },
}

/// Decides whether the viewport follows new content or keeps the reader's
/// position.
///
/// A forced window (`force_stick`) keeps the feed glued to the bottom while a
/// burst of individual `added` events lands, whatever the reader does.
#[derive(Debug, Clone)]
pub struct StickinessController {
    mode: ScrollMode,
    threshold_px: f64,
    default_window: Duration,
    stick_until: Option<Instant>,
    affordance_visible: bool,
}

impl StickinessController {
    pub fn new(threshold_px: f64, default_window: Duration) -> Self {
        Self {
            mode: ScrollMode::Following,
            threshold_px,
            default_window,
            stick_until: None,
            affordance_visible: false,
        }
    }

    pub fn mode(&self) -> ScrollMode {
        self.mode
    }

    pub fn affordance_visible(&self) -> bool {
        self.affordance_visible
    }

    pub fn on_user_scroll(&mut self, metrics: ScrollMetrics) -> ScrollMode {
        if metrics.distance_from_bottom() > self.threshold_px {
            self.mode = ScrollMode::Reading;
        } else {
            self.mode = ScrollMode::Following;
            self.affordance_visible = false;
        }
        self.mode
    }

    /// Force Following until at least `now + duration`. Never shortens a
    /// window already in force.
    pub fn force_stick(&mut self, now: Instant, duration: Duration) {
        let until = now + duration;
        self.stick_until = Some(match self.stick_until {
            Some(current) if current > until => current,
            _ => until,
        });
        self.mode = ScrollMode::Following;
        self.affordance_visible = false;
    }

    pub fn is_forced(&self, now: Instant) -> bool {
        self.stick_until.is_some_and(|until| now < until)
    }

    /// Back to Following without opening a forced window.
    pub fn follow(&mut self) {
        self.mode = ScrollMode::Following;
        self.affordance_visible = false;
    }

    /// The "new messages" button.
    pub fn jump_to_latest(&mut self, now: Instant) {
        self.force_stick(now, self.default_window);
    }

    /// Render policy applied after every reconciled change.
    pub fn after_batch(&mut self, now: Instant, content_added: bool) -> RenderDecision {
        if self.mode == ScrollMode::Following || self.is_forced(now) {
            self.affordance_visible = false;
            return RenderDecision::ScrollToBottom;
        }
        if content_added {
            self.affordance_visible = true;
        }
        RenderDecision::Hold {
            show_affordance: self.affordance_visible,
        }
    }
}

impl Default for StickinessController {
    fn default() -> Self {
        Self::new(180.0, Duration::from_millis(1200))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn away(distance: f64) -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: 1000.0 - 300.0 - distance,
            scroll_height: 1000.0,
            client_height: 300.0,
        }
    }

    #[test]
    fn threshold_switches_modes() {
        let mut ctl = StickinessController::default();
        assert_eq!(ctl.on_user_scroll(away(181.0)), ScrollMode::Reading);
        assert_eq!(ctl.on_user_scroll(away(180.0)), ScrollMode::Following);
    }

    #[test]
    fn reading_holds_and_shows_affordance() {
        let now = Instant::now();
        let mut ctl = StickinessController::default();
        ctl.on_user_scroll(away(500.0));

        assert_eq!(
            ctl.after_batch(now, false),
            RenderDecision::Hold { show_affordance: false }
        );
        assert_eq!(
            ctl.after_batch(now, true),
            RenderDecision::Hold { show_affordance: true }
        );

        ctl.on_user_scroll(away(0.0));
        assert!(!ctl.affordance_visible());
    }

    #[test]
    fn forced_window_overrides_reading() {
        let t0 = Instant::now();
        let mut ctl = StickinessController::default();
        ctl.force_stick(t0, Duration::from_millis(1200));
        ctl.on_user_scroll(away(900.0));

        assert_eq!(
            ctl.after_batch(t0 + Duration::from_millis(1199), true),
            RenderDecision::ScrollToBottom
        );
        assert_eq!(
            ctl.after_batch(t0 + Duration::from_millis(1200), true),
            RenderDecision::Hold { show_affordance: true }
        );
    }

    #[test]
    fn shorter_force_does_not_cut_window() {
        let t0 = Instant::now();
        let mut ctl = StickinessController::default();
        ctl.force_stick(t0, Duration::from_secs(5));
        ctl.force_stick(t0, Duration::from_millis(10));
        assert!(ctl.is_forced(t0 + Duration::from_secs(4)));
    }
}
