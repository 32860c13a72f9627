//! Realtime ordered feed for one chat room.
//!
//! Inbound, a [`driver::FeedDriver`] owns the room subscription and feeds every
//! change through the [`reconciler::Reconciler`] into [`feed_state::FeedState`],
//! which owns the rendered nodes on a [`surface::Surface`]. Outbound, the
//! [`composer::Composer`] validates drafts and writes them to the message store
//! without rendering anything itself: the echoed `added` change is the only way
//! a message reaches the feed.

pub mod command;
pub mod composer;
pub mod config;
pub mod driver;
pub mod feed_state;
pub mod reconciler;
pub mod scroll;
pub mod session;
pub mod surface;
pub mod view;

pub use composer::{Composer, Submission};
pub use config::{ComposerConfig, FeedConfig};
pub use driver::{FeedCommand, FeedDriver, FeedHandle, FeedSnapshot};
pub use feed_state::FeedState;
pub use reconciler::{ApplyOutcome, Reconciler};
pub use scroll::{RenderDecision, ScrollMode, StickinessController};
pub use session::SessionContext;
pub use surface::{Anchor, ScrollMetrics, Surface, TextSurface};
