use std::collections::HashMap;

use xpchat_types::models::MessageId;

use crate::view::MessageView;

/// Viewport geometry, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - (self.scroll_top + self.client_height)).max(0.0)
    }
}

/// Where to attach a node.
#[derive(Debug)]
pub enum Anchor<'a, N> {
    Before(&'a N),
    End,
}

/// The rendering backend the feed draws on (a DOM container in the browser,
/// a line buffer in tests and in the terminal).
///
/// Nodes are built detached; [`crate::feed_state::FeedState`] decides where
/// they go and when they are destroyed.
pub trait Surface {
    type Node;

    fn build_message(&mut self, view: &MessageView) -> Self::Node;

    /// Inline system line (status, errors, command output).
    fn build_notice(&mut self, text: &str) -> Self::Node;

    /// "typing" indicator that stays the last visual element.
    fn build_trailer(&mut self, label: &str) -> Self::Node;

    fn attach(&mut self, node: &Self::Node, anchor: Anchor<'_, Self::Node>);

    /// Put `new` where `old` is and destroy `old`.
    fn swap(&mut self, old: &Self::Node, new: &Self::Node);

    /// Remove and destroy a node. Unknown nodes are ignored.
    fn detach(&mut self, node: &Self::Node);

    fn metrics(&self) -> ScrollMetrics;

    /// The reader moved the viewport to `top`. A real viewport has already
    /// moved by the time this is called, hence the no-op default.
    fn user_scroll(&mut self, _top: f64) {}

    fn scroll_to_bottom(&mut self);

    fn set_new_messages_visible(&mut self, visible: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Message(MessageId),
    Notice,
    Trailer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: RowId,
    pub kind: RowKind,
    pub text: String,
}

/// In-memory line surface with a simulated viewport. Every row has the same
/// height.
#[derive(Debug)]
pub struct TextSurface {
    rows: Vec<Row>,
    detached: HashMap<RowId, Row>,
    next_id: u64,
    row_height: f64,
    client_height: f64,
    scroll_top: f64,
    new_messages_visible: bool,
    scroll_to_bottom_calls: usize,
}

impl TextSurface {
    pub const DEFAULT_ROW_HEIGHT: f64 = 40.0;

    pub fn new(client_height: f64) -> Self {
        Self::with_row_height(client_height, Self::DEFAULT_ROW_HEIGHT)
    }

    pub fn with_row_height(client_height: f64, row_height: f64) -> Self {
        Self {
            rows: Vec::new(),
            detached: HashMap::new(),
            next_id: 1,
            row_height,
            client_height,
            scroll_top: 0.0,
            new_messages_visible: false,
            scroll_to_bottom_calls: 0,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn lines(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.text.as_str()).collect()
    }

    /// Message ids in visual order.
    pub fn message_ids(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|r| match &r.kind {
                RowKind::Message(id) => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Rows intersecting the viewport.
    pub fn visible_lines(&self) -> Vec<&str> {
        let first = (self.scroll_top / self.row_height).floor() as usize;
        let count = (self.client_height / self.row_height).ceil() as usize;
        self.rows
            .iter()
            .skip(first)
            .take(count)
            .map(|r| r.text.as_str())
            .collect()
    }

    /// Simulate the reader scrolling. The position is clamped to the content.
    pub fn scroll_to(&mut self, top: f64) -> ScrollMetrics {
        self.scroll_top = top.clamp(0.0, self.max_scroll_top());
        self.metrics()
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn new_messages_visible(&self) -> bool {
        self.new_messages_visible
    }

    pub fn scroll_to_bottom_calls(&self) -> usize {
        self.scroll_to_bottom_calls
    }

    fn max_scroll_top(&self) -> f64 {
        (self.content_height() - self.client_height).max(0.0)
    }

    fn content_height(&self) -> f64 {
        self.rows.len() as f64 * self.row_height
    }

    fn build(&mut self, kind: RowKind, text: String) -> RowId {
        let id = RowId(self.next_id);
        self.next_id += 1;
        self.detached.insert(id, Row { id, kind, text });
        id
    }

    fn take(&mut self, id: RowId) -> Option<Row> {
        if let Some(row) = self.detached.remove(&id) {
            return Some(row);
        }
        let pos = self.rows.iter().position(|r| r.id == id)?;
        Some(self.rows.remove(pos))
    }
}

impl Surface for TextSurface {
    type Node = RowId;

    fn build_message(&mut self, view: &MessageView) -> RowId {
        self.build(RowKind::Message(view.id.clone()), format_message(view))
    }

    fn build_notice(&mut self, text: &str) -> RowId {
        self.build(RowKind::Notice, format!("-- {text}"))
    }

    fn build_trailer(&mut self, label: &str) -> RowId {
        self.build(RowKind::Trailer, format!("{label} is typing..."))
    }

    fn attach(&mut self, node: &RowId, anchor: Anchor<'_, RowId>) {
        let Some(row) = self.take(*node) else {
            return;
        };
        let pos = match anchor {
            Anchor::Before(before) => self
                .rows
                .iter()
                .position(|r| r.id == *before)
                .unwrap_or(self.rows.len()),
            Anchor::End => self.rows.len(),
        };
        self.rows.insert(pos, row);
    }

    fn swap(&mut self, old: &RowId, new: &RowId) {
        let Some(row) = self.detached.remove(new) else {
            return;
        };
        match self.rows.iter().position(|r| r.id == *old) {
            Some(pos) => self.rows[pos] = row,
            None => {
                self.detached.remove(old);
                self.rows.push(row);
            }
        }
    }

    fn detach(&mut self, node: &RowId) {
        self.take(*node);
        self.scroll_top = self.scroll_top.min(self.max_scroll_top());
    }

    fn metrics(&self) -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: self.scroll_top,
            scroll_height: self.content_height(),
            client_height: self.client_height,
        }
    }

    fn user_scroll(&mut self, top: f64) {
        self.scroll_to(top);
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll_top = self.max_scroll_top();
        self.scroll_to_bottom_calls += 1;
    }

    fn set_new_messages_visible(&mut self, visible: bool) {
        self.new_messages_visible = visible;
    }
}

fn format_message(view: &MessageView) -> String {
    let mut line = String::new();
    if view.is_mine {
        line.push_str("> ");
    }
    line.push_str(&view.author_name);
    if let Some(badge) = view.badge {
        line.push_str(&format!(" [{badge}]"));
    }
    line.push_str(": ");
    line.push_str(&view.body);
    if let Some(url) = &view.media_ref {
        if !view.body.is_empty() {
            line.push(' ');
        }
        line.push_str(&format!("<image {url}>"));
    }
    for chip in &view.reactions {
        line.push_str(&format!(
            " {}{}{}",
            chip.emoji,
            chip.count,
            if chip.mine { "*" } else { "" }
        ));
    }
    line
}
