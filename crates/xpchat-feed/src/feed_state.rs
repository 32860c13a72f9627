use std::collections::HashMap;

use xpchat_types::models::{Message, MessageId};

use crate::surface::{Anchor, Surface};
use crate::view::MessageView;

struct Entry<N> {
    message: Message,
    node: N,
}

/// Ordered registry of the rendered messages of one room.
///
/// Owns every node it is handed: nodes are destroyed on replace, remove and
/// clear, and a node that is not accepted is destroyed on the spot. Besides
/// messages it owns the inline notices and the typing trailer, which is always
/// the last attached node.
pub struct FeedState<S: Surface> {
    surface: S,
    order: Vec<MessageId>,
    entries: HashMap<MessageId, Entry<S::Node>>,
    // Index of each id in `order`, rebuilt on demand after a structural change.
    positions: HashMap<MessageId, usize>,
    positions_valid: bool,
    notices: Vec<S::Node>,
    trailer: Option<S::Node>,
}

impl<S: Surface> FeedState<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            order: Vec::new(),
            entries: HashMap::new(),
            positions: HashMap::new(),
            positions_valid: true,
            notices: Vec::new(),
            trailer: None,
        }
    }

    pub fn has(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&S::Node> {
        self.entries.get(id).map(|e| &e.node)
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.entries.get(id).map(|e| &e.message)
    }

    /// Build a detached node for `message` as seen by `viewer`.
    pub fn render(&mut self, message: &Message, viewer: Option<&str>) -> S::Node {
        self.surface
            .build_message(&MessageView::new(message, viewer))
    }

    /// Insert `message` before the entry at `hint`, or at the end (ahead of the
    /// trailer) when the hint is absent or out of range. An id that is already
    /// present is replaced in place instead. Returns the final index.
    pub fn insert_at(&mut self, message: Message, node: S::Node, hint: Option<usize>) -> usize {
        if self.has(&message.id) {
            let id = message.id.clone();
            self.replace(message, node);
            return self.position(&id).unwrap_or(self.order.len());
        }

        let id = message.id.clone();
        let index = match hint {
            Some(i) if i < self.order.len() => {
                let before = &self.entries[&self.order[i]].node;
                self.surface.attach(&node, Anchor::Before(before));
                self.order.insert(i, id.clone());
                self.positions_valid = false;
                i
            }
            _ => {
                self.attach_tail(&node);
                self.order.push(id.clone());
                if self.positions_valid {
                    self.positions.insert(id.clone(), self.order.len() - 1);
                }
                self.order.len() - 1
            }
        };
        self.entries.insert(id, Entry { message, node });
        index
    }

    /// Swap the node of an existing entry, keeping its position and the
    /// `created_at` observed first. Returns false (and destroys `node`) when
    /// the id is unknown.
    pub fn replace(&mut self, mut message: Message, node: S::Node) -> bool {
        let Some(entry) = self.entries.get_mut(&message.id) else {
            self.surface.detach(&node);
            return false;
        };
        message.created_at = entry.message.created_at;
        self.surface.swap(&entry.node, &node);
        entry.message = message;
        entry.node = node;
        true
    }

    /// Drop an entry and destroy its node. Unknown ids are a no-op.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        self.surface.detach(&entry.node);

        let index = self
            .position(id)
            .or_else(|| self.order.iter().position(|o| o == id));
        if let Some(index) = index {
            self.order.remove(index);
            if index == self.order.len() {
                self.positions.remove(id);
            } else {
                self.positions_valid = false;
            }
        }
        true
    }

    /// Destroy every node, notices and trailer included.
    pub fn clear(&mut self) {
        for (_, entry) in self.entries.drain() {
            self.surface.detach(&entry.node);
        }
        for node in self.notices.drain(..) {
            self.surface.detach(&node);
        }
        if let Some(node) = self.trailer.take() {
            self.surface.detach(&node);
        }
        self.order.clear();
        self.positions.clear();
        self.positions_valid = true;
    }

    /// Append an inline system line. Notices do not count towards `order`.
    pub fn push_notice(&mut self, text: &str) {
        let node = self.surface.build_notice(text);
        self.attach_tail(&node);
        self.notices.push(node);
    }

    /// Show the typing trailer. Returns false when one is already shown.
    pub fn show_trailer(&mut self, label: &str) -> bool {
        if self.trailer.is_some() {
            return false;
        }
        let node = self.surface.build_trailer(label);
        self.surface.attach(&node, Anchor::End);
        self.trailer = Some(node);
        true
    }

    pub fn hide_trailer(&mut self) -> bool {
        match self.trailer.take() {
            Some(node) => {
                self.surface.detach(&node);
                true
            }
            None => false,
        }
    }

    pub fn has_trailer(&self) -> bool {
        self.trailer.is_some()
    }

    /// Index of `id` in render order.
    pub fn position(&mut self, id: &str) -> Option<usize> {
        if !self.positions_valid {
            self.positions = self
                .order
                .iter()
                .enumerate()
                .map(|(i, id)| (id.clone(), i))
                .collect();
            self.positions_valid = true;
        }
        self.positions.get(id).copied()
    }

    pub fn order(&self) -> &[MessageId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// One entry per id in `order`, no duplicates.
    pub fn is_consistent(&self) -> bool {
        let mut seen = std::collections::HashSet::with_capacity(self.order.len());
        self.order.len() == self.entries.len()
            && self
                .order
                .iter()
                .all(|id| seen.insert(id.as_str()) && self.entries.contains_key(id))
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    fn attach_tail(&mut self, node: &S::Node) {
        match &self.trailer {
            Some(trailer) => self.surface.attach(node, Anchor::Before(trailer)),
            None => self.surface.attach(node, Anchor::End),
        }
    }
}
