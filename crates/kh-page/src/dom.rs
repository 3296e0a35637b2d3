//! In-memory document model
//!
//! An arena tree of document, element and text nodes with just enough of the
//! browser DOM for highlighting: attribute access, child list edits, text
//! content and a single mutation observer slot that records child list changes.
//!
//! Detached nodes stay in the arena so stale ids held elsewhere remain valid
//! to query; use `is_connected` before acting on one.

use std::cell::Cell;
use std::fmt::Write as _;
use std::rc::Rc;

use bitflags::bitflags;
use indextree::{Arena, NodeId};

/// Error type for tree operations.
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeId),
    #[error("Not an element: {0:?}")]
    NotElement(NodeId),
    #[error("Node has no parent: {0:?}")]
    Orphan(NodeId),
    #[error("Tree operation failed: {0:?}")]
    Tree(indextree::NodeError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeKind {
    #[default]
    Document,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
}

// =============================================================================
// Mutation Observation
// =============================================================================

bitflags! {
    /// What the observer records.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObserveOptions: u8 {
        const CHILD_LIST = 1 << 0;
        const SUBTREE = 1 << 1;
    }
}

/// One child list change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct ObserverSlot {
    target: Option<NodeId>,
    options: ObserveOptions,
    records: Vec<MutationRecord>,
    pauses: Rc<Cell<usize>>,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self::empty()
    }
}

/// Suspends observation while alive.
///
/// Mutations made while any pause is held are never recorded. Dropping the
/// last pause resumes observation, on every exit path.
#[derive(Debug)]
#[must_use = "observation resumes as soon as the pause is dropped"]
pub struct ObserverPause {
    pauses: Rc<Cell<usize>>,
}

impl Drop for ObserverPause {
    fn drop(&mut self) {
        self.pauses.set(self.pauses.get().saturating_sub(1));
    }
}

// =============================================================================
// Document
// =============================================================================

#[derive(Debug)]
pub struct Document {
    arena: Arena<NodeKind>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    observer: ObserverSlot,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty `<html><head></head><body></body></html>` document.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::Document);
        let html = arena.new_node(element_kind("html"));
        let head = arena.new_node(element_kind("head"));
        let body = arena.new_node(element_kind("body"));
        root.append(html, &mut arena);
        html.append(head, &mut arena);
        html.append(body, &mut arena);
        Self {
            arena,
            root,
            head,
            body,
            observer: ObserverSlot::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    // -------------------------------------------------------------------------
    // Node creation and inspection
    // -------------------------------------------------------------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.arena.new_node(element_kind(tag))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.arena.new_node(NodeKind::Text {
            text: text.to_string(),
        })
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.arena.get(id).map(|node| node.get())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Element { .. }))
    }

    /// Lowercase tag name of an element.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Data of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let attrs = self.attrs_mut(id)?;
        match attrs.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        self.attrs_mut(id)?.retain(|(key, _)| key != name);
        Ok(())
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<(), DomError> {
        if self.has_class(id, class) {
            return Ok(());
        }
        let value = match self.attribute(id, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attribute(id, "class", &value)
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<(), DomError> {
        let remaining = match self.attribute(id, "class") {
            Some(existing) => existing
                .split_whitespace()
                .filter(|c| *c != class)
                .collect::<Vec<_>>()
                .join(" "),
            None => return Ok(()),
        };
        if remaining.is_empty() {
            self.remove_attribute(id, "class")
        } else {
            self.set_attribute(id, "class", &remaining)
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id)?.parent()
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        if self.arena.get(id).is_none() {
            return Vec::new();
        }
        id.children(&self.arena).collect()
    }

    /// `id` and everything below it, in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        if self.arena.get(id).is_none() {
            return Vec::new();
        }
        id.descendants(&self.arena).collect()
    }

    /// `id` and its ancestors up to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        if self.arena.get(id).is_none() {
            return Vec::new();
        }
        id.ancestors(&self.arena).collect()
    }

    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Attached to this document's root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.ancestors(id).last() == Some(&self.root)
    }

    /// Concatenated text of every text node under `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let Some(text) = self.text(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Elements under `id` (inclusive) matching `predicate`, in document order.
    pub fn find_elements<F>(&self, id: NodeId, mut predicate: F) -> Vec<NodeId>
    where
        F: FnMut(&Self, NodeId) -> bool,
    {
        self.descendants(id)
            .into_iter()
            .filter(|&node| self.is_element(node) && predicate(self, node))
            .collect()
    }

    pub fn element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.find_elements(self.root, |doc, node| doc.attribute(node, "id") == Some(element_id))
            .into_iter()
            .next()
    }

    // -------------------------------------------------------------------------
    // Tree edits
    // -------------------------------------------------------------------------

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.ensure_exists(parent)?;
        self.ensure_exists(child)?;
        self.detach_recorded(child);
        parent.checked_append(child, &mut self.arena).map_err(DomError::Tree)?;
        self.record(parent, vec![child], Vec::new());
        Ok(())
    }

    /// Insert `new_node` right before `reference` under the same parent.
    pub fn insert_before(&mut self, reference: NodeId, new_node: NodeId) -> Result<(), DomError> {
        let parent = self.parent(reference).ok_or(DomError::Orphan(reference))?;
        self.ensure_exists(new_node)?;
        self.detach_recorded(new_node);
        reference
            .checked_insert_before(new_node, &mut self.arena)
            .map_err(DomError::Tree)?;
        self.record(parent, vec![new_node], Vec::new());
        Ok(())
    }

    /// Detach `id` from its parent. The node keeps its own subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        self.ensure_exists(id)?;
        if self.parent(id).is_none() {
            return Err(DomError::Orphan(id));
        }
        self.detach_recorded(id);
        Ok(())
    }

    /// Replace `old` with `replacements`, in order, as one child list change.
    pub fn replace_with(&mut self, old: NodeId, replacements: &[NodeId]) -> Result<(), DomError> {
        let parent = self.parent(old).ok_or(DomError::Orphan(old))?;
        for &node in replacements {
            self.ensure_exists(node)?;
            node.detach(&mut self.arena);
            old.checked_insert_before(node, &mut self.arena)
                .map_err(DomError::Tree)?;
        }
        old.detach(&mut self.arena);
        self.record(parent, replacements.to_vec(), vec![old]);
        Ok(())
    }

    /// Merge adjacent text children of `id` and drop empty ones.
    pub fn normalize(&mut self, id: NodeId) -> Result<(), DomError> {
        self.ensure_exists(id)?;
        let mut previous_text: Option<NodeId> = None;
        let mut removed = Vec::new();

        for child in self.children(id) {
            let text = match self.text(child) {
                Some(text) => text.to_string(),
                None => {
                    previous_text = None;
                    continue;
                }
            };
            match previous_text {
                Some(prev) if !text.is_empty() => {
                    if let Some(NodeKind::Text { text: merged }) = self.arena.get_mut(prev).map(|n| n.get_mut()) {
                        merged.push_str(&text);
                    }
                    child.detach(&mut self.arena);
                    removed.push(child);
                }
                _ if text.is_empty() => {
                    child.detach(&mut self.arena);
                    removed.push(child);
                }
                _ => previous_text = Some(child),
            }
        }

        if !removed.is_empty() {
            self.record(id, Vec::new(), removed);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Observer
    // -------------------------------------------------------------------------

    /// Start recording mutations under `target`. Replaces any previous target.
    pub fn observe(&mut self, target: NodeId, options: ObserveOptions) {
        self.observer.target = Some(target);
        self.observer.options = options;
    }

    /// Stop recording and drop queued records.
    pub fn disconnect(&mut self) {
        self.observer.target = None;
        self.observer.records.clear();
    }

    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.observer.records)
    }

    pub fn has_pending_records(&self) -> bool {
        !self.observer.records.is_empty()
    }

    /// Attached and not paused.
    pub fn is_observing(&self) -> bool {
        self.observer.target.is_some() && self.observer.pauses.get() == 0
    }

    pub fn is_observer_attached(&self) -> bool {
        self.observer.target.is_some()
    }

    pub fn pause_observer(&self) -> ObserverPause {
        let pauses = Rc::clone(&self.observer.pauses);
        pauses.set(pauses.get() + 1);
        ObserverPause { pauses }
    }

    // -------------------------------------------------------------------------
    // Serialization
    // -------------------------------------------------------------------------

    /// Markup of `id` including itself.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    /// Markup of the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Document) => {
                for child in self.children(id) {
                    self.write_html(child, out);
                }
            }
            Some(NodeKind::Element { tag, attrs }) => {
                let _ = write!(out, "<{tag}");
                for (name, value) in attrs {
                    let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
                }
                out.push('>');
                if matches!(tag.as_str(), "script" | "style") {
                    out.push_str(&self.text_content(id));
                } else {
                    for child in self.children(id) {
                        self.write_html(child, out);
                    }
                }
                let _ = write!(out, "</{tag}>");
            }
            Some(NodeKind::Text { text }) => out.push_str(&escape_text(text)),
            None => {}
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn ensure_exists(&self, id: NodeId) -> Result<(), DomError> {
        match self.arena.get(id) {
            Some(_) => Ok(()),
            None => Err(DomError::UnknownNode(id)),
        }
    }

    fn kind_mut(&mut self, id: NodeId) -> Result<&mut NodeKind, DomError> {
        self.arena
            .get_mut(id)
            .map(|node| node.get_mut())
            .ok_or(DomError::UnknownNode(id))
    }

    fn attrs_mut(&mut self, id: NodeId) -> Result<&mut Vec<(String, String)>, DomError> {
        match self.kind_mut(id)? {
            NodeKind::Element { attrs, .. } => Ok(attrs),
            _ => Err(DomError::NotElement(id)),
        }
    }

    fn detach_recorded(&mut self, id: NodeId) {
        if let Some(old_parent) = self.parent(id) {
            id.detach(&mut self.arena);
            self.record(old_parent, Vec::new(), vec![id]);
        }
    }

    fn record(&mut self, parent: NodeId, added_nodes: Vec<NodeId>, removed_nodes: Vec<NodeId>) {
        if !self.is_observing() || !self.observer.options.contains(ObserveOptions::CHILD_LIST) {
            return;
        }
        let Some(target) = self.observer.target else {
            return;
        };
        let in_scope = parent == target
            || (self.observer.options.contains(ObserveOptions::SUBTREE)
                && self.is_ancestor_or_self(target, parent));
        if in_scope {
            self.observer.records.push(MutationRecord {
                target: parent,
                added_nodes,
                removed_nodes,
            });
        }
    }
}

fn element_kind(tag: &str) -> NodeKind {
    NodeKind::Element {
        tag: tag.to_ascii_lowercase(),
        attrs: Vec::new(),
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
