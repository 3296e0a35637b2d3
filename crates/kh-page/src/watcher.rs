//! Mutation watcher
//!
//! Turns observer records into debounced incremental highlight requests.
//! Only element additions count; the engine's own wrappers never do, and the
//! engine pauses the observer while writing anyway.

use indextree::NodeId;
use serde::{Deserialize, Serialize};

use crate::dom::{Document, MutationRecord, ObserveOptions};
use crate::style::is_highlight_node;

pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WatcherConfig {
    /// Quiet period after the last qualifying mutation.
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// No observer attached.
    Idle,
    Observing,
    /// Qualifying additions seen, debounce timer armed.
    Pending,
    /// Observer attached but paused by a highlight write.
    Writing,
}

#[derive(Debug, Default)]
pub struct MutationWatcher {
    config: WatcherConfig,
    pending: Vec<NodeId>,
    deadline: Option<u64>,
}

impl MutationWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            deadline: None,
        }
    }

    pub fn config(&self) -> WatcherConfig {
        self.config
    }

    /// Watch child list changes anywhere under `<body>`.
    pub fn start(&mut self, doc: &mut Document) {
        doc.observe(doc.body(), ObserveOptions::CHILD_LIST | ObserveOptions::SUBTREE);
        log::debug!("mutation watcher attached");
    }

    /// Detach and forget anything pending.
    pub fn stop(&mut self, doc: &mut Document) {
        doc.disconnect();
        self.pending.clear();
        self.deadline = None;
        log::debug!("mutation watcher detached");
    }

    pub fn state(&self, doc: &Document) -> WatcherState {
        if !doc.is_observer_attached() {
            WatcherState::Idle
        } else if !doc.is_observing() {
            WatcherState::Writing
        } else if self.deadline.is_some() {
            WatcherState::Pending
        } else {
            WatcherState::Observing
        }
    }

    /// Feed observer records. Each qualifying record re-arms the timer.
    /// Returns true when anything qualified.
    pub fn on_records(&mut self, doc: &Document, records: &[MutationRecord], now_ms: u64) -> bool {
        let mut qualified = false;
        for record in records {
            for &node in &record.added_nodes {
                if !doc.is_element(node) || is_highlight_node(doc, node) {
                    continue;
                }
                qualified = true;
                if !self.pending.contains(&node) {
                    self.pending.push(node);
                }
            }
        }
        if qualified {
            self.deadline = Some(now_ms.saturating_add(self.config.debounce_ms));
        }
        qualified
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn has_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Elements to highlight once the debounce window has elapsed.
    ///
    /// Elements detached in the meantime are dropped, as are elements nested
    /// inside another pending element since the outer one covers them.
    pub fn poll(&mut self, doc: &Document, now_ms: u64) -> Option<Vec<NodeId>> {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {}
            _ => return None,
        }
        self.deadline = None;

        let pending = std::mem::take(&mut self.pending);
        let connected: Vec<NodeId> = pending.into_iter().filter(|&n| doc.is_connected(n)).collect();
        let roots: Vec<NodeId> = connected
            .iter()
            .copied()
            .filter(|&node| {
                !connected
                    .iter()
                    .any(|&other| other != node && doc.is_ancestor_or_self(other, node))
            })
            .collect();

        if roots.is_empty() {
            None
        } else {
            log::debug!("debounce fired with {} added elements", roots.len());
            Some(roots)
        }
    }
}
