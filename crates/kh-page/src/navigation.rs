//! Same-document navigation tracking
//!
//! The host reports every history transition it sees (pushState,
//! replaceState, popstate, full load). The tracker turns those into change
//! events only when the URL actually differs from the last one seen.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationKind {
    PushState,
    ReplaceState,
    PopState,
    Load,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationChange {
    pub from: Option<String>,
    pub to: String,
    pub kind: NavigationKind,
}

#[derive(Debug, Default)]
pub struct NavigationTracker {
    current: Option<String>,
}

impl NavigationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Record a transition. `None` when the URL did not change.
    pub fn observe(&mut self, url: &str, kind: NavigationKind) -> Option<NavigationChange> {
        if self.current.as_deref() == Some(url) {
            return None;
        }
        let from = self.current.replace(url.to_string());
        log::debug!("navigation ({kind:?}) {from:?} -> {url}");
        Some(NavigationChange {
            from,
            to: url.to_string(),
            kind,
        })
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_changes_reported() {
        let mut tracker = NavigationTracker::new();
        let first = tracker.observe("https://a.example/1", NavigationKind::Load).unwrap();
        assert_eq!(first.from, None);

        assert!(tracker
            .observe("https://a.example/1", NavigationKind::ReplaceState)
            .is_none());

        let change = tracker.observe("https://a.example/2", NavigationKind::PushState).unwrap();
        assert_eq!(change.from.as_deref(), Some("https://a.example/1"));
        assert_eq!(change.to, "https://a.example/2");
        assert_eq!(tracker.current(), Some("https://a.example/2"));

        let back = tracker.observe("https://a.example/1", NavigationKind::PopState).unwrap();
        assert_eq!(back.kind, NavigationKind::PopState);
    }

    #[test]
    fn test_reset() {
        let mut tracker = NavigationTracker::new();
        tracker.observe("https://a.example/", NavigationKind::Load);
        tracker.reset();
        assert!(tracker.observe("https://a.example/", NavigationKind::Load).is_some());
    }
}
