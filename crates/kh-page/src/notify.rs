//! On-page toast notifications
//!
//! Toasts are appended to `<body>` marked as extension UI, so neither the
//! watcher nor the engine ever treats them as page content.

use indextree::NodeId;

use crate::dom::{Document, DomError};
use crate::messages::NotificationKind;
use crate::style::UI_ATTR;

pub const TOAST_CLASS: &str = "kh-toast";
pub const TOAST_DURATION_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Toast {
    node: NodeId,
    expires_at: u64,
}

#[derive(Debug, Default)]
pub struct NotificationPresenter {
    toasts: Vec<Toast>,
}

impl NotificationPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(
        &mut self,
        doc: &mut Document,
        message: &str,
        kind: NotificationKind,
        details: Option<&str>,
        now_ms: u64,
    ) -> Result<NodeId, DomError> {
        let _pause = doc.pause_observer();

        let toast = doc.create_element("div");
        doc.set_attribute(toast, "class", TOAST_CLASS)?;
        doc.add_class(toast, &format!("{TOAST_CLASS}-{}", kind.as_str()))?;
        doc.set_attribute(toast, UI_ATTR, "toast")?;
        doc.set_attribute(toast, "role", "status")?;

        let title = doc.create_element("strong");
        let text = doc.create_text(message);
        doc.append_child(title, text)?;
        doc.append_child(toast, title)?;

        if let Some(details) = details.filter(|d| !d.is_empty()) {
            let body = doc.create_element("div");
            let text = doc.create_text(details);
            doc.append_child(body, text)?;
            doc.append_child(toast, body)?;
        }

        doc.append_child(doc.body(), toast)?;
        self.toasts.push(Toast {
            node: toast,
            expires_at: now_ms.saturating_add(TOAST_DURATION_MS),
        });
        Ok(toast)
    }

    /// Remove toasts whose time is up. Returns how many were removed.
    pub fn expire(&mut self, doc: &mut Document, now_ms: u64) -> usize {
        let _pause = doc.pause_observer();
        let (expired, live): (Vec<Toast>, Vec<Toast>) =
            self.toasts.iter().partition(|t| now_ms >= t.expires_at);
        self.toasts = live;

        for toast in &expired {
            if doc.parent(toast.node).is_some() {
                if let Err(e) = doc.remove(toast.node) {
                    log::warn!("failed to remove toast: {e}");
                }
            }
        }
        expired.len()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.toasts.iter().map(|t| t.expires_at).min()
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ObserveOptions;

    #[test]
    fn test_show_and_expire() {
        let mut doc = Document::new();
        doc.observe(doc.body(), ObserveOptions::CHILD_LIST | ObserveOptions::SUBTREE);
        let mut presenter = NotificationPresenter::new();

        let toast = presenter
            .show(&mut doc, "Keyword added", NotificationKind::Success, Some("rust"), 1_000)
            .unwrap();
        assert!(doc.has_class(toast, "kh-toast-success"));
        assert_eq!(doc.text_content(toast), "Keyword addedrust");
        assert!(!doc.has_pending_records());
        assert_eq!(presenter.next_deadline(), Some(4_000));

        assert_eq!(presenter.expire(&mut doc, 3_999), 0);
        assert!(doc.is_connected(toast));
        assert_eq!(presenter.expire(&mut doc, 4_000), 1);
        assert!(!doc.is_connected(toast));
        assert!(presenter.is_empty());
    }

    #[test]
    fn test_empty_details_omitted() {
        let mut doc = Document::new();
        let mut presenter = NotificationPresenter::new();
        let toast = presenter
            .show(&mut doc, "Oops", NotificationKind::Error, Some(""), 0)
            .unwrap();
        assert_eq!(doc.children(toast).len(), 1);
        assert_eq!(doc.attribute(toast, "class"), Some("kh-toast kh-toast-error"));
    }
}
