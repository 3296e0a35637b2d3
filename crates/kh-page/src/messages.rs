//! Messages exchanged with the extension's background and editor pages.

use serde::{Deserialize, Serialize};

/// Inbound messages, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    /// Profiles changed in storage.
    UpdateProfiles,
    ToggleExtension { enabled: bool },
    ShowNotification {
        message: String,
        #[serde(rename = "type", default)]
        kind: NotificationKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    /// Clear and redo unconditionally, flashing the result.
    ForceHighlightRefresh,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    #[default]
    Info,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// Outbound messages. Navigation is the only one and carries no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OutboundMessage {
    NavigationChanged,
}

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("Receiver unavailable: {0}")]
    Unavailable(String),
}

/// Channel to the background page.
pub trait Outbox {
    fn send(&mut self, message: OutboundMessage) -> Result<(), OutboxError>;
}

impl Outbox for Vec<OutboundMessage> {
    fn send(&mut self, message: OutboundMessage) -> Result<(), OutboxError> {
        self.push(message);
        Ok(())
    }
}
