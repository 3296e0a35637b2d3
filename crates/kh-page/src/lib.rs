//! KeyHighlight Page Library
//!
//! Applies a `kh_core::HighlightPlan` to a document and keeps it applied:
//!
//! - `dom`: Arena document model with a pausable mutation observer
//! - `style`: Highlight markup conventions and injected keyframe rules
//! - `engine`: Batched highlight passes and highlight removal
//! - `watcher`: Debounced reaction to content added by the page
//! - `navigation`: Same-document URL change tracking
//! - `messages`: Messages from and to the rest of the extension
//! - `settings`: Read-only access to stored settings
//! - `notify`: On-page toast notifications
//! - `runtime`: Per-page orchestration of all of the above
//!
//! Everything is single-threaded and host-driven: the host delivers
//! events, animation frames and clock ticks to a `ContentRuntime`.

pub mod dom;
pub mod engine;
pub mod messages;
pub mod navigation;
pub mod notify;
pub mod runtime;
pub mod settings;
pub mod style;
pub mod watcher;

// Re-export commonly used types
pub use dom::{Document, DomError, MutationRecord, NodeKind, ObserveOptions, ObserverPause};
pub use engine::{EngineConfig, EngineError, EngineStats, HighlightEngine, PassOptions, PassReport, PassStatus};
pub use messages::{Message, NotificationKind, OutboundMessage, Outbox, OutboxError};
pub use navigation::{NavigationChange, NavigationKind, NavigationTracker};
pub use runtime::{ContentRuntime, Event, RuntimeConfig};
pub use settings::{JsonStore, MemoryStore, SettingsStore, StoreError};
pub use watcher::{MutationWatcher, WatcherConfig, WatcherState};
