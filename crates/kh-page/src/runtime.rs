//! Content runtime
//!
//! Owns one page: its document, the highlight engine, the mutation watcher
//! and the current highlighting state. The host feeds it events, animation
//! frames and clock ticks; nothing runs on its own.
//!
//! Events are handled in arrival order from a single queue. A pass started
//! by one event spans several animation frames; events handled meanwhile
//! either leave it alone or clear it before starting their own.

use std::collections::VecDeque;
use std::rc::Rc;

use indextree::NodeId;
use kh_core::{build_highlight_plan, find_matching_profiles, generate_signature, HighlightPlan, Profile};
use serde::{Deserialize, Serialize};

use crate::dom::Document;
use crate::engine::{EngineConfig, EngineStats, HighlightEngine, PassOptions, PassReport, PassStatus};
use crate::messages::{Message, OutboundMessage, Outbox};
use crate::navigation::{NavigationKind, NavigationTracker};
use crate::notify::NotificationPresenter;
use crate::settings::{load_or_default, SettingsStore};
use crate::style::FLASH_CLASS;
use crate::watcher::{MutationWatcher, WatcherConfig, WatcherState};

pub const DEFAULT_FLASH_MS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    pub watcher: WatcherConfig,
    /// How long refreshed highlights keep the flash class.
    pub flash_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            watcher: WatcherConfig::default(),
            flash_ms: DEFAULT_FLASH_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Message(Message),
    Navigated { url: String, kind: NavigationKind },
}

impl From<Message> for Event {
    fn from(message: Message) -> Self {
        Event::Message(message)
    }
}

#[derive(Debug)]
struct FlashBatch {
    nodes: Vec<NodeId>,
    expires_at: u64,
}

// =============================================================================
// Runtime
// =============================================================================

pub struct ContentRuntime<S: SettingsStore, O: Outbox> {
    config: RuntimeConfig,
    store: S,
    outbox: O,
    doc: Document,
    engine: HighlightEngine,
    watcher: MutationWatcher,
    navigation: NavigationTracker,
    notifications: NotificationPresenter,
    events: VecDeque<Event>,
    flashes: Vec<FlashBatch>,

    running: bool,
    enabled: bool,
    url: String,
    profiles: Vec<Profile>,
    plan: Rc<HighlightPlan>,
    signature: Option<String>,
    now_ms: u64,
}

impl<S: SettingsStore, O: Outbox> ContentRuntime<S, O> {
    pub fn new(doc: Document, store: S, outbox: O, config: RuntimeConfig) -> Self {
        Self {
            config,
            store,
            outbox,
            doc,
            engine: HighlightEngine::new(config.engine),
            watcher: MutationWatcher::new(config.watcher),
            navigation: NavigationTracker::new(),
            notifications: NotificationPresenter::new(),
            events: VecDeque::new(),
            flashes: Vec::new(),
            running: false,
            enabled: false,
            url: String::new(),
            profiles: Vec::new(),
            plan: Rc::new(HighlightPlan::default()),
            signature: None,
            now_ms: 0,
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Load settings and start highlighting `url`.
    pub fn start(&mut self, url: &str) {
        if self.running {
            log::debug!("runtime already started");
            return;
        }
        self.running = true;
        self.navigation.observe(url, NavigationKind::Load);
        self.url = url.to_string();

        let settings = load_or_default(&self.store);
        self.profiles = settings.profiles;
        self.enabled = settings.extension_enabled;
        log::debug!(
            "runtime started on {url}: enabled={}, {} profiles",
            self.enabled,
            self.profiles.len()
        );

        if self.enabled {
            self.watcher.start(&mut self.doc);
            self.apply(false, false);
        }
    }

    /// Remove every highlight and detach from the page.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.teardown();
        self.events.clear();
        self.navigation.reset();
        self.running = false;
        log::debug!("runtime stopped");
    }

    // -------------------------------------------------------------------------
    // Inputs
    // -------------------------------------------------------------------------

    /// Queue an event and handle everything queued.
    pub fn dispatch(&mut self, event: impl Into<Event>) {
        self.enqueue(event);
        self.process_events();
    }

    pub fn enqueue(&mut self, event: impl Into<Event>) {
        self.events.push_back(event.into());
    }

    pub fn process_events(&mut self) {
        while let Some(event) = self.events.pop_front() {
            if !self.running {
                log::debug!("runtime stopped, dropping {event:?}");
                continue;
            }
            match event {
                Event::Message(message) => self.handle_message(message),
                Event::Navigated { url, kind } => self.handle_navigation(&url, kind),
            }
        }
    }

    /// Run one batch of the in-flight pass.
    pub fn animation_frame(&mut self) -> PassStatus {
        let status = self.engine.step(&mut self.doc);
        if let PassStatus::Complete(report) = &status {
            self.schedule_flash(report);
        }
        status
    }

    /// Advance the clock to `now_ms`: deliver observer records, fire the
    /// debounce, flash and toast timers.
    pub fn tick(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
        let now = self.now_ms;
        if !self.running {
            return;
        }

        let records = self.doc.take_records();
        if self.enabled && !records.is_empty() {
            self.watcher.on_records(&self.doc, &records, now);
        }

        if let Some(elements) = self.watcher.poll(&self.doc, now) {
            if self.enabled
                && !self
                    .engine
                    .highlight_elements(&self.doc, &elements, &self.plan, PassOptions::default())
            {
                log::debug!("incremental pass for {} elements not started", elements.len());
            }
        }

        self.expire_flashes(now);
        self.notifications.expire(&mut self.doc, now);
    }

    /// Finish queued events and the in-flight pass.
    pub fn settle(&mut self) -> Option<PassReport> {
        self.process_events();
        let mut last = None;
        while self.engine.is_processing() {
            if let PassStatus::Complete(report) = self.animation_frame() {
                last = Some(report);
            }
        }
        last
    }

    /// Move the clock forward by `ms` and settle.
    pub fn advance(&mut self, ms: u64) -> Option<PassReport> {
        self.tick(self.now_ms.saturating_add(ms));
        self.settle()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Page-side access, as the page's own scripts would have.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn plan(&self) -> &HighlightPlan {
        &self.plan
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    pub fn watcher_state(&self) -> WatcherState {
        self.watcher.state(&self.doc)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn outbox(&self) -> &O {
        &self.outbox
    }

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Earliest pending timer, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        [
            self.watcher.next_deadline(),
            self.flashes.iter().map(|f| f.expires_at).min(),
            self.notifications.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // -------------------------------------------------------------------------
    // Handlers
    // -------------------------------------------------------------------------

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::UpdateProfiles => {
                let settings = load_or_default(&self.store);
                self.profiles = settings.profiles;
                if !settings.extension_enabled {
                    if self.enabled {
                        self.disable();
                    }
                    return;
                }
                if !self.enabled {
                    self.enable();
                }
                self.apply(false, false);
            }
            Message::ToggleExtension { enabled: false } => {
                if self.enabled {
                    self.disable();
                }
            }
            Message::ToggleExtension { enabled: true } => {
                self.profiles = load_or_default(&self.store).profiles;
                self.enable();
                self.apply(true, false);
            }
            Message::ShowNotification { message, kind, details } => {
                if let Err(e) =
                    self.notifications
                        .show(&mut self.doc, &message, kind, details.as_deref(), self.now_ms)
                {
                    log::warn!("failed to show notification: {e}");
                }
            }
            Message::ForceHighlightRefresh => {
                if !self.enabled {
                    log::debug!("ignoring refresh while disabled");
                    return;
                }
                self.profiles = load_or_default(&self.store).profiles;
                self.apply(true, true);
            }
        }
    }

    fn handle_navigation(&mut self, url: &str, kind: NavigationKind) {
        let Some(change) = self.navigation.observe(url, kind) else {
            return;
        };
        self.url = change.to;
        if let Err(e) = self.outbox.send(OutboundMessage::NavigationChanged) {
            log::debug!("navigation notice not delivered: {e}");
        }
        if self.enabled {
            self.apply(false, false);
        }
    }

    fn enable(&mut self) {
        self.enabled = true;
        if !self.doc.is_observer_attached() {
            self.watcher.start(&mut self.doc);
        }
    }

    fn disable(&mut self) {
        self.teardown();
        self.enabled = false;
        log::debug!("highlighting disabled");
    }

    fn teardown(&mut self) {
        self.watcher.stop(&mut self.doc);
        let body = self.doc.body();
        let removed = self.engine.clear_highlights(&mut self.doc, body);
        log::debug!("cleared {removed} highlighted nodes");
        self.engine.reset_patterns();
        self.flashes.clear();
        self.plan = Rc::new(HighlightPlan::default());
        self.signature = None;
    }

    /// Re-match profiles for the current URL and re-highlight when the
    /// result differs from what is applied, or unconditionally with `force`.
    fn apply(&mut self, force: bool, flash: bool) -> bool {
        let (signature, plan) = {
            let matching = find_matching_profiles(&self.profiles, &self.url);
            (
                generate_signature(matching.iter().copied()),
                build_highlight_plan(&matching, &self.url),
            )
        };

        if !force && self.signature.as_deref() == Some(signature.as_str()) && *self.plan == plan {
            log::debug!("profiles unchanged for {}, keeping highlights", self.url);
            return false;
        }

        let body = self.doc.body();
        self.engine.clear_highlights(&mut self.doc, body);
        self.flashes.clear();
        self.signature = Some(signature);
        self.plan = Rc::new(plan);

        if self.plan.is_empty() {
            return false;
        }
        self.engine
            .highlight_document(&self.doc, &self.plan, PassOptions { flash })
    }

    fn schedule_flash(&mut self, report: &PassReport) {
        if !report.flash || report.created.is_empty() {
            return;
        }
        self.flashes.push(FlashBatch {
            nodes: report.created.clone(),
            expires_at: self.now_ms.saturating_add(self.config.flash_ms),
        });
    }

    fn expire_flashes(&mut self, now: u64) {
        let (expired, live): (Vec<FlashBatch>, Vec<FlashBatch>) = std::mem::take(&mut self.flashes)
            .into_iter()
            .partition(|f| now >= f.expires_at);
        self.flashes = live;

        for node in expired.into_iter().flat_map(|f| f.nodes) {
            if let Err(e) = self.doc.remove_class(node, FLASH_CLASS) {
                log::debug!("flash cleanup skipped: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{NotificationKind, OutboxError};
    use crate::settings::MemoryStore;
    use crate::style::{HIGHLIGHT_CLASS, MARKER_ATTR};
    use kh_core::{KeywordGroup, PatternList, StoredSettings, UrlPatternEntry};

    const JOBS: &str = "https://jobs.example/listing/1";

    fn profile(id: &str, pattern: &str, keywords: &[&str], color: &str) -> Profile {
        Profile {
            id: id.into(),
            url_patterns: vec![UrlPatternEntry {
                url_pattern: PatternList::One(pattern.into()),
                ..Default::default()
            }],
            keyword_groups: vec![KeywordGroup {
                id: Some(format!("{id}-g")),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                color: Some(color.into()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn page(paragraphs: &[&str]) -> Document {
        let mut doc = Document::new();
        for text in paragraphs {
            let p = doc.create_element("p");
            let t = doc.create_text(text);
            doc.append_child(p, t).unwrap();
            doc.append_child(doc.body(), p).unwrap();
        }
        doc
    }

    fn runtime(doc: Document, profiles: Vec<Profile>) -> ContentRuntime<MemoryStore, Vec<OutboundMessage>> {
        let store = MemoryStore::new(StoredSettings {
            profiles,
            ..Default::default()
        });
        ContentRuntime::new(doc, store, Vec::new(), RuntimeConfig::default())
    }

    fn highlighted(rt: &ContentRuntime<MemoryStore, Vec<OutboundMessage>>) -> Vec<String> {
        let doc = rt.document();
        doc.find_elements(doc.root(), |d, n| d.has_class(n, HIGHLIGHT_CLASS))
            .into_iter()
            .map(|n| doc.text_content(n))
            .collect()
    }

    fn marked_count(rt: &ContentRuntime<MemoryStore, Vec<OutboundMessage>>) -> usize {
        let doc = rt.document();
        doc.find_elements(doc.root(), |d, n| d.has_attribute(n, MARKER_ATTR))
            .len()
    }

    #[test]
    fn test_start_highlights_matching_page() {
        let mut rt = runtime(
            page(&["Senior Rust engineer", "Go is fine"]),
            vec![profile("p", "https://jobs.example/*", &["rust", "go"], "#111111")],
        );
        rt.start(JOBS);
        assert_eq!(rt.stats().passes_started, 1);
        rt.settle();
        assert_eq!(highlighted(&rt), vec!["Rust", "Go"]);
        assert_eq!(rt.watcher_state(), WatcherState::Observing);
    }

    #[test]
    fn test_no_matching_profile() {
        let mut rt = runtime(
            page(&["Rust"]),
            vec![profile("p", "https://other.example/*", &["rust"], "#111111")],
        );
        rt.start(JOBS);
        rt.settle();
        assert!(highlighted(&rt).is_empty());
        assert_eq!(rt.stats().passes_started, 0);
    }

    #[test]
    fn test_storage_failure_uses_defaults() {
        let mut rt = runtime(page(&["Rust"]), vec![profile("p", "*", &["rust"], "#111111")]);
        rt.store().fail_with(Some("context invalidated"));
        rt.start(JOBS);
        rt.settle();
        assert!(rt.is_enabled());
        assert!(highlighted(&rt).is_empty());
    }

    #[test]
    fn test_disable_then_enable_restores() {
        let mut rt = runtime(
            page(&["Rust and Go", "nothing", "more rust"]),
            vec![profile("p", "https://jobs.example/*", &["rust", "go"], "#111111")],
        );
        rt.start(JOBS);
        rt.settle();
        let before = highlighted(&rt);
        let text = rt.document().text_content(rt.document().body());
        assert_eq!(before.len(), 3);

        rt.dispatch(Message::ToggleExtension { enabled: false });
        assert_eq!(marked_count(&rt), 0);
        assert_eq!(rt.document().text_content(rt.document().body()), text);
        assert_eq!(rt.watcher_state(), WatcherState::Idle);
        assert!(!rt.is_enabled());

        rt.dispatch(Message::ToggleExtension { enabled: true });
        rt.settle();
        assert_eq!(highlighted(&rt), before);
        assert_eq!(rt.watcher_state(), WatcherState::Observing);
    }

    #[test]
    fn test_update_profiles_respects_signature() {
        let mut rt = runtime(
            page(&["rust and go"]),
            vec![profile("p", "https://jobs.example/*", &["rust"], "#111111")],
        );
        rt.start(JOBS);
        rt.settle();
        assert_eq!(rt.stats().passes_started, 1);

        rt.dispatch(Message::UpdateProfiles);
        rt.settle();
        assert_eq!(rt.stats().passes_started, 1);

        rt.store().update(|s| s.profiles[0].keyword_groups[0].keywords.push("go".into()));
        rt.dispatch(Message::UpdateProfiles);
        rt.settle();
        assert_eq!(rt.stats().passes_started, 2);
        assert_eq!(highlighted(&rt), vec!["rust", "go"]);

        rt.store().update(|s| s.extension_enabled = false);
        rt.dispatch(Message::UpdateProfiles);
        assert!(!rt.is_enabled());
        assert_eq!(marked_count(&rt), 0);
    }

    #[test]
    fn test_navigation_rematches() {
        let mut rt = runtime(
            page(&["rust and go"]),
            vec![
                profile("a", "https://jobs.example/listing/*", &["rust"], "#111111"),
                profile("b", "https://jobs.example/search*", &["go"], "#222222"),
            ],
        );
        rt.start(JOBS);
        rt.settle();
        assert_eq!(highlighted(&rt), vec!["rust"]);

        rt.dispatch(Event::Navigated {
            url: "https://jobs.example/listing/2".into(),
            kind: NavigationKind::PushState,
        });
        rt.settle();
        assert_eq!(rt.stats().passes_started, 1);
        assert_eq!(rt.outbox().len(), 1);

        rt.dispatch(Event::Navigated {
            url: "https://jobs.example/listing/2".into(),
            kind: NavigationKind::ReplaceState,
        });
        assert_eq!(rt.outbox().len(), 1);

        rt.dispatch(Event::Navigated {
            url: "https://jobs.example/search?q=go".into(),
            kind: NavigationKind::PushState,
        });
        rt.settle();
        assert_eq!(highlighted(&rt), vec!["go"]);
        assert_eq!(rt.url(), "https://jobs.example/search?q=go");
        assert_eq!(rt.outbox(), &vec![OutboundMessage::NavigationChanged; 2]);
    }

    #[test]
    fn test_navigation_with_per_url_override() {
        let mut p = profile("p", "https://jobs.example/listing/*", &["rust"], "#111111");
        p.url_patterns.push(UrlPatternEntry {
            url_pattern: PatternList::One("https://jobs.example/saved/*".into()),
            color_overrides: [("p-g".to_string(), "#00ff00".to_string())].into(),
            ..Default::default()
        });
        let mut rt = runtime(page(&["rust"]), vec![p]);
        rt.start(JOBS);
        rt.settle();

        rt.dispatch(Event::Navigated {
            url: "https://jobs.example/saved/1".into(),
            kind: NavigationKind::PushState,
        });
        rt.settle();
        assert_eq!(rt.stats().passes_started, 2);
        assert_eq!(rt.plan().color_map["rust"][0].background_color, "#00ff00");
    }

    #[test]
    fn test_mutations_trigger_incremental_pass() {
        let mut rt = runtime(
            page(&["rust"]),
            vec![profile("p", "https://jobs.example/*", &["rust"], "#111111")],
        );
        rt.start(JOBS);
        rt.settle();

        let doc = rt.document_mut();
        let item = doc.create_element("li");
        let text = doc.create_text("more rust here");
        doc.append_child(item, text).unwrap();
        let body = doc.body();
        doc.append_child(body, item).unwrap();

        rt.tick(10);
        assert_eq!(rt.watcher_state(), WatcherState::Pending);
        assert_eq!(rt.next_deadline(), Some(110));

        rt.tick(50);
        assert_eq!(rt.stats().passes_started, 1);
        let report = rt.advance(60).unwrap();
        assert_eq!(report.scope, crate::engine::PassScope::Elements);
        assert_eq!(report.matches, 1);
        assert_eq!(highlighted(&rt), vec!["rust", "rust"]);

        // The engine's own writes never re-arm the watcher
        rt.advance(500);
        assert_eq!(rt.stats().passes_started, 2);
        assert_eq!(rt.watcher_state(), WatcherState::Observing);
    }

    #[test]
    fn test_force_refresh_flashes() {
        let mut rt = runtime(
            page(&["rust"]),
            vec![profile("p", "https://jobs.example/*", &["rust"], "#111111")],
        );
        rt.start(JOBS);
        rt.settle();

        rt.dispatch(Message::ForceHighlightRefresh);
        let report = rt.settle().unwrap();
        assert!(report.flash);
        let span = report.created[0];
        assert!(rt.document().has_class(span, FLASH_CLASS));
        assert_eq!(rt.stats().passes_started, 2);
        assert_eq!(highlighted(&rt), vec!["rust"]);

        rt.tick(599);
        assert!(rt.document().has_class(span, FLASH_CLASS));
        rt.tick(600);
        assert!(!rt.document().has_class(span, FLASH_CLASS));
        assert!(rt.document().has_class(span, HIGHLIGHT_CLASS));
    }

    #[test]
    fn test_multi_profile_collision_animates() {
        let mut rt = runtime(
            page(&["We write python"]),
            vec![
                profile("a", "https://jobs.example/*", &["python"], "#111111"),
                profile("b", "https://jobs.example/listing*", &["Python"], "#222222"),
            ],
        );
        rt.start(JOBS);
        let report = rt.settle().unwrap();
        let colors: Vec<&str> = rt.plan().color_map["python"]
            .iter()
            .map(|c| c.background_color.as_str())
            .collect();
        assert_eq!(colors, vec!["#111111", "#222222"]);
        let style = rt.document().attribute(report.created[0], "style").unwrap();
        assert!(style.contains("animation: kh-blink-"));
        assert!(style.contains("2s step-end infinite"));
    }

    #[test]
    fn test_notification_toast() {
        let mut rt = runtime(page(&[]), Vec::new());
        rt.start(JOBS);
        rt.tick(1_000);
        rt.dispatch(Message::ShowNotification {
            message: "Keyword added".into(),
            kind: NotificationKind::Success,
            details: None,
        });
        let toast = rt
            .document()
            .find_elements(rt.document().body(), |d, n| d.has_class(n, "kh-toast"));
        assert_eq!(toast.len(), 1);
        assert_eq!(rt.watcher_state(), WatcherState::Observing);

        rt.tick(4_000);
        assert!(!rt.document().is_connected(toast[0]));
    }

    struct ClosedOutbox;

    impl Outbox for ClosedOutbox {
        fn send(&mut self, _message: OutboundMessage) -> Result<(), OutboxError> {
            Err(OutboxError::Unavailable("tab closed".into()))
        }
    }

    #[test]
    fn test_outbox_failure_ignored() {
        let store = MemoryStore::new(StoredSettings {
            profiles: vec![profile("p", "*", &["rust"], "#111111")],
            ..Default::default()
        });
        let mut rt = ContentRuntime::new(page(&["rust"]), store, ClosedOutbox, RuntimeConfig::default());
        rt.start(JOBS);
        rt.dispatch(Event::Navigated {
            url: "https://elsewhere.example/".into(),
            kind: NavigationKind::PopState,
        });
        rt.settle();
        assert_eq!(rt.url(), "https://elsewhere.example/");
        assert_eq!(rt.stats().passes_started, 1);
    }

    #[test]
    fn test_stop_clears_and_drops_events() {
        let mut rt = runtime(
            page(&["rust"]),
            vec![profile("p", "https://jobs.example/*", &["rust"], "#111111")],
        );
        rt.start(JOBS);
        rt.settle();
        rt.stop();
        assert!(!rt.is_running());
        assert_eq!(marked_count(&rt), 0);

        rt.dispatch(Message::ForceHighlightRefresh);
        rt.settle();
        assert_eq!(marked_count(&rt), 0);
    }
}
