//! Highlight Engine
//!
//! Rewrites text nodes so keyword occurrences sit inside styled highlight
//! spans. A pass collects candidate text nodes up front, then processes them
//! in fixed-size batches, one batch per animation frame.
//!
//! While a pass is in flight the document observer is paused by the pass
//! itself, so the engine's own writes are never reported as page mutations.
//! Only one pass runs at a time; a pass requested meanwhile is dropped.

use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use fancy_regex::{Regex, RegexBuilder};
use indextree::NodeId;
use kh_core::{is_single_letter, BoundaryCompiler, HighlightPlan, KeywordColor};
use serde::{Deserialize, Serialize};

use crate::dom::{Document, DomError, NodeKind, ObserverPause};
use crate::style::{
    highlight_style, is_highlight_node, KeyframeRegistry, FLASH_CLASS, HIGHLIGHT_CLASS, MARKER_ATTR,
    WRAPPER_CLASS,
};

/// Elements whose text is never highlighted.
pub const SKIPPED_TAGS: [&str; 6] = ["script", "style", "noscript", "svg", "canvas", "iframe"];

pub const DEFAULT_MAX_TEXT_NODES: usize = 2000;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_BACKTRACK_LIMIT: usize = 1_000_000;

/// Error type for a single text node rewrite.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Keyword pattern failed: {0}")]
    Pattern(#[from] fancy_regex::Error),
    #[error("DOM operation failed: {0}")]
    Dom(#[from] DomError),
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Text nodes considered per pass; the rest are left alone.
    pub max_text_nodes: usize,
    /// Text nodes rewritten per animation frame.
    pub batch_size: usize,
    /// Backtracking steps allowed per search before a text node is given up.
    pub backtrack_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_text_nodes: DEFAULT_MAX_TEXT_NODES,
            batch_size: DEFAULT_BATCH_SIZE,
            backtrack_limit: DEFAULT_BACKTRACK_LIMIT,
        }
    }
}

// =============================================================================
// Pass State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassScope {
    Document,
    Elements,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOptions {
    /// Tag created highlights with `FLASH_CLASS`.
    pub flash: bool,
}

/// Summary of a finished pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub scope: PassScope,
    pub nodes_scanned: usize,
    pub nodes_highlighted: usize,
    pub matches: usize,
    pub errors: usize,
    /// Highlight spans created by this pass.
    pub created: Vec<NodeId>,
    pub flash: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassStatus {
    /// No pass in flight.
    Idle,
    /// More batches remain.
    Pending { remaining: usize },
    Complete(PassReport),
}

struct HighlightPass {
    plan: Rc<HighlightPlan>,
    matchers: Rc<KeywordMatchers>,
    queue: VecDeque<NodeId>,
    report: PassReport,
    // Held for the whole pass; dropping it resumes observation.
    _pause: ObserverPause,
}

/// Counters across all passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub passes_started: u64,
    pub passes_completed: u64,
    pub passes_dropped: u64,
    pub nodes_scanned: u64,
    pub nodes_highlighted: u64,
    pub matches: u64,
    pub errors: u64,
}

// =============================================================================
// Keyword Matchers
// =============================================================================

/// Compiled alternations: multi-character keywords and single letters run as
/// two separate sub-passes over the same text.
#[derive(Debug)]
struct KeywordMatchers {
    multi: Option<Regex>,
    single: Option<Regex>,
}

struct MatchSpan<'p> {
    start: usize,
    end: usize,
    colors: &'p [KeywordColor],
}

impl KeywordMatchers {
    fn compile(compiler: &mut BoundaryCompiler, plan: &HighlightPlan, backtrack_limit: usize) -> Self {
        let mut keywords: Vec<&str> = plan.keywords.iter().map(String::as_str).collect();
        // Longest first so phrases win over the words they contain
        keywords.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

        let (single, multi): (Vec<&str>, Vec<&str>) =
            keywords.into_iter().partition(|k| is_single_letter(k));

        Self {
            multi: build_alternation(&keyword_patterns(compiler, &multi), plan.exact_case, backtrack_limit),
            single: build_alternation(&keyword_patterns(compiler, &single), plan.exact_case, backtrack_limit),
        }
    }

    fn find<'p>(&self, text: &str, plan: &'p HighlightPlan) -> Result<Vec<MatchSpan<'p>>, EngineError> {
        let mut spans: Vec<MatchSpan<'p>> = Vec::new();

        if let Some(multi) = &self.multi {
            for found in multi.find_iter(text) {
                let found = found?;
                if let Some(colors) = plan.colors_for(found.as_str()) {
                    spans.push(MatchSpan {
                        start: found.start(),
                        end: found.end(),
                        colors,
                    });
                }
            }
        }

        if let Some(single) = &self.single {
            for found in single.find_iter(text) {
                let found = found?;
                let overlaps = spans
                    .iter()
                    .any(|s| found.start() < s.end && s.start < found.end());
                if overlaps {
                    continue;
                }
                if let Some(colors) = plan.colors_for(found.as_str()) {
                    spans.push(MatchSpan {
                        start: found.start(),
                        end: found.end(),
                        colors,
                    });
                }
            }
        }

        spans.sort_by_key(|s| s.start);
        Ok(spans)
    }
}

fn keyword_patterns<'k>(compiler: &mut BoundaryCompiler, keywords: &[&'k str]) -> Vec<(&'k str, String)> {
    keywords
        .iter()
        .map(|&keyword| (keyword, compiler.compile(keyword).to_string()))
        .collect()
}

fn build_regex(source: &str, backtrack_limit: usize) -> Result<Regex, fancy_regex::Error> {
    RegexBuilder::new(source).backtrack_limit(backtrack_limit).build()
}

fn combined_source<'p>(exact_case: bool, patterns: impl IntoIterator<Item = &'p str>) -> String {
    let mut source = String::from(if exact_case { "(?:" } else { "(?i)(?:" });
    for (i, pattern) in patterns.into_iter().enumerate() {
        if i > 0 {
            source.push('|');
        }
        source.push_str("(?:");
        source.push_str(pattern);
        source.push(')');
    }
    source.push(')');
    source
}

/// One regex for `(keyword, pattern)` pairs, in the order given.
///
/// If the combined pattern does not compile, each pattern is tried on its
/// own and the ones that fail are dropped with a warning.
fn build_alternation(patterns: &[(&str, String)], exact_case: bool, backtrack_limit: usize) -> Option<Regex> {
    if patterns.is_empty() {
        return None;
    }
    let source = combined_source(exact_case, patterns.iter().map(|(_, pattern)| pattern.as_str()));
    match build_regex(&source, backtrack_limit) {
        Ok(regex) => return Some(regex),
        Err(e) => log::warn!("combined keyword pattern failed ({e}), retrying per keyword"),
    }

    let valid: Vec<&str> = patterns
        .iter()
        .filter_map(|(keyword, pattern)| match build_regex(pattern, backtrack_limit) {
            Ok(_) => Some(pattern.as_str()),
            Err(e) => {
                log::warn!("dropping keyword {keyword:?}: {e}");
                None
            }
        })
        .collect();
    if valid.is_empty() {
        return None;
    }
    build_regex(&combined_source(exact_case, valid), backtrack_limit)
        .map_err(|e| log::warn!("keyword pattern unusable: {e}"))
        .ok()
}

// =============================================================================
// Text Node Filter
// =============================================================================

/// Whether a text node is a highlighting candidate.
///
/// Rejects whitespace-only text, text inside skipped tags, inside anything
/// the engine already produced, and inside editable regions.
pub fn accepts_text_node(doc: &Document, id: NodeId) -> bool {
    match doc.text(id) {
        Some(text) if !text.trim().is_empty() => {}
        _ => return false,
    }
    if doc.parent(id).is_none() {
        return false;
    }

    for ancestor in doc.ancestors(id).into_iter().skip(1) {
        let tag = match doc.tag(ancestor) {
            Some(tag) => tag,
            None => continue,
        };
        if SKIPPED_TAGS.contains(&tag) || is_highlight_node(doc, ancestor) {
            return false;
        }
        if let Some(editable) = doc.attribute(ancestor, "contenteditable") {
            if !editable.eq_ignore_ascii_case("false") {
                return false;
            }
        }
    }
    true
}

// =============================================================================
// Engine
// =============================================================================

/// Owns pattern caches, injected styles and the in-flight pass.
pub struct HighlightEngine {
    config: EngineConfig,
    compiler: BoundaryCompiler,
    matchers: Option<(String, Rc<KeywordMatchers>)>,
    keyframes: KeyframeRegistry,
    pass: Option<HighlightPass>,
    stats: EngineStats,
}

impl Default for HighlightEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl HighlightEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: EngineConfig {
                max_text_nodes: config.max_text_nodes.max(1),
                batch_size: config.batch_size.max(1),
                backtrack_limit: config.backtrack_limit,
            },
            compiler: BoundaryCompiler::new(),
            matchers: None,
            keyframes: KeyframeRegistry::new(),
            pass: None,
            stats: EngineStats::default(),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn is_processing(&self) -> bool {
        self.pass.is_some()
    }

    /// Queue a full pass over the document body. Returns false when nothing
    /// was started.
    pub fn highlight_document(&mut self, doc: &Document, plan: &Rc<HighlightPlan>, options: PassOptions) -> bool {
        self.begin(doc, &[doc.body()], plan, PassScope::Document, options)
    }

    /// Queue an incremental pass over `elements` only.
    pub fn highlight_elements(
        &mut self,
        doc: &Document,
        elements: &[NodeId],
        plan: &Rc<HighlightPlan>,
        options: PassOptions,
    ) -> bool {
        self.begin(doc, elements, plan, PassScope::Elements, options)
    }

    fn begin(
        &mut self,
        doc: &Document,
        roots: &[NodeId],
        plan: &Rc<HighlightPlan>,
        scope: PassScope,
        options: PassOptions,
    ) -> bool {
        if self.pass.is_some() {
            self.stats.passes_dropped += 1;
            log::debug!("highlight pass already running, dropping {scope:?} request");
            return false;
        }
        if plan.is_empty() || roots.is_empty() {
            return false;
        }

        let queue = self.collect_text_nodes(doc, roots);
        let matchers = self.matchers_for(plan);

        self.stats.passes_started += 1;
        log::debug!("starting {scope:?} pass over {} text nodes", queue.len());

        self.pass = Some(HighlightPass {
            plan: Rc::clone(plan),
            matchers,
            queue,
            report: PassReport {
                scope,
                nodes_scanned: 0,
                nodes_highlighted: 0,
                matches: 0,
                errors: 0,
                created: Vec::new(),
                flash: options.flash,
            },
            _pause: doc.pause_observer(),
        });
        true
    }

    /// Process one batch of the in-flight pass.
    pub fn step(&mut self, doc: &mut Document) -> PassStatus {
        let mut pass = match self.pass.take() {
            Some(pass) => pass,
            None => return PassStatus::Idle,
        };

        for _ in 0..self.config.batch_size {
            let node = match pass.queue.pop_front() {
                Some(node) => node,
                None => break,
            };
            pass.report.nodes_scanned += 1;
            self.stats.nodes_scanned += 1;

            match self.highlight_text_node(doc, node, &pass.plan, &pass.matchers, pass.report.flash) {
                Ok(created) if !created.is_empty() => {
                    pass.report.nodes_highlighted += 1;
                    pass.report.matches += created.len();
                    self.stats.nodes_highlighted += 1;
                    self.stats.matches += created.len() as u64;
                    pass.report.created.extend(created);
                }
                Ok(_) => {}
                Err(e) => {
                    pass.report.errors += 1;
                    self.stats.errors += 1;
                    log::warn!("skipping text node {node:?}: {e}");
                }
            }
        }

        if let Err(e) = self.keyframes.flush(doc) {
            log::warn!("failed to inject keyframes: {e}");
        }

        if pass.queue.is_empty() {
            self.stats.passes_completed += 1;
            log::debug!(
                "{:?} pass done: {} nodes, {} highlighted, {} matches",
                pass.report.scope,
                pass.report.nodes_scanned,
                pass.report.nodes_highlighted,
                pass.report.matches
            );
            // Dropping the pass releases the observer pause
            PassStatus::Complete(pass.report)
        } else {
            let remaining = pass.queue.len();
            self.pass = Some(pass);
            PassStatus::Pending { remaining }
        }
    }

    /// Run the in-flight pass to the end without yielding.
    pub fn finish(&mut self, doc: &mut Document) -> Option<PassReport> {
        loop {
            match self.step(doc) {
                PassStatus::Idle => return None,
                PassStatus::Pending { .. } => continue,
                PassStatus::Complete(report) => return Some(report),
            }
        }
    }

    /// Abandon the in-flight pass, leaving already rewritten nodes in place.
    pub fn cancel(&mut self) -> bool {
        self.pass.take().is_some()
    }

    /// Undo every highlight under `root`, restoring the original text.
    ///
    /// Any in-flight pass is abandoned first since its queued nodes are about
    /// to disappear. Returns the number of wrappers removed.
    pub fn clear_highlights(&mut self, doc: &mut Document, root: NodeId) -> usize {
        if self.cancel() {
            log::debug!("abandoning in-flight pass to clear highlights");
        }
        let _pause = doc.pause_observer();
        let mut parents: Vec<NodeId> = Vec::new();
        let mut removed = 0;

        let wrappers = doc.find_elements(root, |doc, node| doc.has_class(node, WRAPPER_CLASS));
        for wrapper in wrappers {
            let Some(parent) = doc.parent(wrapper) else {
                continue;
            };
            let text = doc.text_content(wrapper);
            let replacement = doc.create_text(&text);
            match doc.replace_with(wrapper, &[replacement]) {
                Ok(()) => {
                    removed += 1;
                    if !parents.contains(&parent) {
                        parents.push(parent);
                    }
                }
                Err(e) => log::warn!("failed to clear wrapper {wrapper:?}: {e}"),
            }
        }

        // Highlights whose wrapper was rearranged by the page
        let strays = doc.find_elements(root, |doc, node| doc.has_class(node, HIGHLIGHT_CLASS));
        for span in strays {
            let Some(parent) = doc.parent(span) else {
                continue;
            };
            let children = doc.children(span);
            if let Err(e) = doc.replace_with(span, &children) {
                log::warn!("failed to unwrap highlight {span:?}: {e}");
                continue;
            }
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }

        for parent in parents {
            if let Err(e) = doc.normalize(parent) {
                log::warn!("failed to normalize {parent:?}: {e}");
            }
        }

        if let Err(e) = self.keyframes.clear(doc) {
            log::warn!("failed to remove keyframes: {e}");
        }
        removed
    }

    /// Forget compiled patterns, e.g. after the keyword set changed.
    pub fn reset_patterns(&mut self) {
        self.compiler.clear();
        self.matchers = None;
    }

    fn matchers_for(&mut self, plan: &HighlightPlan) -> Rc<KeywordMatchers> {
        let key = format!("{}\u{1f}{}", plan.exact_case, plan.keywords.join("\u{1f}"));
        if let Some((cached_key, matchers)) = &self.matchers {
            if *cached_key == key {
                return Rc::clone(matchers);
            }
            // Different keyword set: bound the boundary cache
            self.compiler.clear();
        }
        let matchers = Rc::new(KeywordMatchers::compile(&mut self.compiler, plan, self.config.backtrack_limit));
        self.matchers = Some((key, Rc::clone(&matchers)));
        matchers
    }

    fn collect_text_nodes(&self, doc: &Document, roots: &[NodeId]) -> VecDeque<NodeId> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut queue = VecDeque::new();

        'roots: for &root in roots {
            if !doc.is_connected(root) {
                log::debug!("skipping detached root {root:?}");
                continue;
            }
            for node in doc.descendants(root) {
                if queue.len() >= self.config.max_text_nodes {
                    log::debug!("text node ceiling {} reached", self.config.max_text_nodes);
                    break 'roots;
                }
                if accepts_text_node(doc, node) && seen.insert(node) {
                    queue.push_back(node);
                }
            }
        }
        queue
    }

    fn highlight_text_node(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        plan: &HighlightPlan,
        matchers: &KeywordMatchers,
        flash: bool,
    ) -> Result<Vec<NodeId>, EngineError> {
        // The page may have moved or edited this node since it was queued
        if !doc.is_connected(node) || !accepts_text_node(doc, node) {
            return Ok(Vec::new());
        }
        let text = match doc.kind(node) {
            Some(NodeKind::Text { text }) => text.clone(),
            _ => return Ok(Vec::new()),
        };

        let spans = matchers.find(&text, plan)?;
        if spans.is_empty() {
            return Ok(Vec::new());
        }

        let wrapper = doc.create_element("span");
        doc.set_attribute(wrapper, "class", WRAPPER_CLASS)?;
        doc.set_attribute(wrapper, MARKER_ATTR, "true")?;

        let mut created = Vec::with_capacity(spans.len());
        let mut cursor = 0;
        for span in &spans {
            if span.start > cursor {
                let before = doc.create_text(&text[cursor..span.start]);
                doc.append_child(wrapper, before)?;
            }

            let matched = &text[span.start..span.end];
            let animation = self.keyframes.ensure(span.colors);
            let highlight = doc.create_element("span");
            doc.set_attribute(highlight, "class", HIGHLIGHT_CLASS)?;
            if flash {
                doc.add_class(highlight, FLASH_CLASS)?;
            }
            doc.set_attribute(highlight, MARKER_ATTR, "true")?;
            doc.set_attribute(highlight, "data-keyword", &matched.to_lowercase())?;
            doc.set_attribute(highlight, "style", &highlight_style(span.colors, animation.as_deref()))?;
            let inner = doc.create_text(matched);
            doc.append_child(highlight, inner)?;
            doc.append_child(wrapper, highlight)?;

            created.push(highlight);
            cursor = span.end;
        }
        if cursor < text.len() {
            let after = doc.create_text(&text[cursor..]);
            doc.append_child(wrapper, after)?;
        }

        doc.replace_with(node, &[wrapper])?;
        Ok(created)
    }
}
