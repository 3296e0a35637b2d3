//! Highlight markup conventions and injected keyframe styles
//!
//! Keywords with more than one color cycle through them with a CSS animation.
//! One `@keyframes` rule exists per distinct ordered color list, named after
//! a hash of that list, so repeated combinations share one rule.

use std::collections::BTreeMap;

use indextree::NodeId;
use kh_core::hash::hash_list;
use kh_core::KeywordColor;

use crate::dom::{Document, DomError};

/// Marker attribute set on every node the engine creates.
pub const MARKER_ATTR: &str = "data-highlighted";
/// Class of the span wrapping a rewritten text node.
pub const WRAPPER_CLASS: &str = "kh-wrapper";
/// Class of a single highlighted keyword occurrence.
pub const HIGHLIGHT_CLASS: &str = "kh-highlight";
/// Temporary class applied after a forced refresh.
pub const FLASH_CLASS: &str = "kh-flash";
/// Marks extension UI (toasts) that must never be highlighted.
pub const UI_ATTR: &str = "data-kh-ui";
/// Id of the injected `<style>` element.
pub const STYLE_ELEMENT_ID: &str = "kh-keyframes";

/// Seconds spent on each color of a cycling highlight.
const SECONDS_PER_COLOR: usize = 1;

const FLASH_RULE: &str = ".kh-flash { outline: 2px solid #ff9800; outline-offset: 1px; }";

/// Nodes created by the engine or belonging to extension UI.
pub fn is_highlight_node(doc: &Document, id: NodeId) -> bool {
    doc.has_attribute(id, MARKER_ATTR)
        || doc.has_attribute(id, UI_ATTR)
        || doc.has_class(id, WRAPPER_CLASS)
        || doc.has_class(id, HIGHLIGHT_CLASS)
}

/// Inline style for a highlight span.
pub fn highlight_style(colors: &[KeywordColor], animation: Option<&str>) -> String {
    let mut style = String::new();
    if let Some(primary) = colors.first() {
        style.push_str(&format!("background-color: {};", primary.background_color));
        if let Some(text) = &primary.text_color {
            style.push_str(&format!(" color: {text};"));
        }
    }
    if let Some(name) = animation {
        style.push_str(&format!(
            " animation: {name} {}s step-end infinite;",
            colors.len() * SECONDS_PER_COLOR
        ));
    }
    style
}

/// `kh-blink-<hash>` for an ordered color list. Both colors of every entry
/// take part, since the generated rule sets both.
pub fn animation_name(colors: &[KeywordColor]) -> String {
    let hash = hash_list(
        colors
            .iter()
            .flat_map(|c| [c.background_color.as_str(), c.text_color.as_deref().unwrap_or("")]),
    );
    format!("kh-blink-{hash:08x}")
}

fn keyframes_rule(name: &str, colors: &[KeywordColor]) -> String {
    let mut rule = format!("@keyframes {name} {{");
    let count = colors.len();
    for (i, color) in colors.iter().enumerate() {
        push_frame(&mut rule, i * 100 / count, color);
    }
    // Closing frame repeats the first so the cycle wraps cleanly
    if let Some(first) = colors.first() {
        push_frame(&mut rule, 100, first);
    }
    rule.push_str(" }");
    rule
}

fn push_frame(rule: &mut String, percent: usize, color: &KeywordColor) {
    rule.push_str(&format!(" {percent}% {{ background-color: {};", color.background_color));
    if let Some(text) = &color.text_color {
        rule.push_str(&format!(" color: {text};"));
    }
    rule.push_str(" }");
}

// =============================================================================
// Registry
// =============================================================================

/// Keyframe rules injected into the page, deduplicated by color list hash.
#[derive(Debug, Default)]
pub struct KeyframeRegistry {
    rules: BTreeMap<String, String>,
    style_node: Option<NodeId>,
    dirty: bool,
}

impl KeyframeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Animation name for `colors`, registering its rule on first use.
    /// Returns `None` for single-color keywords.
    pub fn ensure(&mut self, colors: &[KeywordColor]) -> Option<String> {
        if colors.len() < 2 {
            return None;
        }
        let name = animation_name(colors);
        if !self.rules.contains_key(&name) {
            self.rules.insert(name.clone(), keyframes_rule(&name, colors));
            self.dirty = true;
        }
        Some(name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Write pending rules into the `<style>` element, creating it in `<head>`.
    pub fn flush(&mut self, doc: &mut Document) -> Result<(), DomError> {
        if !self.dirty {
            return Ok(());
        }

        let style = match self.style_node.filter(|&node| doc.is_connected(node)) {
            Some(node) => node,
            None => {
                let node = doc.create_element("style");
                doc.set_attribute(node, "id", STYLE_ELEMENT_ID)?;
                doc.set_attribute(node, UI_ATTR, "style")?;
                doc.append_child(doc.head(), node)?;
                self.style_node = Some(node);
                node
            }
        };

        let mut css = String::from(FLASH_RULE);
        for rule in self.rules.values() {
            css.push('\n');
            css.push_str(rule);
        }

        for child in doc.children(style) {
            doc.remove(child)?;
        }
        let text = doc.create_text(&css);
        doc.append_child(style, text)?;

        self.dirty = false;
        Ok(())
    }

    /// Drop every rule and the injected element.
    pub fn clear(&mut self, doc: &mut Document) -> Result<(), DomError> {
        self.rules.clear();
        self.dirty = false;
        if let Some(node) = self.style_node.take() {
            if doc.parent(node).is_some() {
                doc.remove(node)?;
            }
        }
        Ok(())
    }
}
