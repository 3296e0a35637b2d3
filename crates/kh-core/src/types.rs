//! Stored data model for KeyHighlight
//!
//! These types map directly to the JSON the extension keeps in storage.
//! The core only ever reads them; editing happens elsewhere.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::keywords::parse_url_list;

// =============================================================================
// Colors
// =============================================================================

/// Check for a `#RRGGBB` color.
#[inline]
pub fn is_hex_color(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 7 && bytes[0] == b'#' && bytes[1..].iter().all(|b| b.is_ascii_hexdigit())
}

// =============================================================================
// URL Patterns
// =============================================================================

/// One or more wildcard patterns stored in a single `urlPattern` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternList {
    One(String),
    Many(Vec<String>),
}

impl Default for PatternList {
    fn default() -> Self {
        Self::One(String::new())
    }
}

impl PatternList {
    /// Raw stored strings, before any re-splitting.
    pub fn raw(&self) -> Vec<&str> {
        match self {
            Self::One(s) => vec![s.as_str()],
            Self::Many(list) => list.iter().map(String::as_str).collect(),
        }
    }

    /// Patterns after re-splitting each stored string through the URL list
    /// parser. Stored values may bundle several comma or newline separated URLs.
    pub fn resolve(&self) -> Vec<String> {
        let mut out = Vec::new();
        for raw in self.raw() {
            for pattern in parse_url_list(raw) {
                if !out.contains(&pattern) {
                    out.push(pattern);
                }
            }
        }
        out
    }
}

/// A URL pattern entry with its per-pattern color overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlPatternEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub url_pattern: PatternList,
    /// Group id -> background color
    #[serde(default)]
    pub color_overrides: BTreeMap<String, String>,
    /// Group id (or `"global"`) -> text color
    #[serde(default)]
    pub text_color_overrides: BTreeMap<String, String>,
}

/// Key used for the all-keywords text color override.
pub const GLOBAL_TEXT_COLOR_KEY: &str = "global";

// =============================================================================
// Keyword Groups
// =============================================================================

/// A named set of keywords sharing one highlight color.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

impl KeywordGroup {
    /// Keywords with surrounding whitespace removed, empties dropped.
    pub fn clean_keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|k| k.trim()).filter(|k| !k.is_empty())
    }
}

// =============================================================================
// Profiles
// =============================================================================

/// Binding of URL patterns to keyword groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Legacy single-pattern field from older storage layouts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<PatternList>,
    #[serde(default)]
    pub url_patterns: Vec<UrlPatternEntry>,
    #[serde(default)]
    pub keyword_groups: Vec<KeywordGroup>,
    #[serde(default)]
    pub unique_keywords: bool,
    #[serde(default)]
    pub exact_case: bool,
}

impl Profile {
    /// Every resolved pattern of this profile, legacy field first.
    pub fn resolved_patterns(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(legacy) = &self.url_pattern {
            out.extend(legacy.resolve());
        }
        for entry in &self.url_patterns {
            out.extend(entry.url_pattern.resolve());
        }
        out
    }

    /// A profile needs a keyword and a URL pattern to ever match.
    pub fn is_active(&self) -> bool {
        let has_keyword = self
            .keyword_groups
            .iter()
            .any(|g| g.clean_keywords().next().is_some());
        has_keyword && !self.resolved_patterns().is_empty()
    }
}

// =============================================================================
// Stored Settings
// =============================================================================

fn default_enabled() -> bool {
    true
}

/// Persisted key-value layout read by the content side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSettings {
    #[serde(default = "default_enabled")]
    pub extension_enabled: bool,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    /// Only read by the editor UI.
    #[serde(default)]
    pub keyword_bank: Vec<String>,
}

impl Default for StoredSettings {
    fn default() -> Self {
        Self {
            extension_enabled: true,
            profiles: Vec::new(),
            keyword_bank: Vec::new(),
        }
    }
}
