//! Keyword to color mapping
//!
//! Builds the `HighlightPlan` for a page: every keyword contributed by the
//! matching profiles, mapped to the ordered list of colors it should render
//! with. The first color is the primary one; more than one color drives a
//! cycling animation.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::profile::matching_pattern_entry;
use crate::types::{is_hex_color, Profile, GLOBAL_TEXT_COLOR_KEY};

/// Background used when neither an override nor the group supplies one.
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#ffff00";

/// One rendering of a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordColor {
    pub background_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

/// Lowercased keyword -> colors in contribution order.
pub type KeywordColorMap = BTreeMap<String, Vec<KeywordColor>>;

/// Everything the engine needs to highlight one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightPlan {
    pub color_map: KeywordColorMap,
    /// Keywords as entered, deduplicated per `exact_case`.
    pub keywords: Vec<String>,
    /// Page-wide: set when any matching profile asks for it.
    pub exact_case: bool,
}

impl HighlightPlan {
    pub fn is_empty(&self) -> bool {
        self.color_map.is_empty() || self.keywords.is_empty()
    }

    /// Colors for a matched piece of text.
    pub fn colors_for(&self, matched: &str) -> Option<&[KeywordColor]> {
        self.color_map
            .get(&matched.to_lowercase())
            .map(Vec::as_slice)
            .filter(|colors| !colors.is_empty())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Build the plan for the profiles matching `url`.
///
/// Profile order, then group order, decides color order for keywords shared
/// between groups. Inputs are never modified.
pub fn build_highlight_plan(profiles: &[&Profile], url: &str) -> HighlightPlan {
    let exact_case = profiles.iter().any(|p| p.exact_case);
    let mut plan = HighlightPlan {
        exact_case,
        ..Default::default()
    };
    let mut seen_keywords: HashSet<String> = HashSet::new();

    for profile in profiles {
        let entry = matching_pattern_entry(profile, url);
        let text_override = entry
            .and_then(|e| e.text_color_overrides.get(GLOBAL_TEXT_COLOR_KEY))
            .map(String::as_str);
        let mut profile_seen: HashSet<String> = HashSet::new();

        for group in &profile.keyword_groups {
            if group.clean_keywords().next().is_none() {
                continue;
            }

            let group_override = match (entry, group.id.as_deref()) {
                (Some(entry), Some(id)) => entry.color_overrides.get(id).map(String::as_str),
                _ => None,
            };
            let background = first_valid([group_override, group.color.as_deref()])
                .unwrap_or(DEFAULT_HIGHLIGHT_COLOR);
            let text = first_valid([text_override, group.text_color.as_deref()]);
            let color = KeywordColor {
                background_color: background.to_string(),
                text_color: text.map(str::to_string),
            };

            let mut group_seen: HashSet<String> = HashSet::new();
            for keyword in group.clean_keywords() {
                let dedupe_key = if profile.exact_case {
                    keyword.to_string()
                } else {
                    keyword.to_lowercase()
                };
                if !group_seen.insert(dedupe_key.clone()) {
                    continue;
                }
                if profile.unique_keywords && !profile_seen.insert(dedupe_key) {
                    continue;
                }

                plan.color_map
                    .entry(keyword.to_lowercase())
                    .or_default()
                    .push(color.clone());

                let list_key = if exact_case {
                    keyword.to_string()
                } else {
                    keyword.to_lowercase()
                };
                if seen_keywords.insert(list_key) {
                    plan.keywords.push(keyword.to_string());
                }
            }
        }
    }

    log::debug!(
        "built highlight plan: {} keywords, {} profiles, exact_case={}",
        plan.keywords.len(),
        profiles.len(),
        plan.exact_case
    );
    plan
}

fn first_valid<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    for candidate in candidates.into_iter().flatten() {
        if is_hex_color(candidate) {
            return Some(candidate);
        }
        log::warn!("ignoring malformed color {candidate:?}");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KeywordGroup, PatternList, UrlPatternEntry};

    const URL: &str = "https://jobs.example/42";

    fn group(id: &str, keywords: &[&str], color: Option<&str>) -> KeywordGroup {
        KeywordGroup {
            id: Some(id.into()),
            keywords: keywords.iter().map(|k| (*k).into()).collect(),
            color: color.map(Into::into),
            ..Default::default()
        }
    }

    fn profile(id: &str, groups: Vec<KeywordGroup>) -> Profile {
        Profile {
            id: id.into(),
            url_patterns: vec![UrlPatternEntry {
                url_pattern: PatternList::One("https://jobs.example/*".into()),
                ..Default::default()
            }],
            keyword_groups: groups,
            ..Default::default()
        }
    }

    fn bg(color: &str) -> KeywordColor {
        KeywordColor {
            background_color: color.into(),
            text_color: None,
        }
    }

    #[test]
    fn test_override_beats_group_color() {
        let mut p = profile("p", vec![group("g1", &["Rust"], Some("#ffff00"))]);
        p.url_patterns[0]
            .color_overrides
            .insert("g1".into(), "#ff0000".into());
        let plan = build_highlight_plan(&[&p], URL);
        assert_eq!(plan.color_map["rust"], vec![bg("#ff0000")]);
        assert_eq!(plan.keywords, vec!["Rust"]);
    }

    #[test]
    fn test_override_from_matching_entry_only() {
        let mut p = profile("p", vec![group("g1", &["rust"], Some("#00ff00"))]);
        p.url_patterns.insert(
            0,
            UrlPatternEntry {
                url_pattern: PatternList::One("https://other.example/*".into()),
                color_overrides: [("g1".to_string(), "#ff0000".to_string())].into(),
                ..Default::default()
            },
        );
        let plan = build_highlight_plan(&[&p], URL);
        assert_eq!(plan.color_map["rust"], vec![bg("#00ff00")]);
    }

    #[test]
    fn test_default_and_malformed_colors() {
        let mut p = profile("p", vec![group("g1", &["rust"], None), group("g2", &["go"], Some("red"))]);
        p.url_patterns[0]
            .color_overrides
            .insert("g2".into(), "#zzzzzz".into());
        let plan = build_highlight_plan(&[&p], URL);
        assert_eq!(plan.color_map["rust"], vec![bg(DEFAULT_HIGHLIGHT_COLOR)]);
        assert_eq!(plan.color_map["go"], vec![bg(DEFAULT_HIGHLIGHT_COLOR)]);
    }

    #[test]
    fn test_global_text_color() {
        let mut g2 = group("g2", &["go"], Some("#222222"));
        g2.text_color = Some("#ffffff".into());
        let mut p = profile("p", vec![group("g1", &["rust"], Some("#111111")), g2]);
        let plan = build_highlight_plan(&[&p], URL);
        assert_eq!(plan.color_map["rust"][0].text_color, None);
        assert_eq!(plan.color_map["go"][0].text_color.as_deref(), Some("#ffffff"));

        p.url_patterns[0]
            .text_color_overrides
            .insert("global".into(), "#000000".into());
        let plan = build_highlight_plan(&[&p], URL);
        assert_eq!(plan.color_map["rust"][0].text_color.as_deref(), Some("#000000"));
        assert_eq!(plan.color_map["go"][0].text_color.as_deref(), Some("#000000"));
    }

    #[test]
    fn test_multi_profile_collision_keeps_order() {
        let a = profile("a", vec![group("ga", &["python"], Some("#111111"))]);
        let b = profile("b", vec![group("gb", &["Python"], Some("#222222"))]);
        let plan = build_highlight_plan(&[&a, &b], URL);
        assert_eq!(plan.color_map["python"], vec![bg("#111111"), bg("#222222")]);
        assert_eq!(plan.keywords, vec!["python"]);
        assert_eq!(plan.colors_for("PYTHON").map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_exact_case_is_page_wide() {
        let a = profile("a", vec![group("ga", &["Go"], Some("#111111"))]);
        let mut b = profile("b", vec![group("gb", &["go"], Some("#222222"))]);
        b.exact_case = true;
        let plan = build_highlight_plan(&[&a, &b], URL);
        assert!(plan.exact_case);
        assert_eq!(plan.keywords, vec!["Go", "go"]);
        assert_eq!(plan.color_map["go"].len(), 2);
    }

    #[test]
    fn test_duplicates_within_group_and_unique_keywords() {
        let mut p = profile(
            "p",
            vec![
                group("g1", &["rust", "RUST", " rust "], Some("#111111")),
                group("g2", &["rust", "go"], Some("#222222")),
            ],
        );
        let plan = build_highlight_plan(&[&p], URL);
        assert_eq!(plan.color_map["rust"], vec![bg("#111111"), bg("#222222")]);

        p.unique_keywords = true;
        let plan = build_highlight_plan(&[&p], URL);
        assert_eq!(plan.color_map["rust"], vec![bg("#111111")]);
        assert_eq!(plan.color_map["go"], vec![bg("#222222")]);
    }

    #[test]
    fn test_inputs_untouched() {
        let p = profile("p", vec![group("g1", &["Rust"], Some("#111111"))]);
        let before = p.clone();
        let _ = build_highlight_plan(&[&p], URL);
        assert_eq!(p, before);
    }
}
