//! Profile selection for a page URL
//!
//! Given every stored profile and the current URL, pick the ones that apply.
//! Also derives the profile-set signature used to skip redundant rewrites.

use crate::types::{Profile, UrlPatternEntry};
use crate::url::url_matches;

// =============================================================================
// Matching
// =============================================================================

/// Profiles whose URL patterns match `url`, in storage order.
///
/// Inactive profiles (no keywords or no patterns) never match.
pub fn find_matching_profiles<'a>(profiles: &'a [Profile], url: &str) -> Vec<&'a Profile> {
    profiles
        .iter()
        .filter(|profile| profile.is_active() && profile_matches(profile, url))
        .collect()
}

/// Whether any resolved pattern of `profile` matches `url`.
pub fn profile_matches(profile: &Profile, url: &str) -> bool {
    profile
        .resolved_patterns()
        .iter()
        .any(|pattern| url_matches(url, pattern))
}

/// First URL pattern entry of `profile` whose patterns match `url`.
///
/// Its overrides are the ones applied on this page. The legacy profile-level
/// pattern carries no overrides and is never returned.
pub fn matching_pattern_entry<'a>(profile: &'a Profile, url: &str) -> Option<&'a UrlPatternEntry> {
    profile.url_patterns.iter().find(|entry| {
        entry
            .url_pattern
            .resolve()
            .iter()
            .any(|pattern| url_matches(url, pattern))
    })
}

// =============================================================================
// Signatures
// =============================================================================

/// Deterministic summary of everything in a profile set that affects
/// highlighting. Insensitive to the order of the profiles themselves.
pub fn generate_signature<'a, I>(profiles: I) -> String
where
    I: IntoIterator<Item = &'a Profile>,
{
    let mut parts: Vec<String> = profiles.into_iter().map(profile_signature).collect();
    parts.sort();
    parts.join("||")
}

fn profile_signature(profile: &Profile) -> String {
    let mut parts = vec![format!("id={}", profile.id)];

    if let Some(legacy) = &profile.url_pattern {
        parts.push(format!("legacy={}", legacy.raw().join(",")));
    }

    for entry in &profile.url_patterns {
        parts.push(format!(
            "url={}|bg={}|fg={}",
            entry.url_pattern.raw().join(","),
            join_map(entry.color_overrides.iter()),
            join_map(entry.text_color_overrides.iter()),
        ));
    }

    for group in &profile.keyword_groups {
        parts.push(format!(
            "group={}|{}|{}|{}",
            group.id.as_deref().unwrap_or(""),
            group.keywords.join(","),
            group.color.as_deref().unwrap_or(""),
            group.text_color.as_deref().unwrap_or(""),
        ));
    }

    parts.push(format!("exact={}|unique={}", profile.exact_case, profile.unique_keywords));
    parts.join("::")
}

fn join_map<'a>(entries: impl Iterator<Item = (&'a String, &'a String)>) -> String {
    entries
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KeywordGroup, PatternList};

    fn profile(id: &str, patterns: &[&str], keywords: &[&str], color: &str) -> Profile {
        Profile {
            id: id.into(),
            url_patterns: patterns
                .iter()
                .map(|p| UrlPatternEntry {
                    url_pattern: PatternList::One((*p).into()),
                    ..Default::default()
                })
                .collect(),
            keyword_groups: vec![KeywordGroup {
                id: Some(format!("{id}-g")),
                keywords: keywords.iter().map(|k| (*k).into()).collect(),
                color: Some(color.into()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_find_matching_profiles_in_storage_order() {
        let profiles = vec![
            profile("a", &["https://jobs.example/*"], &["rust"], "#111111"),
            profile("b", &["https://other.example/*"], &["go"], "#222222"),
            profile("c", &["*example/jobs/1", "https://jobs.example/*"], &["zig"], "#333333"),
        ];
        let matched = find_matching_profiles(&profiles, "https://jobs.example/1");
        let ids: Vec<&str> = matched.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_bundled_patterns_are_resplit() {
        let profiles = vec![profile(
            "a",
            &["https://one.example/*,\nhttps://two.example/*"],
            &["rust"],
            "#111111",
        )];
        assert_eq!(find_matching_profiles(&profiles, "https://two.example/x").len(), 1);
    }

    #[test]
    fn test_legacy_pattern_field() {
        let mut p = profile("a", &[], &["rust"], "#111111");
        p.url_pattern = Some(PatternList::One("https://legacy.example/*".into()));
        let profiles = vec![p];
        assert_eq!(find_matching_profiles(&profiles, "https://legacy.example/a").len(), 1);
        assert!(matching_pattern_entry(&profiles[0], "https://legacy.example/a").is_none());
    }

    #[test]
    fn test_inactive_profile_never_matches() {
        let profiles = vec![profile("a", &["*"], &[], "#111111")];
        assert!(find_matching_profiles(&profiles, "https://x.example").is_empty());
    }

    #[test]
    fn test_matching_pattern_entry_picks_first_match() {
        let mut p = profile("a", &["https://x.example/a/*", "https://x.example/*"], &["rust"], "#111111");
        p.url_patterns[1].color_overrides.insert("a-g".into(), "#ff0000".into());
        let entry = matching_pattern_entry(&p, "https://x.example/b").unwrap();
        assert_eq!(entry.color_overrides["a-g"], "#ff0000");
        let entry = matching_pattern_entry(&p, "https://x.example/a/1").unwrap();
        assert!(entry.color_overrides.is_empty());
    }

    #[test]
    fn test_signature_order_independent() {
        let a = profile("a", &["*"], &["rust"], "#111111");
        let b = profile("b", &["*"], &["go"], "#222222");
        assert_eq!(generate_signature([&a, &b]), generate_signature([&b, &a]));
    }

    #[test]
    fn test_signature_tracks_content() {
        let a = profile("a", &["*"], &["rust"], "#111111");
        let base = generate_signature([&a]);

        let mut recolored = a.clone();
        recolored.keyword_groups[0].color = Some("#999999".into());
        assert_ne!(base, generate_signature([&recolored]));

        let mut overridden = a.clone();
        overridden.url_patterns[0]
            .text_color_overrides
            .insert("global".into(), "#000000".into());
        assert_ne!(base, generate_signature([&overridden]));

        let mut exact = a.clone();
        exact.exact_case = true;
        assert_ne!(base, generate_signature([&exact]));

        assert_eq!(generate_signature(std::iter::empty()), "");
    }
}
