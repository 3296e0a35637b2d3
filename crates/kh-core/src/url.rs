//! Wildcard URL pattern matching
//!
//! Matching is byte-exact: no case folding, no trailing slash handling.
//! `*` is the only special character.

// =============================================================================
// Pattern Matching
// =============================================================================

/// Check whether `url` matches a wildcard `pattern`.
///
/// Rules, in order:
/// 1. Empty url or pattern never matches.
/// 2. Trailing `*` is a prefix match.
/// 3. Leading `*` is a suffix match.
/// 4. Any other `*` matches any run of characters, the rest is literal and the
///    whole url must be covered.
/// 5. Otherwise exact equality.
pub fn url_matches(url: &str, pattern: &str) -> bool {
    if url.is_empty() || pattern.is_empty() {
        return false;
    }

    if let Some(prefix) = pattern.strip_suffix('*') {
        return url.starts_with(prefix);
    }

    if let Some(suffix) = pattern.strip_prefix('*') {
        return url.ends_with(suffix);
    }

    if pattern.contains('*') {
        return glob_matches(url, pattern);
    }

    url == pattern
}

/// Full-string glob match where `*` spans any run of characters.
///
/// Walks literal segments left to right: the first must sit at the start,
/// the last at the end, and the middle ones are found leftmost-first.
fn glob_matches(url: &str, pattern: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return false,
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return url == *first,
    };

    if !url.starts_with(first) {
        return false;
    }
    let mut pos = first.len();

    for literal in middle {
        if literal.is_empty() {
            continue;
        }
        match url[pos..].find(literal) {
            Some(offset) => pos += offset + literal.len(),
            None => return false,
        }
    }

    url.len() >= pos + last.len() && url[pos..].ends_with(last)
}
