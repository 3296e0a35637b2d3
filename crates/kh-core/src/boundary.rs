//! Word-boundary aware keyword patterns
//!
//! A keyword must never match inside a larger word: `API` matches in
//! "the API spec" but not in "RAPID". The assertions added around a keyword
//! depend on the keyword's own first and last characters, so `C++` gets no
//! trailing assertion and still matches in "C++,".
//!
//! Word characters follow the ASCII `[A-Za-z0-9_]` class.

use std::collections::HashMap;

const NOT_PRECEDED_BY_WORD: &str = "(?<![A-Za-z0-9_])";
const NOT_FOLLOWED_BY_WORD: &str = "(?![A-Za-z0-9_])";

#[inline]
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `^[a-zA-Z]$`
#[inline]
pub fn is_single_letter(keyword: &str) -> bool {
    let mut chars = keyword.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
}

/// Build the pattern source for one keyword without caching.
pub fn boundary_pattern(keyword: &str) -> String {
    let escaped = fancy_regex::escape(keyword);

    if is_single_letter(keyword) {
        return format!("{NOT_PRECEDED_BY_WORD}{escaped}{NOT_FOLLOWED_BY_WORD}");
    }

    // Phrases and single words share the same rule: only guard an edge that
    // is itself a word character.
    let starts_word = keyword.chars().next().is_some_and(is_word_char);
    let ends_word = keyword.chars().next_back().is_some_and(is_word_char);

    let mut pattern = String::with_capacity(escaped.len() + 40);
    if starts_word {
        pattern.push_str(NOT_PRECEDED_BY_WORD);
    }
    pattern.push_str(&escaped);
    if ends_word {
        pattern.push_str(NOT_FOLLOWED_BY_WORD);
    }
    pattern
}

// =============================================================================
// Compiler
// =============================================================================

/// Memoizing boundary pattern compiler.
///
/// The cache grows with every distinct keyword seen and is only emptied by
/// `clear`, which callers do when the active keyword set changes.
#[derive(Debug, Default)]
pub struct BoundaryCompiler {
    cache: HashMap<String, String>,
}

impl BoundaryCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pattern source for `keyword`.
    pub fn compile(&mut self, keyword: &str) -> &str {
        if !self.cache.contains_key(keyword) {
            self.cache.insert(keyword.to_string(), boundary_pattern(keyword));
        }
        &self.cache[keyword]
    }

    /// Alternation of the compiled patterns, in the order given.
    pub fn alternation<'k, I>(&mut self, keywords: I) -> String
    where
        I: IntoIterator<Item = &'k str>,
    {
        let mut out = String::new();
        for keyword in keywords {
            if !out.is_empty() {
                out.push('|');
            }
            out.push_str("(?:");
            out.push_str(self.compile(keyword));
            out.push(')');
        }
        out
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
