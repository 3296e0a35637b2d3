//! Keyword and URL list parsing
//!
//! Users paste keywords and URLs as free text. These helpers turn that text
//! into normalized token lists.

// =============================================================================
// Delimiters
// =============================================================================

/// Delimiter class used to split raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeywordDelimiters {
    /// Free-form bank/menu text: `, ; \n \r \t |`
    #[default]
    FreeText,
    /// Structured form fields: `, ; \t |`, never newlines
    FormField,
    /// Commas only
    CommaOnly,
}

impl KeywordDelimiters {
    #[inline]
    fn is_delimiter(self, c: char) -> bool {
        match self {
            Self::FreeText => matches!(c, ',' | ';' | '\n' | '\r' | '\t' | '|'),
            Self::FormField => matches!(c, ',' | ';' | '\t' | '|'),
            Self::CommaOnly => c == ',',
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse keyword text.
///
/// `include_newline_delimiters` selects free-text splitting (newlines count)
/// over form-field splitting.
pub fn parse_keywords(text: &str, include_newline_delimiters: bool) -> Vec<String> {
    let delimiters = if include_newline_delimiters {
        KeywordDelimiters::FreeText
    } else {
        KeywordDelimiters::FormField
    };
    parse_keywords_with(text, delimiters)
}

/// Parse keyword text with an explicit delimiter class.
///
/// Pieces are trimmed, slash-separated unless the slash joins two word
/// characters (`HL7/FHIR`, `24/7`), then split on runs of two or more spaces.
/// The result keeps the first occurrence of each token.
pub fn parse_keywords_with(text: &str, delimiters: KeywordDelimiters) -> Vec<String> {
    let mut tokens = Vec::new();

    for piece in split_trimmed(text, delimiters) {
        let parts: Vec<&str> = if piece.contains('/') && !has_word_slash_word(piece) {
            piece.split('/').map(str::trim).filter(|p| !p.is_empty()).collect()
        } else {
            vec![piece]
        };

        for part in parts {
            for token in split_double_spaces(part) {
                tokens.push(token.to_string());
            }
        }
    }

    dedupe(tokens)
}

/// Parse a URL list. Only delimiter splitting, trimming and dedup apply:
/// URLs legitimately contain slashes.
pub fn parse_url_list(text: &str) -> Vec<String> {
    let tokens = split_trimmed(text, KeywordDelimiters::FreeText)
        .map(str::to_string)
        .collect();
    dedupe(tokens)
}

fn split_trimmed(text: &str, delimiters: KeywordDelimiters) -> impl Iterator<Item = &str> {
    text.split(move |c| delimiters.is_delimiter(c))
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
}

#[inline]
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `\w/\w` anywhere in the piece.
fn has_word_slash_word(piece: &str) -> bool {
    let chars: Vec<char> = piece.chars().collect();
    chars
        .windows(3)
        .any(|w| w[1] == '/' && is_word_char(w[0]) && is_word_char(w[2]))
}

/// Split on runs of two or more spaces.
fn split_double_spaces(piece: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let bytes = piece.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b' ' && i + 1 < bytes.len() && bytes[i + 1] == b' ' {
            let token = piece[start..i].trim();
            if !token.is_empty() {
                out.push(token);
            }
            while i < bytes.len() && bytes[i] == b' ' {
                i += 1;
            }
            start = i;
            continue;
        }
        i += 1;
    }

    let token = piece[start..].trim();
    if !token.is_empty() {
        out.push(token);
    }
    out
}

fn dedupe(tokens: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if !out.contains(&token) {
            out.push(token);
        }
    }
    out
}
