//! KeyHighlight Core Library
//!
//! This crate holds everything the highlighter needs to decide *what* to
//! highlight on a page, independent of any DOM:
//!
//! - `types`: Stored profile data model (profiles, URL patterns, keyword groups)
//! - `url`: Wildcard URL pattern matching
//! - `keywords`: Free-text keyword and URL list parsing
//! - `profile`: Profile selection for a page URL and profile-set signatures
//! - `colors`: Keyword to color mapping for the matching profiles
//! - `boundary`: Word-boundary aware regex fragments for keywords
//! - `hash`: Murmur3 string hashing used for stable generated names
//!
//! The page crate consumes the `HighlightPlan` produced here and applies it to
//! a live document.

pub mod boundary;
pub mod colors;
pub mod hash;
pub mod keywords;
pub mod profile;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use boundary::{BoundaryCompiler, is_single_letter};
pub use colors::{build_highlight_plan, HighlightPlan, KeywordColor, KeywordColorMap, DEFAULT_HIGHLIGHT_COLOR};
pub use keywords::{parse_keywords, parse_keywords_with, parse_url_list, KeywordDelimiters};
pub use profile::{find_matching_profiles, generate_signature, matching_pattern_entry};
pub use types::{is_hex_color, KeywordGroup, PatternList, Profile, StoredSettings, UrlPatternEntry};
pub use url::url_matches;
