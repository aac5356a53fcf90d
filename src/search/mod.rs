//! Search functionality.
//!
//! Provides text search within the loaded document with:
//! - Case-insensitive option
//! - Overlapping matches
//! - Next/previous navigation with wraparound
//!
//! Positions and lengths count characters (Unicode scalar values), not bytes.

use std::str::FromStr;

use serde::Serialize;

use crate::error::Error;

/// Stop scanning after this many matches.
pub const MAX_MATCHES: usize = 1000;

/// Characters of surrounding text kept on each side of a match.
pub const CONTEXT_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub id: String,
    /// Matched text as it appears in the document.
    pub text: String,
    pub context: String,
    pub position: usize,
    pub length: usize,
}

/// Outcome of a search plus the navigation cursor.
///
/// `current_index < total` whenever `total > 0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub query: String,
    pub matches: Vec<SearchMatch>,
    pub total: usize,
    pub current_index: usize,
    pub case_sensitive: bool,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" => Ok(Self::Next),
            "prev" => Ok(Self::Prev),
            _ => Err(Error::Validation("search direction")),
        }
    }
}

impl SearchResult {
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn current(&self) -> Option<&SearchMatch> {
        self.matches.get(self.current_index)
    }

    /// Move the cursor, wrapping at both ends. No-op without matches.
    pub fn navigate(&mut self, direction: Direction) {
        if self.total == 0 {
            return;
        }
        self.current_index = match direction {
            Direction::Next if self.current_index + 1 >= self.total => 0,
            Direction::Next => self.current_index + 1,
            Direction::Prev if self.current_index == 0 => self.total - 1,
            Direction::Prev => self.current_index - 1,
        };
    }
}

/// Fold a character to one lowercase character so folded text stays
/// index-aligned with the original.
fn fold(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Find every occurrence of `query` in `document`.
///
/// The query is trimmed; a blank query gives an empty result. The scan
/// advances one character after each hit so overlapping occurrences are
/// all reported.
pub fn search(document: &str, query: &str, case_sensitive: bool) -> SearchResult {
    let query = query.trim();
    if query.is_empty() {
        return SearchResult::default();
    }

    let chars: Vec<char> = document.chars().collect();
    let normalize = |c: char| if case_sensitive { c } else { fold(c) };
    let haystack: Vec<char> = chars.iter().copied().map(normalize).collect();
    let needle: Vec<char> = query.chars().map(normalize).collect();
    let len = needle.len();

    let matches: Vec<SearchMatch> = haystack
        .windows(len)
        .enumerate()
        .filter(|(_, window)| *window == needle.as_slice())
        .take(MAX_MATCHES)
        .enumerate()
        .map(|(n, (position, _))| {
            let context_start = position.saturating_sub(CONTEXT_CHARS);
            let context_end = (position + len + CONTEXT_CHARS).min(chars.len());
            SearchMatch {
                id: format!("search-match-{n}"),
                text: chars[position..position + len].iter().collect(),
                context: chars[context_start..context_end].iter().collect(),
                position,
                length: len,
            }
        })
        .collect();

    SearchResult {
        query: query.to_string(),
        total: matches.len(),
        matches,
        current_index: 0,
        case_sensitive,
    }
}
