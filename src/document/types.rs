//! Core document types.

use std::path::PathBuf;

use serde::Serialize;

/// One table of contents entry, produced per non-empty heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocItem {
    /// Anchor id, unique within one render.
    pub id: String,
    pub text: String,
    /// Heading depth, 1 through 6.
    pub level: u8,
}

impl TocItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>, level: u8) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            level,
        }
    }
}

/// A complete HTML page plus the TOC of its headings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    pub html: String,
    pub toc: Vec<TocItem>,
}

/// What the host receives after rendering a file from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    pub path: PathBuf,
    pub html: String,
    pub toc: Vec<TocItem>,
    pub char_count: usize,
    pub word_count: usize,
}
