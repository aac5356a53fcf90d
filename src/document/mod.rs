//! Markdown document rendering.
//!
//! This module handles:
//! - Parsing markdown with comrak
//! - Assigning unique heading anchors and collecting the TOC
//! - Sanitizing the rendered fragment
//! - Assembling the themed HTML page

mod html;
mod parser;
mod sanitize;
mod slug;
mod types;

pub use html::{Renderer, render_document};
pub use parser::{Fragment, render_fragment};
pub use sanitize::sanitize;
pub use slug::{SlugRegistry, slugify};
pub use types::{RenderOutput, RenderResult, TocItem};
