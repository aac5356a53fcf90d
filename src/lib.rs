// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. search::SearchResult)
    clippy::module_name_repetitions
)]

//! # Markview
//!
//! The core of a desktop markdown viewer.
//!
//! Markview turns markdown into a themed, sanitized HTML page with:
//! - Unique heading anchors and a table of contents
//! - Structural themes and light/dark palettes
//! - In-document search with wraparound navigation
//! - Live reload of the open file and its theme
//!
//! ## Architecture
//!
//! A host shell (window, menus, dialogs) owns an [`app::App`] and calls its
//! synchronous operations. Background work reports back through
//! [`app::Notification`]s sent over a channel the host drains.
//!
//! ## Modules
//!
//! - [`app`]: Application facade, shared state and notifications
//! - [`document`]: Markdown parsing and HTML rendering
//! - [`theme`]: Theme and palette CSS
//! - [`search`]: Search functionality
//! - [`watcher`]: File watching
//! - [`config`]: Persisted settings
//! - [`files`]: Path normalisation and size limits

pub mod app;
pub mod config;
pub mod document;
pub mod error;
pub mod files;
pub mod search;
pub mod theme;
pub mod watcher;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{App, HostContext, Notification};
    pub use crate::config::ConfigStore;
    pub use crate::document::{RenderResult, TocItem};
    pub use crate::search::{Direction, SearchResult};
    pub use crate::theme::Palette;
    pub use crate::watcher::WatchState;
}
