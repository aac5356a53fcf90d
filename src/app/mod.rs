//! Application facade.
//!
//! [`App`] is what a host shell talks to. It wires together:
//! - [`SharedState`]: the single lock-guarded state object
//! - [`ConfigStore`]: persisted settings
//! - [`Renderer`]: markdown to themed HTML
//! - [`WatchCoordinator`]: live reload of the open file and theme
//!
//! Synchronous calls return [`Result`]; everything that happens in the
//! background reaches the host as a [`Notification`].

pub mod events;
pub mod state;

pub use events::{HostContext, Notification, StatusLevel, StatusMessage};
pub use state::SharedState;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ConfigStore;
use crate::document::{RenderResult, Renderer};
use crate::error::{Error, Result};
use crate::files::{count_words, enforce_file_limit, normalize_path, read_document};
use crate::search::{self, Direction, SearchResult};
use crate::theme::{Palette, ThemeSet};
use crate::watcher::{ReappearPolicy, WatchCoordinator, WatchState};

/// One application instance. Dropping it stops any watch session.
#[derive(Debug)]
pub struct App {
    state: Arc<SharedState>,
    config: ConfigStore,
    renderer: Renderer,
    watch: WatchCoordinator,
}

impl App {
    pub fn new(config: ConfigStore) -> Self {
        let state = Arc::new(SharedState::new());
        let renderer = Renderer::new(ThemeSet::new(config.themes_dir()));
        let watch = WatchCoordinator::new(Arc::clone(&state));
        Self {
            state,
            config,
            renderer,
            watch,
        }
    }

    /// Tune how long a removed file is waited for.
    #[must_use]
    pub fn with_reappear_policy(mut self, policy: ReappearPolicy) -> Self {
        self.watch.stop();
        self.watch = WatchCoordinator::with_policy(Arc::clone(&self.state), policy);
        self
    }

    pub const fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub const fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub const fn themes(&self) -> &ThemeSet {
        self.renderer.themes()
    }

    // --- lifecycle ---

    /// Called once the host UI is ready to receive notifications.
    pub fn startup<I, S>(&self, ctx: HostContext, args: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut launch_args: Vec<PathBuf> = args
            .into_iter()
            .filter(|arg| !arg.as_ref().starts_with("-psn_"))
            .filter_map(|arg| normalize_path(arg.as_ref()))
            .collect();
        let queued = self.state.set_context(ctx);
        tracing::debug!(args = launch_args.len(), queued = queued.len(), "startup");
        launch_args.extend(queued);
        self.state.set_launch_args(launch_args);
    }

    /// Files handed over by the OS (drag and drop, "open with").
    pub fn handle_file_open<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths: Vec<PathBuf> = paths
            .into_iter()
            .filter_map(|p| normalize_path(p.as_ref()))
            .collect();
        if paths.is_empty() {
            return;
        }
        match self.state.record_file_open(&paths) {
            Some(ctx) => {
                ctx.emit(Notification::FileOpen(paths));
            }
            None => {
                tracing::debug!(count = paths.len(), "queued file open until startup");
            }
        }
    }

    pub fn launch_args(&self) -> Vec<PathBuf> {
        self.state.launch_args()
    }

    // --- rendering ---

    /// Render with the configured palette and font scale.
    ///
    /// # Errors
    /// Only internal formatting faults.
    pub fn render_markdown(&self, markdown: &str, theme: &str) -> Result<String> {
        self.render_html(markdown, theme, self.config.palette())
    }

    /// `palette` is coerced to the default when unrecognised.
    ///
    /// # Errors
    /// Only internal formatting faults.
    pub fn render_markdown_with_palette(
        &self,
        markdown: &str,
        theme: &str,
        palette: &str,
    ) -> Result<String> {
        self.render_html(markdown, theme, Palette::parse_or_default(palette))
    }

    /// # Errors
    /// See [`App::render_file_with_palette_and_toc`].
    pub fn render_file(&self, path: &str, theme: &str) -> Result<String> {
        let (_, text) = self.load_file(path)?;
        self.render_html(&text, theme, self.config.palette())
    }

    /// # Errors
    /// See [`App::render_file_with_palette_and_toc`].
    pub fn render_file_with_palette(&self, path: &str, theme: &str, palette: &str) -> Result<String> {
        let (_, text) = self.load_file(path)?;
        self.render_html(&text, theme, Palette::parse_or_default(palette))
    }

    /// Render a file from disk and make it the searchable document.
    ///
    /// # Errors
    /// `Validation` for a blank path, `NotFound` for a missing file,
    /// `SizeLimit` when it exceeds the configured limit, `Io` when it cannot
    /// be read.
    pub fn render_file_with_palette_and_toc(
        &self,
        path: &str,
        theme: &str,
        palette: &str,
    ) -> Result<RenderResult> {
        let (path, text) = self.load_file(path)?;
        let output = self.renderer.render(
            &text,
            theme,
            Palette::parse_or_default(palette),
            self.config.font_scale().into(),
        )?;
        let result = RenderResult {
            path,
            html: output.html,
            toc: output.toc,
            char_count: text.chars().count(),
            word_count: count_words(&text),
        };
        self.state.set_document(text);
        Ok(result)
    }

    fn render_html(&self, markdown: &str, theme: &str, palette: Palette) -> Result<String> {
        let output = self
            .renderer
            .render(markdown, theme, palette, self.config.font_scale().into())?;
        Ok(output.html)
    }

    fn load_file(&self, path: &str) -> Result<(PathBuf, String)> {
        let path = normalize_path(path).ok_or(Error::Validation("file path"))?;
        enforce_file_limit(&path, self.config.max_file_bytes())?;
        let text = read_document(&path)?;
        Ok((path, text))
    }

    // --- settings ---

    /// Persist the theme and move the theme watch along with it.
    ///
    /// # Errors
    /// Propagates config write failures.
    pub fn set_theme(&self, theme: &str) -> anyhow::Result<()> {
        self.config.set_theme(theme)?;
        let theme = self.config.theme();
        self.watch.refresh_theme(self.themes().theme_file(&theme));
        Ok(())
    }

    pub fn theme(&self) -> String {
        self.config.theme()
    }

    pub fn palette(&self) -> Palette {
        self.config.palette()
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_palette(&self, palette: Palette) -> anyhow::Result<()> {
        self.config.set_palette(palette)
    }

    pub fn font_scale(&self) -> i32 {
        self.config.font_scale()
    }

    /// Clamped to 50..=200 before it is stored.
    ///
    /// # Errors
    /// Propagates config write failures.
    pub fn set_font_scale(&self, scale: i64) -> anyhow::Result<()> {
        self.config.set_font_scale(scale)
    }

    pub fn auto_reload(&self) -> bool {
        self.config.auto_reload()
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_auto_reload(&self, enabled: bool) -> anyhow::Result<()> {
        self.config.set_auto_reload(enabled)
    }

    pub fn toc_visible(&self) -> bool {
        self.config.toc_visible()
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_toc_visible(&self, visible: bool) -> anyhow::Result<()> {
        self.config.set_toc_visible(visible)
    }

    pub fn toc_pinned(&self) -> bool {
        self.config.toc_pinned()
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_toc_pinned(&self, pinned: bool) -> anyhow::Result<()> {
        self.config.set_toc_pinned(pinned)
    }

    pub fn search_case_sensitive(&self) -> bool {
        self.config.search_case_sensitive()
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_search_case_sensitive(&self, enabled: bool) -> anyhow::Result<()> {
        self.config.set_search_case_sensitive(enabled)
    }

    pub fn search_highlight_color(&self) -> String {
        self.config.search_highlight_color()
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_search_highlight_color(&self, color: &str) -> anyhow::Result<()> {
        self.config.set_search_highlight_color(color)
    }

    pub fn max_file_size_mb(&self) -> u64 {
        self.config.max_file_size_mb()
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_max_file_size_mb(&self, mb: i64) -> anyhow::Result<()> {
        self.config.set_max_file_size_mb(mb)
    }

    pub fn list_themes(&self) -> Vec<String> {
        self.themes().list()
    }

    // --- watching ---

    /// Watch `path` and the configured theme file.
    ///
    /// # Errors
    /// See [`WatchCoordinator::start`].
    pub fn start_watching_file(&self, path: &str) -> Result<()> {
        let theme = self.themes().theme_file(&self.config.theme());
        self.watch.start(path, theme)
    }

    pub fn stop_watching_file(&self) {
        self.watch.stop();
    }

    pub fn watched_file(&self) -> Option<PathBuf> {
        self.state.watched_file()
    }

    pub fn watch_state(&self) -> WatchState {
        self.watch.state()
    }

    // --- search ---

    /// Search the current document. A blank query clears the result.
    ///
    /// # Errors
    /// `NoDocument` if nothing has been rendered yet, or the current
    /// document is empty.
    pub fn search_document(&self, query: &str, case_sensitive: bool) -> Result<SearchResult> {
        let document = self
            .state
            .document()
            .filter(|doc| !doc.is_empty())
            .ok_or(Error::NoDocument)?;
        let result = search::search(&document, query, case_sensitive);
        tracing::debug!(query = %result.query, total = result.total, "search");
        self.state.set_search_result(result.clone());
        Ok(result)
    }

    pub fn navigate_search(&self, direction: Direction) -> SearchResult {
        self.state.update_search_result(|result| result.navigate(direction))
    }

    pub fn clear_search(&self) {
        self.state.set_search_result(SearchResult::default());
    }

    pub fn search_state(&self) -> SearchResult {
        self.state.search_result()
    }

    pub fn set_current_document(&self, text: &str) {
        self.state.set_document(text);
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.watch.stop();
    }
}
