//! Shared application state.
//!
//! One coarse lock guards everything. Each method is atomic on its own;
//! callers combining two calls get no atomicity across them.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::events::{HostContext, Notification};
use crate::search::SearchResult;
use crate::watcher::{WatchSession, WatchState};

#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
pub(crate) struct Inner {
    pub(crate) context: Option<HostContext>,
    pub(crate) launch_args: Vec<PathBuf>,
    pub(crate) pending_opens: Vec<PathBuf>,
    pub(crate) session: Option<WatchSession>,
    pub(crate) last_generation: u64,
    pub(crate) document: Option<Arc<str>>,
    pub(crate) search: SearchResult,
}

impl Inner {
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.generation() == generation)
    }

    pub(crate) fn emit(&self, notification: Notification) {
        match &self.context {
            Some(ctx) => {
                ctx.emit(notification);
            }
            None => {
                tracing::debug!(event = notification.name(), "host not ready, dropping");
            }
        }
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poisoning is ignored: every update is a single field replacement, so
    /// a panicking holder cannot leave the state half-written.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn context(&self) -> Option<HostContext> {
        self.lock().context.clone()
    }

    /// Install the host context and hand back the opens queued before it.
    pub fn set_context(&self, ctx: HostContext) -> Vec<PathBuf> {
        let mut inner = self.lock();
        inner.context = Some(ctx);
        std::mem::take(&mut inner.pending_opens)
    }

    pub fn launch_args(&self) -> Vec<PathBuf> {
        self.lock().launch_args.clone()
    }

    pub fn set_launch_args(&self, args: Vec<PathBuf>) {
        self.lock().launch_args = args;
    }

    /// Record opened paths. Queues them and returns `None` while the host
    /// context is missing.
    pub fn record_file_open(&self, paths: &[PathBuf]) -> Option<HostContext> {
        let mut inner = self.lock();
        inner.launch_args.extend_from_slice(paths);
        if inner.context.is_none() {
            inner.pending_opens.extend_from_slice(paths);
            return None;
        }
        inner.context.clone()
    }

    pub fn pending_opens(&self) -> Vec<PathBuf> {
        self.lock().pending_opens.clone()
    }

    pub fn document(&self) -> Option<Arc<str>> {
        self.lock().document.clone()
    }

    pub fn set_document(&self, text: impl Into<Arc<str>>) {
        self.lock().document = Some(text.into());
    }

    pub fn search_result(&self) -> SearchResult {
        self.lock().search.clone()
    }

    pub fn set_search_result(&self, result: SearchResult) {
        self.lock().search = result;
    }

    /// Apply `f` to the search result under the lock and return the new value.
    pub fn update_search_result(&self, f: impl FnOnce(&mut SearchResult)) -> SearchResult {
        let mut inner = self.lock();
        f(&mut inner.search);
        inner.search.clone()
    }

    pub fn watched_file(&self) -> Option<PathBuf> {
        self.lock()
            .session
            .as_ref()
            .map(|s| s.target().to_path_buf())
    }

    pub fn watch_state(&self) -> WatchState {
        WatchState::of(self.lock().session.as_ref())
    }

    /// True while the session started with `generation` is still live.
    pub fn is_current(&self, generation: u64) -> bool {
        self.lock().is_current(generation)
    }

    /// Emit unless the session `generation` has been retired.
    ///
    /// The check and the send happen under one lock so nothing from a
    /// retired session reaches the host after it was stopped.
    pub fn emit_for(&self, generation: u64, notification: Notification) -> bool {
        let inner = self.lock();
        if !inner.is_current(generation) {
            tracing::debug!(generation, event = notification.name(), "stale session event discarded");
            return false;
        }
        inner.emit(notification);
        true
    }

    /// Emit regardless of any watch session.
    pub fn emit(&self, notification: Notification) {
        self.lock().emit(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_opens_queue_until_context() {
        let state = SharedState::new();
        assert!(state.record_file_open(&[PathBuf::from("/a.md")]).is_none());
        assert_eq!(state.pending_opens(), vec![PathBuf::from("/a.md")]);

        let (ctx, _rx) = HostContext::channel();
        let flushed = state.set_context(ctx);
        assert_eq!(flushed, vec![PathBuf::from("/a.md")]);
        assert!(state.pending_opens().is_empty());
        assert!(state.record_file_open(&[PathBuf::from("/b.md")]).is_some());
        assert!(state.pending_opens().is_empty());
        assert_eq!(
            state.launch_args(),
            vec![PathBuf::from("/a.md"), PathBuf::from("/b.md")]
        );
    }

    #[test]
    fn test_emit_for_without_session_is_stale() {
        let state = SharedState::new();
        let (ctx, rx) = HostContext::channel();
        state.set_context(ctx);
        assert!(!state.emit_for(1, Notification::FileChanged("/a.md".into())));
        assert!(rx.try_recv().is_err());

        state.emit(Notification::FileChanged("/a.md".into()));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_update_search_result() {
        let state = SharedState::new();
        state.set_search_result(crate::search::search("abab", "ab", true));
        let result = state.update_search_result(|r| r.navigate(crate::search::Direction::Next));
        assert_eq!(result.current_index, 1);
        assert_eq!(state.search_result().current_index, 1);
    }
}
