//! File watching for live reload.
//!
//! Uses notify crate for cross-platform file system events. At most one
//! session exists at a time; it watches the document's parent directory and,
//! optionally, the active theme file. Every session carries a generation
//! number and its background threads only emit while that generation is
//! still installed in the shared state.
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;

use crate::app::events::{
    Notification, STATUS_FILE_MISSING, STATUS_FILE_WATCH_ERROR, STATUS_THEME_WATCH_FAILED, StatusMessage,
};
use crate::app::state::SharedState;
use crate::error::{Error, Result};
use crate::files::normalize_path;
use crate::theme::ThemeFile;

/// Lifecycle of the watch coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatchState {
    Idle,
    WatchingFile,
    WatchingFileAndTheme,
}

impl WatchState {
    pub(crate) fn of(session: Option<&WatchSession>) -> Self {
        match session {
            None => Self::Idle,
            Some(s) if s.theme.is_some() => Self::WatchingFileAndTheme,
            Some(_) => Self::WatchingFile,
        }
    }
}

/// Events arriving this close together are handled as one batch, so a
/// single save reported several times by the OS reloads once.
const COALESCE: Duration = Duration::from_millis(50);

/// How long to wait for a removed file to come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReappearPolicy {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for ReappearPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            attempts: 10,
        }
    }
}

/// The live watch. Dropping it closes the notifier, which ends the event
/// loop thread.
pub struct WatchSession {
    target: PathBuf,
    root: PathBuf,
    theme: Option<ThemeFile>,
    // False when the theme lives in `root` and the directory watch covers it.
    theme_watched: bool,
    generation: u64,
    reappear_pending: bool,
    watcher: RecommendedWatcher,
}

impl fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSession")
            .field("target", &self.target)
            .field("theme", &self.theme)
            .field("generation", &self.generation)
            .field("reappear_pending", &self.reappear_pending)
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    /// The canonical path of the file being watched.
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub const fn theme(&self) -> Option<&ThemeFile> {
        self.theme.as_ref()
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// A missing theme file (built-in themes have none) is skipped quietly.
    /// A theme file the notifier refuses comes back as a warning status.
    fn watch_theme(&mut self, theme: ThemeFile) -> Option<StatusMessage> {
        let path = match theme.path.canonicalize() {
            Ok(path) => path,
            Err(err) => {
                tracing::debug!(path = %theme.path.display(), %err, "theme file not watchable");
                return None;
            }
        };
        let covered = path.parent() == Some(self.root.as_path());
        if !covered {
            if let Err(err) = self.watcher.watch(&path, RecursiveMode::NonRecursive) {
                tracing::warn!(path = %path.display(), %err, "failed to watch theme file");
                return Some(StatusMessage::warning(
                    STATUS_THEME_WATCH_FAILED,
                    format!("theme changes will not reload: {}: {err}", path.display()),
                ));
            }
        }
        tracing::debug!(theme = %theme.name, path = %path.display(), covered, "watching theme");
        self.theme_watched = !covered;
        self.theme = Some(ThemeFile {
            name: theme.name,
            path,
        });
        None
    }

    fn unwatch_theme(&mut self) {
        let Some(theme) = self.theme.take() else {
            return;
        };
        if std::mem::take(&mut self.theme_watched) {
            if let Err(err) = self.watcher.unwatch(&theme.path) {
                tracing::debug!(path = %theme.path.display(), %err, "theme unwatch failed");
            }
        }
    }
}

/// Starts, stops and retargets the single watch session.
#[derive(Debug, Clone)]
pub struct WatchCoordinator {
    state: Arc<SharedState>,
    policy: ReappearPolicy,
}

impl WatchCoordinator {
    pub fn new(state: Arc<SharedState>) -> Self {
        Self::with_policy(state, ReappearPolicy::default())
    }

    pub const fn with_policy(state: Arc<SharedState>, policy: ReappearPolicy) -> Self {
        Self { state, policy }
    }

    pub const fn policy(&self) -> ReappearPolicy {
        self.policy
    }

    /// Watch `path`, replacing any existing session. `theme` is watched too
    /// when it names an existing file; failing to watch it is not an error.
    ///
    /// # Errors
    /// `Validation` for a blank path, `NotFound` if it does not exist, `Watch`
    /// if the notifier cannot be set up, `Io` if the event thread cannot start.
    pub fn start(&self, path: &str, theme: Option<ThemeFile>) -> Result<()> {
        self.stop();

        let path = normalize_path(path).ok_or(Error::Validation("file path"))?;
        if !path.exists() {
            return Err(Error::NotFound(path));
        }
        // Canonicalize so event paths from the OS (which are always absolute
        // and canonical) match our stored paths.
        let target = path.canonicalize().unwrap_or(path);
        let watch_root = watch_root_for(&target);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .map_err(|source| Error::Watch {
            path: watch_root.clone(),
            source,
        })?;
        watcher
            .watch(&watch_root, RecursiveMode::NonRecursive)
            .map_err(|source| Error::Watch {
                path: watch_root.clone(),
                source,
            })?;

        let mut session = WatchSession {
            target: target.clone(),
            root: watch_root.clone(),
            theme: None,
            theme_watched: false,
            generation: 0,
            reappear_pending: false,
            watcher,
        };
        let theme_warning = theme.and_then(|theme| session.watch_theme(theme));

        let (generation, replaced) = {
            let mut inner = self.state.lock();
            inner.last_generation += 1;
            session.generation = inner.last_generation;
            let generation = session.generation;
            let replaced = inner.session.replace(session);
            if let Some(warning) = theme_warning {
                inner.emit(Notification::Status(warning));
            }
            (generation, replaced)
        };
        // A concurrent start may have slipped in between stop and here.
        drop(replaced);

        let state = Arc::clone(&self.state);
        let policy = self.policy;
        let loop_target = target.clone();
        let spawned = thread::Builder::new()
            .name("markview-watch".into())
            .spawn(move || run_event_loop(&state, &rx, &loop_target, generation, policy));
        if let Err(err) = spawned {
            self.stop();
            return Err(Error::io("failed to start watch thread", err));
        }

        tracing::info!(path = %target.display(), root = %watch_root.display(), generation, "watching");
        Ok(())
    }

    /// Stop the current session, if any. Safe to call repeatedly.
    pub fn stop(&self) {
        let session = self.state.lock().session.take();
        if let Some(session) = session {
            tracing::info!(path = %session.target.display(), generation = session.generation, "stopped watching");
            // Closing the notifier can block briefly; keep it off the lock.
            drop(session);
        }
    }

    /// Point the theme watch at `theme`, or drop it for `None`. Without a
    /// session this does nothing.
    pub fn refresh_theme(&self, theme: Option<ThemeFile>) {
        let mut inner = self.state.lock();
        let Some(session) = inner.session.as_mut() else {
            return;
        };
        session.unwatch_theme();
        let warning = theme.and_then(|theme| session.watch_theme(theme));
        if let Some(warning) = warning {
            inner.emit(Notification::Status(warning));
        }
    }

    pub fn state(&self) -> WatchState {
        self.state.watch_state()
    }
}

fn watch_root_for(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Written,
    Removed,
}

/// What an event of `kind` means for each of its paths.
fn classify(kind: &EventKind) -> Option<Change> {
    match kind {
        EventKind::Create(_) | EventKind::Any => Some(Change::Written),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(Change::Written),
        // Backends that pair a rename also send its From and To halves.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => None,
        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Remove(_) => Some(Change::Removed),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(Change::Written),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

fn run_event_loop(
    state: &Arc<SharedState>,
    rx: &Receiver<notify::Result<Event>>,
    target: &Path,
    generation: u64,
    policy: ReappearPolicy,
) {
    // recv fails once the session is dropped and the notifier with it.
    while let Ok(first) = rx.recv() {
        let mut batch = vec![first];
        let deadline = Instant::now() + COALESCE;
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(left) {
                Ok(res) => batch.push(res),
                Err(_) => break,
            }
        }
        if !handle_batch(state, batch, target, generation, policy) {
            break;
        }
    }
    tracing::debug!(generation, "watch loop finished");
}

/// Returns false once the session has been retired.
fn handle_batch(
    state: &Arc<SharedState>,
    batch: Vec<notify::Result<Event>>,
    target: &Path,
    generation: u64,
    policy: ReappearPolicy,
) -> bool {
    let theme = {
        let inner = state.lock();
        match inner.session.as_ref() {
            Some(session) if session.generation == generation => session.theme.clone(),
            _ => return false,
        }
    };

    let mut theme_reported = false;
    let mut target_reported = false;
    for res in batch {
        let event = match res {
            Ok(event) => event,
            Err(err) => {
                let status = StatusMessage::error(STATUS_FILE_WATCH_ERROR, err.to_string());
                if !state.emit_for(generation, Notification::Status(status)) {
                    return false;
                }
                continue;
            }
        };
        let Some(change) = classify(&event.kind) else {
            continue;
        };
        for path in &event.paths {
            if change == Change::Written {
                if let Some(theme) = theme.as_ref().filter(|t| t.path == *path) {
                    if !theme_reported
                        && !state.emit_for(generation, Notification::ThemeChanged(theme.name.clone()))
                    {
                        return false;
                    }
                    theme_reported = true;
                    continue;
                }
            }
            if path != target {
                continue;
            }
            let live = match change {
                Change::Written if target_reported => true,
                Change::Written => {
                    target_reported = true;
                    emit_target_written(state, generation, target)
                }
                Change::Removed => begin_reappear_poll(state, generation, target, policy),
            };
            if !live {
                return false;
            }
        }
    }
    true
}

/// Writes seen while a reappearance poll runs are left to the poll, so a
/// delete followed by a recreate reports a single change.
fn emit_target_written(state: &SharedState, generation: u64, target: &Path) -> bool {
    let inner = state.lock();
    match inner.session.as_ref() {
        Some(session) if session.generation == generation => {
            if !session.reappear_pending {
                inner.emit(Notification::FileChanged(target.to_path_buf()));
            }
            true
        }
        _ => false,
    }
}

fn begin_reappear_poll(
    state: &Arc<SharedState>,
    generation: u64,
    target: &Path,
    policy: ReappearPolicy,
) -> bool {
    {
        let mut inner = state.lock();
        match inner.session.as_mut() {
            Some(session) if session.generation == generation => {
                if session.reappear_pending {
                    return true;
                }
                session.reappear_pending = true;
            }
            _ => return false,
        }
    }
    tracing::debug!(path = %target.display(), "target removed, waiting for it to reappear");

    let poll_state = Arc::clone(state);
    let poll_target = target.to_path_buf();
    let spawned = thread::Builder::new()
        .name("markview-reappear".into())
        .spawn(move || wait_for_reappear(&poll_state, &poll_target, generation, policy));
    if let Err(err) = spawned {
        tracing::warn!(%err, "failed to start reappear poll");
        finish_reappear(state, generation, None);
    }
    true
}

fn wait_for_reappear(state: &SharedState, target: &Path, generation: u64, policy: ReappearPolicy) {
    for attempt in 1..=policy.attempts {
        thread::sleep(policy.interval);
        if !state.is_current(generation) {
            tracing::debug!(generation, "session retired during reappear poll");
            return;
        }
        if target.exists() {
            tracing::debug!(path = %target.display(), attempt, "target reappeared");
            finish_reappear(state, generation, Some(Notification::FileChanged(target.to_path_buf())));
            return;
        }
    }
    tracing::warn!(path = %target.display(), "target did not reappear");
    finish_reappear(
        state,
        generation,
        Some(Notification::Status(StatusMessage::error(
            STATUS_FILE_MISSING,
            format!("file missing: {}", target.display()),
        ))),
    );
}

fn finish_reappear(state: &SharedState, generation: u64, notification: Option<Notification>) {
    let mut inner = state.lock();
    let Some(session) = inner
        .session
        .as_mut()
        .filter(|s| s.generation == generation)
    else {
        return;
    };
    session.reappear_pending = false;
    if let Some(notification) = notification {
        inner.emit(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use tempfile::tempdir;

    #[test]
    fn test_watch_root_for_relative_file_is_dot() {
        let root = watch_root_for(Path::new("TEST-README.md"));
        assert_eq!(root, PathBuf::from("."));
    }

    #[test]
    fn test_classify_event_kinds() {
        let written = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        assert_eq!(classify(&written), Some(Change::Written));
        assert_eq!(classify(&EventKind::Create(CreateKind::File)), Some(Change::Written));
        assert_eq!(classify(&EventKind::Remove(RemoveKind::File)), Some(Change::Removed));
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(Change::Removed)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(Change::Written)
        );
        assert_eq!(classify(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))), None);
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(notify::event::MetadataKind::Any))),
            None
        );
        assert_eq!(classify(&EventKind::Access(notify::event::AccessKind::Any)), None);
    }

    #[test]
    fn test_start_rejects_blank_and_missing_paths() {
        let coordinator = WatchCoordinator::new(Arc::new(SharedState::new()));
        assert!(matches!(coordinator.start("   ", None), Err(Error::Validation(_))));

        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("nope.md");
        let err = coordinator
            .start(missing.to_str().expect("utf-8 path"), None)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(coordinator.state(), WatchState::Idle);
    }

    #[test]
    fn test_start_stop_transitions() {
        let dir = tempdir().expect("tempdir");
        let canonical_dir = dir.path().canonicalize().expect("canonicalize");
        let doc = canonical_dir.join("doc.md");
        let css = canonical_dir.join("paper.css");
        std::fs::write(&doc, "# hi").expect("write");
        std::fs::write(&css, "h1{}").expect("write");

        let state = Arc::new(SharedState::new());
        let coordinator = WatchCoordinator::new(Arc::clone(&state));

        coordinator.start(doc.to_str().unwrap(), None).expect("start");
        assert_eq!(coordinator.state(), WatchState::WatchingFile);
        assert_eq!(state.watched_file(), Some(doc.clone()));

        coordinator.refresh_theme(Some(ThemeFile {
            name: "paper".into(),
            path: css.clone(),
        }));
        assert_eq!(coordinator.state(), WatchState::WatchingFileAndTheme);

        coordinator.refresh_theme(None);
        assert_eq!(coordinator.state(), WatchState::WatchingFile);

        coordinator.stop();
        coordinator.stop();
        assert_eq!(coordinator.state(), WatchState::Idle);
        assert_eq!(state.watched_file(), None);
    }

    #[test]
    fn test_missing_theme_file_watches_document_only() {
        let dir = tempdir().expect("tempdir");
        let doc = dir.path().join("doc.md");
        std::fs::write(&doc, "x").expect("write");

        let coordinator = WatchCoordinator::new(Arc::new(SharedState::new()));
        let theme = ThemeFile {
            name: "gone".into(),
            path: dir.path().join("gone.css"),
        };
        coordinator
            .start(doc.to_str().unwrap(), Some(theme))
            .expect("start");
        assert_eq!(coordinator.state(), WatchState::WatchingFile);
    }

    #[test]
    fn test_restart_bumps_generation() {
        let dir = tempdir().expect("tempdir");
        let a = dir.path().join("a.md");
        let b = dir.path().join("b.md");
        std::fs::write(&a, "a").expect("write");
        std::fs::write(&b, "b").expect("write");

        let state = Arc::new(SharedState::new());
        let coordinator = WatchCoordinator::new(Arc::clone(&state));
        coordinator.start(a.to_str().unwrap(), None).expect("start a");
        let first = state.lock().session.as_ref().map(WatchSession::generation).unwrap();
        coordinator.start(b.to_str().unwrap(), None).expect("start b");
        let second = state.lock().session.as_ref().map(WatchSession::generation).unwrap();

        assert!(second > first);
        assert!(!state.is_current(first));
        assert!(state.is_current(second));
        assert_eq!(
            state.watched_file(),
            Some(b.canonicalize().expect("canonicalize"))
        );
    }
}
