//! Asynchronous notifications delivered to the host UI.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

use serde::Serialize;

/// Status code for notifier errors not tied to a path.
pub const STATUS_FILE_WATCH_ERROR: &str = "file-watch-error";
/// Status code emitted when a removed file did not come back.
pub const STATUS_FILE_MISSING: &str = "file-missing";
/// Status code emitted when the theme file cannot be watched.
pub const STATUS_THEME_WATCH_FAILED: &str = "theme-watch-failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub code: String,
    pub message: String,
}

impl StatusMessage {
    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusLevel::Warning, code, message)
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusLevel::Error, code, message)
    }

    fn new(level: StatusLevel, code: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Notification {
    FileOpen(Vec<PathBuf>),
    FileChanged(PathBuf),
    ThemeChanged(String),
    Status(StatusMessage),
}

impl Notification {
    /// Event name as seen by the UI layer.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FileOpen(_) => "file-open",
            Self::FileChanged(_) => "file-changed",
            Self::ThemeChanged(_) => "theme-changed",
            Self::Status(_) => "status",
        }
    }
}

/// Handle to the host UI, available once startup has completed.
#[derive(Debug, Clone)]
pub struct HostContext {
    tx: Sender<Notification>,
}

impl HostContext {
    /// Create a context and the receiver the host drains notifications from.
    pub fn channel() -> (Self, Receiver<Notification>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    /// Deliver a notification. Returns false once the host hung up.
    pub fn emit(&self, notification: Notification) -> bool {
        tracing::debug!(event = notification.name(), "emit");
        self.tx.send(notification).is_ok()
    }
}
