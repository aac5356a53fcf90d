//! Error types shared by the renderer, search engine and watch coordinator.

use std::path::PathBuf;

/// Errors returned by the synchronous entry points of the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller passed an empty or otherwise unusable value.
    #[error("invalid {0}")]
    Validation(&'static str),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("file too large: {size} bytes (limit {limit})")]
    SizeLimit { size: u64, limit: u64 },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Registering a path with the filesystem notifier failed.
    #[error("failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// Assembling the HTML document failed. Not expected in practice.
    #[error("render failed: {0}")]
    Render(String),

    /// Search was requested before any document was rendered.
    #[error("no document loaded")]
    NoDocument,
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
