//! Path normalisation and file size checks for documents opened by the host.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// One mebibyte, the unit of the `maxFileSizeMB` setting.
pub const MIB: u64 = 1024 * 1024;

/// Normalise a path handed over by the host (drag and drop, launch args,
/// dialogs).
///
/// Handles `file://` URLs, `~` expansion and relative paths. Returns `None`
/// for blank input.
pub fn normalize_path(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let raw = raw.strip_prefix("file://").unwrap_or(raw);

    let mut path = expand_home(raw);
    if path.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            path = cwd.join(path);
        }
    }
    Some(clean(&path))
}

fn expand_home(raw: &str) -> PathBuf {
    let Some(home) = dirs::home_dir() else {
        return PathBuf::from(raw);
    };
    if raw == "~" {
        home
    } else if let Some(rest) = raw.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(raw)
    }
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

/// Reject files larger than `limit` bytes.
///
/// # Errors
/// `NotFound` when the file does not exist, `Io` when it cannot be stat'ed
/// for any other reason, `SizeLimit` when it is too big.
pub fn enforce_file_limit(path: &Path, limit: u64) -> Result<()> {
    let meta = std::fs::metadata(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::io(format!("failed to stat {}", path.display()), err),
    })?;
    let size = meta.len();
    if size > limit {
        return Err(Error::SizeLimit { size, limit });
    }
    Ok(())
}

/// Read a document as UTF-8 text, replacing invalid sequences.
///
/// # Errors
/// Returns an IO error if the file cannot be read.
pub fn read_document(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
