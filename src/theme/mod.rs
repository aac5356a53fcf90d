//! Theme and palette CSS.
//!
//! A page is styled in three layers: the base layout (owned by the
//! renderer), the structural theme CSS resolved here by name, and the
//! palette CSS. Later layers override earlier ones.

mod builtin;

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Theme name meaning "no theme CSS".
pub const DEFAULT_THEME: &str = "default";

/// Color scheme applied on top of the theme.
#[derive(
    clap::ValueEnum, Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Default for the read-only viewer.
    #[default]
    Light,
    Dark,
    /// Emit no palette CSS and keep the theme's own colors.
    Theme,
}

impl Palette {
    /// Parse a palette name, coercing anything unrecognised to the default.
    pub fn parse_or_default(value: &str) -> Self {
        value.trim().parse().unwrap_or_default()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Theme => "theme",
        }
    }

    /// CSS for this palette, scoped to the `#wrapper` element.
    pub const fn css(self) -> &'static str {
        match self {
            Self::Light => LIGHT_PALETTE_CSS,
            Self::Dark => DARK_PALETTE_CSS,
            Self::Theme => "",
        }
    }
}

impl FromStr for Palette {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "theme" => Ok(Self::Theme),
            _ => Err(Error::Validation("palette")),
        }
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const LIGHT_PALETTE_CSS: &str = "html,body{background:#ffffff;color:#1f2328}#wrapper{color:#1f2328}#wrapper p,#wrapper td,#wrapper div,#wrapper li,#wrapper h1,#wrapper h2,#wrapper h3,#wrapper h4,#wrapper h5,#wrapper h6,#wrapper th,#wrapper caption,#wrapper dt,#wrapper dd,#wrapper span{color:inherit}#wrapper a{color:#0969da}#wrapper pre,#wrapper code{background:#f6f8fa}#wrapper blockquote{color:#57606a;border-left:4px solid #d0d7de}#wrapper hr{border:0;border-top:1px solid #d0d7de}#wrapper table{border-collapse:collapse}#wrapper th,#wrapper td{border:1px solid #d0d7de;padding:6px 10px}#wrapper figcaption{background:transparent;color:inherit}";

const DARK_PALETTE_CSS: &str = "html,body{background:#0d1117;color:#c9d1d9}#wrapper{color:#c9d1d9}#wrapper p,#wrapper td,#wrapper div,#wrapper li,#wrapper h1,#wrapper h2,#wrapper h3,#wrapper h4,#wrapper h5,#wrapper h6,#wrapper th,#wrapper caption,#wrapper dt,#wrapper dd,#wrapper span{color:inherit}#wrapper a{color:#58a6ff}#wrapper pre,#wrapper code{background:#161b22}#wrapper blockquote{color:#8b949e;border-left:4px solid #30363d}#wrapper hr{border:0;border-top:1px solid #30363d}#wrapper table{border-collapse:collapse}#wrapper th,#wrapper td{border:1px solid #30363d;padding:6px 10px}#wrapper figcaption{background:transparent;color:inherit}";

/// Reduce a user supplied theme name to a `<name>.css` file name.
///
/// Only the final path component is kept so names cannot escape the theme
/// directory. Returns `None` for the default theme and for names with no
/// usable file component.
pub fn theme_file_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name == DEFAULT_THEME {
        return None;
    }
    let base = Path::new(name).file_name()?.to_str()?;
    if has_css_extension(base) {
        Some(base.to_string())
    } else {
        Some(format!("{base}.css"))
    }
}

fn has_css_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("css"))
}

fn stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

/// A theme file the watcher can observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeFile {
    /// Display name, without the `.css` extension.
    pub name: String,
    pub path: PathBuf,
}

/// Resolves theme names against a theme directory and the built-in set.
#[derive(Debug, Clone, Default)]
pub struct ThemeSet {
    dir: Option<PathBuf>,
}

impl ThemeSet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// A theme set backed only by the built-in themes.
    pub const fn builtin_only() -> Self {
        Self { dir: None }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// CSS text for `name`.
    ///
    /// Never fails: an unknown or unreadable theme yields empty CSS.
    pub fn css(&self, name: &str) -> String {
        let Some(file_name) = theme_file_name(name) else {
            return String::new();
        };
        if let Some(dir) = &self.dir {
            let path = dir.join(&file_name);
            match std::fs::read_to_string(&path) {
                Ok(css) => return css,
                Err(err) => {
                    tracing::debug!(path = %path.display(), %err, "theme file unreadable");
                }
            }
        }
        builtin::lookup(stem(&file_name)).map_or_else(
            || {
                tracing::warn!(theme = name, "unknown theme, rendering without theme css");
                String::new()
            },
            str::to_string,
        )
    }

    /// The on-disk file backing `name`, if the theme is not the default.
    ///
    /// The file is not required to exist.
    pub fn theme_file(&self, name: &str) -> Option<ThemeFile> {
        let dir = self.dir.as_ref()?;
        let file_name = theme_file_name(name)?;
        Some(ThemeFile {
            name: stem(&file_name).to_string(),
            path: dir.join(&file_name),
        })
    }

    /// All selectable theme names, `default` first and the rest sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: BTreeSet<String> =
            builtin::names().map(ToOwned::to_owned).collect();

        if let Some(entries) = self.dir.as_ref().and_then(|d| std::fs::read_dir(d).ok()) {
            for entry in entries.flatten() {
                if entry.file_type().is_ok_and(|t| t.is_dir()) {
                    continue;
                }
                let file_name = entry.file_name();
                let Some(file_name) = file_name.to_str() else {
                    continue;
                };
                if !has_css_extension(file_name) {
                    continue;
                }
                let name = stem(file_name);
                if !name.is_empty() {
                    names.insert(name.to_string());
                }
            }
        }
        names.remove(DEFAULT_THEME);

        std::iter::once(DEFAULT_THEME.to_string())
            .chain(names)
            .collect()
    }
}
