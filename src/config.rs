use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::files::MIB;
use crate::theme::{DEFAULT_THEME, Palette};

pub const MIN_FONT_SCALE: i32 = 50;
pub const MAX_FONT_SCALE: i32 = 200;
pub const DEFAULT_FONT_SCALE: i32 = 100;

pub const DEFAULT_MAX_FILE_MB: u64 = 5;
/// Upper bound for `maxFileSizeMB` to avoid accidental huge loads.
pub const MAX_FILE_MB_CAP: u64 = 100;

pub const DEFAULT_HIGHLIGHT_COLOR: &str = "yellow";
pub const HIGHLIGHT_COLORS: &[&str] = &["yellow", "green", "blue", "orange", "purple"];

const KEY_THEME: &str = "theme";
const KEY_PALETTE: &str = "palette";
const KEY_FONT_SCALE: &str = "fontScale";
const KEY_AUTO_RELOAD: &str = "autoReload";
const KEY_TOC_VISIBLE: &str = "tocVisible";
const KEY_TOC_PINNED: &str = "tocPinned";
const KEY_SEARCH_CASE: &str = "searchCaseSensitive";
const KEY_HIGHLIGHT_COLOR: &str = "searchHighlightColor";
const KEY_MAX_FILE_MB: &str = "maxFileSizeMB";

pub fn clamp_font_scale(scale: i64) -> i32 {
    // Clamped first, so the narrowing cast is lossless.
    scale.clamp(i64::from(MIN_FONT_SCALE), i64::from(MAX_FONT_SCALE)) as i32
}

pub fn global_config_dir() -> PathBuf {
    dirs::config_dir().map_or_else(|| PathBuf::from(".markview"), |dir| dir.join("markview"))
}

/// File-backed `key=value` settings store.
///
/// Every getter re-reads the file so edits made by other processes are
/// picked up. Reads fail soft to defaults; writes propagate errors.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    themes_dir: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, themes_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            themes_dir: themes_dir.into(),
        }
    }

    /// Store rooted in a config directory: `<dir>/markview.conf` plus
    /// `<dir>/mdthemes/`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("markview.conf"), dir.join("mdthemes"))
    }

    pub fn global() -> Self {
        Self::in_dir(&global_config_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn themes_dir(&self) -> &Path {
        &self.themes_dir
    }

    /// Load every setting from disk.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read.
    pub fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config {}", self.path.display()))?;
        Ok(parse_settings(&content))
    }

    fn save(&self, settings: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
        }
        let mut out = String::new();
        for (key, value) in settings {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        fs::write(&self.path, out)
            .with_context(|| format!("Failed to write config {}", self.path.display()))
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.load() {
            Ok(mut settings) => settings.remove(key),
            Err(err) => {
                tracing::warn!(key, "{err:#}; using default");
                None
            }
        }
    }

    /// Set one key, keeping the others.
    ///
    /// # Errors
    /// Returns an error if the existing file cannot be read or the new one
    /// cannot be written.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut settings = self.load()?;
        settings.insert(key.to_string(), value.to_string());
        self.save(&settings)
    }

    fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| matches!(v.as_str(), "true" | "1" | "yes"))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, if value { "true" } else { "false" })
    }

    pub fn theme(&self) -> String {
        match self.get(KEY_THEME) {
            // Legacy configs stored the palette under `theme`.
            Some(v) if !v.is_empty() && v != "light" && v != "dark" => v,
            _ => DEFAULT_THEME.to_string(),
        }
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_theme(&self, theme: &str) -> Result<()> {
        let theme = theme.trim();
        self.set(KEY_THEME, if theme.is_empty() { DEFAULT_THEME } else { theme })
    }

    pub fn palette(&self) -> Palette {
        let settings = match self.load() {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(key = KEY_PALETTE, "{err:#}; using default");
                return Palette::default();
            }
        };
        if let Some(p) = settings.get(KEY_PALETTE).filter(|p| !p.is_empty()) {
            return Palette::parse_or_default(p);
        }
        match settings.get(KEY_THEME).map(String::as_str) {
            Some("dark") => Palette::Dark,
            Some("light") => Palette::Light,
            _ => Palette::default(),
        }
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_palette(&self, palette: Palette) -> Result<()> {
        self.set(KEY_PALETTE, palette.as_str())
    }

    pub fn font_scale(&self) -> i32 {
        self.get(KEY_FONT_SCALE)
            .and_then(|v| v.parse::<i64>().ok())
            .map_or(DEFAULT_FONT_SCALE, clamp_font_scale)
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_font_scale(&self, scale: i64) -> Result<()> {
        self.set(KEY_FONT_SCALE, &clamp_font_scale(scale).to_string())
    }

    pub fn auto_reload(&self) -> bool {
        self.get_bool(KEY_AUTO_RELOAD)
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_auto_reload(&self, enabled: bool) -> Result<()> {
        self.set_bool(KEY_AUTO_RELOAD, enabled)
    }

    pub fn toc_visible(&self) -> bool {
        self.get_bool(KEY_TOC_VISIBLE)
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_toc_visible(&self, visible: bool) -> Result<()> {
        self.set_bool(KEY_TOC_VISIBLE, visible)
    }

    pub fn toc_pinned(&self) -> bool {
        self.get_bool(KEY_TOC_PINNED)
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_toc_pinned(&self, pinned: bool) -> Result<()> {
        self.set_bool(KEY_TOC_PINNED, pinned)
    }

    pub fn search_case_sensitive(&self) -> bool {
        self.get_bool(KEY_SEARCH_CASE)
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_search_case_sensitive(&self, enabled: bool) -> Result<()> {
        self.set_bool(KEY_SEARCH_CASE, enabled)
    }

    pub fn search_highlight_color(&self) -> String {
        self.get(KEY_HIGHLIGHT_COLOR)
            .filter(|c| HIGHLIGHT_COLORS.contains(&c.as_str()))
            .unwrap_or_else(|| DEFAULT_HIGHLIGHT_COLOR.to_string())
    }

    /// Unknown colors are stored as the default color.
    ///
    /// # Errors
    /// Propagates config write failures.
    pub fn set_search_highlight_color(&self, color: &str) -> Result<()> {
        let color = color.trim();
        let color = if HIGHLIGHT_COLORS.contains(&color) {
            color
        } else {
            DEFAULT_HIGHLIGHT_COLOR
        };
        self.set(KEY_HIGHLIGHT_COLOR, color)
    }

    pub fn max_file_size_mb(&self) -> u64 {
        self.get(KEY_MAX_FILE_MB)
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&n| n >= 1)
            .map_or(DEFAULT_MAX_FILE_MB, |n| n.unsigned_abs().min(MAX_FILE_MB_CAP))
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_size_mb() * MIB
    }

    /// # Errors
    /// Propagates config write failures.
    pub fn set_max_file_size_mb(&self, mb: i64) -> Result<()> {
        let mb = u64::try_from(mb.max(1)).map_or(DEFAULT_MAX_FILE_MB, |mb| mb.min(MAX_FILE_MB_CAP));
        self.set(KEY_MAX_FILE_MB, &mb.to_string())
    }
}

pub fn parse_settings(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
