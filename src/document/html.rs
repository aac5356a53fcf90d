//! Full HTML page assembly.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{NoExpand, Regex};

use super::parser::render_fragment;
use super::types::RenderOutput;
use crate::config::clamp_font_scale;
use crate::error::Result;
use crate::theme::{Palette, ThemeSet};

static STYLE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</style").expect("style pattern is valid"));

/// Renders markdown into themed pages.
///
/// Stateless apart from the theme lookup, so it can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    themes: ThemeSet,
}

impl Renderer {
    pub const fn new(themes: ThemeSet) -> Self {
        Self { themes }
    }

    pub const fn themes(&self) -> &ThemeSet {
        &self.themes
    }

    /// Render `markdown` with the named theme.
    ///
    /// # Errors
    /// Only internal formatting faults, see [`render_document`].
    pub fn render(
        &self,
        markdown: &str,
        theme: &str,
        palette: Palette,
        font_scale: i64,
    ) -> Result<RenderOutput> {
        let theme_css = self.themes.css(theme);
        render_document(markdown, &theme_css, palette, font_scale)
    }
}

/// Render a complete HTML document from markdown and already resolved theme
/// CSS. Same inputs always give byte-identical output.
///
/// `font_scale` is a percentage and is clamped to 50..=200.
///
/// # Errors
/// Returns `Error::Render` if the HTML writer fails.
pub fn render_document(
    markdown: &str,
    theme_css: &str,
    palette: Palette,
    font_scale: i64,
) -> Result<RenderOutput> {
    let _span = tracing::debug_span!("render", bytes = markdown.len(), %palette).entered();
    let fragment = render_fragment(markdown)?;
    let html = assemble_page(&fragment.html, theme_css, palette, clamp_font_scale(font_scale));
    Ok(RenderOutput {
        html,
        toc: fragment.toc,
    })
}

fn base_css(font_scale: i32) -> String {
    format!(
        "body{{margin:0}}img{{max-width:100%}}pre{{overflow:auto}}#wrapper{{font-size:{font_scale}% !important;padding:32px;max-width:900px;margin:0 auto;font-family:-apple-system,BlinkMacSystemFont,Segoe UI,Roboto,Oxygen,Ubuntu,Cantarell,Helvetica Neue,Arial,sans-serif;line-height:1.55}}pre{{padding:12px;border-radius:8px}}code{{padding:2px 4px;border-radius:6px}}blockquote{{margin:0 0 16px 0;padding:0 0 0 14px}}table{{width:100%}}"
    )
}

/// Keep theme files from closing the `<style>` element early.
fn contain_css(css: &str) -> Cow<'_, str> {
    STYLE_CLOSE.replace_all(css, NoExpand(r"<\/style"))
}

fn assemble_page(body: &str, theme_css: &str, palette: Palette, font_scale: i32) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"/><meta name=\"viewport\" content=\"width=device-width,initial-scale=1\"/><style>{}{}{}</style></head><body class=\"palette-{palette}\"><div id=\"wrapper\">{body}</div></body></html>",
        base_css(font_scale),
        contain_css(theme_css),
        palette.css(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TocItem;

    fn render(markdown: &str) -> RenderOutput {
        render_document(markdown, "", Palette::Light, 100).unwrap()
    }

    #[test]
    fn test_intro_example_toc() {
        let out = render("# Intro\n\n## Intro\n");
        assert_eq!(
            out.toc,
            vec![TocItem::new("intro", "Intro", 1), TocItem::new("intro-2", "Intro", 2)]
        );
    }

    #[test]
    fn test_render_is_idempotent() {
        let md = "# A\n\n| x | y |\n|---|---|\n| 1 | 2 |\n\n<b onclick=\"x()\">bold</b>\n";
        let a = render_document(md, "h1{color:red}", Palette::Dark, 130).unwrap();
        let b = render_document(md, "h1{color:red}", Palette::Dark, 130).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_font_scale_clamped_in_css() {
        let low = render_document("x", "", Palette::Light, -30).unwrap().html;
        assert!(low.contains("font-size:50% !important"));
        let high = render_document("x", "", Palette::Light, 5000).unwrap().html;
        assert!(high.contains("font-size:200% !important"));
        let mid = render_document("x", "", Palette::Light, 125).unwrap().html;
        assert!(mid.contains("font-size:125% !important"));
    }

    #[test]
    fn test_layers_in_precedence_order() {
        let html = render_document("x", "THEME_MARKER{}", Palette::Dark, 100)
            .unwrap()
            .html;
        let base = html.find("#wrapper{font-size").unwrap();
        let theme = html.find("THEME_MARKER").unwrap();
        let palette = html.find("#0d1117").unwrap();
        assert!(base < theme && theme < palette);
        assert!(html.contains("<body class=\"palette-dark\">"));
    }

    #[test]
    fn test_theme_palette_emits_no_palette_css() {
        let html = render_document("x", "", Palette::Theme, 100).unwrap().html;
        assert!(!html.contains("#wrapper a{"));
        assert!(html.contains("palette-theme"));
    }

    #[test]
    fn test_script_never_reaches_page() {
        let html = render("<script>alert('x')</script>").html;
        assert!(!html.contains("<script"));
        assert!(!html.contains("alert('x')"));
    }

    #[test]
    fn test_theme_css_cannot_close_style() {
        let html = render_document("x", "a{}</STYLE><script>alert(1)</script>", Palette::Light, 100)
            .unwrap()
            .html;
        assert_eq!(html.matches("</style>").count(), 1);
        assert!(html.contains(r"<\/style>"));
    }

    #[test]
    fn test_body_wrapped() {
        let html = render("hello").html;
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<div id=\"wrapper\"><p>hello</p>\n</div>"));
    }

    #[test]
    fn test_renderer_resolves_theme_by_name() {
        let renderer = Renderer::new(ThemeSet::builtin_only());
        let with_theme = renderer.render("x", "paper", Palette::Light, 100).unwrap();
        let without = renderer.render("x", "default", Palette::Light, 100).unwrap();
        assert!(with_theme.html.contains("Charter"));
        assert!(!without.html.contains("Charter"));
    }
}
