//! Markdown parsing with comrak.

use std::collections::HashMap;
use std::sync::LazyLock;

use comrak::nodes::{AstNode, NodeValue};
use comrak::{Arena, Options, format_html, parse_document};
use regex::{Captures, Regex};

use super::sanitize::{sanitize, scope_raw_html};
use super::slug::SlugRegistry;
use super::types::TocItem;
use crate::error::{Error, Result};

/// Opening heading tags as emitted with `render.sourcepos` enabled.
static HEADING_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<h([1-6]) data-sourcepos="([^"]*)">"#).expect("heading pattern is valid")
});

/// Sanitized HTML body plus the headings found while parsing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub html: String,
    pub toc: Vec<TocItem>,
}

/// Parse markdown and render the sanitized HTML fragment with heading ids.
///
/// Parsing never fails; only writing the HTML can, which does not happen
/// for an in-memory buffer in practice.
pub fn render_fragment(source: &str) -> Result<Fragment> {
    let arena = Arena::new();
    let options = create_options();
    let root = parse_document(&arena, source, &options);

    for node in root.descendants() {
        match &mut node.data.borrow_mut().value {
            NodeValue::HtmlBlock(block) => block.literal = scope_raw_html(&block.literal),
            NodeValue::HtmlInline(raw) => *raw = scope_raw_html(raw),
            _ => {}
        }
    }

    let mut slugs = SlugRegistry::new();
    let mut toc = Vec::new();
    // Keyed by the heading's source position, which comrak also writes
    // into the `data-sourcepos` attribute of the rendered tag.
    let mut anchors: HashMap<String, String> = HashMap::new();

    for node in root.descendants() {
        let ast = node.data.borrow();
        let NodeValue::Heading(heading) = &ast.value else {
            continue;
        };
        let text = extract_text(node);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let id = slugs.claim(text);
        anchors.insert(ast.sourcepos.to_string(), id.clone());
        toc.push(TocItem::new(id, text, heading.level));
    }

    let mut out = Vec::new();
    format_html(root, &options, &mut out).map_err(|err| Error::Render(err.to_string()))?;
    let html = String::from_utf8(out).map_err(|err| Error::Render(err.to_string()))?;

    let html = HEADING_OPEN.replace_all(&html, |caps: &Captures<'_>| {
        match anchors.get(&caps[2]) {
            Some(id) => format!("<h{} id=\"{id}\">", &caps[1]),
            None => format!("<h{}>", &caps[1]),
        }
    });

    Ok(Fragment {
        html: sanitize(&html),
        toc,
    })
}

fn create_options() -> Options {
    let mut options = Options::default();

    // Enable GFM extensions
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;
    options.extension.description_lists = true;
    options.extension.shortcodes = true;

    // Raw HTML is passed through and cleaned by the sanitizer afterwards.
    options.render.unsafe_ = true;
    options.render.sourcepos = true;

    options
}

fn extract_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    extract_text_recursive(node, &mut text);
    text
}

fn extract_text_recursive<'a>(node: &'a AstNode<'a>, text: &mut String) {
    match &node.data.borrow().value {
        NodeValue::Text(t) => {
            text.push_str(t);
        }
        NodeValue::Code(c) => {
            text.push_str(&c.literal);
        }
        NodeValue::SoftBreak | NodeValue::LineBreak => {
            text.push(' ');
        }
        NodeValue::HtmlInline(_) => {}
        _ => {
            for child in node.children() {
                extract_text_recursive(child, text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toc_of(source: &str) -> Vec<TocItem> {
        render_fragment(source).unwrap().toc
    }

    #[test]
    fn test_parse_empty_document() {
        let fragment = render_fragment("").unwrap();
        assert!(fragment.html.is_empty());
        assert!(fragment.toc.is_empty());
    }

    #[test]
    fn test_duplicate_headings_get_suffixes() {
        assert_eq!(
            toc_of("# Intro\n\n## Intro\n"),
            vec![TocItem::new("intro", "Intro", 1), TocItem::new("intro-2", "Intro", 2)]
        );
    }

    #[test]
    fn test_heading_ids_written_into_html() {
        let fragment = render_fragment("# Intro\n\ntext\n\n### Intro\n").unwrap();
        assert!(fragment.html.contains("<h1 id=\"intro\">Intro</h1>"));
        assert!(fragment.html.contains("<h3 id=\"intro-2\">Intro</h3>"));
        assert!(!fragment.html.contains("data-sourcepos"));
    }

    #[test]
    fn test_heading_text_includes_inline_markup() {
        let toc = toc_of("## The *quick* `fox` [jumps](https://x.y)\n");
        assert_eq!(toc, vec![TocItem::new("the-quick-fox-jumps", "The quick fox jumps", 2)]);
    }

    #[test]
    fn test_setext_heading_with_soft_break() {
        let toc = toc_of("Line one\nline two\n========\n");
        assert_eq!(toc[0].text, "Line one line two");
        assert_eq!(toc[0].id, "line-one-line-two");
        assert_eq!(toc[0].level, 1);
    }

    #[test]
    fn test_empty_headings_skipped() {
        let fragment = render_fragment("#\n\n## Real\n\n###   \n").unwrap();
        assert_eq!(fragment.toc, vec![TocItem::new("real", "Real", 2)]);
        assert!(fragment.html.contains("<h1></h1>"));
    }

    #[test]
    fn test_levels_follow_heading_depth() {
        let toc = toc_of("# a\n## b\n### c\n#### d\n##### e\n###### f\n");
        let levels: Vec<u8> = toc.iter().map(|t| t.level).collect();
        assert_eq!(levels, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_gfm_extensions_enabled() {
        let html = render_fragment(
            "| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n\n- [x] done\n\nhttps://example.com\n",
        )
        .unwrap()
        .html;
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("type=\"checkbox\""));
        assert!(html.contains("<a href=\"https://example.com\">"));
    }

    #[test]
    fn test_raw_script_removed() {
        let html = render_fragment("hello\n\n<script>alert('x')</script>\n\nworld <script>alert('x')</script>\n")
            .unwrap()
            .html;
        assert!(!html.contains("<script"));
        assert!(!html.contains("alert('x')"));
        assert!(html.contains("hello"));
        assert!(html.contains("world"));
    }

    #[test]
    fn test_raw_presentational_html_kept() {
        let html = render_fragment("<details><summary>More</summary>\n\nbody\n\n</details>\n")
            .unwrap()
            .html;
        assert!(html.contains("<details>"));
        assert!(html.contains("<summary>More</summary>"));
    }

    #[test]
    fn test_raw_ids_cannot_shadow_heading_anchors() {
        let html = render_fragment("<span id=\"intro\">x</span>\n\n# Intro\n")
            .unwrap()
            .html;
        assert!(html.contains("<span id=\"user-content-intro\">"));
        assert!(html.contains("<h1 id=\"intro\">Intro</h1>"));
        assert_eq!(html.matches("id=\"intro\"").count(), 1);

        let html = render_fragment("<a name=\"intro\">here</a> text\n").unwrap().html;
        assert!(html.contains("name=\"user-content-intro\""));
    }

    #[test]
    fn test_raw_heading_sourcepos_does_not_take_anchor() {
        // The markdown heading below sits at 3:1-3:7.
        let fragment = render_fragment("<h1 data-sourcepos=\"3:1-3:7\">Fake</h1>\n\n# Intro\n").unwrap();
        assert!(fragment.html.contains("<h1>Fake</h1>"));
        assert_eq!(fragment.html.matches("id=\"intro\"").count(), 1);
        assert_eq!(fragment.toc.len(), 1);
    }

    #[test]
    fn test_code_is_escaped_not_executed() {
        let html = render_fragment("```html\n<script>x()</script>\n```\n").unwrap().html;
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script"));
    }
}
