//! Allowlist sanitizer for rendered HTML fragments.
//!
//! Raw HTML in markdown is passed through by the parser and cleaned here:
//! unknown tags are dropped (their text is kept), script-like elements are
//! dropped together with their content, attributes are filtered per tag and
//! URL attributes must use a safe scheme.

use std::fmt::Write as _;

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "blockquote", "br", "caption", "cite", "code", "col",
    "colgroup", "dd", "del", "details", "dfn", "div", "dl", "dt", "em", "figcaption", "figure",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "input", "ins", "kbd", "li", "mark",
    "ol", "p", "pre", "q", "rp", "rt", "ruby", "s", "samp", "section", "small", "span", "strike",
    "strong", "sub", "summary", "sup", "table", "tbody", "td", "tfoot", "th", "thead", "time",
    "tr", "tt", "u", "ul", "var", "wbr",
];

/// Elements whose content must not survive either.
const DROP_WITH_CONTENT: &[&str] = &[
    "applet", "embed", "frame", "frameset", "iframe", "math", "noembed", "noframes", "noscript",
    "object", "plaintext", "script", "style", "svg", "template", "textarea", "title", "xmp",
];

const GLOBAL_ATTRS: &[&str] = &["align", "class", "dir", "id", "lang", "title"];

const URL_ATTRS: &[&str] = &["cite", "href", "src"];

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto", "tel"];

fn tag_attrs(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href", "name", "rel"],
        "img" => &["alt", "height", "src", "width"],
        "td" | "th" => &["colspan", "rowspan"],
        "ol" => &["reversed", "start", "type"],
        "li" => &["value"],
        "input" => &["checked", "disabled", "type"],
        "blockquote" | "q" | "del" | "ins" => &["cite"],
        "details" => &["open"],
        "col" | "colgroup" => &["span"],
        "time" => &["datetime"],
        _ => &[],
    }
}

#[derive(Debug)]
struct Tag<'a> {
    name: String,
    attrs: Vec<(String, Option<&'a str>)>,
    self_closing: bool,
    len: usize,
}

impl Tag<'_> {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| *v)
    }
}

#[derive(Debug)]
enum Markup<'a> {
    /// Comments, doctypes, processing instructions: dropped.
    Skip(usize),
    Close { name: String, len: usize },
    Open(Tag<'a>),
    /// A `<` that does not start markup.
    Text,
}

/// Clean an HTML fragment.
pub fn sanitize(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut rest = fragment;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        rest = &rest[lt..];

        match parse_markup(rest) {
            Markup::Skip(len) => rest = &rest[len..],
            Markup::Close { name, len } => {
                if ALLOWED_TAGS.contains(&name.as_str()) {
                    let _ = write!(out, "</{name}>");
                }
                rest = &rest[len..];
            }
            Markup::Open(tag) => {
                rest = &rest[tag.len..];
                if DROP_WITH_CONTENT.contains(&tag.name.as_str()) {
                    if !tag.self_closing {
                        rest = skip_past_close(rest, &tag.name);
                    }
                } else if ALLOWED_TAGS.contains(&tag.name.as_str()) {
                    write_open(&mut out, &tag);
                }
            }
            Markup::Text => {
                out.push_str("&lt;");
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Prefix for `id` and `name` values written in raw HTML.
pub const USER_ID_PREFIX: &str = "user-content-";

/// Scope raw HTML taken from the markdown source before it is rendered.
///
/// `id` and `name` values get [`USER_ID_PREFIX`] so they cannot shadow
/// generated heading anchors, and `data-sourcepos` is removed so the tag
/// cannot pass for a parsed heading. Everything else is left for
/// [`sanitize`].
pub fn scope_raw_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        rest = &rest[lt..];

        let len = match parse_markup(rest) {
            Markup::Open(tag) => {
                write_scoped(&mut out, &tag);
                rest = &rest[tag.len..];
                continue;
            }
            Markup::Skip(len) | Markup::Close { len, .. } => len,
            Markup::Text => 1,
        };
        out.push_str(&rest[..len]);
        rest = &rest[len..];
    }
    out.push_str(rest);
    out
}

fn write_scoped(out: &mut String, tag: &Tag<'_>) {
    out.push('<');
    out.push_str(&tag.name);
    for (name, value) in &tag.attrs {
        match (name.as_str(), value) {
            ("data-sourcepos", _) => {}
            ("id" | "name", Some(value)) => {
                let _ = write!(out, " {name}=\"{USER_ID_PREFIX}{}\"", escape_attr(value));
            }
            (_, Some(value)) => {
                let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
            }
            (_, None) => {
                let _ = write!(out, " {name}");
            }
        }
    }
    out.push_str(if tag.self_closing { " />" } else { ">" });
}

fn parse_markup(s: &str) -> Markup<'_> {
    let bytes = s.as_bytes();
    if let Some(body) = s.strip_prefix("<!--") {
        let len = body.find("-->").map_or(s.len(), |i| 4 + i + 3);
        return Markup::Skip(len);
    }
    match bytes.get(1) {
        Some(b'!' | b'?') => Markup::Skip(s.find('>').map_or(s.len(), |i| i + 1)),
        Some(b'/') if bytes.get(2).is_some_and(u8::is_ascii_alphabetic) => {
            let end = name_end(bytes, 2);
            let name = s[2..end].to_ascii_lowercase();
            s[end..].find('>').map_or(Markup::Text, |gt| Markup::Close {
                name,
                len: end + gt + 1,
            })
        }
        Some(c) if c.is_ascii_alphabetic() => parse_open(s).map_or(Markup::Text, Markup::Open),
        _ => Markup::Text,
    }
}

fn name_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    i
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Parse an opening tag. `None` when the tag is never closed by `>`.
fn parse_open(s: &str) -> Option<Tag<'_>> {
    let bytes = s.as_bytes();
    let end = name_end(bytes, 1);
    let name = s[1..end].to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut self_closing = false;
    let mut i = end;

    loop {
        i = skip_ws(bytes, i);
        match bytes.get(i)? {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                i += 1;
                if bytes.get(i) == Some(&b'>') {
                    self_closing = true;
                    i += 1;
                    break;
                }
            }
            _ => {
                let start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'=' | b'>' | b'/')
                {
                    i += 1;
                }
                if i == start {
                    // Stray `=`.
                    i += 1;
                    continue;
                }
                let attr_name = s[start..i].to_ascii_lowercase();
                i = skip_ws(bytes, i);
                let mut value = None;
                if bytes.get(i) == Some(&b'=') {
                    i = skip_ws(bytes, i + 1);
                    match bytes.get(i).copied() {
                        Some(quote) if quote == b'"' || quote == b'\'' => {
                            let close = s[i + 1..].find(char::from(quote))?;
                            value = Some(&s[i + 1..i + 1 + close]);
                            i += close + 2;
                        }
                        _ => {
                            let start = i;
                            while i < bytes.len()
                                && !bytes[i].is_ascii_whitespace()
                                && bytes[i] != b'>'
                            {
                                i += 1;
                            }
                            value = Some(&s[start..i]);
                        }
                    }
                }
                attrs.push((attr_name, value));
            }
        }
    }

    Some(Tag {
        name,
        attrs,
        self_closing,
        len: i,
    })
}

/// Skip past the matching close tag, or to the end when there is none.
fn skip_past_close<'a>(rest: &'a str, name: &str) -> &'a str {
    let lower = rest.to_ascii_lowercase();
    let needle = format!("</{name}");
    let mut from = 0;
    while let Some(pos) = lower[from..].find(&needle) {
        let after = from + pos + needle.len();
        let boundary = lower.as_bytes().get(after).is_none_or(|&b| {
            b == b'>' || b == b'/' || b.is_ascii_whitespace()
        });
        if boundary {
            return lower[after..]
                .find('>')
                .map_or("", |gt| &rest[after + gt + 1..]);
        }
        from = after;
    }
    ""
}

fn write_open(out: &mut String, tag: &Tag<'_>) {
    if tag.name == "input"
        && !tag
            .attr("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("checkbox"))
    {
        return;
    }

    out.push('<');
    out.push_str(&tag.name);
    for (name, value) in &tag.attrs {
        let allowed = GLOBAL_ATTRS.contains(&name.as_str())
            || tag_attrs(&tag.name).contains(&name.as_str());
        if !allowed {
            continue;
        }
        let value = value.unwrap_or("");
        if URL_ATTRS.contains(&name.as_str()) && !is_safe_url(&tag.name, value) {
            continue;
        }
        let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
    }
    out.push_str(if tag.self_closing { " />" } else { ">" });
}

fn escape_attr(value: &str) -> String {
    value
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn is_safe_url(tag: &str, value: &str) -> bool {
    let decoded: String = decode_entities(value)
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    let scheme_end = decoded.find(':');
    let path_start = decoded.find(['/', '?', '#']);
    let scheme = match (scheme_end, path_start) {
        (Some(colon), Some(path)) if path < colon => return true,
        (Some(colon), _) => &decoded[..colon],
        (None, _) => return true,
    };

    if SAFE_SCHEMES.contains(&scheme) {
        return true;
    }
    tag == "img"
        && scheme == "data"
        && decoded.starts_with("data:image/")
        && !decoded.starts_with("data:image/svg")
}

/// Decode the entities that can hide a URL scheme.
fn decode_entities(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp + 1..];

        if let Some(num) = rest.strip_prefix('#') {
            let (radix, digits) = match num.strip_prefix(['x', 'X']) {
                Some(hex) => (16, hex),
                None => (10, num),
            };
            let len = digits
                .find(|c: char| !c.is_digit(radix))
                .unwrap_or(digits.len());
            let decoded = u32::from_str_radix(&digits[..len], radix)
                .ok()
                .and_then(char::from_u32);
            if let Some(ch) = decoded {
                out.push(ch);
                let consumed = num.len() - digits.len() + len + 1;
                rest = &rest[consumed..];
                rest = rest.strip_prefix(';').unwrap_or(rest);
                continue;
            }
        } else if let Some(semi) = rest.find(';') {
            let replacement = match rest[..semi].to_ascii_lowercase().as_str() {
                "colon" => Some(":"),
                "tab" | "newline" => Some(""),
                "amp" => Some("&"),
                "sol" => Some("/"),
                "num" => Some("#"),
                "quest" => Some("?"),
                _ => None,
            };
            if let Some(replacement) = replacement {
                out.push_str(replacement);
                rest = &rest[semi + 1..];
                continue;
            }
        }
        out.push('&');
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_dropped_with_content() {
        let out = sanitize("<p>a</p><script>alert('x')</script><p>b</p>");
        assert_eq!(out, "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_script_close_tag_case_insensitive() {
        let out = sanitize("x<SCRIPT type=\"text/javascript\">evil()</ScRiPt >y");
        assert_eq!(out, "xy");
    }

    #[test]
    fn test_unclosed_script_drops_rest() {
        assert_eq!(sanitize("keep<script>evil()"), "keep");
    }

    #[test]
    fn test_event_handlers_removed() {
        let out = sanitize("<img src=\"a.png\" onerror=\"alert(1)\" alt='pic'>");
        assert_eq!(out, "<img src=\"a.png\" alt=\"pic\">");
    }

    #[test]
    fn test_javascript_urls_removed() {
        assert_eq!(
            sanitize("<a href=\"javascript:alert(1)\">x</a>"),
            "<a>x</a>"
        );
        assert_eq!(
            sanitize("<a href=\"java&#x09;script&colon;alert(1)\">x</a>"),
            "<a>x</a>"
        );
        assert_eq!(
            sanitize("<a href=\" JaVaScRiPt:alert(1)\">x</a>"),
            "<a>x</a>"
        );
    }

    #[test]
    fn test_safe_urls_kept() {
        let input = "<a href=\"https://example.com/?a=1&amp;b=2\">x</a><a href=\"#intro\">y</a><a href=\"docs/a:b.md\">z</a>";
        assert_eq!(sanitize(input), input);
    }

    #[test]
    fn test_data_urls_only_for_raster_images() {
        assert_eq!(
            sanitize("<img src=\"data:image/png;base64,AAAA\">"),
            "<img src=\"data:image/png;base64,AAAA\">"
        );
        assert_eq!(sanitize("<img src=\"data:image/svg+xml,<svg/>\">"), "<img>");
        assert_eq!(sanitize("<a href=\"data:text/html,hi\">x</a>"), "<a>x</a>");
    }

    #[test]
    fn test_unknown_tags_dropped_text_kept() {
        assert_eq!(
            sanitize("<form action=\"/x\"><button>Go</button></form>"),
            "Go"
        );
    }

    #[test]
    fn test_comments_and_doctype_removed() {
        assert_eq!(sanitize("a<!-- <script>x</script> -->b<!DOCTYPE html>c"), "abc");
    }

    #[test]
    fn test_presentational_markup_passes() {
        let input = "<details open=\"\"><summary>More</summary><p class=\"note\"><kbd>Ctrl</kbd></p></details>";
        assert_eq!(sanitize(input), input);
    }

    #[test]
    fn test_task_list_checkbox_kept_other_inputs_dropped() {
        assert_eq!(
            sanitize("<input type=\"checkbox\" checked=\"\" disabled=\"\" /> done"),
            "<input type=\"checkbox\" checked=\"\" disabled=\"\" /> done"
        );
        assert_eq!(sanitize("<input type=\"text\" value=\"x\">"), "");
    }

    #[test]
    fn test_stray_angle_brackets_escaped() {
        assert_eq!(sanitize("1 < 2 and <3"), "1 &lt; 2 and &lt;3");
        assert_eq!(sanitize("<b unterminated"), "&lt;b unterminated");
    }

    #[test]
    fn test_style_and_data_attributes_removed() {
        assert_eq!(
            sanitize("<h1 data-sourcepos=\"1:1-1:7\" id=\"intro\" style=\"x\">Intro</h1>"),
            "<h1 id=\"intro\">Intro</h1>"
        );
    }

    #[test]
    fn test_raw_ids_are_scoped() {
        assert_eq!(
            scope_raw_html(r#"<span id="intro" class=note>x</span>"#),
            r#"<span id="user-content-intro" class="note">x</span>"#
        );
        assert_eq!(
            scope_raw_html("<a name='top'>top</a>"),
            r#"<a name="user-content-top">top</a>"#
        );
        assert_eq!(
            scope_raw_html(r#"<h1 data-sourcepos="3:1-3:7">Fake</h1>"#),
            "<h1>Fake</h1>"
        );
        assert_eq!(scope_raw_html("a < b <!-- c -->"), "a < b <!-- c -->");
    }

    #[test]
    fn test_svg_dropped_with_content() {
        assert_eq!(
            sanitize("a<svg><script>alert(1)</script><circle/></svg>b"),
            "ab"
        );
    }
}
