//! Themes compiled into the binary, used when the theme directory has no
//! file of the requested name.

const GITHUB: &str = "#wrapper{font-family:-apple-system,BlinkMacSystemFont,Segoe UI,Noto Sans,Helvetica,Arial,sans-serif;line-height:1.5}#wrapper h1,#wrapper h2{padding-bottom:.3em;border-bottom:1px solid #d0d7de}#wrapper h1{font-size:2em}#wrapper h2{font-size:1.5em}#wrapper code{font-size:85%}#wrapper pre{padding:16px;line-height:1.45}#wrapper table tr:nth-child(2n){background:rgba(127,127,127,.06)}";

const PAPER: &str = "#wrapper{font-family:Charter,Georgia,Cambria,Times New Roman,serif;line-height:1.7;max-width:720px}#wrapper h1,#wrapper h2,#wrapper h3{font-weight:600;letter-spacing:-.01em}#wrapper p{text-align:justify;hyphens:auto}#wrapper blockquote{font-style:italic}#wrapper img{display:block;margin:1.5em auto}";

const TERMINAL: &str = "#wrapper{font-family:ui-monospace,SFMono-Regular,Menlo,Consolas,monospace;line-height:1.45}#wrapper h1::before{content:'# '}#wrapper h2::before{content:'## '}#wrapper h3::before{content:'### '}#wrapper pre,#wrapper code{border-radius:0}#wrapper hr{border-style:dashed}";

const THEMES: &[(&str, &str)] = &[("github", GITHUB), ("paper", PAPER), ("terminal", TERMINAL)];

pub(super) fn lookup(name: &str) -> Option<&'static str> {
    THEMES
        .iter()
        .find(|(theme, _)| *theme == name)
        .map(|(_, css)| *css)
}

pub(super) fn names() -> impl Iterator<Item = &'static str> {
    THEMES.iter().map(|(name, _)| *name)
}
