//! Page rendering: include expansion, asset tag injection, whitespace collapsing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::{Transform, TransformContext};
use crate::error::TransformFailure;

/// Maximum include nesting
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Elements whose content is copied verbatim when collapsing whitespace
const PRESERVED_ELEMENTS: &[&str] = &["pre", "textarea", "script", "style"];

#[allow(clippy::expect_used)]
fn include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{>\s*([^\s}]+)\s*\}\}").expect("hard-coded pattern compiles"))
}

/// References injected into every page, as URLs relative to the output root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageAssets {
    pub styles: Vec<String>,
    pub scripts: Vec<String>,
    pub favicon: Option<String>,
}

/// Renders one page template. `{{> name.html}}` includes resolve against the source root.
#[derive(Debug, Clone, Default)]
pub struct PageRenderer {
    assets: PageAssets,
}

impl PageRenderer {
    pub fn new(assets: PageAssets) -> Self {
        Self { assets }
    }

    pub fn assets(&self) -> &PageAssets {
        &self.assets
    }
}

impl Transform for PageRenderer {
    fn name(&self) -> &str {
        "html"
    }

    fn apply(
        &self,
        input: Vec<u8>,
        ctx: &TransformContext<'_>,
    ) -> Result<Vec<u8>, TransformFailure> {
        let text = std::str::from_utf8(&input)?;
        let mut stack = vec![ctx.source.to_path_buf()];
        let expanded = expand_includes(text, ctx.source, ctx.source_root, &mut stack)?;
        let injected = inject_assets(&expanded, &self.assets);

        let rendered = if ctx.policy.should_minify() {
            collapse_whitespace(&injected)
        } else {
            injected
        };
        Ok(rendered.into_bytes())
    }
}

fn expand_includes(
    text: &str,
    file: &Path,
    root: &Path,
    stack: &mut Vec<PathBuf>,
) -> Result<String, TransformFailure> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in include_re().captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        last = whole.end();

        let path = root.join(name.as_str());
        if !path.is_file() {
            return Err(TransformFailure::Unresolved {
                name: name.as_str().to_string(),
                from: file.to_path_buf(),
            });
        }
        if stack.contains(&path) || stack.len() > MAX_INCLUDE_DEPTH {
            return Err(TransformFailure::ImportCycle(path));
        }

        let content = fs::read_to_string(&path)?;
        stack.push(path.clone());
        let nested = expand_includes(&content, &path, root, stack)?;
        stack.pop();
        out.push_str(nested.trim_end_matches('\n'));
    }

    out.push_str(&text[last..]);
    Ok(out)
}

/// Insert favicon and style links before `</head>` and scripts before `</body>`.
///
/// A document without `</head>` gets the links prepended; one without `</body>`
/// gets the scripts appended.
pub fn inject_assets(html: &str, assets: &PageAssets) -> String {
    let mut head = String::new();
    if let Some(favicon) = &assets.favicon {
        head.push_str(&format!("<link rel=\"icon\" href=\"{favicon}\">"));
    }
    for href in &assets.styles {
        head.push_str(&format!("<link href=\"{href}\" rel=\"stylesheet\">"));
    }

    let mut body = String::new();
    for src in &assets.scripts {
        body.push_str(&format!("<script defer src=\"{src}\"></script>"));
    }

    let mut out = html.to_string();

    if !head.is_empty() {
        match out.to_ascii_lowercase().find("</head>") {
            Some(pos) => out.insert_str(pos, &head),
            None => out.insert_str(0, &head),
        }
    }

    if !body.is_empty() {
        match out.to_ascii_lowercase().rfind("</body>") {
            Some(pos) => out.insert_str(pos, &body),
            None => out.push_str(&body),
        }
    }

    out
}

fn preserved_element_at(lower: &str, pos: usize) -> Option<&'static str> {
    let after = lower.get(pos + 1..)?;
    PRESERVED_ELEMENTS.iter().copied().find(|tag| {
        after.starts_with(tag)
            && after[tag.len()..]
                .bytes()
                .next()
                .map_or(true, |b| b == b'>' || b == b'/' || b.is_ascii_whitespace())
    })
}

/// Collapse whitespace runs to one space; drop line-breaking runs between tags.
///
/// Content of `pre`, `textarea`, `script` and `style` is kept as is.
pub fn collapse_whitespace(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'<' {
            if let Some(tag) = preserved_element_at(&lower, i) {
                let close = format!("</{tag}");
                let close_at = lower[i + 1..]
                    .find(&close)
                    .map_or(bytes.len(), |p| i + 1 + p);
                let end = lower[close_at..]
                    .find('>')
                    .map_or(bytes.len(), |p| close_at + p + 1);
                out.push_str(&html[i..end]);
                i = end;
                continue;
            }
        }

        if bytes[i].is_ascii_whitespace() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let prev = out.as_bytes().last().copied();
            let next = bytes.get(i).copied();
            let breaks_line = html[start..i].contains('\n');
            let between_tags = prev == Some(b'>') && next == Some(b'<');
            if prev.is_some() && next.is_some() && !(between_tags && breaks_line) {
                out.push(' ');
            }
            continue;
        }

        let Some(ch) = html[i..].chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}
