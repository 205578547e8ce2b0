//! Style sheet sub-pipeline.
//!
//! Stages run in a fixed order: preprocess, lint/auto-fix, media-query
//! consolidation, vendor prefixing. Prefixing must see consolidated media
//! queries and linting must see source syntax.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use regex::Regex;
use tracing::warn;

use super::{Transform, TransformContext, TransformRef};
use crate::error::TransformFailure;

/// Build the style chain. `preprocessor` replaces the built-in SCSS expansion.
pub fn style_chain(preprocessor: Option<TransformRef>) -> Vec<TransformRef> {
    vec![
        preprocessor.unwrap_or_else(|| Arc::new(ScssPreprocessor)),
        Arc::new(StyleLint),
        Arc::new(MediaQueryMerger),
        Arc::new(Prefixer::default()),
    ]
}

#[allow(clippy::expect_used)]
fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("hard-coded pattern compiles"))
}

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(
        &RE,
        r#"(?m)^[ \t]*@(?:import|use)[ \t]+["']([^"']+)["'][ \t]*;[ \t]*\r?\n?"#,
    )
}

fn variable_def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(
        &RE,
        r"(?m)^[ \t]*\$([A-Za-z_][\w-]*)[ \t]*:[ \t]*([^;]*?)[ \t]*(!default)?[ \t]*;[ \t]*\r?\n?",
    )
}

fn variable_use_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"\$([A-Za-z_][\w-]*)")
}

fn duplicate_semicolon_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r";(?:\s*;)+")
}

fn empty_rule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"(?m)^[ \t]*[^{}@/;\s][^{};]*\{\s*\}[ \t]*\n?")
}

/// Byte ranges of quoted strings and `/* */` comments
fn literal_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
                spans.push(start..i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = text[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |end| i + 2 + end + 2);
                spans.push(start..i);
            }
            _ => i += 1,
        }
    }

    spans
}

fn overlaps_literal(spans: &[Range<usize>], range: &Range<usize>) -> bool {
    spans.iter().any(|s| s.start < range.end && range.start < s.end)
}

/// `Regex::replace_all` that leaves matches touching a string or comment alone
fn replace_outside_literals(text: &str, re: &Regex, with: &str) -> String {
    let spans = literal_spans(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for m in re.find_iter(text) {
        if overlaps_literal(&spans, &m.range()) {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(with);
        last = m.end();
    }

    out.push_str(&text[last..]);
    out
}

// ==================== Preprocessing ====================

/// Built-in SCSS subset: `@import`/`@use` inlining, global `$variables`, `//` comments.
///
/// Nesting is left to the prefixer, which lowers it for the configured targets.
/// The indented `.sass` syntax needs an external preprocessor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScssPreprocessor;

impl Transform for ScssPreprocessor {
    fn name(&self) -> &str {
        "scss"
    }

    fn apply(
        &self,
        input: Vec<u8>,
        ctx: &TransformContext<'_>,
    ) -> Result<Vec<u8>, TransformFailure> {
        if ctx.source.extension().and_then(OsStr::to_str) == Some("sass") {
            return Err(TransformFailure::Syntax(
                "indented .sass syntax requires an external preprocessor (--style-preprocessor)"
                    .to_string(),
            ));
        }

        let text = std::str::from_utf8(&input)?;
        let mut stack = vec![canonical(ctx.source)];
        let expanded = expand_imports(text, ctx.source, &mut stack)?;
        let stripped = strip_line_comments(&expanded);
        let substituted = substitute_variables(&stripped)?;
        Ok(substituted.into_bytes())
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Imports that must stay as real CSS `@import`s
fn is_remote_import(name: &str) -> bool {
    name.starts_with("http://") || name.starts_with("https://") || name.starts_with("//")
}

/// Sass lookup order: exact name, then partial, trying `scss` and `css` when no extension is given.
fn resolve_import(dir: &Path, name: &str) -> Option<PathBuf> {
    let requested = dir.join(name);
    let file_name = requested.file_name()?.to_string_lossy().into_owned();
    let parent = requested.parent()?;

    let mut candidates = Vec::with_capacity(4);
    if Path::new(&file_name).extension().is_some() {
        candidates.push(parent.join(&file_name));
        candidates.push(parent.join(format!("_{file_name}")));
    } else {
        for ext in ["scss", "css"] {
            candidates.push(parent.join(format!("{file_name}.{ext}")));
            candidates.push(parent.join(format!("_{file_name}.{ext}")));
        }
    }

    candidates.into_iter().find(|p| p.is_file())
}

fn expand_imports(
    text: &str,
    file: &Path,
    stack: &mut Vec<PathBuf>,
) -> Result<String, TransformFailure> {
    let dir = file.parent().unwrap_or_else(|| Path::new(""));
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in import_re().captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        last = whole.end();

        if is_remote_import(name.as_str()) {
            out.push_str(whole.as_str());
            continue;
        }

        let resolved = resolve_import(dir, name.as_str()).ok_or_else(|| {
            TransformFailure::Unresolved {
                name: name.as_str().to_string(),
                from: file.to_path_buf(),
            }
        })?;
        let key = canonical(&resolved);
        if stack.contains(&key) {
            return Err(TransformFailure::ImportCycle(resolved));
        }

        let content = fs::read_to_string(&resolved)?;
        stack.push(key);
        let nested = expand_imports(&content, &resolved, stack)?;
        stack.pop();

        out.push_str(&nested);
        if !nested.ends_with('\n') {
            out.push('\n');
        }
    }

    out.push_str(&text[last..]);
    Ok(out)
}

/// Drop `//` comments outside strings, block comments and parentheses (`url(//cdn)` survives).
fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;
    let mut in_block = false;
    let mut parens = 0usize;

    while let Some(c) = chars.next() {
        if in_block {
            out.push(c);
            if c == '*' && chars.peek() == Some(&'/') {
                out.push('/');
                chars.next();
                in_block = false;
            }
            continue;
        }

        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
            }
            '(' => {
                parens += 1;
                out.push(c);
            }
            ')' => {
                parens = parens.saturating_sub(1);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'*') => {
                in_block = true;
                out.push('/');
                out.push('*');
                chars.next();
            }
            '/' if parens == 0 && chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Collect `$name: value;` definitions and substitute every `$name` use.
///
/// Variables are global; `!default` only assigns when the name is still unset.
fn substitute_variables(text: &str) -> Result<String, TransformFailure> {
    let mut vars: HashMap<String, String> = HashMap::new();
    let mut body = String::with_capacity(text.len());
    let mut last = 0;

    for caps in variable_def_re().captures_iter(text) {
        let (Some(whole), Some(name), Some(raw)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        body.push_str(&text[last..whole.start()]);
        last = whole.end();

        if caps.get(3).is_some() && vars.contains_key(name.as_str()) {
            continue;
        }
        let value = replace_variables(raw.as_str().trim(), &vars)?;
        vars.insert(name.as_str().to_string(), value);
    }
    body.push_str(&text[last..]);

    replace_variables(&body, &vars)
}

/// Replace `$name` uses outside quoted strings and comments
fn replace_variables(text: &str, vars: &HashMap<String, String>) -> Result<String, TransformFailure> {
    let spans = literal_spans(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in variable_use_re().captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if overlaps_literal(&spans, &whole.range()) {
            continue;
        }
        let value = vars.get(name.as_str()).ok_or_else(|| {
            TransformFailure::Syntax(format!("undefined variable ${}", name.as_str()))
        })?;
        out.push_str(&text[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }

    out.push_str(&text[last..]);
    Ok(out)
}

// ==================== Lint / auto-fix ====================

/// Mechanical fixes (duplicate semicolons, empty rules, trailing whitespace) plus warnings
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleLint;

impl Transform for StyleLint {
    fn name(&self) -> &str {
        "stylelint"
    }

    fn apply(
        &self,
        input: Vec<u8>,
        ctx: &TransformContext<'_>,
    ) -> Result<Vec<u8>, TransformFailure> {
        let text = std::str::from_utf8(&input)?;

        let important = text.matches("!important").count();
        if important > 0 {
            warn!(
                source = %ctx.source.display(),
                count = important,
                "style sheet uses !important"
            );
        }

        Ok(lint_fix(text).into_bytes())
    }
}

fn lint_fix(text: &str) -> String {
    let trimmed = text.lines().map(str::trim_end).collect::<Vec<_>>().join("\n");
    let mut fixed = replace_outside_literals(&trimmed, duplicate_semicolon_re(), ";");

    // Removing an empty rule can leave its parent empty
    loop {
        let next = replace_outside_literals(&fixed, empty_rule_re(), "");
        if next == fixed {
            break;
        }
        fixed = next;
    }

    let mut fixed = fixed.trim_end().to_string();
    if !fixed.is_empty() {
        fixed.push('\n');
    }
    fixed
}

// ==================== Media query consolidation ====================

/// Merges top-level `@media` blocks with identical queries and moves them after
/// all other top-level statements, in first-appearance order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaQueryMerger;

impl Transform for MediaQueryMerger {
    fn name(&self) -> &str {
        "combine-media-query"
    }

    fn apply(
        &self,
        input: Vec<u8>,
        _ctx: &TransformContext<'_>,
    ) -> Result<Vec<u8>, TransformFailure> {
        let text = std::str::from_utf8(&input)?;
        let merged = merge_media_queries(text).map_err(TransformFailure::Syntax)?;
        Ok(merged.into_bytes())
    }
}

/// A top-level statement
#[derive(Debug, PartialEq, Eq)]
enum Statement<'a> {
    /// `prelude { body }`; `raw` spans the whole statement
    Block {
        raw: &'a str,
        prelude: &'a str,
        body: &'a str,
    },
    /// `@charset ...;`, `@import ...;`, standalone comments, stray text
    Other(&'a str),
}

fn split_top_level(css: &str) -> Result<Vec<Statement<'_>>, String> {
    let bytes = css.as_bytes();
    let mut statements = Vec::new();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut body_start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];

        if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' | b'\'' => quote = Some(b),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = css[i + 2..]
                    .find("*/")
                    .map(|pos| i + 2 + pos + 2)
                    .ok_or_else(|| "unterminated comment".to_string())?;
                if depth == 0 && css[start..i].trim().is_empty() {
                    statements.push(Statement::Other(&css[start..end]));
                    start = end;
                }
                i = end;
                continue;
            }
            b'{' => {
                if depth == 0 {
                    body_start = i + 1;
                }
                depth += 1;
            }
            b'}' => {
                if depth == 0 {
                    return Err(format!("unexpected `}}` at byte {i}"));
                }
                depth -= 1;
                if depth == 0 {
                    statements.push(Statement::Block {
                        raw: &css[start..=i],
                        prelude: &css[start..body_start - 1],
                        body: &css[body_start..i],
                    });
                    start = i + 1;
                }
            }
            b';' if depth == 0 => {
                statements.push(Statement::Other(&css[start..=i]));
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    if quote.is_some() {
        return Err("unterminated string".to_string());
    }
    if depth > 0 {
        return Err("unclosed block".to_string());
    }
    if !css[start..].trim().is_empty() {
        statements.push(Statement::Other(&css[start..]));
    }

    Ok(statements)
}

fn media_key(prelude: &str) -> Option<String> {
    let prelude = prelude.trim();
    let is_media = prelude
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("@media"));
    is_media.then(|| prelude.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Consolidate equal top-level media queries.
pub fn merge_media_queries(css: &str) -> Result<String, String> {
    let statements = split_top_level(css)?;

    let mut rest: Vec<&str> = Vec::new();
    let mut queries: Vec<(String, Vec<&str>)> = Vec::new();

    for statement in statements {
        match statement {
            Statement::Block { raw, prelude, body } => match media_key(prelude) {
                Some(key) => match queries.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, bodies)) => bodies.push(body),
                    None => queries.push((key, vec![body])),
                },
                None => rest.push(raw),
            },
            Statement::Other(raw) => rest.push(raw),
        }
    }

    let mut out = String::with_capacity(css.len());
    for raw in rest {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        out.push_str(raw);
        out.push('\n');
    }
    for (key, bodies) in queries {
        out.push_str(&key);
        out.push_str(" {\n");
        for body in bodies {
            let body = body.trim();
            if body.is_empty() {
                continue;
            }
            out.push_str(body);
            out.push('\n');
        }
        out.push_str("}\n");
    }

    Ok(out)
}

// ==================== Vendor prefixing ====================

const fn version(major: u32) -> Option<u32> {
    Some(major << 16)
}

/// Vendor prefixing, nesting lowering and (in production) minification via lightningcss
#[derive(Debug, Clone, Copy)]
pub struct Prefixer {
    browsers: Browsers,
}

impl Prefixer {
    pub fn new(browsers: Browsers) -> Self {
        Self { browsers }
    }
}

impl Default for Prefixer {
    /// IE 8 and roughly the last four major versions of evergreen browsers
    fn default() -> Self {
        Self::new(Browsers {
            android: version(80),
            chrome: version(80),
            edge: version(80),
            firefox: version(72),
            ie: version(8),
            ios_saf: version(13),
            opera: version(67),
            safari: version(13),
            samsung: version(12),
        })
    }
}

impl Transform for Prefixer {
    fn name(&self) -> &str {
        "lightningcss"
    }

    fn apply(
        &self,
        input: Vec<u8>,
        ctx: &TransformContext<'_>,
    ) -> Result<Vec<u8>, TransformFailure> {
        let css = std::str::from_utf8(&input)?;
        let targets = Targets::from(self.browsers);

        let mut sheet = StyleSheet::parse(
            css,
            ParserOptions {
                filename: ctx.source.display().to_string(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| TransformFailure::Syntax(e.to_string()))?;

        sheet
            .minify(MinifyOptions {
                targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| TransformFailure::Syntax(e.to_string()))?;

        let printed = sheet
            .to_css(PrinterOptions {
                minify: ctx.policy.should_minify(),
                targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| TransformFailure::Syntax(e.to_string()))?;

        Ok(printed.code.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{BuildMode, ModePolicy};
    use crate::transform::run_chain;
    use tempfile::TempDir;

    fn apply_with(
        transform: &dyn Transform,
        source: &Path,
        mode: BuildMode,
        input: &str,
    ) -> Result<String, TransformFailure> {
        let policy = ModePolicy::new(mode);
        let root = source.parent().unwrap_or_else(|| Path::new("/"));
        let ctx = TransformContext {
            source,
            source_root: root,
            policy: &policy,
        };
        transform
            .apply(input.as_bytes().to_vec(), &ctx)
            .map(|out| String::from_utf8(out).unwrap())
    }

    fn apply(transform: &dyn Transform, input: &str) -> Result<String, TransformFailure> {
        apply_with(
            transform,
            Path::new("/src/css/app.scss"),
            BuildMode::Development,
            input,
        )
    }

    // ==================== ScssPreprocessor tests ====================

    #[test]
    fn test_scss_variables_substituted() {
        let out = apply(
            &ScssPreprocessor,
            "$brand: #336699;\n$accent: $brand;\na { color: $accent; }\n",
        )
        .unwrap();
        assert_eq!(out, "a { color: #336699; }\n");
    }

    #[test]
    fn test_scss_default_does_not_override() {
        let out = apply(
            &ScssPreprocessor,
            "$size: 10px;\n$size: 20px !default;\np { margin: $size; }\n",
        )
        .unwrap();
        assert_eq!(out, "p { margin: 10px; }\n");
    }

    #[test]
    fn test_scss_undefined_variable_fails() {
        let err = apply(&ScssPreprocessor, "a { color: $missing; }").unwrap_err();
        assert!(err.to_string().contains("$missing"));
    }

    #[test]
    fn test_scss_attribute_selector_is_not_a_variable() {
        let css = "a[href$=\".pdf\"] { color: red; }\n";
        assert_eq!(apply(&ScssPreprocessor, css).unwrap(), css);
    }

    #[test]
    fn test_scss_variables_in_strings_left_alone() {
        let css = "$price: 5;\n.a::before { content: \"$USD\"; }\n/* uses $theme */\n.b { order: $price; }\n";
        assert_eq!(
            apply(&ScssPreprocessor, css).unwrap(),
            ".a::before { content: \"$USD\"; }\n/* uses $theme */\n.b { order: 5; }\n"
        );
    }

    #[test]
    fn test_scss_line_comments_stripped() {
        let out = apply(
            &ScssPreprocessor,
            "// header\na { background: url(//cdn.example.com/x.png); } // trailing\n/* kept */\n",
        )
        .unwrap();
        assert!(!out.contains("header"));
        assert!(!out.contains("trailing"));
        assert!(out.contains("url(//cdn.example.com/x.png)"));
        assert!(out.contains("/* kept */"));
    }

    #[test]
    fn test_scss_comment_markers_in_strings_survive() {
        let out = apply(&ScssPreprocessor, "a::after { content: \"// not a comment\"; }").unwrap();
        assert!(out.contains("\"// not a comment\""));
    }

    #[test]
    fn test_scss_imports_partials() {
        let temp = TempDir::new().unwrap();
        let css_dir = temp.path().join("css");
        fs::create_dir_all(&css_dir).unwrap();
        fs::write(css_dir.join("_vars.scss"), "$gap: 4px;\n").unwrap();
        fs::write(css_dir.join("_base.scss"), "body { padding: $gap; }\n").unwrap();
        let main = css_dir.join("app.scss");
        let source = "@import \"vars\";\n@use 'base';\n.x { margin: $gap; }\n";
        fs::write(&main, source).unwrap();

        let out = apply_with(&ScssPreprocessor, &main, BuildMode::Development, source).unwrap();

        assert_eq!(out, "body { padding: 4px; }\n.x { margin: 4px; }\n");
    }

    #[test]
    fn test_scss_remote_import_kept() {
        let out = apply(
            &ScssPreprocessor,
            "@import \"https://fonts.example.com/css\";\na { b: c; }\n",
        )
        .unwrap();
        assert!(out.starts_with("@import \"https://fonts.example.com/css\";"));
    }

    #[test]
    fn test_scss_unresolved_import_fails() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("app.scss");
        let err = apply_with(
            &ScssPreprocessor,
            &main,
            BuildMode::Development,
            "@import \"missing\";\n",
        )
        .unwrap_err();
        assert!(matches!(err, TransformFailure::Unresolved { .. }));
    }

    #[test]
    fn test_scss_import_cycle_fails() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("_a.scss"), "@import \"b\";\n").unwrap();
        fs::write(temp.path().join("_b.scss"), "@import \"a\";\n").unwrap();
        let main = temp.path().join("app.scss");
        fs::write(&main, "@import \"a\";\n").unwrap();

        let err = apply_with(
            &ScssPreprocessor,
            &main,
            BuildMode::Development,
            "@import \"a\";\n",
        )
        .unwrap_err();
        assert!(matches!(err, TransformFailure::ImportCycle(_)));
    }

    #[test]
    fn test_sass_indented_syntax_rejected() {
        let err = apply_with(
            &ScssPreprocessor,
            Path::new("/src/css/app.sass"),
            BuildMode::Development,
            "a\n  color: red\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("--style-preprocessor"));
    }

    // ==================== StyleLint tests ====================

    #[test]
    fn test_lint_fixes_duplicate_semicolons() {
        assert_eq!(lint_fix("a { color: red;; margin: 0; ; }"), "a { color: red; margin: 0; }\n");
    }

    #[test]
    fn test_lint_removes_empty_rules() {
        assert_eq!(lint_fix(".a {}\n.b { color: red; }\n.c {\n}\n"), ".b { color: red; }\n");
    }

    #[test]
    fn test_lint_ignores_braces_and_semicolons_in_strings() {
        let css = ".a::before {\n  content: \"{}\";\n}\n.b::after { content: ';;'; }\n/* .c {} */\n";
        assert_eq!(lint_fix(css), css);
    }

    #[test]
    fn test_literal_spans() {
        let text = r#"a "b\"c" /* d */ 'e' /* open"#;
        let spans: Vec<&str> = literal_spans(text).into_iter().map(|r| &text[r]).collect();
        assert_eq!(spans, vec![r#""b\"c""#, "/* d */", "'e'", "/* open"]);
    }

    #[test]
    fn test_lint_trims_trailing_whitespace() {
        assert_eq!(lint_fix("a {   \n  color: red;  \n}   "), "a {\n  color: red;\n}\n");
    }

    #[test]
    fn test_lint_empty_input() {
        assert_eq!(lint_fix("  \n"), "");
    }

    // ==================== MediaQueryMerger tests ====================

    #[test]
    fn test_merge_equal_queries() {
        let css = "@media (max-width: 600px) { .a { color: red; } }\n\
                   .b { color: blue; }\n\
                   @media  (max-width:  600px) { .c { color: green; } }\n";

        let out = merge_media_queries(css).unwrap();

        assert_eq!(
            out,
            ".b { color: blue; }\n@media (max-width: 600px) {\n.a { color: red; }\n.c { color: green; }\n}\n"
        );
    }

    #[test]
    fn test_merge_keeps_distinct_queries_in_order() {
        let css = "@media print { a { b: c; } }\n@media screen { d { e: f; } }\n@media print { g { h: i; } }\n";

        let out = merge_media_queries(css).unwrap();

        assert_eq!(out.matches("@media print").count(), 1);
        assert_eq!(out.matches("@media screen").count(), 1);
        assert!(out.find("@media print").unwrap() < out.find("@media screen").unwrap());
        assert!(out.find("a { b: c; }").unwrap() < out.find("g { h: i; }").unwrap());
    }

    #[test]
    fn test_merge_ignores_braces_in_strings_and_comments() {
        let css = "/* { */\n.a::before { content: \"}\"; }\n@media print { .b { c: d; } }\n";
        let out = merge_media_queries(css).unwrap();
        assert!(out.starts_with("/* { */\n.a::before { content: \"}\"; }\n"));
        assert!(out.ends_with("@media print {\n.b { c: d; }\n}\n"));
    }

    #[test]
    fn test_merge_keeps_at_statements() {
        let css = "@charset \"utf-8\";\n@media print { a { b: c; } }\n.x { y: z; }\n";
        let out = merge_media_queries(css).unwrap();
        assert!(out.starts_with("@charset \"utf-8\";\n.x { y: z; }\n"));
    }

    #[test]
    fn test_merge_unbalanced_fails() {
        assert!(merge_media_queries(".a { color: red; ").is_err());
        assert!(merge_media_queries(".a { color: red; } }").is_err());
        assert!(merge_media_queries(".a { content: \"x; }").is_err());
    }

    #[test]
    fn test_split_top_level_statements() {
        let statements = split_top_level("@import url(x.css);\n.a { b { c: d; } }").unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], Statement::Other("@import url(x.css);"));
        assert!(matches!(
            statements[1],
            Statement::Block { prelude: "\n.a ", body: " b { c: d; } ", .. }
        ));
    }

    // ==================== Prefixer tests ====================

    #[test]
    fn test_prefixer_adds_vendor_prefixes() {
        let out = apply(&Prefixer::default(), ".a { user-select: none; }").unwrap();
        assert!(out.contains("-webkit-user-select"));
        assert!(out.contains("user-select: none"));
    }

    #[test]
    fn test_prefixer_minifies_in_production() {
        let out = apply_with(
            &Prefixer::default(),
            Path::new("/src/css/app.css"),
            BuildMode::Production,
            ".a {\n  color: red;\n}\n\n.b {\n  color: blue;\n}\n",
        )
        .unwrap();
        assert!(!out.contains('\n'));
        assert!(out.contains(".a{color:red}"));
    }

    // ==================== Full chain tests ====================

    #[test]
    fn test_style_chain_consolidates_then_prefixes() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("app.scss");
        let input = "$wide: 600px;\n\
                     @media (max-width: $wide) { .a { user-select: none; } }\n\
                     .b { color: red;; }\n\
                     @media (max-width: $wide) { .c { color: blue; } }\n";
        let policy = ModePolicy::new(BuildMode::Development);
        let ctx = TransformContext {
            source: &source,
            source_root: temp.path(),
            policy: &policy,
        };

        let out = run_chain(&style_chain(None), input.as_bytes().to_vec(), &ctx).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert_eq!(out.matches("@media").count(), 1);
        assert!(out.contains("-webkit-user-select"));
        assert!(out.find(".b").unwrap() < out.find("@media").unwrap());
    }

    #[test]
    fn test_style_chain_keeps_string_content() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("app.scss");
        let input = "$gap: 4px;\n.a::before {\n  content: \"{}\";\n  margin: $gap;\n}\n.b::after { content: \"$USD\"; }\n";
        let policy = ModePolicy::new(BuildMode::Development);
        let ctx = TransformContext {
            source: &source,
            source_root: temp.path(),
            policy: &policy,
        };

        let out = run_chain(&style_chain(None), input.as_bytes().to_vec(), &ctx).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains(".a:before") || out.contains(".a::before"));
        assert!(out.contains("\"{}\""));
        assert!(out.contains("\"$USD\""));
        assert!(out.contains("4px"));
    }
}
