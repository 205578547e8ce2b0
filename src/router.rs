//! Asset routing: a fixed, ordered table mapping file extensions to transform
//! chains and output locations.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::mode::ModePolicy;
use crate::pages::{MARKUP_EXTENSION, PARTIAL_MARKER};
use crate::transform::image::ImageCompressor;
use crate::transform::style::style_chain;
use crate::transform::TransformRef;

pub const STYLE_EXTENSIONS: &[&str] = &["scss", "sass", "css"];
pub const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg"];
pub const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "eot", "ttf", "otf"];

/// Directory whose contents are never emitted
const VENDORED_DIR: &str = "node_modules";

/// Asset categories. A file belongs to at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Markup,
    Style,
    Script,
    Image,
    Font,
}

impl AssetKind {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Markup => "markup",
            AssetKind::Style => "style",
            AssetKind::Script => "script",
            AssetKind::Image => "image",
            AssetKind::Font => "font",
        }
    }
}

/// Output location template: `<dir>/[name].<ext>`, where `<ext>` may be `[ext]`
/// to keep the source extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplate {
    raw: String,
    dir: PathBuf,
    /// `None` keeps the source extension
    extension: Option<String>,
}

impl OutputTemplate {
    pub fn parse(template: &str) -> Self {
        let (dir, file) = template.rsplit_once('/').unwrap_or(("", template));
        let ext = file.strip_prefix("[name].").unwrap_or(file);
        Self {
            raw: template.to_string(),
            dir: PathBuf::from(dir),
            extension: (ext != "[ext]").then(|| ext.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Output path relative to the output root; the file name comes from the mode policy.
    pub fn output_path(&self, source: &Path, content: &[u8], policy: &ModePolicy) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source_ext = source
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self.extension.as_deref().unwrap_or(&source_ext);

        self.dir.join(policy.artifact_name(&stem, ext, content))
    }
}

impl fmt::Display for OutputTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One routing entry
#[derive(Clone)]
pub struct AssetRule {
    pub kind: AssetKind,
    /// Lowercase extensions, matched case-insensitively
    pub extensions: &'static [&'static str],
    /// Applied in order; empty means copy
    pub chain: Vec<TransformRef>,
    /// `None` for markup, which is rendered as pages instead of emitted per file
    pub output: Option<OutputTemplate>,
    /// Matched files for which this returns true are consumed elsewhere and not emitted
    pub excluded: fn(&Path) -> bool,
}

impl AssetRule {
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(ext))
            })
    }

    #[inline]
    pub fn is_excluded(&self, path: &Path) -> bool {
        (self.excluded)(path)
    }

    /// Names of the transformers in the chain, in order
    pub fn chain_names(&self) -> Vec<&str> {
        self.chain.iter().map(|t| t.name()).collect()
    }
}

impl fmt::Debug for AssetRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRule")
            .field("kind", &self.kind)
            .field("extensions", &self.extensions)
            .field("chain", &self.chain_names())
            .field("output", &self.output.as_ref().map(OutputTemplate::as_str))
            .finish()
    }
}

fn never_excluded(_path: &Path) -> bool {
    false
}

/// Partials (`_name.ext`) and anything under `node_modules`
pub fn is_partial_or_vendored(path: &Path) -> bool {
    let partial = path
        .file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|name| name.starts_with(PARTIAL_MARKER));
    let vendored = path
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name == VENDORED_DIR));
    partial || vendored
}

/// External programs that replace or extend built-in stages
#[derive(Clone, Default)]
pub struct ExternalTransformers {
    pub style_preprocessor: Option<TransformRef>,
    pub script_transpiler: Option<TransformRef>,
    /// Only run in development
    pub script_linter: Option<TransformRef>,
}

/// Ordered rule table. The first matching rule wins.
#[derive(Debug, Clone)]
pub struct AssetRouter {
    rules: Vec<AssetRule>,
}

impl AssetRouter {
    pub fn new(rules: Vec<AssetRule>) -> Self {
        Self { rules }
    }

    /// Markup, styles, scripts, images, fonts.
    pub fn standard(external: &ExternalTransformers, policy: &ModePolicy) -> Self {
        let mut script_chain: Vec<TransformRef> = Vec::new();
        if policy.is_development() {
            script_chain.extend(external.script_linter.clone());
        }
        script_chain.extend(external.script_transpiler.clone());

        Self::new(vec![
            AssetRule {
                kind: AssetKind::Markup,
                extensions: &[MARKUP_EXTENSION],
                chain: Vec::new(),
                output: None,
                excluded: never_excluded,
            },
            AssetRule {
                kind: AssetKind::Style,
                extensions: STYLE_EXTENSIONS,
                chain: style_chain(external.style_preprocessor.clone()),
                output: Some(OutputTemplate::parse("css/[name].css")),
                excluded: is_partial_or_vendored,
            },
            AssetRule {
                kind: AssetKind::Script,
                extensions: SCRIPT_EXTENSIONS,
                chain: script_chain,
                output: Some(OutputTemplate::parse("js/[name].js")),
                excluded: is_partial_or_vendored,
            },
            AssetRule {
                kind: AssetKind::Image,
                extensions: IMAGE_EXTENSIONS,
                chain: vec![Arc::new(ImageCompressor)],
                output: Some(OutputTemplate::parse("img/[name].[ext]")),
                excluded: never_excluded,
            },
            AssetRule {
                kind: AssetKind::Font,
                extensions: FONT_EXTENSIONS,
                chain: Vec::new(),
                output: Some(OutputTemplate::parse("fonts/[name].[ext]")),
                excluded: never_excluded,
            },
        ])
    }

    /// First rule matching `path`, or `None` for passthrough files.
    pub fn route(&self, path: &Path) -> Option<&AssetRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn rules(&self) -> &[AssetRule] {
        &self.rules
    }
}
