//! Build plan: every page plus every routed or passthrough source file.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::BuildError;
use crate::pages::Page;
use crate::router::{AssetKind, AssetRouter, AssetRule};

/// How one source file reaches the output tree
#[derive(Debug, Clone, Copy)]
pub enum Route<'r> {
    Rule(&'r AssetRule),
    /// Copied unchanged to its relative location
    Passthrough,
}

impl Route<'_> {
    pub fn kind(&self) -> Option<AssetKind> {
        match self {
            Route::Rule(rule) => Some(rule.kind),
            Route::Passthrough => None,
        }
    }
}

/// One non-page source file
#[derive(Debug, Clone)]
pub struct WorkItem<'r> {
    /// Absolute source path
    pub source: PathBuf,
    /// Output location for passthrough copies, relative to the output root
    pub relative: PathBuf,
    pub route: Route<'r>,
}

/// Everything one invocation builds
#[derive(Debug, Clone, Default)]
pub struct BuildPlan<'r> {
    pub pages: Vec<Page>,
    pub items: Vec<WorkItem<'r>>,
}

impl<'r> BuildPlan<'r> {
    pub fn new(pages: Vec<Page>, items: Vec<WorkItem<'r>>) -> Self {
        Self { pages, items }
    }

    /// Number of work units (pages + files)
    pub fn len(&self) -> usize {
        self.pages.len() + self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.items.is_empty()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Scan `source_root` recursively (sorted by file name) and route every file.
///
/// Files under `assets_dir` are copied as they are, except images and fonts,
/// which go through their rules. Elsewhere markup is skipped (pages and includes
/// are handled by the renderer), as are files a rule excludes. Hidden entries are
/// never scanned. Passthrough files keep their path relative to `assets_dir` when
/// inside it, otherwise relative to `source_root`.
pub fn collect_assets<'r>(
    source_root: &Path,
    assets_dir: &Path,
    output_root: &Path,
    router: &'r AssetRouter,
) -> Result<Vec<WorkItem<'r>>, BuildError> {
    let mut items = Vec::new();

    let walker = WalkDir::new(source_root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e) && e.path() != output_root);

    for entry in walker {
        let entry = entry.map_err(|e| BuildError::ReadFailed {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| source_root.to_path_buf()),
            source: e.into(),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let source = entry.path();
        let in_assets = source.starts_with(assets_dir);
        let route = match router.route(source) {
            // The assets tree is copied verbatim, except images and fonts
            Some(rule)
                if in_assets && !matches!(rule.kind, AssetKind::Image | AssetKind::Font) =>
            {
                Route::Passthrough
            }
            Some(rule) if rule.kind == AssetKind::Markup => continue,
            Some(rule) if rule.is_excluded(source) => {
                debug!(source = %source.display(), kind = rule.kind.as_str(), "excluded");
                continue;
            }
            Some(rule) => Route::Rule(rule),
            None => Route::Passthrough,
        };

        let relative = source
            .strip_prefix(assets_dir)
            .or_else(|_| source.strip_prefix(source_root))
            .unwrap_or(source)
            .to_path_buf();

        items.push(WorkItem {
            source: source.to_path_buf(),
            relative,
            route,
        });
    }

    Ok(items)
}

/// File name of a work item's source, for log lines
pub fn display_name(item: &WorkItem<'_>) -> String {
    item.source
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or_default()
        .to_string()
}
