//! Page discovery: top-level markup files that each render to one document.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::BuildError;

/// Extension of page templates
pub const MARKUP_EXTENSION: &str = "html";

/// Leading character that marks a partial/include rather than a page
pub const PARTIAL_MARKER: char = '_';

/// A standalone page template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// File stem, e.g. `about.page` for `about.page.html`
    pub logical_name: String,
    /// Absolute path of the template
    pub template_path: PathBuf,
    /// Output file name; pages keep their source file name
    pub output_name: String,
    /// Favicon to reference, decided by the assembler
    pub favicon: Option<PathBuf>,
}

impl Page {
    /// Copy of this page referencing `favicon`
    pub fn with_favicon(&self, favicon: Option<PathBuf>) -> Self {
        Self {
            favicon,
            ..self.clone()
        }
    }
}

/// True when `name` is a page file name: markup extension, no partial marker.
#[inline]
pub fn is_page_name(name: &str) -> bool {
    !name.starts_with(PARTIAL_MARKER)
        && Path::new(name).extension().and_then(OsStr::to_str) == Some(MARKUP_EXTENSION)
}

/// Discover the pages among the direct entries of `source_dir`.
///
/// Order follows the directory listing. A missing or unreadable directory is a
/// configuration error; an existing directory with no pages yields an empty list.
#[must_use = "this returns the discovered pages which should be rendered"]
pub fn discover_pages(source_dir: &Path) -> Result<Vec<Page>, BuildError> {
    if !source_dir.is_dir() {
        return Err(BuildError::SourceNotFound {
            path: source_dir.to_path_buf(),
        });
    }

    let unreadable = |e| BuildError::SourceUnreadable {
        path: source_dir.to_path_buf(),
        source: e,
    };

    let mut pages = Vec::new();
    for entry in fs::read_dir(source_dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let template_path = entry.path();
        // Follows symlinks, like the asset scan
        if !template_path.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            debug!(path = %template_path.display(), "skipping non UTF-8 file name");
            continue;
        };
        if !is_page_name(name) {
            continue;
        }

        let logical_name = template_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        pages.push(Page {
            logical_name,
            template_path,
            output_name: name.to_string(),
            favicon: None,
        });
    }

    Ok(pages)
}
