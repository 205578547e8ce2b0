//! One-shot cleanup that runs before any discovery starts.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::BuildError;

/// Placeholder files that only exist to keep empty asset directories tracked,
/// relative to the assets directory.
pub const PLACEHOLDER_FILES: &[&str] = &["fonts/.gitignore", "img/.gitignore"];

/// Delete the known placeholder files under `assets_dir`.
///
/// Missing files are skipped. Any other deletion failure is returned immediately.
/// Returns the paths that were actually removed.
pub fn remove_placeholders(assets_dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let mut removed = Vec::new();

    for relative in PLACEHOLDER_FILES {
        let path = assets_dir.join(relative);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "removed placeholder");
                removed.push(path);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(BuildError::Housekeeping { path, source: e }),
        }
    }

    Ok(removed)
}
