//! Output file writes with disk-full detection.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::BuildError;

/// ENOSPC on Unix
const ENOSPC: i32 = 28;

#[inline]
fn is_disk_full(e: &io::Error) -> bool {
    e.raw_os_error() == Some(ENOSPC)
}

/// Create the parent directory of `dst` if it does not exist yet
fn ensure_parent(dst: &Path) -> Result<(), BuildError> {
    let Some(parent) = dst.parent() else {
        return Ok(());
    };
    if parent.exists() {
        return Ok(());
    }

    fs::create_dir_all(parent).map_err(|e| {
        if is_disk_full(&e) {
            return BuildError::DiskFull {
                path: parent.to_path_buf(),
            };
        }
        BuildError::CreateDirFailed {
            path: parent.to_path_buf(),
            source: e,
        }
    })
}

/// Write transformed content to `dst`, returning the number of bytes written
pub fn write_file(dst: &Path, content: &[u8]) -> Result<u64, BuildError> {
    ensure_parent(dst)?;

    fs::write(dst, content).map_err(|e| {
        if is_disk_full(&e) {
            return BuildError::DiskFull {
                path: dst.to_path_buf(),
            };
        }
        BuildError::WriteFailed {
            path: dst.to_path_buf(),
            source: e,
        }
    })?;

    Ok(content.len() as u64)
}

/// Copy a single file from src to dst
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64, BuildError> {
    ensure_parent(dst)?;

    fs::copy(src, dst).map_err(|e| {
        if is_disk_full(&e) {
            return BuildError::DiskFull {
                path: dst.to_path_buf(),
            };
        }
        BuildError::CopyFailed {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            source: e,
        }
    })
}
