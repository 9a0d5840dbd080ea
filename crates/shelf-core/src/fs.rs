//! File system helpers with typed errors.
//!
//! Every helper maps `std::io::Error` into a [`FileSystemError`] that carries
//! the offending path, so callers can propagate with `?` and still report
//! where things went wrong. Tree operations walk with `walkdir` and report
//! one [`ProgressTracker`] step per file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, FileSystemError, Result};
use crate::progress::{ProgressTracker, advance};

/// Converts an I/O error for read operations.
pub(crate) fn read_error(path: &Path, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        return Error::FileSystem(FileSystemError::NotFound {
            path: path.to_path_buf(),
        });
    }
    Error::FileSystem(FileSystemError::ReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Converts an I/O error for write operations.
pub(crate) fn write_error(path: &Path, e: io::Error) -> Error {
    Error::FileSystem(FileSystemError::WriteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Converts an I/O error for directory creation.
pub(crate) fn create_dir_error(path: &Path, e: io::Error) -> Error {
    Error::FileSystem(FileSystemError::CreateDirFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Converts an I/O error for delete operations.
pub(crate) fn delete_error(path: &Path, e: io::Error) -> Error {
    Error::FileSystem(FileSystemError::DeleteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Converts an I/O error for copy or rename operations.
pub(crate) fn copy_error(src: &Path, dst: &Path, e: io::Error) -> Error {
    Error::FileSystem(FileSystemError::CopyFailed {
        source_path: src.to_path_buf(),
        destination: dst.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Read a file's contents as a string.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| read_error(path, e))
}

/// Read and parse a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_to_string(path)?;
    serde_json::from_str(&content).map_err(Error::Serialization)
}

/// Write `value` as pretty-printed JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| create_dir_error(parent, e))?;
    }
    fs::write(path, content).map_err(|e| write_error(path, e))
}

/// Create a directory and all parent directories.
pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| create_dir_error(path, e))
}

/// Copy a single file, creating the destination's parent directories.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    if let Some(parent) = dst.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| create_dir_error(parent, e))?;
    }
    fs::copy(src, dst).map_err(|e| copy_error(src, dst, e))
}

/// Rename a file or directory, creating the destination's parent directories.
pub fn rename(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| create_dir_error(parent, e))?;
    }
    fs::rename(from, to).map_err(|e| copy_error(from, to, e))
}

/// Remove a single file. A file that is already gone is not an error.
pub fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(delete_error(path, e)),
    }
}

/// Collect every regular file under `root`.
fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
                reason: e.to_string(),
            })
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Copy the tree at `src` into `dst`, one progress step per file.
///
/// Directories (including empty ones) are recreated. `dst` is created if it
/// doesn't exist; existing files at the destination are overwritten.
pub fn copy_tree(src: &Path, dst: &Path, tracker: &mut dyn ProgressTracker) -> Result<()> {
    let files = collect_files(src)?;
    tracker.set_max(files.len() as u64);
    tracker.set_position(0);

    create_dir_all(dst)?;
    for entry in WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_dir())
    {
        if let Ok(relative) = entry.path().strip_prefix(src) {
            create_dir_all(&dst.join(relative))?;
        }
    }

    for (done, file) in files.iter().enumerate() {
        if let Ok(relative) = file.strip_prefix(src) {
            copy_file(file, &dst.join(relative))?;
        }
        advance(tracker, done, files.len());
    }

    tracker.complete();
    debug!(
        "Copied {} files from {} to {}",
        files.len(),
        src.display(),
        dst.display()
    );
    Ok(())
}

/// Delete the tree at `path`, one progress step per file.
///
/// A path that doesn't exist counts as already deleted.
pub fn remove_tree(path: &Path, tracker: &mut dyn ProgressTracker) -> Result<()> {
    if !path.exists() {
        tracker.set_max(0);
        tracker.complete();
        return Ok(());
    }

    let files = collect_files(path)?;
    tracker.set_max(files.len() as u64);
    tracker.set_position(0);

    for (done, file) in files.iter().enumerate() {
        fs::remove_file(file).map_err(|e| delete_error(file, e))?;
        advance(tracker, done, files.len());
    }
    fs::remove_dir_all(path).map_err(|e| delete_error(path, e))?;

    tracker.complete();
    debug!("Deleted {} files under {}", files.len(), path.display());
    Ok(())
}

/// Best-effort recursive byte count. Unreadable entries are logged and skipped.
pub fn dir_size(path: &Path) -> u64 {
    let mut total = 0u64;
    for entry in WalkDir::new(path) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => match entry.metadata() {
                Ok(meta) => total = total.saturating_add(meta.len()),
                Err(e) => warn!("Skipping {} while sizing: {}", entry.path().display(), e),
            },
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable path while sizing: {}", e),
        }
    }
    total
}
