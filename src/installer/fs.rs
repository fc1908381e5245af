//! File-system helpers for installing and updating dotfiles.
use std::fs;
use std::io::{self, Write as _};
use std::path::Path;

use super::symlink::remove_symlink;
use crate::paths::is_symlink;

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Whether the parent directory of `path` exists.
#[must_use]
pub fn parent_exists(path: &Path) -> bool {
    path.parent().is_none_or(Path::is_dir)
}

/// Remove whatever is at `path`: a symlink (dangling or not), a file or a
/// whole directory tree. Does nothing if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_existing(path: &Path) -> io::Result<()> {
    match path.symlink_metadata() {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
        Ok(_) if is_symlink(path) => remove_symlink(path),
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
    }
}

/// Write `content` to `path` through a sibling temporary file so the
/// destination is never left half-written. Permission bits are copied from
/// `mode_from` when given.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be written or renamed.
pub fn write_atomic(path: &Path, content: &[u8], mode_from: Option<&Path>) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    if let Some(src) = mode_from {
        fs::set_permissions(tmp.path(), fs::metadata(src)?.permissions())?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Recursively copy a directory tree, following symlinks inside it.
///
/// # Errors
///
/// Returns an error if a directory cannot be created, an entry cannot be
/// read, or a file cannot be copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Copy `src` (file or directory) to `dst`, replacing whatever is there.
///
/// # Errors
///
/// Returns an error if the old destination cannot be removed or the copy
/// fails.
pub fn replace_with_copy(src: &Path, dst: &Path) -> io::Result<()> {
    remove_existing(dst)?;
    ensure_parent_dir(dst)?;
    if src.is_dir() {
        copy_dir_recursive(src, dst)
    } else {
        fs::copy(src, dst).map(|_| ())
    }
}

/// Sorted child entries of `dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn sorted_children(dir: &Path) -> io::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(fs::DirEntry::file_name);
    Ok(entries)
}
