//! Path helpers shared by the config store and the engine.
//!
//! Destinations are stored either absolute or home-relative (`~/…`); every
//! comparison between them goes through [`expand_user`] first.
use std::path::{Component, Path, PathBuf};

/// Expand a leading `~` or `~/` against `home`.
#[must_use]
pub fn expand_user(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    path.strip_prefix("~/")
        .map_or_else(|| PathBuf::from(path), |rest| home.join(rest))
}

/// Make `path` absolute against the current directory and fold `.`/`..`
/// components without resolving symlinks.
#[must_use]
pub fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    normalize(&joined)
}

/// Lexically fold `.` and `..` components.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Canonical stored form of a deployed path: `~/…` under `home`, otherwise
/// the absolute path.
#[must_use]
pub fn canonical_destination(path: &Path, home: &Path) -> String {
    let abs = absolutize(path);
    let home = normalize(home);
    match abs.strip_prefix(&home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => abs.display().to_string(),
    }
}

/// Drop the root (and any prefix) so `path` can be re-rooted elsewhere.
#[must_use]
pub fn strip_root(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect()
}

/// Whether `a` and `b` both exist and resolve to the same file.
#[must_use]
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (dunce::canonicalize(a), dunce::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Whether anything (including a dangling symlink) exists at `path`.
#[must_use]
pub fn lexists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Whether `path` is a symlink (dangling or not).
#[must_use]
pub fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .is_ok_and(|m| m.file_type().is_symlink())
}

/// Append `suffix` to the final component of `path`.
#[must_use]
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}
