//! Symlink helpers.
use std::io;
use std::path::{Path, PathBuf};

/// Create a symlink at `link` pointing to `target`.
///
/// # Errors
///
/// Returns an error if the link cannot be created.
pub fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    {
        if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    }
}

/// Remove a symlink without touching what it points to.
///
/// # Errors
///
/// Returns an error if the link cannot be removed.
pub fn remove_symlink(path: &Path) -> io::Result<()> {
    #[cfg(windows)]
    if path.is_dir() {
        return std::fs::remove_dir(path);
    }
    std::fs::remove_file(path)
}

/// Target of the symlink at `link`, made absolute against the link's
/// directory.
#[must_use]
pub fn link_target(link: &Path) -> Option<PathBuf> {
    let target = std::fs::read_link(link).ok()?;
    if target.is_absolute() {
        return Some(target);
    }
    Some(crate::paths::normalize(
        &link.parent().unwrap_or_else(|| Path::new("/")).join(target),
    ))
}

/// Whether `link` is a symlink pointing at `target`.
#[must_use]
pub fn points_to(link: &Path, target: &Path) -> bool {
    link_target(link).is_some_and(|t| t == target)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn create_and_check_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::write(&target, "x").unwrap();
        let link = dir.path().join("link");
        create_symlink(&target, &link).unwrap();
        assert!(points_to(&link, &target));
        assert!(!points_to(&link, &dir.path().join("other")));
        remove_symlink(&link).unwrap();
        assert!(target.exists());
        assert!(link.symlink_metadata().is_err());
    }

    #[test]
    fn relative_targets_are_resolved_against_link_dir() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink("sub/../target", &link).unwrap();
        assert_eq!(link_target(&link).unwrap(), dir.path().join("target"));
    }

    #[test]
    fn regular_file_points_nowhere() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "x").unwrap();
        assert!(link_target(&file).is_none());
    }
}
