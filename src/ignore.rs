//! Ignore-glob handling shared by install, compare and update.
//!
//! Patterns are anchored to the dotfile's deployed destination unless they
//! are absolute or start with `*`. A leading `!` re-includes whatever it
//! matches. `*` also matches `/`.
use glob::Pattern;
use std::path::{Path, PathBuf};

use crate::paths::expand_user;

/// A compiled set of ignore patterns for one dotfile.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    base: PathBuf,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl IgnoreSet {
    /// Compile `patterns` (config and CLI patterns merged) relative to the
    /// absolute destination `base`. Invalid globs are dropped with a debug
    /// trace.
    #[must_use]
    pub fn new<S: AsRef<str>>(patterns: &[S], base: &Path, home: &Path) -> Self {
        let mut set = Self {
            base: base.to_path_buf(),
            ..Self::default()
        };
        for raw in patterns {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            let (negated, pattern) = raw
                .strip_prefix('!')
                .map_or((false, raw), |rest| (true, rest));
            let anchored = anchor(pattern, base, home);
            match Pattern::new(&anchored) {
                Ok(p) if negated => set.exclude.push(p),
                Ok(p) => set.include.push(p),
                Err(e) => tracing::debug!("ignoring invalid pattern {raw:?}: {e}"),
            }
        }
        set
    }

    /// Whether no pattern is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }

    /// Whether `path` (an absolute path on the destination side) is ignored.
    #[must_use]
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.include.iter().any(|p| p.matches_path(path))
            && !self.exclude.iter().any(|p| p.matches_path(path))
    }

    /// Whether `path`, found below `root`, is ignored once re-rooted on the
    /// destination. The path itself is also tested, so `*`-patterns work on
    /// both sides.
    #[must_use]
    pub fn is_ignored_under(&self, root: &Path, path: &Path) -> bool {
        if self.is_empty() {
            return false;
        }
        let rebased = path
            .strip_prefix(root)
            .map(|rel| {
                if rel.as_os_str().is_empty() {
                    self.base.clone()
                } else {
                    self.base.join(rel)
                }
            })
            .unwrap_or_else(|_| path.to_path_buf());
        self.is_ignored(&rebased) || self.is_ignored(path)
    }
}

fn anchor(pattern: &str, base: &Path, home: &Path) -> String {
    if pattern.starts_with('*') {
        return pattern.to_string();
    }
    let expanded = expand_user(pattern, home);
    if expanded.is_absolute() {
        return expanded.display().to_string();
    }
    base.join(expanded).display().to_string()
}
