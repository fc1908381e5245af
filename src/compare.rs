//! Difference between a rendered source and its deployed counterpart.
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::exec::{Executor, fill_placeholders, shell_quote};
use crate::ignore::IgnoreSet;
use crate::paths::lexists;
use crate::templating::SNIFF_LEN;

/// Computes textual or binary differences.
///
/// An empty string means both sides are identical once ignored paths are
/// left out.
pub struct Comparator<'a> {
    executor: &'a dyn Executor,
    diff_command: String,
}

impl std::fmt::Debug for Comparator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comparator")
            .field("diff_command", &self.diff_command)
            .finish_non_exhaustive()
    }
}

impl<'a> Comparator<'a> {
    /// `diff_command` receives the two paths as `{0}` and `{1}`.
    #[must_use]
    pub fn new(executor: &'a dyn Executor, diff_command: &str) -> Self {
        Self {
            executor,
            diff_command: diff_command.to_string(),
        }
    }

    /// Compare `left` (rendered source) with `right` (deployed path).
    ///
    /// Ignore patterns are tested against the deployed side of each pair.
    #[must_use]
    pub fn compare(&self, left: &Path, right: &Path, ignore: &IgnoreSet) -> String {
        let mut out = String::new();
        self.compare_entry(left, right, ignore, &mut out);
        out
    }

    fn compare_entry(
        &self,
        left: &Path,
        right: &Path,
        ignore: &IgnoreSet,
        out: &mut String,
    ) {
        if ignore.is_ignored(right) {
            tracing::debug!("ignoring {} in comparison", right.display());
            return;
        }
        match (lexists(left), lexists(right)) {
            (true, false) => {
                out.push_str(&format!(
                    "=> \"{}\" does not exist on destination\n",
                    right.display()
                ));
                return;
            }
            (false, true) => {
                out.push_str(&format!(
                    "=> \"{}\" does not exist in dotpath\n",
                    right.display()
                ));
                return;
            }
            (false, false) => return,
            (true, true) => {}
        }
        match (left.is_dir(), right.is_dir()) {
            (true, true) => self.compare_dirs(left, right, ignore, out),
            (false, false) => out.push_str(&self.compare_files(left, right)),
            (true, false) => out.push_str(&format!(
                "=> \"{}\" is a file but \"{}\" is a directory\n",
                right.display(),
                left.display()
            )),
            (false, true) => out.push_str(&format!(
                "=> \"{}\" is a directory but \"{}\" is a file\n",
                right.display(),
                left.display()
            )),
        }
    }

    fn compare_dirs(
        &self,
        left: &Path,
        right: &Path,
        ignore: &IgnoreSet,
        out: &mut String,
    ) {
        let names: BTreeSet<_> = child_names(left)
            .into_iter()
            .chain(child_names(right))
            .collect();
        for name in names {
            self.compare_entry(&left.join(&name), &right.join(&name), ignore, out);
        }
    }

    fn compare_files(&self, left: &Path, right: &Path) -> String {
        let (Ok(a), Ok(b)) = (fs::read(left), fs::read(right)) else {
            return format!("files {} and {} differ\n", left.display(), right.display());
        };
        if a == b {
            return String::new();
        }
        if is_binary(&a) || is_binary(&b) {
            return format!(
                "Binary files {} and {} differ\n",
                left.display(),
                right.display()
            );
        }
        self.text_diff(left, right)
    }

    fn text_diff(&self, left: &Path, right: &Path) -> String {
        let fallback = format!("files {} and {} differ\n", left.display(), right.display());
        let program = self.diff_command.split_whitespace().next().unwrap_or_default();
        if program.is_empty() || !self.executor.which(program) {
            tracing::debug!("diff command {program:?} unavailable");
            return fallback;
        }
        let command = fill_placeholders(
            &self.diff_command,
            &[shell_quote(left), shell_quote(right)],
        );
        match self.executor.run_shell(&command) {
            Ok(result) if !result.stdout.is_empty() => result.stdout,
            Ok(_) => fallback,
            Err(e) => {
                tracing::debug!("diff failed: {e:#}");
                fallback
            }
        }
    }
}

/// NUL byte in the first block or invalid UTF-8.
#[must_use]
pub fn is_binary(content: &[u8]) -> bool {
    let head = content.get(..SNIFF_LEN).unwrap_or(content);
    head.contains(&0) || std::str::from_utf8(content).is_err()
}

fn child_names(dir: &Path) -> Vec<std::ffi::OsString> {
    fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).map(|e| e.file_name()).collect())
        .unwrap_or_default()
}
