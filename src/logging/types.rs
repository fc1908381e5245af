//! Log trait and the per-dotfile result entries collected for the summary.

/// Outcome of one dotfile, as shown in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Installed, updated, imported or removed.
    Ok,
    /// Nothing to do (identical, declined, ignored).
    Skipped,
    /// Dry-run mode; the change was only reported.
    DryRun,
    /// The dotfile could not be processed.
    Failed,
}

impl ItemStatus {
    /// Summary marker and its ANSI color.
    pub(super) const fn marker(self) -> (&'static str, &'static str) {
        match self {
            Self::Ok => ("✓", "\x1b[32m"),
            Self::Skipped => ("○", "\x1b[33m"),
            Self::DryRun => ("~", "\x1b[37m"),
            Self::Failed => ("✗", "\x1b[31m"),
        }
    }
}

/// One recorded result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEntry {
    /// Dotfile key, or the path given on the command line.
    pub name: String,
    /// Final status.
    pub status: ItemStatus,
    /// Skip reason or error description.
    pub message: Option<String>,
}

/// Logging surface used by the engine.
///
/// [`Logger`](super::Logger) writes immediately;
/// [`BufferedLog`](super::BufferedLog) holds a parallel worker's output
/// until its dotfile is done.
pub trait Log: Send + Sync {
    /// Section header.
    fn stage(&self, msg: &str);
    /// Informational line.
    fn info(&self, msg: &str);
    /// Hidden on the console unless verbose; always in the log file.
    fn debug(&self, msg: &str);
    /// Warning, to stderr.
    fn warn(&self, msg: &str);
    /// Error, to stderr.
    fn error(&self, msg: &str);
    /// What a dry run would have done.
    fn dry_run(&self, msg: &str);
    /// Verbatim block such as a diff or a config dump.
    fn raw(&self, msg: &str);
    /// Record a result for the summary.
    fn record(&self, name: &str, status: ItemStatus, message: Option<&str>);
}
