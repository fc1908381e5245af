//! Console and file logger collecting per-dotfile results for the summary.
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::subscriber::{DRY_RUN, RAW, STAGE};
use super::types::{ItemEntry, ItemStatus, Log};
use super::utils::log_file_path;

/// The command-wide logger.
///
/// Messages go through [`tracing`] (console plus the log file set up by
/// [`init_subscriber`](super::init_subscriber)). Results passed to
/// [`record`](Self::record) are kept for [`print_summary`](Self::print_summary).
#[derive(Debug)]
pub struct Logger {
    items: Mutex<Vec<ItemEntry>>,
    log_file: Option<PathBuf>,
    /// Held while a parallel worker replays its buffered output.
    pub(super) flush_lock: Mutex<()>,
    /// Start time of each dotfile currently handled by a worker.
    started: Mutex<HashMap<String, Instant>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Logger {
    /// Create the logger of `command`; the log file path is only remembered
    /// for the summary.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
            flush_lock: Mutex::new(()),
            started: Mutex::new(HashMap::new()),
        }
    }

    /// Path of the log file, if it could be created.
    #[cfg(test)]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Every result recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<ItemEntry> {
        lock(&self.items).clone()
    }

    /// Log an error.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a section header.
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE, "{msg}");
    }

    /// Log an informational line.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a line hidden on the console unless verbose.
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log what a dry run would do.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN, "{msg}");
    }

    /// Emit a verbatim block (diffs, dumps).
    pub fn raw(&self, msg: &str) {
        tracing::info!(target: RAW, "{msg}");
    }

    /// Record a result for the summary.
    pub fn record(&self, name: &str, status: ItemStatus, message: Option<&str>) {
        lock(&self.items).push(ItemEntry {
            name: name.to_string(),
            status,
            message: message.map(String::from),
        });
    }

    /// Number of failed results.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        lock(&self.items)
            .iter()
            .filter(|e| e.status == ItemStatus::Failed)
            .count()
    }

    /// Print one line per result and the totals.
    ///
    /// Successful results only reach the log file unless verbose.
    pub fn print_summary(&self) {
        let items = self.entries();
        if items.is_empty() {
            return;
        }
        self.stage("Summary");
        for item in &items {
            let line = summary_line(item);
            if item.status == ItemStatus::Ok {
                self.debug(&line);
            } else {
                self.info(&line);
            }
        }
        self.info(&totals(&items));
        if let Some(path) = &self.log_file {
            self.debug(&format!("log: {}", path.display()));
        }
    }

    /// A parallel worker picked up `key`.
    pub fn notify_item_start(&self, key: &str) {
        lock(&self.started).insert(key.to_string(), Instant::now());
        self.debug(&format!("{key}: started"));
    }

    /// Time since [`notify_item_start`](Self::notify_item_start) for `key`,
    /// forgetting it.
    pub(super) fn item_done(&self, key: &str) -> Option<Duration> {
        lock(&self.started).remove(key).map(|start| start.elapsed())
    }

    #[cfg(test)]
    pub(super) fn in_flight(&self) -> usize {
        lock(&self.started).len()
    }
}

fn summary_line(item: &ItemEntry) -> String {
    let (symbol, color) = item.status.marker();
    let reason = item
        .message
        .as_deref()
        .map_or_else(String::new, |m| format!(" ({m})"));
    format!("{color}{symbol} {}{reason}\x1b[0m", item.name)
}

fn totals(items: &[ItemEntry]) -> String {
    let count = |status| items.iter().filter(|e| e.status == status).count();
    format!(
        "{} dotfiles: \x1b[32m{} ok\x1b[0m, \x1b[33m{} skipped\x1b[0m, \x1b[37m{} dry-run\x1b[0m, \x1b[31m{} failed\x1b[0m",
        items.len(),
        count(ItemStatus::Ok),
        count(ItemStatus::Skipped),
        count(ItemStatus::DryRun),
        count(ItemStatus::Failed),
    )
}

impl Log for Logger {
    fn stage(&self, msg: &str) {
        Self::stage(self, msg);
    }
    fn info(&self, msg: &str) {
        Self::info(self, msg);
    }
    fn debug(&self, msg: &str) {
        Self::debug(self, msg);
    }
    fn warn(&self, msg: &str) {
        Self::warn(self, msg);
    }
    fn error(&self, msg: &str) {
        Self::error(self, msg);
    }
    fn dry_run(&self, msg: &str) {
        Self::dry_run(self, msg);
    }
    fn raw(&self, msg: &str) {
        Self::raw(self, msg);
    }
    fn record(&self, name: &str, status: ItemStatus, message: Option<&str>) {
        Self::record(self, name, status, message);
    }
}
