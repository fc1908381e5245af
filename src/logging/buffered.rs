//! Per-worker log that holds output until its dotfile is done.
use std::sync::{Arc, Mutex, PoisonError};

use super::logger::Logger;
use super::types::{ItemStatus, Log};

#[derive(Debug, Clone, Copy)]
enum Level {
    Stage,
    Info,
    Debug,
    Warn,
    Error,
    DryRun,
    Raw,
}

/// [`Log`] for one parallel install worker.
///
/// Lines are kept in memory and written in one block by
/// [`flush_and_complete`](Self::flush_and_complete), so the output of
/// dotfiles installed at the same time never interleaves. Results go
/// straight to the shared [`Logger`].
#[derive(Debug)]
pub struct BufferedLog {
    inner: Arc<Logger>,
    lines: Mutex<Vec<(Level, String)>>,
}

impl BufferedLog {
    /// Buffer in front of `inner`.
    #[must_use]
    pub const fn new(inner: Arc<Logger>) -> Self {
        Self {
            inner,
            lines: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, level: Level, msg: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, msg.to_string()));
    }

    /// Write the buffered lines of `key` to the shared logger, then its
    /// duration at debug level.
    pub fn flush_and_complete(&self, key: &str) {
        let lines =
            std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner));
        let _guard = self
            .inner
            .flush_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let log = self.inner.as_ref();
        for (level, msg) in &lines {
            match level {
                Level::Stage => log.stage(msg),
                Level::Info => log.info(msg),
                Level::Debug => log.debug(msg),
                Level::Warn => log.warn(msg),
                Level::Error => log.error(msg),
                Level::DryRun => log.dry_run(msg),
                Level::Raw => log.raw(msg),
            }
        }
        if let Some(elapsed) = log.item_done(key) {
            log.debug(&format!("{key}: done in {} ms", elapsed.as_millis()));
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Log for BufferedLog {
    fn stage(&self, msg: &str) {
        self.push(Level::Stage, msg);
    }
    fn info(&self, msg: &str) {
        self.push(Level::Info, msg);
    }
    fn debug(&self, msg: &str) {
        self.push(Level::Debug, msg);
    }
    fn warn(&self, msg: &str) {
        self.push(Level::Warn, msg);
    }
    fn error(&self, msg: &str) {
        self.push(Level::Error, msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push(Level::DryRun, msg);
    }
    fn raw(&self, msg: &str) {
        self.push(Level::Raw, msg);
    }
    fn record(&self, name: &str, status: ItemStatus, message: Option<&str>) {
        self.inner.record(name, status, message);
    }
}
