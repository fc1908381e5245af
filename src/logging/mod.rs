//! Console and log file output, per-dotfile result collection and the
//! buffered variant used by parallel install workers.

mod buffered;
mod logger;
mod subscriber;
mod types;
mod utils;

pub use buffered::BufferedLog;
pub use logger::Logger;
pub use subscriber::init_subscriber;
pub use types::{ItemEntry, ItemStatus, Log};

/// Serializes `XDG_CACHE_HOME` changes across test threads.
#[cfg(test)]
pub(crate) static TEST_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// A [`Logger`] whose events reach a log file in a fresh temporary cache
/// directory through a thread-local subscriber.
///
/// Keep the guard alive for the whole test.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};

    let tmp = tempfile::tempdir().expect("temp cache dir");
    let (log, layer) = {
        let _env = TEST_ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // SAFETY: Protected by TEST_ENV_MUTEX; restored before lock is released.
        #[allow(unsafe_code)]
        unsafe {
            std::env::set_var("XDG_CACHE_HOME", tmp.path());
        }
        let layer = subscriber::FileLayer::new("test").expect("file layer");
        let log = Logger::new("test");
        // SAFETY: see above.
        #[allow(unsafe_code)]
        unsafe {
            std::env::remove_var("XDG_CACHE_HOME");
        }
        (log, layer)
    };
    let subscriber = tracing_subscriber::registry().with(layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (log, tmp, guard)
}

/// [`Log`] keeping every line in memory as `"<level>: <msg>"`.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CapturedLog {
    lines: std::sync::Mutex<Vec<String>>,
    records: std::sync::Mutex<Vec<(String, ItemStatus)>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl CapturedLog {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<(String, ItemStatus)> {
        self.records.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    fn push(&self, level: &str, msg: &str) {
        self.lines.lock().unwrap().push(format!("{level}: {msg}"));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl Log for CapturedLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry_run", msg);
    }
    fn raw(&self, msg: &str) {
        self.push("raw", msg);
    }
    fn record(&self, name: &str, status: ItemStatus, _message: Option<&str>) {
        self.records.lock().unwrap().push((name.to_string(), status));
    }
}
