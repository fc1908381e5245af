//! Process-wide Ctrl-C flag.
//!
//! The handler only records the request; drivers poll [`check`] between
//! dotfiles and once more after the last one, so an item is never left
//! half-written and an interrupted run never reports success.
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::DotdropError;

#[cfg(not(test))]
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

// Unit tests run concurrently in one process; each test thread gets its own flag.
#[cfg(test)]
thread_local! {
    static INTERRUPTED: AtomicBool = const { AtomicBool::new(false) };
}

#[cfg(not(test))]
fn with_flag<R>(f: impl FnOnce(&AtomicBool) -> R) -> R {
    f(&INTERRUPTED)
}

#[cfg(test)]
fn with_flag<R>(f: impl FnOnce(&AtomicBool) -> R) -> R {
    INTERRUPTED.with(f)
}

/// Install the Ctrl-C handler.
///
/// # Errors
///
/// Returns an error if a handler is already installed.
pub fn install_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(request)
}

/// Record a stop request.
pub fn request() {
    with_flag(|flag| flag.store(true, Ordering::SeqCst));
}

/// Whether the user asked to stop.
#[must_use]
pub fn interrupted() -> bool {
    with_flag(|flag| flag.load(Ordering::SeqCst))
}

/// Fail with [`DotdropError::Interrupted`] once the user asked to stop.
///
/// # Errors
///
/// Returns [`DotdropError::Interrupted`] after Ctrl-C.
pub fn check() -> Result<(), DotdropError> {
    if interrupted() {
        return Err(DotdropError::Interrupted);
    }
    Ok(())
}

/// Clears the calling test thread's flag when dropped.
#[cfg(test)]
pub(crate) struct ResetOnDrop;

#[cfg(test)]
impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        with_flag(|flag| flag.store(false, Ordering::SeqCst));
    }
}
