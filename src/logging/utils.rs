//! Helpers shared by the console and file outputs.
use std::path::PathBuf;

/// Remove CSI escape sequences (colors, cursor movement) and bare two-byte
/// escapes.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next_if_eq(&'[').is_some() {
            // parameters and intermediates, then one final byte
            for inner in chars.by_ref() {
                if ('@'..='~').contains(&inner) {
                    break;
                }
            }
        } else {
            chars.next();
        }
    }
    out
}

/// `$XDG_CACHE_HOME/dotdrop/<command>.log`, falling back to
/// `~/.cache/dotdrop/`. The directory is created on demand.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    let cache = std::env::var_os("XDG_CACHE_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME")
                .or_else(|| std::env::var_os("USERPROFILE"))
                .map(|home| PathBuf::from(home).join(".cache"))
        })?;
    let dir = cache.join("dotdrop");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir.join(format!("{command}.log")))
}

/// Local time for log lines; `with_date` adds the day for run headers.
pub(super) fn timestamp(with_date: bool) -> String {
    let format = if with_date {
        "%Y-%m-%d %H:%M:%S"
    } else {
        "%H:%M:%S"
    };
    chrono::Local::now().format(format).to_string()
}
