//! Dotfile key generation for imported paths.
use std::path::{Component, Path};

/// Generate a key for a dotfile deployed at `dst` (canonical form).
///
/// Keys are `f_` (file) or `d_` (directory) followed by the last path
/// component without its leading dots, lower-cased. Parent components are
/// prepended until the key is not `taken`.
#[must_use]
pub fn generate(dst: &str, is_dir: bool, taken: impl Fn(&str) -> bool) -> String {
    let prefix = if is_dir { "d_" } else { "f_" };
    let parts: Vec<String> = Path::new(dst)
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) if s != "~" => Some(clean(&s.to_string_lossy())),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect();

    for n in 1..=parts.len() {
        let tail = parts.get(parts.len() - n..).unwrap_or_default();
        let candidate = format!("{prefix}{}", tail.join("_"));
        if !taken(&candidate) {
            return candidate;
        }
    }

    let base = format!("{prefix}{}", parts.join("_"));
    let mut i = 1usize;
    loop {
        let candidate = format!("{base}_{i}");
        if !taken(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

fn clean(component: &str) -> String {
    component
        .trim_start_matches('.')
        .to_lowercase()
        .replace(char::is_whitespace, "_")
}
