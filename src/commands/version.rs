//! Command: print version information.

/// Version string: `DOTDROP_VERSION` from the build, else the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("DOTDROP_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the dotdrop version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("dotdrop {}", version());
}
