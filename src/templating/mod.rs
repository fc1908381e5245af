//! Template rendering.
//!
//! The engine only talks to the [`Renderer`] trait; [`JinjaRenderer`] is
//! the shipped implementation.
mod jinja;
mod variables;

use std::path::Path;

use crate::error::RenderError;

pub use jinja::JinjaRenderer;
pub use variables::{RenderContext, Variables};

/// Bytes inspected when sniffing a file for template markup or binary content.
pub const SNIFF_LEN: usize = 8192;

/// Template engine seen by the installer, actions and transformations.
pub trait Renderer: Send + Sync + std::fmt::Debug {
    /// Whether `path` (a file) contains template markup.
    fn is_template(&self, path: &Path) -> bool;

    /// Render the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] for undefined variables, syntax errors, or
    /// an unreadable source.
    fn render(&self, path: &Path, ctx: &RenderContext) -> Result<Vec<u8>, RenderError>;

    /// Render an inline template such as an action command.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] for undefined variables or syntax errors.
    fn render_str(&self, text: &str, ctx: &RenderContext) -> Result<String, RenderError>;
}

/// Whether `path` is a template, or for a directory whether any file below
/// it is.
#[must_use]
pub fn is_template_tree(renderer: &dyn Renderer, path: &Path) -> bool {
    if !path.is_dir() {
        return renderer.is_template(path);
    }
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .any(|e| renderer.is_template(e.path()))
}

/// Whether `text` contains Jinja markup.
#[must_use]
pub fn has_markup(text: &str) -> bool {
    ["{{", "{%", "{#"].iter().any(|m| text.contains(m))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn has_markup_detects_all_delimiters() {
        assert!(has_markup("x = {{ y }}"));
        assert!(has_markup("{% if a %}b{% endif %}"));
        assert!(has_markup("{# note #}"));
        assert!(!has_markup("plain { braces }"));
    }

    #[test]
    fn template_tree_finds_nested_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("plain"), "x").unwrap();
        let renderer = JinjaRenderer::new();
        assert!(!is_template_tree(&renderer, dir.path()));
        std::fs::write(dir.path().join("sub/tpl"), "{{ x }}").unwrap();
        assert!(is_template_tree(&renderer, dir.path()));
    }
}
