//! [`Renderer`] backed by `minijinja`.
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use std::path::Path;

use super::{RenderContext, Renderer, SNIFF_LEN, has_markup};
use crate::error::RenderError;

/// Jinja renderer with strict undefined handling.
///
/// Besides the variables of the context, templates can call `env(name)`,
/// `exists(path)`, `basename(path)` and `dirname(path)`.
pub struct JinjaRenderer {
    env: Environment<'static>,
}

impl std::fmt::Debug for JinjaRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JinjaRenderer").finish_non_exhaustive()
    }
}

impl Default for JinjaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl JinjaRenderer {
    /// Renderer with strict undefined variables.
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.add_function("env", |name: String| std::env::var(name).unwrap_or_default());
        env.add_function("exists", |path: String| Path::new(&path).exists());
        env.add_function("basename", |path: String| {
            Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        env.add_function("dirname", |path: String| {
            Path::new(&path)
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        });
        Self { env }
    }

    fn render_source(
        &self,
        source: &str,
        origin: &str,
        ctx: &RenderContext,
    ) -> Result<String, RenderError> {
        self.env
            .render_str(source, ctx.merged())
            .map_err(|e| convert_error(&e, origin))
    }
}

fn convert_error(e: &minijinja::Error, origin: &str) -> RenderError {
    let origin = origin.to_string();
    let message = e.to_string();
    match e.kind() {
        ErrorKind::UndefinedError => RenderError::UndefinedVariable { origin, message },
        ErrorKind::SyntaxError => RenderError::Syntax { origin, message },
        _ => RenderError::Other { origin, message },
    }
}

impl Renderer for JinjaRenderer {
    fn is_template(&self, path: &Path) -> bool {
        let Ok(bytes) = std::fs::read(path) else {
            return false;
        };
        let head = bytes.get(..SNIFF_LEN).unwrap_or(&bytes);
        if head.contains(&0) {
            return false;
        }
        std::str::from_utf8(&bytes).is_ok_and(has_markup)
    }

    fn render(&self, path: &Path, ctx: &RenderContext) -> Result<Vec<u8>, RenderError> {
        let source = std::fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let origin = path.display().to_string();
        self.render_source(&source, &origin, ctx)
            .map(String::into_bytes)
    }

    fn render_str(&self, text: &str, ctx: &RenderContext) -> Result<String, RenderError> {
        self.render_source(text, "<string>", ctx)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::templating::Variables;
    use std::collections::BTreeMap;

    fn ctx() -> RenderContext {
        RenderContext::with_overlay(
            &Variables::new(BTreeMap::from([(
                "editor".to_string(),
                "vim".to_string(),
            )])),
            BTreeMap::from([("_dotfile_key".to_string(), "f_vimrc".to_string())]),
        )
    }

    #[test]
    fn render_str_substitutes_variables() {
        let out = JinjaRenderer::new()
            .render_str("set editor={{ editor }} # {{ _dotfile_key }}", &ctx())
            .unwrap();
        assert_eq!(out, "set editor=vim # f_vimrc");
    }

    #[test]
    fn render_keeps_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vimrc");
        std::fs::write(&path, "set editor={{ editor }}\n").unwrap();
        let out = JinjaRenderer::new().render(&path, &ctx()).unwrap();
        assert_eq!(out, b"set editor=vim\n");
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let err = JinjaRenderer::new()
            .render_str("{{ missing }}", &ctx())
            .unwrap_err();
        assert!(matches!(err, RenderError::UndefinedVariable { .. }));
    }

    #[test]
    fn syntax_error_is_reported() {
        let err = JinjaRenderer::new()
            .render_str("{% if %}", &ctx())
            .unwrap_err();
        assert!(matches!(err, RenderError::Syntax { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = JinjaRenderer::new()
            .render(Path::new("/nonexistent/tpl"), &ctx())
            .unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }

    #[test]
    fn helper_functions() {
        let out = JinjaRenderer::new()
            .render_str(
                "{{ basename('/a/b.txt') }} {{ dirname('/a/b.txt') }} {{ exists('/') }}",
                &ctx(),
            )
            .unwrap();
        assert_eq!(out, "b.txt /a true");
    }

    #[test]
    fn is_template_sniffs_markup() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = JinjaRenderer::new();
        let plain = dir.path().join("plain");
        std::fs::write(&plain, "no markup").unwrap();
        let tpl = dir.path().join("tpl");
        std::fs::write(&tpl, "{% if true %}x{% endif %}").unwrap();
        let binary = dir.path().join("bin");
        std::fs::write(&binary, b"{{\0\xff").unwrap();
        assert!(!renderer.is_template(&plain));
        assert!(renderer.is_template(&tpl));
        assert!(!renderer.is_template(&binary));
        assert!(!renderer.is_template(dir.path()));
    }
}
