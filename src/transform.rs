//! Read/write transformations.
//!
//! A transformation command reads `{0}` and must write `{1}`. The output
//! lives in a private temporary directory that is removed when the returned
//! [`TransformedPath`] is dropped, whatever the outcome of the caller.
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::Transformation;
use crate::error::TransformError;
use crate::exec::Executor;
use crate::logging::Log;
use crate::templating::{RenderContext, Renderer};

/// Output of a transformation, deleted on drop.
#[derive(Debug)]
pub struct TransformedPath {
    _dir: TempDir,
    path: PathBuf,
}

impl TransformedPath {
    /// Path of the transformed copy.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Runs transformation commands.
#[derive(Clone, Copy)]
pub struct Transformer<'a> {
    renderer: &'a dyn Renderer,
    executor: &'a dyn Executor,
    log: &'a dyn Log,
}

impl std::fmt::Debug for Transformer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer").finish_non_exhaustive()
    }
}

impl<'a> Transformer<'a> {
    /// Build a transformer rendering commands with `renderer`.
    #[must_use]
    pub const fn new(renderer: &'a dyn Renderer, executor: &'a dyn Executor, log: &'a dyn Log) -> Self {
        Self {
            renderer,
            executor,
            log,
        }
    }

    /// Apply `trans` to `input`.
    ///
    /// The output keeps the input's file name so that template detection
    /// and diff labels stay meaningful.
    ///
    /// # Errors
    ///
    /// Returns a [`TransformError`] if the command cannot be rendered, exits
    /// non-zero, or does not produce its output.
    pub fn apply(
        &self,
        trans: &Transformation,
        input: &Path,
        ctx: &RenderContext,
    ) -> Result<TransformedPath, TransformError> {
        let dir = tempfile::Builder::new().prefix("dotdrop-trans-").tempdir()?;
        let name = input
            .file_name()
            .map_or_else(|| "out".into(), std::ffi::OsStr::to_os_string);
        let output = dir.path().join(name);

        let rendered = self
            .renderer
            .render_str(&trans.command, ctx)
            .map_err(|source| TransformError::Render {
                key: trans.key.clone(),
                source,
            })?;
        let command = Transformation {
            key: trans.key.clone(),
            command: rendered,
        }
        .command_line(input, &output);
        self.log
            .debug(&format!("executing transformation {}: {command}", trans.key));

        let result = self
            .executor
            .run_shell(&command)
            .map_err(|e| TransformError::Failed {
                key: trans.key.clone(),
                reason: e.to_string(),
            })?;
        if !result.success {
            return Err(TransformError::Failed {
                key: trans.key.clone(),
                reason: format!(
                    "exit {}: {}",
                    result.code.unwrap_or(-1),
                    result.stderr.trim()
                ),
            });
        }
        if output.symlink_metadata().is_err() {
            return Err(TransformError::NoOutput {
                key: trans.key.clone(),
                path: output,
            });
        }
        Ok(TransformedPath {
            _dir: dir,
            path: output,
        })
    }
}
