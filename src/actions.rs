//! Pre/post hook execution.
//!
//! Default actions run before the dotfile's own actions of the same kind.
//! The first failing hook stops the sequence.
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Action;
use crate::error::ActionError;
use crate::exec::Executor;
use crate::logging::Log;
use crate::templating::{RenderContext, Renderer};

/// Renders and runs hook commands.
#[derive(Clone, Copy)]
pub struct ActionRunner<'a> {
    renderer: &'a dyn Renderer,
    executor: &'a dyn Executor,
    log: &'a dyn Log,
    dry_run: bool,
}

impl std::fmt::Debug for ActionRunner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRunner")
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl<'a> ActionRunner<'a> {
    /// Build a runner; in dry-run commands are only reported.
    #[must_use]
    pub const fn new(
        renderer: &'a dyn Renderer,
        executor: &'a dyn Executor,
        log: &'a dyn Log,
        dry_run: bool,
    ) -> Self {
        Self {
            renderer,
            executor,
            log,
            dry_run,
        }
    }

    /// Run `defaults` then `actions`.
    ///
    /// # Errors
    ///
    /// Returns the first hook that failed or could not be rendered.
    pub fn run(
        &self,
        defaults: &[Action],
        actions: &[Action],
        ctx: &RenderContext,
    ) -> Result<(), ActionError> {
        for action in defaults {
            self.run_one(action, &format!("def-{}", action.kind), ctx)?;
        }
        for action in actions {
            self.run_one(action, &action.kind.to_string(), ctx)?;
        }
        Ok(())
    }

    fn run_one(&self, action: &Action, label: &str, ctx: &RenderContext) -> Result<(), ActionError> {
        let command = self
            .renderer
            .render_str(&action.command_line(), ctx)
            .map_err(|source| ActionError::Render {
                key: action.key.clone(),
                kind: label.to_string(),
                source,
            })?;
        if self.dry_run {
            self.log
                .dry_run(&format!("would execute {label}-action {}: {command}", action.key));
            return Ok(());
        }
        self.log
            .debug(&format!("executing {label}-action {}: {command}", action.key));
        let failed = |reason: String| ActionError::Failed {
            key: action.key.clone(),
            kind: label.to_string(),
            reason,
        };
        let result = self
            .executor
            .run_shell(&command)
            .map_err(|e| failed(e.to_string()))?;
        for line in result.stdout.lines().filter(|l| !l.trim().is_empty()) {
            self.log.info(line);
        }
        if !result.success {
            let stderr = result.stderr.trim();
            let reason = if stderr.is_empty() {
                format!("exit {}", result.code.unwrap_or(-1))
            } else {
                stderr.to_string()
            };
            return Err(failed(reason));
        }
        Ok(())
    }
}

/// A dotfile's pre-actions, run lazily right before the first filesystem
/// mutation and never more than once.
pub struct PreActions<'a> {
    runner: ActionRunner<'a>,
    defaults: &'a [Action],
    actions: &'a [Action],
    ctx: &'a RenderContext,
    fired: AtomicBool,
}

impl std::fmt::Debug for PreActions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreActions")
            .field("defaults", &self.defaults.len())
            .field("actions", &self.actions.len())
            .field("fired", &self.fired())
            .finish_non_exhaustive()
    }
}

impl<'a> PreActions<'a> {
    /// Defer `defaults` then `actions` until [`Self::fire`].
    #[must_use]
    pub const fn new(
        runner: ActionRunner<'a>,
        defaults: &'a [Action],
        actions: &'a [Action],
        ctx: &'a RenderContext,
    ) -> Self {
        Self {
            runner,
            defaults,
            actions,
            ctx,
            fired: AtomicBool::new(false),
        }
    }

    /// Run the hooks unless they already ran.
    ///
    /// # Errors
    ///
    /// Returns the failing hook; it is not retried on a later call.
    pub fn fire(&self) -> Result<(), ActionError> {
        if self.fired.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.runner.run(self.defaults, self.actions, self.ctx)
    }

    /// Whether [`Self::fire`] was called.
    #[must_use]
    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::ActionKind;
    use crate::exec::RecordingExecutor;
    use crate::logging::CapturedLog;
    use crate::templating::{JinjaRenderer, Variables};
    use std::collections::BTreeMap;

    fn action(key: &str, command: &str, kind: ActionKind) -> Action {
        Action {
            key: key.to_string(),
            command: command.to_string(),
            kind,
            args: Vec::new(),
        }
    }

    fn ctx() -> RenderContext {
        RenderContext::new(&Variables::new(BTreeMap::from([(
            "editor".to_string(),
            "vim".to_string(),
        )])))
    }

    #[test]
    fn defaults_run_before_own_actions_and_are_rendered() {
        let renderer = JinjaRenderer::new();
        let exec = RecordingExecutor::default();
        let log = CapturedLog::default();
        let runner = ActionRunner::new(&renderer, &exec, &log, false);
        runner
            .run(
                &[action("log", "echo default", ActionKind::Post)],
                &[action("set", "echo {{ editor }}", ActionKind::Post)],
                &ctx(),
            )
            .unwrap();
        assert_eq!(exec.calls(), vec!["echo default", "echo vim"]);
    }

    #[test]
    fn first_failure_short_circuits() {
        let renderer = JinjaRenderer::new();
        let exec = RecordingExecutor::failing_on("bad");
        let log = CapturedLog::default();
        let runner = ActionRunner::new(&renderer, &exec, &log, false);
        let err = runner
            .run(
                &[],
                &[
                    action("a", "bad", ActionKind::Pre),
                    action("b", "never", ActionKind::Pre),
                ],
                &ctx(),
            )
            .unwrap_err();
        assert_eq!(exec.calls(), vec!["bad"]);
        assert_eq!(err.to_string(), "pre-action \"a\" failed: boom");
    }

    #[test]
    fn default_failure_is_labelled() {
        let renderer = JinjaRenderer::new();
        let exec = RecordingExecutor::failing_on("x");
        let log = CapturedLog::default();
        let runner = ActionRunner::new(&renderer, &exec, &log, false);
        let err = runner
            .run(&[action("d", "x", ActionKind::Post)], &[], &ctx())
            .unwrap_err();
        assert!(err.to_string().starts_with("def-post-action"));
    }

    #[test]
    fn dry_run_executes_nothing() {
        let renderer = JinjaRenderer::new();
        let exec = RecordingExecutor::default();
        let log = CapturedLog::default();
        let runner = ActionRunner::new(&renderer, &exec, &log, true);
        runner
            .run(&[], &[action("a", "rm -rf {{ editor }}", ActionKind::Pre)], &ctx())
            .unwrap();
        assert!(exec.calls().is_empty());
        assert!(log.contains("would execute pre-action a: rm -rf vim"));
    }

    #[test]
    fn undefined_variable_in_command_is_render_error() {
        let renderer = JinjaRenderer::new();
        let exec = RecordingExecutor::default();
        let log = CapturedLog::default();
        let runner = ActionRunner::new(&renderer, &exec, &log, false);
        let err = runner
            .run(&[], &[action("a", "echo {{ nope }}", ActionKind::Pre)], &ctx())
            .unwrap_err();
        assert!(matches!(err, ActionError::Render { .. }));
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn arguments_fill_placeholders() {
        let renderer = JinjaRenderer::new();
        let exec = RecordingExecutor::default();
        let log = CapturedLog::default();
        let runner = ActionRunner::new(&renderer, &exec, &log, false);
        let mut a = action("notify", "notify-send {0}", ActionKind::Post);
        a.args = vec!["vimrc".to_string()];
        runner.run(&[], &[a], &ctx()).unwrap();
        assert_eq!(exec.calls(), vec!["notify-send vimrc"]);
    }

    #[test]
    fn pre_actions_fire_once() {
        let renderer = JinjaRenderer::new();
        let exec = RecordingExecutor::default();
        let log = CapturedLog::default();
        let runner = ActionRunner::new(&renderer, &exec, &log, false);
        let defaults = [action("d", "def", ActionKind::Pre)];
        let own = [action("p", "own", ActionKind::Pre)];
        let ctx = ctx();
        let pre = PreActions::new(runner, &defaults, &own, &ctx);
        assert!(!pre.fired());
        pre.fire().unwrap();
        pre.fire().unwrap();
        assert!(pre.fired());
        assert_eq!(exec.calls(), vec!["def", "own"]);
    }
}
