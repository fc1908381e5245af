//! Process execution for actions, transformations, dynamic variables and
//! the external diff command.
use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::{Command, Output};

/// Captured output of a finished process.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code; `None` when killed by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Abstraction over process execution.
///
/// Hooks, transformations, dynamic variables and the external diff command
/// all go through this trait so tests can substitute a recording stub.
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run a program and fail if it exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be spawned or exits non-zero.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a program, allowing failure.
    ///
    /// # Errors
    ///
    /// Returns an error only if the program cannot be spawned.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command line through `sh -c`, allowing failure.
    ///
    /// # Errors
    ///
    /// Returns an error only if the shell cannot be spawned.
    fn run_shell(&self, command: &str) -> Result<ExecResult> {
        self.run_unchecked("sh", &["-c", command])
    }

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// [`Executor`] backed by real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    fn spawn(program: &str, args: &[&str]) -> Result<ExecResult> {
        Command::new(program)
            .args(args)
            .output()
            .map(ExecResult::from)
            .with_context(|| format!("cannot execute {program}"))
    }
}

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let result = Self::spawn(program, args)?;
        if !result.success {
            let status = result
                .code
                .map_or_else(|| "killed by a signal".to_string(), |c| format!("exit {c}"));
            bail!("{program} failed ({status}): {}", result.stderr.trim());
        }
        Ok(result)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        Self::spawn(program, args)
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Quote `path` for interpolation into a `sh -c` command line.
#[must_use]
pub fn shell_quote(path: &Path) -> String {
    let s = path.to_string_lossy();
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+=:,@%".contains(c))
    {
        return s.into_owned();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Replace positional `{0}`, `{1}`, … placeholders in `template`.
///
/// Braces that do not hold an index present in `args` are kept verbatim so
/// that shell constructs such as `${HOME}` or `{a,b}` survive.
#[must_use]
pub fn fill_placeholders(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let (before, after) = rest.split_at(open);
        out.push_str(before);
        let replaced = after.find('}').and_then(|close| {
            let inner = after.get(1..close)?;
            let idx: usize = inner.parse().ok()?;
            args.get(idx).map(|arg| (arg, close))
        });
        match replaced {
            Some((arg, close)) => {
                out.push_str(arg);
                rest = after.get(close + 1..).unwrap_or_default();
            }
            None => {
                out.push('{');
                rest = after.get(1..).unwrap_or_default();
            }
        }
    }
    out.push_str(rest);
    out
}

/// Executor stub that records every shell command and fails those
/// containing a marker.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingExecutor {
    pub calls: std::sync::Mutex<Vec<String>>,
    pub fail_on: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl RecordingExecutor {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_on: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl Executor for RecordingExecutor {
    fn run(&self, _: &str, _: &[&str]) -> Result<ExecResult> {
        panic!("unexpected executor call in test")
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let line = if program == "sh" {
            args.last().copied().unwrap_or_default().to_string()
        } else {
            format!("{program} {}", args.join(" "))
        };
        let failed = self.fail_on.as_deref().is_some_and(|m| line.contains(m));
        self.calls.lock().unwrap().push(line);
        Ok(ExecResult {
            success: !failed,
            code: Some(i32::from(failed)),
            stderr: if failed { "boom".to_string() } else { String::new() },
            ..ExecResult::default()
        })
    }

    fn which(&self, _: &str) -> bool {
        true
    }
}
