//! Interactive yes/no confirmation.
use std::io::{self, BufRead as _, IsTerminal as _, Write as _};

use crate::interrupt;

/// Source of user confirmations for overwrites and removals.
#[cfg_attr(test, mockall::automock)]
pub trait Prompt: Send + Sync {
    /// Ask `question`; `true` means go ahead.
    fn confirm(&self, question: &str) -> bool;
}

/// Asks on the terminal. When stdin is not a terminal there is nobody to
/// ask, so every question is answered yes. After Ctrl-C every answer is no.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    #[allow(clippy::print_stdout)]
    fn confirm(&self, question: &str) -> bool {
        if interrupt::interrupted() {
            return false;
        }
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return true;
        }
        print!("{question} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut input = String::new();
        if stdin.lock().read_line(&mut input).is_err() || interrupt::interrupted() {
            return false;
        }
        parse_answer(&input)
    }
}

/// Answers every question the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Prompt for FixedAnswer {
    fn confirm(&self, _question: &str) -> bool {
        self.0
    }
}

/// Interpret a typed answer; anything but `y`/`yes` is a no.
fn parse_answer(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Confirmation policy shared by the installer and the updater.
///
/// `force` answers yes without asking; outside safe mode nothing is asked.
#[derive(Clone, Copy)]
pub struct Confirm<'a> {
    prompt: &'a dyn Prompt,
    safe: bool,
    force: bool,
}

impl std::fmt::Debug for Confirm<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Confirm")
            .field("prompt", &"<dyn Prompt>")
            .field("safe", &self.safe)
            .field("force", &self.force)
            .finish()
    }
}

impl<'a> Confirm<'a> {
    /// Build a policy around `prompt`.
    #[must_use]
    pub const fn new(prompt: &'a dyn Prompt, safe: bool, force: bool) -> Self {
        Self {
            prompt,
            safe,
            force,
        }
    }

    /// Ask only when safe mode requires it.
    #[must_use]
    pub fn ask(&self, question: &str) -> bool {
        if self.force || !self.safe {
            return true;
        }
        self.prompt.confirm(question)
    }

    /// Ask even outside safe mode (used by `--showpatch`); `force` still
    /// answers yes.
    #[must_use]
    pub fn ask_always(&self, question: &str) -> bool {
        if self.force {
            return true;
        }
        self.prompt.confirm(question)
    }
}
