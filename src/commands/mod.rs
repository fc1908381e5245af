//! Subcommands and the setup they share.
pub mod compare;
pub mod import;
pub mod install;
pub mod list;
pub mod remove;
pub mod update;
pub mod version;

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::GlobalOpts;
use crate::config::{self, Config, ConfigStore, Dotfile, Profile, profiles};
use crate::exec::{Executor, SystemExecutor};
use crate::interrupt;
use crate::logging::Logger;
use crate::paths::{absolutize, expand_user};
use crate::pipeline::Context;
use crate::prompt::{Prompt, TerminalPrompt};
use crate::templating::{JinjaRenderer, Renderer};

/// Shared state produced by the common command setup sequence.
///
/// Locates and loads the config file, selects the profile and builds the
/// variable base so that each command does not have to repeat the
/// boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Loaded config, saved by [`Self::finish`] when changed.
    pub config: Config,
    /// Active profile, includes resolved.
    pub profile: Profile,
    /// Shared state for the engine.
    pub ctx: Context,
}

impl CommandSetup {
    /// Resolve the home directory and config path, then load everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory is unknown, the config cannot
    /// be loaded, the profile is undefined or a dynamic variable fails.
    pub fn init(global: &GlobalOpts, log: &Arc<Logger>) -> Result<Self> {
        let home = resolve_home()?;
        let path = config::resolve_path(global.cfg.as_deref(), &home);
        Self::load(global, &path, &home, Arc::clone(log), Arc::new(TerminalPrompt))
    }

    /// Load the config at `path` with `home` as the home directory.
    ///
    /// # Errors
    ///
    /// Same as [`init`](Self::init).
    pub fn load(
        global: &GlobalOpts,
        path: &Path,
        home: &Path,
        log: Arc<Logger>,
        prompt: Arc<dyn Prompt>,
    ) -> Result<Self> {
        log.stage("Loading configuration");
        let config = Config::load(path, home)?;
        log.debug(&format!("config: {}", config.path().display()));

        let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
        let renderer: Arc<dyn Renderer> = Arc::new(JinjaRenderer::new());

        let name = profiles::resolve_name(global.profile.as_deref(), executor.as_ref());
        let profile = config.resolve_profile(&name)?;
        log.info(&format!(
            "profile: {name} ({} dotfiles)",
            profile.dotfiles.len()
        ));
        let vars = config.variables(&profile, renderer.as_ref(), executor.as_ref())?;
        log.debug(&format!("{} variables", vars.iter().count()));

        let mut settings = config.settings().clone();
        if global.safe {
            settings.safe = true;
        }
        let ctx = Context {
            dotpath: config.dotpath(),
            home: home.to_path_buf(),
            settings,
            vars,
            renderer,
            executor,
            prompt,
            log,
            dry_run: global.dry_run,
            force: global.force,
        };
        Ok(Self {
            config,
            profile,
            ctx,
        })
    }

    /// Every dotfile of the active profile, in order.
    #[must_use]
    pub fn dotfiles(&self) -> Vec<Dotfile> {
        self.config.profile_dotfiles(&self.profile)
    }

    /// The profile's dotfiles restricted to `keys`; every dotfile when
    /// `keys` is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is not part of the profile.
    pub fn select_keys(&self, keys: &[String]) -> Result<Vec<Dotfile>> {
        let dotfiles = self.dotfiles();
        if keys.is_empty() {
            return Ok(dotfiles);
        }
        if let Some(unknown) = keys.iter().find(|k| !dotfiles.iter().any(|d| &d.key == *k)) {
            anyhow::bail!(
                "dotfile \"{unknown}\" is not part of profile \"{}\"",
                self.profile.key
            );
        }
        Ok(dotfiles
            .into_iter()
            .filter(|d| keys.contains(&d.key))
            .collect())
    }

    /// Canonical `~/…` form of a deployed path given on the command line.
    #[must_use]
    pub fn destination_of(&self, path: &str) -> String {
        let abs = absolutize(&expand_user(path, &self.ctx.home));
        self.config.path_to_dotfile_destination(&abs)
    }

    /// Write back the config if the command changed it.
    ///
    /// Nothing is saved after a failed or interrupted run; in dry-run the
    /// would-be file is printed instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn finish(&mut self, succeeded: bool) -> Result<()> {
        if !self.config.is_dirty() {
            return Ok(());
        }
        let log = &self.ctx.log;
        if !succeeded || interrupt::interrupted() {
            log.warn("config not saved");
            return Ok(());
        }
        if self.ctx.dry_run {
            log.dry_run("new config file would be:");
            log.raw(&self.config.dump()?);
            return Ok(());
        }
        self.config
            .save()
            .with_context(|| format!("saving {}", self.config.path().display()))?;
        log.info(&format!("config saved to {}", self.config.path().display()));
        Ok(())
    }
}

/// Home directory from `$HOME` (or `%USERPROFILE%`).
///
/// # Errors
///
/// Returns an error if neither variable is set.
pub fn resolve_home() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .context("cannot determine home directory, set HOME")
}

/// Print the summary and bail if any dotfile failed.
///
/// # Errors
///
/// Returns an error if one or more dotfiles recorded a failure.
pub fn finish_with_summary(log: &Logger) -> Result<()> {
    log.print_summary();
    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} dotfile(s) failed");
    }
    Ok(())
}
