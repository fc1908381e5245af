//! Command: deploy the dotfiles of the active profile.
use anyhow::{Context as _, Result};
use std::sync::Arc;

use super::{CommandSetup, finish_with_summary};
use crate::cli::{GlobalOpts, InstallOpts};
use crate::logging::Logger;
use crate::pipeline::{InstallPlan, install_all};

/// Run the install command.
///
/// # Errors
///
/// Returns an error if setup fails, the profile has no dotfile, a profile
/// action fails, or any dotfile failed to install.
pub fn run(global: &GlobalOpts, opts: &InstallOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    run_with(setup, opts)
}

/// Install with an already loaded setup.
///
/// # Errors
///
/// Same as [`run`].
pub fn run_with(mut setup: CommandSetup, opts: &InstallOpts) -> Result<()> {
    setup
        .ctx
        .log
        .debug(&format!("dotdrop {}", super::version::version()));

    if opts.showdiff {
        setup.ctx.settings.showdiff = true;
    }
    let workers = opts.workers.unwrap_or(setup.ctx.settings.workers).max(1);
    if workers > 1 && !setup.ctx.force {
        // workers cannot share the terminal for questions
        setup.ctx.log.debug("more than one worker, not asking any question");
        setup.ctx.force = true;
    }

    let dotfiles = setup.select_keys(&opts.keys)?;
    if dotfiles.is_empty() {
        setup
            .ctx
            .log
            .warn("no dotfile to install for this profile");
        anyhow::bail!("nothing to install for profile \"{}\"", setup.profile.key);
    }

    let (default_pre, default_post) = setup.config.default_actions()?;
    let temp_root = if opts.temp {
        let dir = tempfile::Builder::new()
            .prefix("dotdrop-")
            .tempdir()
            .context("creating temporary install directory")?;
        Some(dir.keep())
    } else {
        None
    };
    let plan = InstallPlan {
        dotfiles,
        default_pre,
        default_post,
        profile_pre: setup.profile.pre_actions.clone(),
        profile_post: setup.profile.post_actions.clone(),
        temp_root,
        force_actions: opts.force_actions,
        workers,
    };

    let log = Arc::clone(&setup.ctx.log);
    log.stage(&format!("Installing {} dotfile(s)", plan.dotfiles.len()));
    let stats = install_all(&setup.ctx, &plan)?;
    if let Some(root) = &plan.temp_root {
        log.info(&format!("installed to tmp \"{}\".", root.display()));
    }
    log.info(&format!("{} dotfile(s) installed.", stats.installed));
    setup.finish(stats.failed.is_empty())?;
    finish_with_summary(&log)
}
