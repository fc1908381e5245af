//! Command: fold deployed edits back into the dotpath.
use anyhow::Result;
use std::sync::Arc;

use super::{CommandSetup, finish_with_summary};
use crate::cli::{GlobalOpts, UpdateOpts};
use crate::logging::Logger;
use crate::pipeline::{UpdateRequest, update_all};
use crate::update::UpdateOptions;

/// Run the update command.
///
/// # Errors
///
/// Returns an error if setup fails, any target could not be updated, or
/// the config cannot be saved.
pub fn run(global: &GlobalOpts, opts: &UpdateOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    run_with(setup, opts)
}

/// Update with an already loaded setup.
///
/// # Errors
///
/// Same as [`run`].
pub fn run_with(mut setup: CommandSetup, opts: &UpdateOpts) -> Result<()> {
    let log = Arc::clone(&setup.ctx.log);
    let (targets, by_key) = if opts.paths.is_empty() {
        let question = format!(
            "Update all dotfiles for profile \"{}\"",
            setup.profile.key
        );
        if !setup.ctx.confirm().ask(&question) {
            log.info("update aborted");
            return Ok(());
        }
        (setup.profile.dotfiles.clone(), true)
    } else {
        (opts.paths.clone(), opts.key)
    };

    let request = UpdateRequest {
        targets,
        by_key,
        options: UpdateOptions {
            dry_run: setup.ctx.dry_run,
            showpatch: opts.showpatch,
            policy: setup.ctx.settings.update_policy,
            ignore: opts.ignore.clone(),
        },
    };
    log.stage(&format!("Updating {} target(s)", request.targets.len()));
    let profile_keys = setup.profile.dotfiles.clone();
    let ok = update_all(&setup.ctx, &mut setup.config, &profile_keys, &request)?;
    setup.finish(ok)?;
    finish_with_summary(&log)
}
