//! Command: show the differences between the rendered dotpath and the
//! deployed files.
use anyhow::Result;
use std::sync::Arc;

use super::CommandSetup;
use crate::cli::{CompareOpts, GlobalOpts};
use crate::config::{ConfigStore, Dotfile};
use crate::logging::Logger;
use crate::pipeline::compare_all;

/// Run the compare command.
///
/// # Errors
///
/// Returns an error if setup fails or any dotfile differs from its
/// deployed state.
pub fn run(global: &GlobalOpts, opts: &CompareOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    run_with(&setup, opts)
}

/// Compare with an already loaded setup.
///
/// # Errors
///
/// Same as [`run`].
pub fn run_with(setup: &CommandSetup, opts: &CompareOpts) -> Result<()> {
    let log = &setup.ctx.log;
    let (dotfiles, all_found) = select(setup, &opts.files);
    log.stage(&format!("Comparing {} dotfile(s)", dotfiles.len()));
    let same = compare_all(&setup.ctx, &dotfiles, &opts.ignore, opts.file_only)?;
    if !all_found {
        anyhow::bail!("some files are not managed by profile \"{}\"", setup.profile.key);
    }
    if !same {
        anyhow::bail!("deployed dotfiles differ");
    }
    log.info(&format!("{} dotfile(s) identical", dotfiles.len()));
    Ok(())
}

/// Dotfiles of the profile deployed at `files`, or all of them.
fn select(setup: &CommandSetup, files: &[String]) -> (Vec<Dotfile>, bool) {
    if files.is_empty() {
        return (setup.dotfiles(), true);
    }
    let mut all_found = true;
    let mut selected: Vec<Dotfile> = Vec::new();
    for file in files {
        let dst = setup.destination_of(file);
        let found: Vec<Dotfile> = setup
            .config
            .get_dotfiles_by_destination(&dst)
            .into_iter()
            .filter(|d| setup.profile.dotfiles.contains(&d.key))
            .collect();
        if found.is_empty() {
            setup
                .ctx
                .log
                .warn(&format!("\"{file}\" is not managed by this profile, ignored"));
            all_found = false;
        }
        for dotfile in found {
            if !selected.iter().any(|d| d.key == dotfile.key) {
                selected.push(dotfile);
            }
        }
    }
    (selected, all_found)
}
