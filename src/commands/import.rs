//! Command: copy deployed files into the dotpath and register them.
use anyhow::{Context as _, Result};
use std::path::Path;
use std::sync::Arc;

use super::{CommandSetup, finish_with_summary};
use crate::cli::{GlobalOpts, ImportOpts};
use crate::config::{ConfigStore, LinkMode};
use crate::ignore::IgnoreSet;
use crate::installer::fs::replace_with_copy;
use crate::interrupt;
use crate::logging::{ItemStatus, Logger};
use crate::paths::{absolutize, expand_user, is_symlink, lexists, strip_root};

/// Run the import command.
///
/// # Errors
///
/// Returns an error if setup fails, any path could not be imported, or the
/// config cannot be saved.
pub fn run(global: &GlobalOpts, opts: &ImportOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    run_with(setup, opts)
}

/// Import with an already loaded setup.
///
/// # Errors
///
/// Same as [`run`].
pub fn run_with(mut setup: CommandSetup, opts: &ImportOpts) -> Result<()> {
    let log = Arc::clone(&setup.ctx.log);
    let link = opts.link.unwrap_or(setup.ctx.settings.link_default);
    log.stage(&format!("Importing {} path(s)", opts.paths.len()));

    let mut count = 0;
    for path in &opts.paths {
        interrupt::check()?;
        match import_one(&mut setup, path, opts.import_as.as_deref(), link) {
            Ok(Some(key)) => {
                log.info(&format!("\"{path}\" imported as {key}"));
                let status = if setup.ctx.dry_run {
                    ItemStatus::DryRun
                } else {
                    ItemStatus::Ok
                };
                log.record(&key, status, None);
                count += 1;
            }
            Ok(None) => log.record(path, ItemStatus::Skipped, Some("user declined")),
            Err(e) => {
                log.error(&format!("importing \"{path}\" failed: {e:#}"));
                log.record(path, ItemStatus::Failed, Some(&format!("{e:#}")));
            }
        }
    }
    interrupt::check()?;
    log.info(&format!("{count} file(s) imported."));
    let ok = log.failure_count() == 0;
    setup.finish(ok)?;
    finish_with_summary(&log)
}

/// Copy `path` into the dotpath and register it in the active profile.
///
/// Returns the dotfile key, or `None` when the user declined.
fn import_one(
    setup: &mut CommandSetup,
    path: &str,
    import_as: Option<&str>,
    link: LinkMode,
) -> Result<Option<String>> {
    let ctx = &setup.ctx;
    let deployed = absolutize(&expand_user(path.trim_end_matches('/'), &ctx.home));
    if !lexists(&deployed) {
        anyhow::bail!("\"{path}\" does not exist");
    }
    if is_symlink(&deployed)
        && !ctx.confirm().ask(&format!(
            "\"{}\" is a symlink, dereference it and continue",
            deployed.display()
        ))
    {
        return Ok(None);
    }
    if link == LinkMode::LinkChildren && !deployed.is_dir() {
        anyhow::bail!("{link} requires a directory");
    }

    let stored_from = import_as.map_or_else(
        || deployed.clone(),
        |name| absolutize(&expand_user(name.trim_end_matches('/'), &ctx.home)),
    );
    let src = stored_name(&stored_from, &ctx.home, ctx.settings.keepdot);
    if src.is_empty() {
        anyhow::bail!("cannot derive a stored name for \"{path}\"");
    }
    let dst = setup.config.path_to_dotfile_destination(&deployed);
    ctx.log.debug(&format!("import dotfile: src:{src} dst:{dst}"));

    let profile = &setup.profile.key;
    for other in setup.config.get_dotfiles_by_destination(&dst) {
        if other.src != src && setup.config.get_profiles_by_dotfile_key(&other.key).contains(profile) {
            anyhow::bail!("duplicate dotfile for this profile: {} already deploys {dst}", other.key);
        }
    }

    let stored = ctx.dotpath.join(&src);
    let mut overwrite = true;
    if lexists(&stored) {
        let diff = ctx
            .comparator()
            .compare(&stored, &deployed, &IgnoreSet::default());
        if diff.is_empty() {
            overwrite = false;
        } else {
            ctx.log
                .info(&format!("diff \"{dst}\" VS \"{}\"", stored.display()));
            ctx.log.raw(&diff);
            if !ctx.confirm().ask(&format!(
                "Dotfile \"{}\" already exists, overwrite",
                stored.display()
            )) {
                return Ok(None);
            }
        }
    }
    if overwrite {
        if ctx.dry_run {
            ctx.log.dry_run(&format!(
                "would copy {} to {}",
                deployed.display(),
                stored.display()
            ));
        } else {
            replace_with_copy(&deployed, &stored)
                .with_context(|| format!("copying into {}", stored.display()))?;
        }
    }
    let profile = profile.clone();
    Ok(Some(setup.config.new_dotfile(&src, &dst, link, &profile)))
}

/// Path of an imported file inside the dotpath: relative to home (or to the
/// filesystem root), without its leading dot unless `keepdot`.
fn stored_name(path: &Path, home: &Path, keepdot: bool) -> String {
    let rel = path
        .strip_prefix(home)
        .map_or_else(|_| strip_root(path), Path::to_path_buf);
    let rel = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if keepdot {
        rel
    } else {
        rel.trim_start_matches('.').trim_start_matches('/').to_string()
    }
}
