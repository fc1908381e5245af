//! Command: unregister dotfiles and delete their stored sources.
use anyhow::{Context as _, Result};
use std::path::Path;
use std::sync::Arc;

use super::CommandSetup;
use crate::cli::{GlobalOpts, RemoveOpts};
use crate::config::{ConfigStore, Dotfile, LinkMode};
use crate::installer::fs::remove_existing;
use crate::interrupt;
use crate::logging::Logger;

/// Run the remove command.
///
/// # Errors
///
/// Returns an error if setup fails, a removal fails, or the config cannot
/// be saved.
pub fn run(global: &GlobalOpts, opts: &RemoveOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    run_with(setup, opts)
}

/// Remove with an already loaded setup.
///
/// # Errors
///
/// Same as [`run`].
pub fn run_with(mut setup: CommandSetup, opts: &RemoveOpts) -> Result<()> {
    let log = Arc::clone(&setup.ctx.log);
    let mut removed: Vec<String> = Vec::new();
    for target in &opts.paths {
        interrupt::check()?;
        for dotfile in lookup(&setup, target, opts.key) {
            if dotfile.link != LinkMode::Nolink {
                log.warn(&format!("{} uses {}, remove it manually", dotfile.key, dotfile.link));
                continue;
            }
            if !setup.profile.dotfiles.contains(&dotfile.key) {
                log.warn(&format!(
                    "{target} ignored, not associated to profile \"{}\"",
                    setup.profile.key
                ));
                continue;
            }
            if remove_one(&mut setup, &dotfile)? {
                removed.push(dotfile.key);
            }
        }
    }
    interrupt::check()?;

    if removed.is_empty() {
        log.info("no dotfile removed");
    } else {
        log.info(&format!("dotfile(s) removed: {}", removed.join(",")));
    }
    setup.finish(true)
}

/// Dotfiles named by `target`, a deployed path or (with `by_key`) a key.
fn lookup(setup: &CommandSetup, target: &str, by_key: bool) -> Vec<Dotfile> {
    let found: Vec<Dotfile> = if by_key {
        setup.config.get_dotfile(target).into_iter().collect()
    } else {
        setup
            .config
            .get_dotfiles_by_destination(&setup.destination_of(target))
    };
    if found.is_empty() {
        setup
            .ctx
            .log
            .warn(&format!("{target} ignored, does not exist"));
    }
    found
}

/// Unregister `dotfile` from every profile and the config, then delete its
/// stored source. Returns `false` when the user declined.
fn remove_one(setup: &mut CommandSetup, dotfile: &Dotfile) -> Result<bool> {
    let ctx = &setup.ctx;
    let profiles = setup.config.get_profiles_by_dotfile_key(&dotfile.key);
    let names = profiles.join(",");
    if ctx.dry_run {
        ctx.log
            .dry_run(&format!("would remove {} from {names}", dotfile.key));
        return Ok(false);
    }
    if !ctx.confirm().ask(&format!(
        "Remove \"{}\" from all these profiles: {names}",
        dotfile.key
    )) {
        return Ok(false);
    }

    for profile in &profiles {
        setup.config.del_dotfile_from_profile(&dotfile.key, profile);
    }
    setup.config.del_dotfile(&dotfile.key);

    let stored = dotfile.abs_src(&ctx.dotpath);
    let shared = setup
        .config
        .dotfile_keys()
        .filter_map(|k| setup.config.dotfile_entry(k))
        .any(|e| e.src == dotfile.src);
    if shared {
        ctx.log.debug(&format!(
            "{} is still used by another dotfile, kept",
            stored.display()
        ));
        return Ok(true);
    }
    remove_existing(&stored).with_context(|| format!("removing {}", stored.display()))?;
    ctx.log.debug(&format!("removed {}", stored.display()));
    remove_empty_parents(setup, &stored);
    Ok(true)
}

/// Delete empty directories above `path`, up to the dotpath.
fn remove_empty_parents(setup: &CommandSetup, path: &Path) {
    let ctx = &setup.ctx;
    let mut parent = path.parent();
    while let Some(dir) = parent {
        if dir == ctx.dotpath || !dir.starts_with(&ctx.dotpath) {
            break;
        }
        let empty = std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none());
        if empty {
            if !ctx
                .confirm()
                .ask(&format!("Remove empty dir \"{}\"", dir.display()))
            {
                break;
            }
            if let Err(e) = std::fs::remove_dir(dir) {
                ctx.log
                    .warn(&format!("cannot remove {}: {e}", dir.display()));
                break;
            }
        }
        parent = dir.parent();
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::commands::test_support::Workspace;
    use crate::config::Config;

    const CONFIG: &str = r#"
[dotfiles.f_vimrc]
src = "vimrc"
dst = "~/.vimrc"

[dotfiles.f_init]
src = "config/nvim/init.lua"
dst = "~/.config/nvim/init.lua"

[dotfiles.f_link]
src = "zshrc"
dst = "~/.zshrc"
link = "link"

[profiles.home]
dotfiles = ["f_vimrc", "f_init", "f_link"]

[profiles.work]
dotfiles = ["f_vimrc"]
"#;

    fn workspace() -> Workspace {
        let ws = Workspace::new(CONFIG);
        ws.write("dotfiles/vimrc", "v\n");
        ws.write("dotfiles/config/nvim/init.lua", "-- init\n");
        ws.write("dotfiles/zshrc", "z\n");
        ws
    }

    fn remove(ws: &Workspace, targets: &[&str], key: bool) {
        let opts = RemoveOpts {
            paths: targets.iter().map(ToString::to_string).collect(),
            key,
        };
        run_with(ws.setup(&ws.global("home")), &opts).unwrap();
    }

    #[test]
    fn remove_by_key_from_every_profile() {
        let ws = workspace();
        remove(&ws, &["f_vimrc"], true);
        let config = Config::load(&ws.config_path(), &ws.home()).unwrap();
        assert!(config.get_dotfile("f_vimrc").is_none());
        assert!(config.resolve_profile("work").unwrap().dotfiles.is_empty());
        assert!(!ws.dotpath().join("vimrc").exists());
    }

    #[test]
    fn remove_by_path_cleans_empty_parents() {
        let ws = workspace();
        remove(&ws, &["~/.config/nvim/init.lua"], false);
        assert!(!ws.dotpath().join("config").exists());
        assert!(ws.dotpath().exists());
    }

    #[test]
    fn linked_dotfile_is_kept() {
        let ws = workspace();
        remove(&ws, &["f_link"], true);
        let config = Config::load(&ws.config_path(), &ws.home()).unwrap();
        assert!(config.get_dotfile("f_link").is_some());
        assert!(ws.dotpath().join("zshrc").exists());
    }

    #[test]
    fn unknown_target_is_ignored() {
        let ws = workspace();
        remove(&ws, &["f_nope"], true);
        assert!(ws.dotpath().join("vimrc").exists());
    }

    #[test]
    fn dry_run_removes_nothing() {
        let ws = workspace();
        let global = GlobalOpts {
            dry_run: true,
            ..ws.global("home")
        };
        let opts = RemoveOpts {
            paths: vec!["f_vimrc".to_string()],
            key: true,
        };
        run_with(ws.setup(&global), &opts).unwrap();
        assert!(ws.dotpath().join("vimrc").exists());
        let config = Config::load(&ws.config_path(), &ws.home()).unwrap();
        assert!(config.get_dotfile("f_vimrc").is_some());
    }
}
