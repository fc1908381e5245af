//! Commands: list profiles, the dotfiles of a profile and their stored files.
use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

use super::{CommandSetup, resolve_home};
use crate::cli::{DetailOpts, FilesOpts, GlobalOpts};
use crate::config::{self, Config, Dotfile};
use crate::logging::Logger;
use crate::templating::{Renderer, is_template_tree};

/// Print every profile with its dotfile count.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded.
#[allow(clippy::print_stdout)]
pub fn run_profiles(global: &GlobalOpts) -> Result<()> {
    let home = resolve_home()?;
    let config = Config::load(&config::resolve_path(global.cfg.as_deref(), &home), &home)?;
    print!("{}", profiles(&config));
    Ok(())
}

/// Print the dotfiles of the active profile.
///
/// # Errors
///
/// Returns an error if setup fails.
#[allow(clippy::print_stdout)]
pub fn run_files(global: &GlobalOpts, opts: &FilesOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    print!("{}", files(&setup, opts));
    Ok(())
}

/// Print the stored files of the selected dotfiles.
///
/// # Errors
///
/// Returns an error if setup fails or a key is not part of the profile.
#[allow(clippy::print_stdout)]
pub fn run_detail(global: &GlobalOpts, opts: &DetailOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let dotfiles = setup.select_keys(&opts.keys)?;
    print!(
        "{}",
        detail(&dotfiles, &setup.ctx.dotpath, setup.ctx.renderer.as_ref())
    );
    Ok(())
}

/// `Available profile(s):` followed by one `key (N dotfiles)` line each.
#[must_use]
pub fn profiles(config: &Config) -> String {
    let mut out = String::from("Available profile(s):\n");
    for key in config.profile_keys() {
        match config.resolve_profile(key) {
            Ok(profile) => {
                let _ = writeln!(out, "{key} ({} dotfiles)", profile.dotfiles.len());
            }
            Err(e) => {
                let _ = writeln!(out, "{key} (invalid: {e})");
            }
        }
    }
    out
}

/// Listing of the active profile's dotfiles.
#[must_use]
pub fn files(setup: &CommandSetup, opts: &FilesOpts) -> String {
    let ctx = &setup.ctx;
    let dotfiles: Vec<Dotfile> = setup
        .dotfiles()
        .into_iter()
        .filter(|d| {
            !opts.template || is_template_tree(ctx.renderer.as_ref(), &d.abs_src(&ctx.dotpath))
        })
        .collect();
    format_files(&setup.profile.key, &dotfiles, opts)
}

fn format_files(profile: &str, dotfiles: &[Dotfile], opts: &FilesOpts) -> String {
    let mut out = String::new();
    if !opts.grepable {
        let kind = if opts.template { "Template" } else { "Dotfile" };
        let _ = writeln!(out, "{kind}(s) for profile \"{profile}\":");
    }
    for d in dotfiles {
        if opts.grepable {
            let _ = writeln!(out, "{},dst:{},src:{},link:{}", d.key, d.dst, d.src, d.link);
        } else {
            let _ = writeln!(out, "{}", d.key);
            let _ = writeln!(out, "  dst: {}", d.dst);
            let _ = writeln!(out, "  src: {}", d.src);
            let _ = writeln!(out, "  link: {}", d.link);
        }
    }
    out
}

/// Every file stored for each dotfile, relative to the dotpath, with its
/// template status.
#[must_use]
pub fn detail(dotfiles: &[Dotfile], dotpath: &Path, renderer: &dyn Renderer) -> String {
    let mut out = String::new();
    for d in dotfiles {
        let _ = writeln!(out, "{} (dst: \"{}\", link: {})", d.key, d.dst, d.link);
        let src = d.abs_src(dotpath);
        if !src.exists() {
            let _ = writeln!(out, "  {} (does not exist)", d.src);
            continue;
        }
        for entry in WalkDir::new(&src)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let rel = entry.path().strip_prefix(dotpath).unwrap_or(entry.path());
            let template = if renderer.is_template(entry.path()) {
                "yes"
            } else {
                "no"
            };
            let _ = writeln!(out, "  {} (template:{template})", rel.display());
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::commands::test_support::Workspace;
    use crate::templating::JinjaRenderer;

    const CONFIG: &str = r#"
[dotfiles.f_vimrc]
src = "vimrc"
dst = "~/.vimrc"

[dotfiles.d_nvim]
src = "config/nvim"
dst = "~/.config/nvim"
link = "link_children"

[profiles.home]
dotfiles = ["f_vimrc", "d_nvim"]

[profiles.work]
dotfiles = ["f_vimrc"]
include = ["home"]

[profiles.all]
dotfiles = ["ALL"]
"#;

    fn workspace() -> Workspace {
        let ws = Workspace::new(CONFIG);
        ws.write("dotfiles/vimrc", "set nu\n");
        ws.write("dotfiles/config/nvim/init.lua", "vim.g.x = '{{ profile }}'\n");
        ws.write("dotfiles/config/nvim/lua/plugins.lua", "return {}\n");
        ws
    }

    #[test]
    fn profiles_with_counts() {
        let ws = workspace();
        let config = Config::load(&ws.config_path(), &ws.home()).unwrap();
        insta::assert_snapshot!(profiles(&config), @r"
        Available profile(s):
        all (2 dotfiles)
        home (2 dotfiles)
        work (2 dotfiles)
        ");
    }

    #[test]
    fn files_listing() {
        let ws = workspace();
        let setup = ws.setup(&ws.global("home"));
        insta::assert_snapshot!(files(&setup, &FilesOpts::default()), @r#"
        Dotfile(s) for profile "home":
        f_vimrc
          dst: ~/.vimrc
          src: vimrc
          link: nolink
        d_nvim
          dst: ~/.config/nvim
          src: config/nvim
          link: link_children
        "#);
    }

    #[test]
    fn files_grepable_templates_only() {
        let ws = workspace();
        let setup = ws.setup(&ws.global("home"));
        let opts = FilesOpts {
            template: true,
            grepable: true,
        };
        assert_eq!(
            files(&setup, &opts),
            "d_nvim,dst:~/.config/nvim,src:config/nvim,link:link_children\n"
        );
    }

    #[test]
    fn detail_lists_stored_files() {
        let ws = workspace();
        let setup = ws.setup(&ws.global("home"));
        let out = detail(&setup.dotfiles(), &ws.dotpath(), &JinjaRenderer::new());
        insta::assert_snapshot!(out, @r#"
        f_vimrc (dst: "~/.vimrc", link: nolink)
          vimrc (template:no)
        d_nvim (dst: "~/.config/nvim", link: link_children)
          config/nvim/init.lua (template:yes)
          config/nvim/lua/plugins.lua (template:no)
        "#);
    }

    #[test]
    fn detail_reports_missing_source() {
        let ws = Workspace::new(CONFIG);
        let setup = ws.setup(&ws.global("work"));
        let dotfiles = setup.select_keys(&["f_vimrc".to_string()]).unwrap();
        let out = detail(&dotfiles, &ws.dotpath(), &JinjaRenderer::new());
        assert!(out.contains("vimrc (does not exist)"));
    }
}
