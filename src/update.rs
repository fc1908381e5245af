//! Reverse synchronization: fold a deployed file back into the dotpath.
//!
//! A target is located by deployed path or by key, compared with what the
//! stored source currently renders to, and written back only when they
//! differ.
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compare::{Comparator, is_binary};
use crate::config::{ConfigStore, Dotfile, LinkMode, UpdatePolicy};
use crate::error::UpdateError;
use crate::ignore::IgnoreSet;
use crate::installer::Installer;
use crate::installer::fs::{ensure_parent_dir, remove_existing, sorted_children, write_atomic};
use crate::logging::Log;
use crate::paths::{absolutize, expand_user, lexists};
use crate::prompt::Confirm;
use crate::templating::{RenderContext, Renderer, Variables};
use crate::transform::Transformer;

/// Result of updating one target.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// The stored source was rewritten (or would be, in dry-run).
    Updated,
    /// Nothing to write back.
    Skipped(String),
    /// The target could not be updated.
    Failed(UpdateError),
}

impl UpdateOutcome {
    /// Whether the target counts as a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Updater settings taken from `[config]` and the command line.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Report instead of writing.
    pub dry_run: bool,
    /// Show the change and ask before writing.
    pub showpatch: bool,
    /// How deployed content maps back to templates.
    pub policy: UpdatePolicy,
    /// Extra ignore patterns from the command line.
    pub ignore: Vec<String>,
}

/// Collaborators of the updater.
#[derive(Clone, Copy)]
pub struct UpdateEnv<'a> {
    /// Absolute dotpath.
    pub dotpath: &'a Path,
    /// Home directory used to expand `~`.
    pub home: &'a Path,
    /// Variable base of the active profile.
    pub vars: &'a Variables,
    /// Template engine.
    pub renderer: &'a dyn Renderer,
    /// Runs `trans_read` and `trans_write`.
    pub transformer: Transformer<'a>,
    /// Stages the stored source for comparison.
    pub installer: &'a Installer<'a>,
    /// Diffs staged and deployed trees.
    pub comparator: &'a Comparator<'a>,
    /// Questions before overwriting or removing.
    pub confirm: Confirm<'a>,
    /// Output sink.
    pub log: &'a dyn Log,
}

impl std::fmt::Debug for UpdateEnv<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateEnv")
            .field("dotpath", &self.dotpath)
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}

/// Updates dotfiles of one profile from their deployed state.
pub struct Updater<'a> {
    store: &'a mut dyn ConfigStore,
    profile_keys: &'a [String],
    env: UpdateEnv<'a>,
    opts: UpdateOptions,
}

impl std::fmt::Debug for Updater<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("profile_keys", &self.profile_keys)
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl<'a> Updater<'a> {
    /// Build an updater restricted to `profile_keys`.
    #[must_use]
    pub fn new(
        store: &'a mut dyn ConfigStore,
        profile_keys: &'a [String],
        env: UpdateEnv<'a>,
        opts: UpdateOptions,
    ) -> Self {
        Self {
            store,
            profile_keys,
            env,
            opts,
        }
    }

    /// Update the dotfile deployed at (or above) `path`.
    pub fn update_path(&mut self, path: &str) -> UpdateOutcome {
        let deployed = absolutize(&expand_user(path, self.env.home));
        if !lexists(&deployed) {
            return UpdateOutcome::Failed(UpdateError::DeployedMissing(deployed));
        }
        let Some((dotfile, rel)) = self.locate(&deployed) else {
            return UpdateOutcome::Failed(UpdateError::NotFound(path.to_string()));
        };
        self.log_target(&dotfile, &deployed);
        self.update_dotfile(&dotfile, &rel)
    }

    /// Update the dotfile `key` of the active profile.
    pub fn update_key(&mut self, key: &str) -> UpdateOutcome {
        let dotfile = self
            .profile_keys
            .iter()
            .any(|k| k == key)
            .then(|| self.store.get_dotfile(key))
            .flatten();
        let Some(dotfile) = dotfile else {
            return UpdateOutcome::Failed(UpdateError::NotFound(key.to_string()));
        };
        let deployed = dotfile.abs_dst(self.env.home);
        if !lexists(&deployed) {
            return UpdateOutcome::Failed(UpdateError::DeployedMissing(deployed));
        }
        self.log_target(&dotfile, &deployed);
        self.update_dotfile(&dotfile, Path::new(""))
    }

    fn log_target(&self, dotfile: &Dotfile, deployed: &Path) {
        self.env.log.debug(&format!(
            "updating {} from {}",
            dotfile.key,
            deployed.display()
        ));
    }

    /// Find the dotfile of the active profile deployed at `deployed`, or the
    /// directory dotfile containing it, with the remaining sub-path.
    fn locate(&self, deployed: &Path) -> Option<(Dotfile, PathBuf)> {
        let canonical = self.store.path_to_dotfile_destination(deployed);
        let in_profile = |d: &Dotfile| self.profile_keys.iter().any(|k| *k == d.key);
        if let Some(exact) = self
            .store
            .get_dotfiles_by_destination(&canonical)
            .into_iter()
            .find(|d| in_profile(d))
        {
            return Some((exact, PathBuf::new()));
        }
        self.profile_keys
            .iter()
            .filter_map(|key| self.store.get_dotfile(key))
            .filter_map(|d| {
                let root = d.abs_dst(self.env.home);
                let rel = deployed.strip_prefix(&root).ok()?.to_path_buf();
                Some((root.components().count(), d, rel))
            })
            .max_by_key(|(depth, _, _)| *depth)
            .map(|(_, d, rel)| (d, rel))
    }

    fn update_dotfile(&mut self, dotfile: &Dotfile, rel: &Path) -> UpdateOutcome {
        match self.try_update(dotfile, rel) {
            Ok(outcome) => outcome,
            Err(e) => UpdateOutcome::Failed(e),
        }
    }

    fn try_update(&mut self, dotfile: &Dotfile, rel: &Path) -> Result<UpdateOutcome, UpdateError> {
        if dotfile.link != LinkMode::Nolink {
            self.env.log.warn(&format!(
                "{} uses {}, nothing to update",
                dotfile.key, dotfile.link
            ));
            return Ok(UpdateOutcome::Skipped(format!("{} dotfile", dotfile.link)));
        }
        let has_trans = dotfile.trans_read.is_some() || dotfile.trans_write.is_some();
        if has_trans && !rel.as_os_str().is_empty() {
            return Err(UpdateError::TransformedSubPath(dotfile.key.clone()));
        }

        let env = self.env;
        let root_dst = dotfile.abs_dst(env.home);
        let deployed = join_rel(&root_dst, rel);
        let stored = join_rel(&dotfile.abs_src(env.dotpath), rel);
        let ctx = RenderContext::with_overlay(env.vars, dotfile.overlay(env.dotpath, env.home));
        let patterns: Vec<&String> = dotfile.upignore.iter().chain(&self.opts.ignore).collect();
        let ignore = IgnoreSet::new(&patterns, &root_dst, env.home);
        if ignore.is_ignored(&deployed) {
            return Ok(UpdateOutcome::Skipped("ignored".to_string()));
        }

        let diff = self.diff_against_stored(dotfile, &stored, &deployed, &ctx, &ignore)?;
        if diff.is_empty() {
            env.log.debug(&format!("{} is identical", deployed.display()));
            return Ok(UpdateOutcome::Skipped("identical".to_string()));
        }

        if self.opts.showpatch {
            env.log.raw(&diff);
            if !env
                .confirm
                .ask_always(&format!("Apply changes to \"{}\"", stored.display()))
            {
                return Ok(UpdateOutcome::Skipped("user declined".to_string()));
            }
        } else if crate::templating::is_template_tree(env.renderer, &stored)
            && !env.confirm.ask(&format!(
                "\"{}\" is a template, update it anyway",
                stored.display()
            ))
        {
            return Ok(UpdateOutcome::Skipped("user declined".to_string()));
        }

        if self.opts.dry_run {
            env.log.dry_run(&format!(
                "would update {} from {}",
                stored.display(),
                deployed.display()
            ));
            return Ok(UpdateOutcome::Updated);
        }

        let transformed = dotfile
            .trans_write
            .as_ref()
            .map(|trans| env.transformer.apply(trans, &deployed, &ctx))
            .transpose()?;
        let source = transformed.as_ref().map_or(deployed.as_path(), |t| t.path());

        let writer = WriteBack {
            env,
            policy: self.opts.policy,
            ignore: &ignore,
            ctx: &ctx,
            deployed_root: &deployed,
            source_root: source,
            stored_root: &stored,
            render_stored: transformed.is_none(),
        };
        if source.is_dir() {
            writer.merge_dir(source, &stored)?;
        } else {
            writer.write_file(source, &stored)?;
        }
        env.log.info(&format!(
            "updated {} from {}",
            stored.display(),
            deployed.display()
        ));

        self.patch_destination(dotfile, &root_dst);
        Ok(UpdateOutcome::Updated)
    }

    /// Diff between the rendered stored source and the deployed state.
    fn diff_against_stored(
        &self,
        dotfile: &Dotfile,
        stored: &Path,
        deployed: &Path,
        ctx: &RenderContext,
        ignore: &IgnoreSet,
    ) -> Result<String, UpdateError> {
        let env = self.env;
        if !lexists(stored) {
            return Ok(format!(
                "=> \"{}\" does not exist in dotpath\n",
                deployed.display()
            ));
        }
        let transformed = dotfile
            .trans_read
            .as_ref()
            .map(|trans| env.transformer.apply(trans, stored, ctx))
            .transpose()?;
        let source = transformed.as_ref().map_or(stored, |t| t.path());
        let tmp = tempfile::tempdir().map_err(|e| UpdateError::io("create temp dir for", stored, e))?;
        let staged = env
            .installer
            .install_to_temp(ctx, tmp.path(), source, deployed, true)
            .map_err(|e| UpdateError::Render(e.to_string()))?;
        Ok(env.comparator.compare(&staged, deployed, ignore))
    }

    /// Rewrite the configured destination to its canonical `~/…` form.
    fn patch_destination(&mut self, dotfile: &Dotfile, root_dst: &Path) {
        let canonical = self.store.path_to_dotfile_destination(root_dst);
        if canonical != dotfile.dst && self.store.set_dotfile_destination(&dotfile.key, &canonical) {
            self.env.log.info(&format!(
                "destination of {} changed to {canonical}",
                dotfile.key
            ));
        }
    }
}

/// One write-back operation.
struct WriteBack<'w, 'a> {
    env: UpdateEnv<'a>,
    policy: UpdatePolicy,
    ignore: &'w IgnoreSet,
    ctx: &'w RenderContext,
    deployed_root: &'w Path,
    source_root: &'w Path,
    stored_root: &'w Path,
    render_stored: bool,
}

impl WriteBack<'_, '_> {
    /// Whether `child`, found below `side_root` (the write-back source or the
    /// stored tree), is ignored at its deployed location.
    fn is_ignored(&self, side_root: &Path, child: &Path) -> bool {
        child.strip_prefix(side_root).map_or_else(
            |_| self.ignore.is_ignored(child),
            |rel| self.ignore.is_ignored(&join_rel(self.deployed_root, rel)),
        )
    }

    fn write_file(&self, source: &Path, stored: &Path) -> Result<(), UpdateError> {
        let mut content = fs::read(source).map_err(|e| UpdateError::io("read", source, e))?;
        if self.policy == UpdatePolicy::Substitute
            && !is_binary(&content)
            && self.env.renderer.is_template(stored)
        {
            let text = String::from_utf8_lossy(&content).into_owned();
            content = substitute(&text, self.env.vars).into_bytes();
        }
        if stored.is_dir() {
            remove_existing(stored).map_err(|e| UpdateError::io("remove", stored, e))?;
        }
        ensure_parent_dir(stored).map_err(|e| UpdateError::io("create parent of", stored, e))?;
        write_atomic(stored, &content, Some(source)).map_err(|e| UpdateError::io("write", stored, e))
    }

    /// Whether the stored file already renders to the deployed content.
    fn unchanged(&self, deployed: &Path, stored: &Path) -> bool {
        if !stored.is_file() {
            return false;
        }
        let Ok(current) = fs::read(deployed) else {
            return false;
        };
        let rendered = if self.render_stored && self.env.renderer.is_template(stored) {
            self.env.renderer.render(stored, self.ctx).ok()
        } else {
            fs::read(stored).ok()
        };
        rendered.is_some_and(|r| r == current)
    }

    fn merge_dir(&self, deployed: &Path, stored: &Path) -> Result<(), UpdateError> {
        if lexists(stored) && !stored.is_dir() {
            remove_existing(stored).map_err(|e| UpdateError::io("remove", stored, e))?;
        }
        fs::create_dir_all(stored).map_err(|e| UpdateError::io("create", stored, e))?;

        let mut seen = BTreeSet::new();
        for entry in sorted_children(deployed).map_err(|e| UpdateError::io("read", deployed, e))? {
            let child = entry.path();
            let name = entry.file_name();
            if self.is_ignored(self.source_root, &child) {
                self.env.log.debug(&format!("{} ignored", child.display()));
                continue;
            }
            seen.insert(name.clone());
            let stored_child = stored.join(&name);
            if child.is_dir() {
                self.merge_dir(&child, &stored_child)?;
            } else if !self.unchanged(&child, &stored_child) {
                self.write_file(&child, &stored_child)?;
                self.env
                    .log
                    .debug(&format!("updated {}", stored_child.display()));
            }
        }

        for entry in sorted_children(stored).map_err(|e| UpdateError::io("read", stored, e))? {
            let child = entry.path();
            if seen.contains(&entry.file_name())
                || self.is_ignored(self.stored_root, &child)
            {
                continue;
            }
            if !self
                .env
                .confirm
                .ask(&format!("Remove \"{}\" from dotpath", child.display()))
            {
                continue;
            }
            remove_existing(&child).map_err(|e| UpdateError::io("remove", &child, e))?;
            self.env.log.info(&format!("removed {}", child.display()));
        }
        Ok(())
    }
}

fn join_rel(root: &Path, rel: &Path) -> PathBuf {
    if rel.as_os_str().is_empty() {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}

/// Replace literal occurrences of user variable values with `{{ name }}`,
/// longest values first, in a single left-to-right pass.
#[must_use]
pub fn substitute(text: &str, vars: &Variables) -> String {
    let mut candidates: Vec<(&str, &str)> = vars
        .user_variables()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    candidates.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(b.0)));

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'outer: while !rest.is_empty() {
        for (name, value) in &candidates {
            if let Some(after) = rest.strip_prefix(value) {
                out.push_str("{{ ");
                out.push_str(name);
                out.push_str(" }}");
                rest = after;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::config::settings::DEFAULT_DIFF_COMMAND;
    use crate::config::test_helpers::config_in;
    use crate::exec::SystemExecutor;
    use crate::installer::InstallOptions;
    use crate::logging::CapturedLog;
    use crate::prompt::{FixedAnswer, MockPrompt, Prompt};
    use crate::templating::JinjaRenderer;
    use std::collections::BTreeMap;

    const CONFIG: &str = r#"
[config]
dotpath = "dotfiles"

[variables]
editor = "vim"

[trans_read]
rev = "rev < {0} > {1}"

[trans_write]
rev = "rev < {0} > {1}"

[dotfiles.f_vimrc]
src = "vimrc"
dst = "~/.vimrc"

[dotfiles.d_vim]
src = "vim"
dst = "~/.vim"
upignore = ["*.swp", "sub/keep"]

[dotfiles.f_link]
src = "linked"
dst = "~/.linked"
link = "link"

[dotfiles.f_rev]
src = "rev"
dst = "~/.rev"
trans_read = "rev"
trans_write = "rev"

[profiles.home]
dotfiles = ["f_vimrc", "d_vim", "f_link", "f_rev"]
"#;

    struct Fixture {
        dir: tempfile::TempDir,
        config: Config,
        renderer: JinjaRenderer,
        log: CapturedLog,
        vars: Variables,
        keys: Vec<String>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let home = dir.path().join("home");
            fs::create_dir_all(&home).unwrap();
            fs::create_dir_all(dir.path().join("dotfiles")).unwrap();
            let config = config_in(dir.path(), &home, CONFIG);
            let vars = Variables::new(BTreeMap::from([
                ("editor".to_string(), "vim".to_string()),
                ("profile".to_string(), "home".to_string()),
            ]));
            let keys = config.resolve_profile("home").unwrap().dotfiles;
            Self {
                dir,
                config,
                renderer: JinjaRenderer::new(),
                log: CapturedLog::default(),
                vars,
                keys,
            }
        }

        fn home(&self) -> PathBuf {
            self.dir.path().join("home")
        }

        fn dotpath(&self) -> PathBuf {
            self.dir.path().join("dotfiles")
        }

        fn write(&self, path: &Path, content: &str) {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn run<R>(
            &mut self,
            prompt: &dyn Prompt,
            opts: UpdateOptions,
            f: impl FnOnce(&mut Updater<'_>) -> R,
        ) -> R {
            self.run_with_confirm(prompt, true, opts, f)
        }

        fn run_with_confirm<R>(
            &mut self,
            prompt: &dyn Prompt,
            safe: bool,
            opts: UpdateOptions,
            f: impl FnOnce(&mut Updater<'_>) -> R,
        ) -> R {
            let comparator = Comparator::new(&SystemExecutor, DEFAULT_DIFF_COMMAND);
            let confirm = Confirm::new(prompt, safe, false);
            let installer = Installer::new(
                &self.renderer,
                &comparator,
                confirm,
                &self.log,
                InstallOptions::default(),
            );
            let dotpath = self.dotpath();
            let home = self.home();
            let env = UpdateEnv {
                dotpath: &dotpath,
                home: &home,
                vars: &self.vars,
                renderer: &self.renderer,
                transformer: Transformer::new(&self.renderer, &SystemExecutor, &self.log),
                installer: &installer,
                comparator: &comparator,
                confirm,
                log: &self.log,
            };
            let mut updater = Updater::new(&mut self.config, &self.keys, env, opts);
            f(&mut updater)
        }
    }

    static YES: FixedAnswer = FixedAnswer(true);

    #[test]
    fn identical_template_is_not_rewritten() {
        let mut fx = Fixture::new();
        fx.write(&fx.dotpath().join("vimrc"), "set editor={{ editor }}\n");
        fx.write(&fx.home().join(".vimrc"), "set editor=vim\n");
        let outcome = fx.run(&YES, UpdateOptions::default(), |u| u.update_key("f_vimrc"));
        assert!(matches!(outcome, UpdateOutcome::Skipped(ref r) if r == "identical"));
        assert_eq!(
            fs::read_to_string(fx.dotpath().join("vimrc")).unwrap(),
            "set editor={{ editor }}\n"
        );
    }

    #[test]
    fn raw_policy_copies_deployed_content() {
        let mut fx = Fixture::new();
        fx.write(&fx.dotpath().join("vimrc"), "set editor={{ editor }}\n");
        fx.write(&fx.home().join(".vimrc"), "set editor=neovim\n");
        let outcome = fx.run(&YES, UpdateOptions::default(), |u| u.update_key("f_vimrc"));
        assert!(matches!(outcome, UpdateOutcome::Updated), "{outcome:?}");
        assert_eq!(
            fs::read_to_string(fx.dotpath().join("vimrc")).unwrap(),
            "set editor=neovim\n"
        );
    }

    #[test]
    fn substitute_policy_restores_variables() {
        let mut fx = Fixture::new();
        fx.write(&fx.dotpath().join("vimrc"), "set editor={{ editor }}\n");
        fx.write(&fx.home().join(".vimrc"), "set editor=vim\nset ts=4\n");
        let opts = UpdateOptions {
            policy: UpdatePolicy::Substitute,
            ..UpdateOptions::default()
        };
        let outcome = fx.run(&YES, opts, |u| u.update_path("~/.vimrc"));
        assert!(matches!(outcome, UpdateOutcome::Updated), "{outcome:?}");
        assert_eq!(
            fs::read_to_string(fx.dotpath().join("vimrc")).unwrap(),
            "set editor={{ editor }}\nset ts=4\n"
        );
    }

    #[test]
    fn safe_mode_decline_on_template_keeps_source() {
        let mut fx = Fixture::new();
        fx.write(&fx.dotpath().join("vimrc"), "{{ editor }}\n");
        fx.write(&fx.home().join(".vimrc"), "nano\n");
        let mut prompt = MockPrompt::new();
        prompt.expect_confirm().times(1).return_const(false);
        let outcome = fx.run(&prompt, UpdateOptions::default(), |u| u.update_key("f_vimrc"));
        assert!(matches!(outcome, UpdateOutcome::Skipped(_)));
        assert_eq!(
            fs::read_to_string(fx.dotpath().join("vimrc")).unwrap(),
            "{{ editor }}\n"
        );
    }

    #[test]
    fn dry_run_writes_nothing() {
        let mut fx = Fixture::new();
        fx.write(&fx.dotpath().join("vimrc"), "a\n");
        fx.write(&fx.home().join(".vimrc"), "b\n");
        let opts = UpdateOptions {
            dry_run: true,
            ..UpdateOptions::default()
        };
        let outcome = fx.run(&YES, opts, |u| u.update_key("f_vimrc"));
        assert!(matches!(outcome, UpdateOutcome::Updated));
        assert_eq!(fs::read_to_string(fx.dotpath().join("vimrc")).unwrap(), "a\n");
        assert!(fx.log.contains("would update"));
    }

    #[test]
    fn unknown_path_and_key_are_not_found() {
        let mut fx = Fixture::new();
        fx.write(&fx.home().join(".bashrc"), "x");
        let by_path = fx.run(&YES, UpdateOptions::default(), |u| u.update_path("~/.bashrc"));
        assert!(matches!(by_path, UpdateOutcome::Failed(UpdateError::NotFound(_))));
        let by_key = fx.run(&YES, UpdateOptions::default(), |u| u.update_key("f_nope"));
        assert!(matches!(by_key, UpdateOutcome::Failed(UpdateError::NotFound(_))));
    }

    #[test]
    fn missing_deployed_file_fails() {
        let mut fx = Fixture::new();
        fx.write(&fx.dotpath().join("vimrc"), "a\n");
        let outcome = fx.run(&YES, UpdateOptions::default(), |u| u.update_key("f_vimrc"));
        assert!(matches!(
            outcome,
            UpdateOutcome::Failed(UpdateError::DeployedMissing(_))
        ));
    }

    #[test]
    fn link_dotfiles_are_skipped_with_warning() {
        let mut fx = Fixture::new();
        fx.write(&fx.dotpath().join("linked"), "x");
        fx.write(&fx.home().join(".linked"), "y");
        let outcome = fx.run(&YES, UpdateOptions::default(), |u| u.update_key("f_link"));
        assert!(outcome.is_success());
        assert!(fx.log.contains("warn: f_link uses link"));
        assert_eq!(fs::read_to_string(fx.dotpath().join("linked")).unwrap(), "x");
    }

    #[test]
    fn directory_merge_adds_removes_and_ignores() {
        let mut fx = Fixture::new();
        let stored = fx.dotpath().join("vim");
        let deployed = fx.home().join(".vim");
        fx.write(&stored.join("vimrc"), "{{ editor }}\n");
        fx.write(&stored.join("gone"), "old");
        fx.write(&deployed.join("vimrc"), "vim\n");
        fx.write(&deployed.join("new"), "fresh");
        fx.write(&deployed.join("x.swp"), "swap");
        let outcome = fx.run(&YES, UpdateOptions::default(), |u| u.update_key("d_vim"));
        assert!(matches!(outcome, UpdateOutcome::Updated), "{outcome:?}");
        assert_eq!(fs::read_to_string(stored.join("vimrc")).unwrap(), "{{ editor }}\n");
        assert_eq!(fs::read_to_string(stored.join("new")).unwrap(), "fresh");
        assert!(!stored.join("gone").exists());
        assert!(!stored.join("x.swp").exists());
    }

    #[test]
    fn sub_path_updates_only_that_file() {
        let mut fx = Fixture::new();
        let stored = fx.dotpath().join("vim");
        let deployed = fx.home().join(".vim");
        fx.write(&stored.join("a"), "a");
        fx.write(&stored.join("b"), "b");
        fx.write(&deployed.join("a"), "A");
        fx.write(&deployed.join("b"), "B");
        let path = deployed.join("a").display().to_string();
        let outcome = fx.run(&YES, UpdateOptions::default(), |u| u.update_path(&path));
        assert!(matches!(outcome, UpdateOutcome::Updated), "{outcome:?}");
        assert_eq!(fs::read_to_string(stored.join("a")).unwrap(), "A");
        assert_eq!(fs::read_to_string(stored.join("b")).unwrap(), "b");
    }

    #[test]
    fn sub_path_merge_keeps_ignored_stored_files() {
        let mut fx = Fixture::new();
        let stored = fx.dotpath().join("vim");
        let deployed = fx.home().join(".vim");
        fx.write(&stored.join("sub/a"), "old\n");
        fx.write(&stored.join("sub/keep"), "kept\n");
        fx.write(&stored.join("sub/gone"), "gone\n");
        fx.write(&deployed.join("sub/a"), "new\n");
        let path = deployed.join("sub").display().to_string();
        let outcome = fx.run(&YES, UpdateOptions::default(), |u| u.update_path(&path));
        assert!(matches!(outcome, UpdateOutcome::Updated), "{outcome:?}");
        assert_eq!(fs::read_to_string(stored.join("sub/a")).unwrap(), "new\n");
        assert_eq!(fs::read_to_string(stored.join("sub/keep")).unwrap(), "kept\n");
        assert!(!stored.join("sub/gone").exists());
    }

    #[test]
    fn sub_path_ignore_is_anchored_on_dotfile_destination() {
        let mut fx = Fixture::new();
        let stored = fx.dotpath().join("vim");
        let deployed = fx.home().join(".vim");
        fx.write(&stored.join("sub/keep"), "kept\n");
        fx.write(&deployed.join("sub/keep"), "changed\n");
        let path = deployed.join("sub").display().to_string();
        let outcome = fx.run(&YES, UpdateOptions::default(), |u| u.update_path(&path));
        assert!(matches!(outcome, UpdateOutcome::Skipped(ref r) if r == "identical"), "{outcome:?}");
        assert_eq!(fs::read_to_string(stored.join("sub/keep")).unwrap(), "kept\n");
    }

    #[test]
    fn showpatch_accepted_writes_stored_source() {
        let mut fx = Fixture::new();
        fx.write(&fx.dotpath().join("vimrc"), "a\n");
        fx.write(&fx.home().join(".vimrc"), "b\n");
        let mut prompt = MockPrompt::new();
        prompt
            .expect_confirm()
            .withf(|q| q.starts_with("Apply changes to"))
            .times(1)
            .return_const(true);
        let opts = UpdateOptions {
            showpatch: true,
            ..UpdateOptions::default()
        };
        // Outside safe mode the patch is still shown and confirmed.
        let outcome = fx.run_with_confirm(&prompt, false, opts, |u| u.update_key("f_vimrc"));
        assert!(matches!(outcome, UpdateOutcome::Updated), "{outcome:?}");
        assert_eq!(fs::read_to_string(fx.dotpath().join("vimrc")).unwrap(), "b\n");
        assert!(fx.log.contains("raw: "));
    }

    #[test]
    fn showpatch_declined_keeps_stored_source() {
        let mut fx = Fixture::new();
        fx.write(&fx.dotpath().join("vimrc"), "a\n");
        fx.write(&fx.home().join(".vimrc"), "b\n");
        let mut prompt = MockPrompt::new();
        prompt.expect_confirm().times(1).return_const(false);
        let opts = UpdateOptions {
            showpatch: true,
            ..UpdateOptions::default()
        };
        let outcome = fx.run_with_confirm(&prompt, false, opts, |u| u.update_key("f_vimrc"));
        assert!(matches!(outcome, UpdateOutcome::Skipped(ref r) if r == "user declined"));
        assert_eq!(fs::read_to_string(fx.dotpath().join("vimrc")).unwrap(), "a\n");
    }

    #[test]
    fn write_transformation_is_applied() {
        let mut fx = Fixture::new();
        fx.write(&fx.dotpath().join("rev"), "cba\n");
        fx.write(&fx.home().join(".rev"), "xyz\n");
        let outcome = fx.run(&YES, UpdateOptions::default(), |u| u.update_key("f_rev"));
        assert!(matches!(outcome, UpdateOutcome::Updated), "{outcome:?}");
        assert_eq!(fs::read_to_string(fx.dotpath().join("rev")).unwrap(), "zyx\n");
    }

    #[test]
    fn read_transformation_is_used_for_identity_check() {
        let mut fx = Fixture::new();
        fx.write(&fx.dotpath().join("rev"), "cba\n");
        fx.write(&fx.home().join(".rev"), "abc\n");
        let outcome = fx.run(&YES, UpdateOptions::default(), |u| u.update_key("f_rev"));
        assert!(matches!(outcome, UpdateOutcome::Skipped(ref r) if r == "identical"));
    }

    #[test]
    fn absolute_destination_is_canonicalized() {
        let mut fx = Fixture::new();
        let abs = fx.home().join(".vimrc").display().to_string();
        assert!(fx.config.set_dotfile_destination("f_vimrc", &abs));
        fx.config.save().unwrap();
        fx.write(&fx.dotpath().join("vimrc"), "a\n");
        fx.write(&fx.home().join(".vimrc"), "b\n");
        let outcome = fx.run(&YES, UpdateOptions::default(), |u| u.update_key("f_vimrc"));
        assert!(matches!(outcome, UpdateOutcome::Updated));
        assert_eq!(fx.config.dotfile_entry("f_vimrc").unwrap().dst, "~/.vimrc");
        assert!(fx.config.is_dirty());
    }

    #[test]
    fn substitute_prefers_longest_value_and_skips_builtins() {
        let vars = Variables::new(BTreeMap::from([
            ("short".to_string(), "vim".to_string()),
            ("long".to_string(), "neovim".to_string()),
            ("empty".to_string(), String::new()),
            ("profile".to_string(), "home".to_string()),
            ("_dotdrop_dotpath".to_string(), "/repo".to_string()),
        ]));
        assert_eq!(
            substitute("neovim vim home /repo", &vars),
            "{{ long }} {{ short }} home /repo"
        );
    }
}
