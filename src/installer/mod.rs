//! Materializes one dotfile at its destination.
//!
//! Every entry point returns an [`InstallOutcome`]; filesystem errors are
//! folded into [`InstallOutcome::Failed`] and never escape.
pub mod fs;
pub mod symlink;

use std::path::{Path, PathBuf};

use self::fs::{ensure_parent_dir, parent_exists, remove_existing, sorted_children, write_atomic};
use self::symlink::{create_symlink, link_target, points_to};
use crate::actions::PreActions;
use crate::compare::Comparator;
use crate::error::InstallError;
use crate::ignore::IgnoreSet;
use crate::logging::Log;
use crate::paths::{is_symlink, lexists, strip_root, with_suffix};
use crate::prompt::{Confirm, FixedAnswer};
use crate::templating::{RenderContext, Renderer};

/// Result of installing one dotfile.
#[derive(Debug)]
pub enum InstallOutcome {
    /// Written, linked, or (in dry-run) would have been.
    Installed,
    /// Nothing to do; the reason is shown in the summary.
    Skipped(String),
    /// The dotfile could not be installed.
    Failed(InstallError),
}

impl InstallOutcome {
    /// Whether the destination was (or would be) changed.
    #[must_use]
    pub const fn is_installed(&self) -> bool {
        matches!(self, Self::Installed)
    }

    fn from_result(result: Result<Self, InstallError>) -> Self {
        result.unwrap_or_else(Self::Failed)
    }
}

/// Installer settings taken from `[config]` and the command line.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Create missing parent directories of a destination.
    pub create: bool,
    /// Keep a copy of an overwritten destination.
    pub backup: bool,
    /// Suffix of backup copies.
    pub backup_suffix: String,
    /// Report instead of writing.
    pub dry_run: bool,
    /// Print a diff before overwriting.
    pub showdiff: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            create: true,
            backup: true,
            backup_suffix: crate::config::settings::DEFAULT_BACKUP_SUFFIX.to_string(),
            dry_run: false,
            showdiff: false,
        }
    }
}

const IDENTICAL: &str = "identical";
const DECLINED: &str = "user declined";

static YES: FixedAnswer = FixedAnswer(true);

/// Installs dotfiles by copy, symlink or per-child symlinks.
pub struct Installer<'a> {
    renderer: &'a dyn Renderer,
    comparator: &'a Comparator<'a>,
    confirm: Confirm<'a>,
    log: &'a dyn Log,
    opts: InstallOptions,
}

impl std::fmt::Debug for Installer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("confirm", &self.confirm)
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl<'a> Installer<'a> {
    /// Build an installer asking questions through `confirm`.
    #[must_use]
    pub const fn new(
        renderer: &'a dyn Renderer,
        comparator: &'a Comparator<'a>,
        confirm: Confirm<'a>,
        log: &'a dyn Log,
        opts: InstallOptions,
    ) -> Self {
        Self {
            renderer,
            comparator,
            confirm,
            log,
            opts,
        }
    }

    /// Render or copy `src` to `dst`.
    ///
    /// When `template` is set, files detected as templates are rendered with
    /// `ctx`; everything else is copied byte for byte. Directory sources are
    /// walked recursively, skipping whatever `ignore` matches.
    #[allow(clippy::too_many_arguments)]
    pub fn install(
        &self,
        ctx: &RenderContext,
        src: &Path,
        dst: &Path,
        pre: &PreActions<'_>,
        ignore: &IgnoreSet,
        template: bool,
        noempty: bool,
    ) -> InstallOutcome {
        InstallOutcome::from_result(self.try_install(ctx, src, dst, Some(pre), ignore, template, noempty))
    }

    /// Symlink `dst` to `src`.
    pub fn link(&self, src: &Path, dst: &Path, pre: &PreActions<'_>, template: bool) -> InstallOutcome {
        InstallOutcome::from_result(self.try_link(src, dst, pre, template))
    }

    /// Symlink every immediate child of directory `src` under `dst`.
    pub fn link_children(
        &self,
        src: &Path,
        dst: &Path,
        pre: &PreActions<'_>,
        template: bool,
    ) -> InstallOutcome {
        InstallOutcome::from_result(self.try_link_children(src, dst, pre, template))
    }

    /// Render `src` under `tmp_root` at the destination's path with its
    /// root stripped, without actions, backups, prompts or dry-run.
    ///
    /// Returns the staged path.
    ///
    /// # Errors
    ///
    /// Returns an [`InstallError`] if rendering or writing fails.
    pub fn install_to_temp(
        &self,
        ctx: &RenderContext,
        tmp_root: &Path,
        src: &Path,
        dst: &Path,
        template: bool,
    ) -> Result<PathBuf, InstallError> {
        let staged = tmp_root.join(strip_root(dst));
        let scratch = Installer::new(
            self.renderer,
            self.comparator,
            Confirm::new(&YES, false, true),
            self.log,
            InstallOptions {
                create: true,
                backup: false,
                dry_run: false,
                showdiff: false,
                ..self.opts.clone()
            },
        );
        match scratch.try_install(ctx, src, &staged, None, &IgnoreSet::default(), template, false)? {
            InstallOutcome::Failed(e) => Err(e),
            InstallOutcome::Installed | InstallOutcome::Skipped(_) => Ok(staged),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_install(
        &self,
        ctx: &RenderContext,
        src: &Path,
        dst: &Path,
        pre: Option<&PreActions<'_>>,
        ignore: &IgnoreSet,
        template: bool,
        noempty: bool,
    ) -> Result<InstallOutcome, InstallError> {
        if !lexists(src) {
            return Err(InstallError::SourceMissing(src.to_path_buf()));
        }
        if ignore.is_ignored(dst) {
            return Ok(InstallOutcome::Skipped("ignored".to_string()));
        }
        if src.is_dir() {
            let walk = DirWalk {
                ctx,
                root: src,
                pre,
                ignore,
                template,
                noempty,
            };
            return self.install_dir(&walk, src, dst, self.opts.create);
        }
        self.install_file(ctx, src, dst, pre, template, self.opts.create)
    }

    fn content_for(&self, ctx: &RenderContext, src: &Path, template: bool) -> Result<Vec<u8>, InstallError> {
        if template && self.renderer.is_template(src) {
            self.log.debug(&format!("rendering {}", src.display()));
            return Ok(self.renderer.render(src, ctx)?);
        }
        std::fs::read(src).map_err(|e| InstallError::io("read", src, e))
    }

    fn install_file(
        &self,
        ctx: &RenderContext,
        src: &Path,
        dst: &Path,
        pre: Option<&PreActions<'_>>,
        template: bool,
        create_parents: bool,
    ) -> Result<InstallOutcome, InstallError> {
        let content = self.content_for(ctx, src, template)?;
        let dst_is_link = is_symlink(dst);
        if dst.is_dir() && !dst_is_link {
            return Err(InstallError::DestinationIsDirectory(dst.to_path_buf()));
        }
        let exists = lexists(dst);
        if exists && !dst_is_link {
            let current = std::fs::read(dst).map_err(|e| InstallError::io("read", dst, e))?;
            if current == content {
                self.log.debug(&format!("{} is up to date", dst.display()));
                return Ok(InstallOutcome::Skipped(IDENTICAL.to_string()));
            }
            if self.opts.showdiff {
                self.show_diff(&content, dst)?;
            }
            if !self.confirm.ask(&format!("Overwrite \"{}\"", dst.display())) {
                return Ok(InstallOutcome::Skipped(DECLINED.to_string()));
            }
        }
        if !parent_exists(dst) && !create_parents && !self.opts.dry_run {
            return Err(InstallError::MissingParent(dst.to_path_buf()));
        }

        fire(pre)?;
        if self.opts.dry_run {
            self.log
                .dry_run(&format!("would install {} to {}", src.display(), dst.display()));
            return Ok(InstallOutcome::Installed);
        }
        ensure_parent_dir(dst).map_err(|e| InstallError::io("create parent of", dst, e))?;
        if exists {
            self.make_room(dst, !dst_is_link)?;
        }
        write_atomic(dst, &content, Some(src)).map_err(|e| InstallError::io("write", dst, e))?;
        self.log
            .debug(&format!("installed {} to {}", src.display(), dst.display()));
        Ok(InstallOutcome::Installed)
    }

    fn install_dir(
        &self,
        walk: &DirWalk<'_, '_>,
        src: &Path,
        dst: &Path,
        create_parents: bool,
    ) -> Result<InstallOutcome, InstallError> {
        let dst_is_link = is_symlink(dst);
        if lexists(dst) && !dst_is_link && !dst.is_dir() {
            return Err(InstallError::DestinationNotDirectory(dst.to_path_buf()));
        }
        if !parent_exists(dst) && !create_parents && !self.opts.dry_run {
            return Err(InstallError::MissingParent(dst.to_path_buf()));
        }
        if dst_is_link {
            if !self
                .confirm
                .ask(&format!("Replace symlink \"{}\" with a directory", dst.display()))
            {
                return Ok(InstallOutcome::Skipped(DECLINED.to_string()));
            }
            fire(walk.pre)?;
            if self.opts.dry_run {
                self.log
                    .dry_run(&format!("would replace symlink {}", dst.display()));
            } else {
                remove_existing(dst).map_err(|e| InstallError::io("remove", dst, e))?;
            }
        }

        let children: Vec<_> = sorted_children(src)
            .map_err(|e| InstallError::io("read", src, e))?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| !walk.ignore.is_ignored_under(walk.root, path))
            .collect();

        if children.is_empty() {
            if walk.noempty {
                return Ok(InstallOutcome::Skipped("empty directory".to_string()));
            }
            if dst.is_dir() {
                return Ok(InstallOutcome::Skipped(IDENTICAL.to_string()));
            }
            fire(walk.pre)?;
            if self.opts.dry_run {
                self.log
                    .dry_run(&format!("would create directory {}", dst.display()));
            } else {
                std::fs::create_dir_all(dst).map_err(|e| InstallError::io("create", dst, e))?;
            }
            return Ok(InstallOutcome::Installed);
        }

        let mut installed = dst_is_link;
        let mut skip_reason: Option<String> = None;
        for child in children {
            let Some(name) = child.file_name() else {
                continue;
            };
            let child_dst = dst.join(name);
            let outcome = if child.is_dir() {
                self.install_dir(walk, &child, &child_dst, true)?
            } else {
                self.install_file(walk.ctx, &child, &child_dst, walk.pre, walk.template, true)?
            };
            match outcome {
                InstallOutcome::Installed => installed = true,
                InstallOutcome::Skipped(reason) => {
                    if skip_reason.is_none() || reason != IDENTICAL {
                        skip_reason = Some(reason);
                    }
                }
                InstallOutcome::Failed(e) => return Err(e),
            }
        }
        if installed {
            return Ok(InstallOutcome::Installed);
        }
        Ok(InstallOutcome::Skipped(
            skip_reason.unwrap_or_else(|| IDENTICAL.to_string()),
        ))
    }

    fn try_link(
        &self,
        src: &Path,
        dst: &Path,
        pre: &PreActions<'_>,
        template: bool,
    ) -> Result<InstallOutcome, InstallError> {
        if !lexists(src) {
            return Err(InstallError::SourceMissing(src.to_path_buf()));
        }
        if template {
            return Err(InstallError::TemplateLink(src.to_path_buf()));
        }
        if points_to(dst, src) {
            return Ok(InstallOutcome::Skipped("already linked".to_string()));
        }
        let exists = lexists(dst);
        if exists
            && !self
                .confirm
                .ask(&format!("Remove \"{}\" for link creation", dst.display()))
        {
            return Ok(InstallOutcome::Skipped(DECLINED.to_string()));
        }
        if !parent_exists(dst) && !self.opts.create && !self.opts.dry_run {
            return Err(InstallError::MissingParent(dst.to_path_buf()));
        }

        pre.fire()?;
        if self.opts.dry_run {
            self.log
                .dry_run(&format!("would link {} to {}", dst.display(), src.display()));
            return Ok(InstallOutcome::Installed);
        }
        ensure_parent_dir(dst).map_err(|e| InstallError::io("create parent of", dst, e))?;
        if exists {
            self.make_room(dst, !is_symlink(dst))?;
        }
        create_symlink(src, dst).map_err(|e| InstallError::io("link", dst, e))?;
        self.log
            .debug(&format!("linked {} to {}", dst.display(), src.display()));
        Ok(InstallOutcome::Installed)
    }

    fn try_link_children(
        &self,
        src: &Path,
        dst: &Path,
        pre: &PreActions<'_>,
        template: bool,
    ) -> Result<InstallOutcome, InstallError> {
        if !src.is_dir() {
            return Err(InstallError::NotADirectory(src.to_path_buf()));
        }
        if template {
            return Err(InstallError::TemplateLink(src.to_path_buf()));
        }
        let mut changed = false;

        if is_symlink(dst) {
            if !self
                .confirm
                .ask(&format!("Replace symlink \"{}\" with a directory", dst.display()))
            {
                return Ok(InstallOutcome::Skipped(DECLINED.to_string()));
            }
            pre.fire()?;
            if self.opts.dry_run {
                self.log
                    .dry_run(&format!("would replace symlink {}", dst.display()));
            } else {
                remove_existing(dst).map_err(|e| InstallError::io("remove", dst, e))?;
            }
            changed = true;
        } else if lexists(dst) && !dst.is_dir() {
            return Err(InstallError::DestinationNotDirectory(dst.to_path_buf()));
        }

        if !self.opts.dry_run && !dst.is_dir() {
            if !parent_exists(dst) && !self.opts.create {
                return Err(InstallError::MissingParent(dst.to_path_buf()));
            }
            pre.fire()?;
            std::fs::create_dir_all(dst).map_err(|e| InstallError::io("create", dst, e))?;
            changed = true;
        }

        for entry in sorted_children(src).map_err(|e| InstallError::io("read", src, e))? {
            let child = entry.path();
            let child_dst = dst.join(entry.file_name());
            if points_to(&child_dst, &child) {
                continue;
            }
            if lexists(&child_dst)
                && !self
                    .confirm
                    .ask(&format!("Remove \"{}\" for link creation", child_dst.display()))
            {
                continue;
            }
            pre.fire()?;
            changed = true;
            if self.opts.dry_run {
                self.log.dry_run(&format!(
                    "would link {} to {}",
                    child_dst.display(),
                    child.display()
                ));
                continue;
            }
            if lexists(&child_dst) {
                self.make_room(&child_dst, !is_symlink(&child_dst))?;
            }
            create_symlink(&child, &child_dst).map_err(|e| InstallError::io("link", &child_dst, e))?;
            self.log
                .debug(&format!("linked {} to {}", child_dst.display(), child.display()));
        }

        if dst.is_dir() && self.remove_stale_links(src, dst, pre)? {
            changed = true;
        }

        if changed {
            Ok(InstallOutcome::Installed)
        } else {
            Ok(InstallOutcome::Skipped("already linked".to_string()))
        }
    }

    /// Remove links under `dst` that point at children of `src` which no
    /// longer exist.
    fn remove_stale_links(&self, src: &Path, dst: &Path, pre: &PreActions<'_>) -> Result<bool, InstallError> {
        let mut removed = false;
        for entry in sorted_children(dst).map_err(|e| InstallError::io("read", dst, e))? {
            let path = entry.path();
            let Some(target) = link_target(&path) else {
                continue;
            };
            if target.parent() != Some(src) || lexists(&target) {
                continue;
            }
            pre.fire()?;
            removed = true;
            if self.opts.dry_run {
                self.log
                    .dry_run(&format!("would remove stale link {}", path.display()));
                continue;
            }
            remove_existing(&path).map_err(|e| InstallError::io("remove", &path, e))?;
            self.log.info(&format!("removed stale link {}", path.display()));
        }
        Ok(removed)
    }

    /// Move an existing destination aside (backup) or delete it.
    fn make_room(&self, dst: &Path, may_backup: bool) -> Result<(), InstallError> {
        if self.opts.backup && may_backup {
            let backup = with_suffix(dst, &self.opts.backup_suffix);
            remove_existing(&backup).map_err(|e| InstallError::io("remove", &backup, e))?;
            std::fs::rename(dst, &backup).map_err(|e| InstallError::io("back up", dst, e))?;
            self.log
                .info(&format!("backed up {} to {}", dst.display(), backup.display()));
            return Ok(());
        }
        remove_existing(dst).map_err(|e| InstallError::io("remove", dst, e))
    }

    fn show_diff(&self, content: &[u8], dst: &Path) -> Result<(), InstallError> {
        let dir = tempfile::tempdir().map_err(|e| InstallError::io("create temp dir for", dst, e))?;
        let rendered = dir
            .path()
            .join(dst.file_name().unwrap_or_else(|| std::ffi::OsStr::new("rendered")));
        std::fs::write(&rendered, content).map_err(|e| InstallError::io("write", &rendered, e))?;
        let diff = self
            .comparator
            .compare(dst, &rendered, &IgnoreSet::default());
        if !diff.is_empty() {
            self.log.raw(&diff);
        }
        Ok(())
    }
}

/// Parameters constant across one directory walk.
struct DirWalk<'c, 'p> {
    ctx: &'c RenderContext,
    root: &'c Path,
    pre: Option<&'c PreActions<'p>>,
    ignore: &'c IgnoreSet,
    template: bool,
    noempty: bool,
}

fn fire(pre: Option<&PreActions<'_>>) -> Result<(), InstallError> {
    if let Some(pre) = pre {
        pre.fire()?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::actions::ActionRunner;
    use crate::config::{Action, ActionKind};
    use crate::config::settings::DEFAULT_DIFF_COMMAND;
    use crate::exec::{RecordingExecutor, SystemExecutor};
    use crate::logging::CapturedLog;
    use crate::prompt::MockPrompt;
    use crate::templating::{JinjaRenderer, Variables};
    use std::collections::BTreeMap;
    use std::fs;

    struct Fixture {
        dir: tempfile::TempDir,
        renderer: JinjaRenderer,
        exec: RecordingExecutor,
        log: CapturedLog,
        ctx: RenderContext,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                renderer: JinjaRenderer::new(),
                exec: RecordingExecutor::default(),
                log: CapturedLog::default(),
                ctx: RenderContext::new(&Variables::new(BTreeMap::from([(
                    "editor".to_string(),
                    "vim".to_string(),
                )]))),
            }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        fn write(&self, rel: &str, content: &str) -> PathBuf {
            let p = self.path(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(&p, content).unwrap();
            p
        }

        fn runner(&self) -> ActionRunner<'_> {
            ActionRunner::new(&self.renderer, &self.exec, &self.log, false)
        }
    }

    fn pre_action() -> Vec<Action> {
        vec![Action {
            key: "mk".to_string(),
            command: "mkcache".to_string(),
            kind: ActionKind::Pre,
            args: Vec::new(),
        }]
    }

    fn with_installer<R>(
        fx: &Fixture,
        prompt: &dyn crate::prompt::Prompt,
        safe: bool,
        opts: InstallOptions,
        f: impl FnOnce(&Installer<'_>) -> R,
    ) -> R {
        let comparator = Comparator::new(&SystemExecutor, DEFAULT_DIFF_COMMAND);
        let installer = Installer::new(
            &fx.renderer,
            &comparator,
            Confirm::new(prompt, safe, false),
            &fx.log,
            opts,
        );
        f(&installer)
    }

    fn install_default(fx: &Fixture, src: &Path, dst: &Path, actions: &[Action]) -> InstallOutcome {
        let pre = PreActions::new(fx.runner(), &[], actions, &fx.ctx);
        with_installer(fx, &YES, false, InstallOptions::default(), |i| {
            i.install(&fx.ctx, src, dst, &pre, &IgnoreSet::default(), true, false)
        })
    }

    #[test]
    fn template_is_rendered_and_second_install_is_identical() {
        let fx = Fixture::new();
        let src = fx.write("dotpath/vimrc", "set editor={{ editor }}\n");
        let dst = fx.path("home/.vimrc");

        let first = install_default(&fx, &src, &dst, &pre_action());
        assert!(first.is_installed(), "{first:?}");
        assert_eq!(fs::read_to_string(&dst).unwrap(), "set editor=vim\n");

        let second = install_default(&fx, &src, &dst, &pre_action());
        assert!(matches!(second, InstallOutcome::Skipped(ref r) if r == IDENTICAL));
        assert!(!with_suffix(&dst, ".dotdropbak").exists());
        assert_eq!(fx.exec.calls(), vec!["mkcache"], "pre-action must run only for the write");
    }

    #[test]
    fn overwrite_takes_backup() {
        let fx = Fixture::new();
        let src = fx.write("dotpath/vimrc", "new\n");
        let dst = fx.write("home/.vimrc", "old\n");
        assert!(install_default(&fx, &src, &dst, &[]).is_installed());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "new\n");
        assert_eq!(
            fs::read_to_string(with_suffix(&dst, ".dotdropbak")).unwrap(),
            "old\n"
        );
    }

    #[test]
    fn safe_mode_decline_is_skip_without_actions() {
        let fx = Fixture::new();
        let src = fx.write("dotpath/vimrc", "new\n");
        let dst = fx.write("home/.vimrc", "old\n");
        let mut prompt = MockPrompt::new();
        prompt.expect_confirm().times(1).return_const(false);
        let actions = pre_action();
        let pre = PreActions::new(fx.runner(), &[], &actions, &fx.ctx);
        let outcome = with_installer(&fx, &prompt, true, InstallOptions::default(), |i| {
            i.install(&fx.ctx, &src, &dst, &pre, &IgnoreSet::default(), true, false)
        });
        assert!(matches!(outcome, InstallOutcome::Skipped(ref r) if r == DECLINED));
        assert_eq!(fs::read_to_string(&dst).unwrap(), "old\n");
        assert!(fx.exec.calls().is_empty());
    }

    #[test]
    fn missing_parent_without_create_fails() {
        let fx = Fixture::new();
        let src = fx.write("dotpath/conf", "x");
        let dst = fx.path("home/missing/conf");
        let pre = PreActions::new(fx.runner(), &[], &[], &fx.ctx);
        let opts = InstallOptions {
            create: false,
            ..InstallOptions::default()
        };
        let outcome = with_installer(&fx, &YES, false, opts, |i| {
            i.install(&fx.ctx, &src, &dst, &pre, &IgnoreSet::default(), true, false)
        });
        assert!(matches!(
            outcome,
            InstallOutcome::Failed(InstallError::MissingParent(_))
        ));
    }

    #[test]
    fn failing_pre_action_aborts_before_write() {
        let mut fx = Fixture::new();
        fx.exec = RecordingExecutor::failing_on("mkcache");
        let src = fx.write("dotpath/vimrc", "x");
        let dst = fx.path("home/.vimrc");
        let outcome = install_default(&fx, &src, &dst, &pre_action());
        assert!(matches!(outcome, InstallOutcome::Failed(InstallError::Action(_))));
        assert!(!dst.exists());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let fx = Fixture::new();
        let src = fx.write("dotpath/vimrc", "x");
        let dst = fx.path("home/.vimrc");
        let pre = PreActions::new(fx.runner(), &[], &[], &fx.ctx);
        let opts = InstallOptions {
            dry_run: true,
            ..InstallOptions::default()
        };
        let outcome = with_installer(&fx, &YES, false, opts, |i| {
            i.install(&fx.ctx, &src, &dst, &pre, &IgnoreSet::default(), true, false)
        });
        assert!(outcome.is_installed());
        assert!(!dst.exists());
        assert!(fx.log.contains("would install"));
    }

    #[test]
    fn directory_install_honours_ignore_and_keeps_binary() {
        let fx = Fixture::new();
        fx.write("dotpath/vim/vimrc", "{{ editor }}");
        fx.write("dotpath/vim/undo/file", "x");
        fs::write(fx.path("dotpath/vim/blob"), b"\x00{{ editor }}").unwrap();
        let dst = fx.path("home/.vim");
        let ignore = IgnoreSet::new(&["undo"], &dst, &fx.path("home"));
        let pre = PreActions::new(fx.runner(), &[], &[], &fx.ctx);
        let outcome = with_installer(&fx, &YES, false, InstallOptions::default(), |i| {
            i.install(&fx.ctx, &fx.path("dotpath/vim"), &dst, &pre, &ignore, true, false)
        });
        assert!(outcome.is_installed(), "{outcome:?}");
        assert_eq!(fs::read_to_string(dst.join("vimrc")).unwrap(), "vim");
        assert_eq!(fs::read(dst.join("blob")).unwrap(), b"\x00{{ editor }}");
        assert!(!dst.join("undo").exists());
    }

    #[test]
    fn noempty_skips_empty_directories() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.path("dotpath/empty")).unwrap();
        let dst = fx.path("home/empty");
        let pre = PreActions::new(fx.runner(), &[], &[], &fx.ctx);
        let outcome = with_installer(&fx, &YES, false, InstallOptions::default(), |i| {
            i.install(&fx.ctx, &fx.path("dotpath/empty"), &dst, &pre, &IgnoreSet::default(), true, true)
        });
        assert!(matches!(outcome, InstallOutcome::Skipped(_)));
        assert!(!dst.exists());
    }

    #[test]
    fn symlinked_destination_is_replaced_without_backup() {
        let fx = Fixture::new();
        let src = fx.write("dotpath/vimrc", "x");
        let other = fx.write("elsewhere", "x");
        let dst = fx.path("home/.vimrc");
        fs::create_dir_all(dst.parent().unwrap()).unwrap();
        create_symlink(&other, &dst).unwrap();
        assert!(install_default(&fx, &src, &dst, &[]).is_installed());
        assert!(!is_symlink(&dst));
        assert!(!with_suffix(&dst, ".dotdropbak").exists());
        assert_eq!(fs::read_to_string(&other).unwrap(), "x");
    }

    #[test]
    fn link_creates_and_detects_existing_link() {
        let fx = Fixture::new();
        let src = fx.write("dotpath/vimrc", "x");
        let dst = fx.path("home/.vimrc");
        let pre = PreActions::new(fx.runner(), &[], &[], &fx.ctx);
        with_installer(&fx, &YES, false, InstallOptions::default(), |i| {
            assert!(i.link(&src, &dst, &pre, false).is_installed());
            assert!(points_to(&dst, &src));
            assert!(matches!(i.link(&src, &dst, &pre, false), InstallOutcome::Skipped(_)));
        });
    }

    #[test]
    fn link_rejects_templates() {
        let fx = Fixture::new();
        let src = fx.write("dotpath/vimrc", "{{ editor }}");
        let pre = PreActions::new(fx.runner(), &[], &[], &fx.ctx);
        let outcome = with_installer(&fx, &YES, false, InstallOptions::default(), |i| {
            i.link(&src, &fx.path("home/.vimrc"), &pre, true)
        });
        assert!(matches!(
            outcome,
            InstallOutcome::Failed(InstallError::TemplateLink(_))
        ));
    }

    #[test]
    fn link_children_links_each_child_and_removes_stale_links() {
        let fx = Fixture::new();
        let a = fx.write("dotpath/config/a", "a");
        let b = fx.write("dotpath/config/b", "b");
        let src = fx.path("dotpath/config");
        let dst = fx.path("home/.config");
        let pre = PreActions::new(fx.runner(), &[], &[], &fx.ctx);
        with_installer(&fx, &YES, false, InstallOptions::default(), |i| {
            assert!(i.link_children(&src, &dst, &pre, false).is_installed());
            assert!(points_to(&dst.join("a"), &a));
            assert!(points_to(&dst.join("b"), &b));
            assert!(!is_symlink(&dst));

            fs::remove_file(&b).unwrap();
            assert!(i.link_children(&src, &dst, &pre, false).is_installed());
            assert!(!lexists(&dst.join("b")));
            assert!(points_to(&dst.join("a"), &a));

            assert!(matches!(
                i.link_children(&src, &dst, &pre, false),
                InstallOutcome::Skipped(_)
            ));
        });
    }

    #[test]
    fn link_children_requires_directory() {
        let fx = Fixture::new();
        let src = fx.write("dotpath/file", "x");
        let pre = PreActions::new(fx.runner(), &[], &[], &fx.ctx);
        let outcome = with_installer(&fx, &YES, false, InstallOptions::default(), |i| {
            i.link_children(&src, &fx.path("home/x"), &pre, false)
        });
        assert!(matches!(
            outcome,
            InstallOutcome::Failed(InstallError::NotADirectory(_))
        ));
    }

    #[test]
    fn install_to_temp_stages_under_stripped_destination() {
        let fx = Fixture::new();
        let src = fx.write("dotpath/vimrc", "{{ editor }}");
        let tmp = tempfile::tempdir().unwrap();
        let dst = Path::new("/home/u/.vimrc");
        let staged = with_installer(&fx, &YES, true, InstallOptions::default(), |i| {
            i.install_to_temp(&fx.ctx, tmp.path(), &src, dst, true)
        })
        .unwrap();
        assert_eq!(staged, tmp.path().join("home/u/.vimrc"));
        assert_eq!(fs::read_to_string(staged).unwrap(), "vim");
    }
}
