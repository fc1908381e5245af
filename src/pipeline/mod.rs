//! Per-command sequencing of the engine over a profile's dotfiles.
//!
//! Per-dotfile failures are logged with the dotfile key, recorded for the
//! summary and never abort the siblings.
mod parallel;

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::actions::{ActionRunner, PreActions};
use crate::compare::Comparator;
use crate::config::{Action, ConfigStore, Dotfile, LinkMode, Settings};
use crate::error::InstallError;
use crate::exec::Executor;
use crate::ignore::IgnoreSet;
use crate::installer::{InstallOptions, InstallOutcome, Installer};
use crate::interrupt;
use crate::logging::{ItemStatus, Log, Logger};
use crate::paths::{is_same_file, lexists, strip_root};
use crate::prompt::{Confirm, Prompt};
use crate::templating::{RenderContext, Renderer, Variables, is_template_tree};
use crate::transform::Transformer;
use crate::update::{UpdateEnv, UpdateOptions, UpdateOutcome, Updater};

/// Shared state for running a command.
pub struct Context {
    /// Absolute dotpath.
    pub dotpath: PathBuf,
    /// Home directory used to expand `~`.
    pub home: PathBuf,
    /// `[config]` with command-line overrides applied.
    pub settings: Settings,
    /// Immutable variable base of the active profile.
    pub vars: Variables,
    /// Template engine.
    pub renderer: Arc<dyn Renderer>,
    /// Runs actions, transformations and the diff command.
    pub executor: Arc<dyn Executor>,
    /// Asks the user; see [`Context::confirm`].
    pub prompt: Arc<dyn Prompt>,
    /// Console, log file and summary.
    pub log: Arc<Logger>,
    /// Report instead of writing.
    pub dry_run: bool,
    /// Answer yes to every question.
    pub force: bool,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("dotpath", &self.dotpath)
            .field("home", &self.home)
            .field("settings", &self.settings)
            .field("vars", &self.vars)
            .field("renderer", &self.renderer)
            .field("executor", &self.executor)
            .field("prompt", &"<dyn Prompt>")
            .field("log", &self.log)
            .field("dry_run", &self.dry_run)
            .field("force", &self.force)
            .finish()
    }
}

impl Context {
    /// Confirmation policy from `safe` and `force`.
    #[must_use]
    pub fn confirm(&self) -> Confirm<'_> {
        Confirm::new(self.prompt.as_ref(), self.settings.safe, self.force)
    }

    /// Comparator using the configured diff command.
    #[must_use]
    pub fn comparator(&self) -> Comparator<'_> {
        Comparator::new(self.executor.as_ref(), &self.settings.diff_command)
    }

    /// Installer settings for this run.
    #[must_use]
    pub fn install_options(&self) -> InstallOptions {
        InstallOptions {
            create: self.settings.create,
            backup: self.settings.backup,
            backup_suffix: self.settings.backup_suffix.clone(),
            dry_run: self.dry_run,
            showdiff: self.settings.showdiff,
        }
    }

    /// Fresh rendering context for `dotfile`.
    #[must_use]
    pub fn render_context(&self, dotfile: &Dotfile) -> RenderContext {
        RenderContext::with_overlay(&self.vars, dotfile.overlay(&self.dotpath, &self.home))
    }

    fn runner<'a>(&'a self, log: &'a dyn Log) -> ActionRunner<'a> {
        ActionRunner::new(self.renderer.as_ref(), self.executor.as_ref(), log, self.dry_run)
    }

    fn transformer<'a>(&'a self, log: &'a dyn Log) -> Transformer<'a> {
        Transformer::new(self.renderer.as_ref(), self.executor.as_ref(), log)
    }
}

/// What `install` should do.
#[derive(Debug, Clone, Default)]
pub struct InstallPlan {
    /// Dotfiles to install, in order.
    pub dotfiles: Vec<Dotfile>,
    /// Pre-actions of every dotfile.
    pub default_pre: Vec<Action>,
    /// Post-actions of every dotfile.
    pub default_post: Vec<Action>,
    /// Run once before the first dotfile.
    pub profile_pre: Vec<Action>,
    /// Run once after the last dotfile.
    pub profile_post: Vec<Action>,
    /// Install under this directory instead of the real destinations; no
    /// action runs.
    pub temp_root: Option<PathBuf>,
    /// Run actions even for dotfiles that were not installed.
    pub force_actions: bool,
    /// Worker threads; 1 runs sequentially.
    pub workers: usize,
}

impl InstallPlan {
    const fn actions_enabled(&self) -> bool {
        self.temp_root.is_none()
    }
}

/// Aggregate of an install run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallStats {
    /// Dotfiles changed.
    pub installed: usize,
    /// Dotfiles already up to date or declined.
    pub skipped: usize,
    /// Keys of failed dotfiles, sorted.
    pub failed: Vec<String>,
}

impl InstallStats {
    fn collect(results: impl IntoIterator<Item = (String, InstallOutcome)>) -> Self {
        let mut stats = Self::default();
        for (key, outcome) in results {
            match outcome {
                InstallOutcome::Installed => stats.installed += 1,
                InstallOutcome::Skipped(_) => stats.skipped += 1,
                InstallOutcome::Failed(_) => stats.failed.push(key),
            }
        }
        stats.failed.sort();
        stats
    }
}

/// Install every dotfile of `plan`.
///
/// Profile pre-actions run once before the first dotfile; profile
/// post-actions run after the last one if anything was installed or
/// `force_actions` is set.
///
/// # Errors
///
/// Returns an error if a profile action fails, the worker pool cannot be
/// built, or the run is interrupted.
pub fn install_all(ctx: &Context, plan: &InstallPlan) -> Result<InstallStats> {
    let log: &dyn Log = ctx.log.as_ref();
    let base = RenderContext::new(&ctx.vars);
    if plan.actions_enabled() {
        ctx.runner(log)
            .run(&[], &plan.profile_pre, &base)
            .context("profile pre-actions failed")?;
    }

    let results = if plan.workers > 1 && plan.dotfiles.len() > 1 {
        parallel::install_parallel(ctx, plan)?
    } else {
        let mut results = Vec::with_capacity(plan.dotfiles.len());
        for dotfile in &plan.dotfiles {
            interrupt::check()?;
            results.push((dotfile.key.clone(), install_one(ctx, plan, dotfile, log)));
        }
        results
    };
    interrupt::check()?;

    let stats = InstallStats::collect(results);
    if plan.actions_enabled() && (stats.installed > 0 || plan.force_actions) {
        ctx.runner(log)
            .run(&[], &plan.profile_post, &base)
            .context("profile post-actions failed")?;
    }
    Ok(stats)
}

/// Destination of `dotfile` for this run.
fn target_of(ctx: &Context, plan: &InstallPlan, dotfile: &Dotfile) -> PathBuf {
    let dst = dotfile.abs_dst(&ctx.home);
    match &plan.temp_root {
        Some(root) => root.join(&dotfile.key).join(strip_root(&dst)),
        None => dst,
    }
}

/// Transform, install and run post-actions for one dotfile.
pub(crate) fn install_one(
    ctx: &Context,
    plan: &InstallPlan,
    dotfile: &Dotfile,
    log: &dyn Log,
) -> InstallOutcome {
    log.debug(&format!("installing {}", dotfile.key));
    let render_ctx = ctx.render_context(dotfile);
    let runner = ctx.runner(log);
    let (default_pre, own_pre, default_post, own_post) = if plan.actions_enabled() {
        (
            plan.default_pre.as_slice(),
            dotfile.pre_actions.as_slice(),
            plan.default_post.as_slice(),
            dotfile.post_actions.as_slice(),
        )
    } else {
        (&[][..], &[][..], &[][..], &[][..])
    };
    let pre = PreActions::new(runner, default_pre, own_pre, &render_ctx);

    let comparator = ctx.comparator();
    let installer = Installer::new(
        ctx.renderer.as_ref(),
        &comparator,
        ctx.confirm(),
        log,
        ctx.install_options(),
    );
    let src = dotfile.abs_src(&ctx.dotpath);
    let dst = target_of(ctx, plan, dotfile);

    let mut outcome = match dotfile.link {
        LinkMode::Link => {
            installer.link(&src, &dst, &pre, is_template_tree(ctx.renderer.as_ref(), &src))
        }
        LinkMode::LinkChildren => installer.link_children(
            &src,
            &dst,
            &pre,
            is_template_tree(ctx.renderer.as_ref(), &src),
        ),
        LinkMode::Nolink => {
            let transformed = match &dotfile.trans_read {
                Some(trans) => match ctx.transformer(log).apply(trans, &src, &render_ctx) {
                    Ok(t) => Some(t),
                    Err(e) => return report(log, dotfile, InstallOutcome::Failed(e.into()), ctx.dry_run),
                },
                None => None,
            };
            let source = transformed.as_ref().map_or(src.as_path(), |t| t.path());
            let ignore = IgnoreSet::new(&dotfile.instignore, &dst, &ctx.home);
            installer.install(
                &render_ctx,
                source,
                &dst,
                &pre,
                &ignore,
                is_template_tree(ctx.renderer.as_ref(), source),
                dotfile.noempty,
            )
        }
    };

    let run_post = match &outcome {
        InstallOutcome::Installed => true,
        InstallOutcome::Skipped(_) | InstallOutcome::Failed(_) => plan.force_actions,
    };
    if run_post && plan.actions_enabled() {
        let forced = !outcome.is_installed();
        if forced {
            log.debug(&format!("forcing actions of {}", dotfile.key));
        }
        let result = pre
            .fire()
            .and_then(|()| runner.run(default_post, own_post, &render_ctx));
        if let Err(e) = result {
            if forced {
                log.error(&format!("{}: {e}", dotfile.key));
            } else {
                outcome = InstallOutcome::Failed(InstallError::Action(e));
            }
        }
    }
    report(log, dotfile, outcome, ctx.dry_run)
}

fn report(log: &dyn Log, dotfile: &Dotfile, outcome: InstallOutcome, dry_run: bool) -> InstallOutcome {
    match &outcome {
        InstallOutcome::Installed if dry_run => log.record(&dotfile.key, ItemStatus::DryRun, None),
        InstallOutcome::Installed => log.record(&dotfile.key, ItemStatus::Ok, None),
        InstallOutcome::Skipped(reason) => {
            log.record(&dotfile.key, ItemStatus::Skipped, Some(reason));
        }
        InstallOutcome::Failed(e) => {
            log.error(&format!("installing \"{}\" failed: {e}", dotfile.key));
            log.record(&dotfile.key, ItemStatus::Failed, Some(&e.to_string()));
        }
    }
    outcome
}

/// Compare each dotfile's rendered source with its deployed state.
///
/// Each dotfile is staged in its own directory of one scratch root. Returns
/// `true` when everything is identical.
///
/// # Errors
///
/// Returns an error if the scratch directory cannot be created or the run
/// is interrupted.
pub fn compare_all(ctx: &Context, dotfiles: &[Dotfile], ignore: &[String], file_only: bool) -> Result<bool> {
    let log: &dyn Log = ctx.log.as_ref();
    let tmp = tempfile::Builder::new()
        .prefix("dotdrop-compare-")
        .tempdir()
        .context("creating compare scratch directory")?;
    let comparator = ctx.comparator();
    let installer = Installer::new(
        ctx.renderer.as_ref(),
        &comparator,
        ctx.confirm(),
        log,
        ctx.install_options(),
    );

    let mut same = true;
    for dotfile in dotfiles {
        interrupt::check()?;
        let dst = dotfile.abs_dst(&ctx.home);
        if !lexists(&dst) {
            log.info(&format!(
                "=> compare {}: \"{}\" does not exist on destination",
                dotfile.key, dotfile.dst
            ));
            same = false;
            continue;
        }
        let render_ctx = ctx.render_context(dotfile);
        let src = dotfile.abs_src(&ctx.dotpath);
        let transformed = match &dotfile.trans_read {
            Some(trans) => match ctx.transformer(log).apply(trans, &src, &render_ctx) {
                Ok(t) => Some(t),
                Err(e) => {
                    log.error(&format!("=> compare {}: {e}", dotfile.key));
                    same = false;
                    continue;
                }
            },
            None => None,
        };
        let source = transformed.as_ref().map_or(src.as_path(), |t| t.path());
        if is_same_file(source, &dst) {
            log.debug(&format!("=> compare {}: points to itself", dotfile.key));
            continue;
        }

        let template = is_template_tree(ctx.renderer.as_ref(), source);
        let stage_root = tmp.path().join(&dotfile.key);
        let staged = match installer.install_to_temp(&render_ctx, &stage_root, source, &dst, template) {
            Ok(staged) => staged,
            Err(e) => {
                log.error(&format!("=> compare {}: {e}", dotfile.key));
                same = false;
                continue;
            }
        };
        let patterns: Vec<&String> = dotfile.cmpignore.iter().chain(ignore).collect();
        let ignore_set = IgnoreSet::new(&patterns, &dst, &ctx.home);
        let diff = comparator.compare(&staged, &dst, &ignore_set);
        if diff.is_empty() {
            log.debug(&format!("=> compare {}: same file", dotfile.key));
            continue;
        }
        same = false;
        log.info(&format!(
            "=> compare {}: diffing with \"{}\"",
            dotfile.key, dotfile.dst
        ));
        log.raw(if file_only { "<files are different>" } else { &diff });
    }
    interrupt::check()?;
    Ok(same)
}

/// What `update` should fold back.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    /// Deployed paths, or dotfile keys with `by_key`.
    pub targets: Vec<String>,
    /// Targets are keys.
    pub by_key: bool,
    /// Updater settings.
    pub options: UpdateOptions,
}

/// Update every target; one failure does not stop the others.
///
/// Returns `true` when every target succeeded.
///
/// # Errors
///
/// Returns an error if the run is interrupted.
pub fn update_all(
    ctx: &Context,
    store: &mut dyn ConfigStore,
    profile_keys: &[String],
    request: &UpdateRequest,
) -> Result<bool> {
    let log: &dyn Log = ctx.log.as_ref();
    let comparator = ctx.comparator();
    let installer = Installer::new(
        ctx.renderer.as_ref(),
        &comparator,
        ctx.confirm(),
        log,
        ctx.install_options(),
    );
    let env = UpdateEnv {
        dotpath: &ctx.dotpath,
        home: &ctx.home,
        vars: &ctx.vars,
        renderer: ctx.renderer.as_ref(),
        transformer: ctx.transformer(log),
        installer: &installer,
        comparator: &comparator,
        confirm: ctx.confirm(),
        log,
    };
    let mut updater = Updater::new(store, profile_keys, env, request.options.clone());

    let mut ok = true;
    for target in &request.targets {
        interrupt::check()?;
        let outcome = if request.by_key {
            updater.update_key(target)
        } else {
            updater.update_path(target)
        };
        match &outcome {
            UpdateOutcome::Updated if ctx.dry_run => log.record(target, ItemStatus::DryRun, None),
            UpdateOutcome::Updated => log.record(target, ItemStatus::Ok, None),
            UpdateOutcome::Skipped(reason) => log.record(target, ItemStatus::Skipped, Some(reason)),
            UpdateOutcome::Failed(e) => {
                log.error(&format!("updating \"{target}\" failed: {e}"));
                log.record(target, ItemStatus::Failed, Some(&e.to_string()));
            }
        }
        ok &= outcome.is_success();
    }
    interrupt::check()?;
    Ok(ok)
}
