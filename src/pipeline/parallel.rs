//! Rayon-based parallel dotfile installation.

use anyhow::{Context as _, Result};
use std::sync::{Arc, mpsc};

use super::{Context, InstallPlan, install_one};
use crate::installer::InstallOutcome;
use crate::interrupt;
use crate::logging::BufferedLog;

/// Install the dotfiles of `plan` on `plan.workers` threads.
///
/// Each worker logs into its own [`BufferedLog`], replayed in one piece once
/// the dotfile is done, so output of concurrent dotfiles never interleaves.
/// Results are returned in completion order.
pub(super) fn install_parallel(ctx: &Context, plan: &InstallPlan) -> Result<Vec<(String, InstallOutcome)>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(plan.workers)
        .thread_name(|i| format!("dotdrop-worker-{i}"))
        .build()
        .context("building install worker pool")?;

    let (tx, rx) = mpsc::channel();
    pool.scope(|s| {
        for dotfile in &plan.dotfiles {
            let tx = tx.clone();
            s.spawn(move |_| {
                if interrupt::interrupted() {
                    return;
                }
                ctx.log.notify_item_start(&dotfile.key);
                let buf = BufferedLog::new(Arc::clone(&ctx.log));
                let outcome = install_one(ctx, plan, dotfile, &buf);
                buf.flush_and_complete(&dotfile.key);
                // the receiver outlives the scope
                let _ = tx.send((dotfile.key.clone(), outcome));
            });
        }
    });
    drop(tx);

    interrupt::check()?;
    Ok(rx.into_iter().collect())
}
