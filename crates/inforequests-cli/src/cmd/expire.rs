//! `ir expire` — append EXPIRATION / APPEAL_EXPIRATION to overdue branches.
//!
//! Meant to run daily from cron. Concurrent sweeps are serialized through
//! an advisory lock file in the data directory.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use super::Session;
use crate::output::{OutputMode, pretty_kv, render};
use inforequests_core::lock::{SWEEP_LOCK_FILE, SweepLock};
use inforequests_core::model::Action;
use inforequests_core::workflow::expiration::expire_all;

#[derive(Args, Debug)]
pub struct ExpireArgs {
    /// Only check this branch.
    #[arg(long)]
    pub branch: Option<i64>,
}

#[derive(Debug, Serialize)]
struct BranchExpiry {
    branch_id: i64,
    added: Option<Action>,
}

/// Execute `ir expire`.
///
/// # Errors
///
/// Returns a lock error when another sweep holds the lock past the
/// configured timeout, or a store error.
pub fn run_expire(args: &ExpireArgs, session: &Session, output: OutputMode) -> Result<()> {
    let lock = SweepLock::acquire(
        &session.data_dir.join(SWEEP_LOCK_FILE),
        Duration::from_secs(session.config.scheduler.lock_timeout_secs),
    )?;
    let ctx = session.ctx();

    if let Some(branch_id) = args.branch {
        let mut branch = session.branch(branch_id)?;
        let added = branch.add_expiration_if_expired(&session.store, &ctx)?;
        lock.release();

        let expiry = BranchExpiry { branch_id, added };
        return render(output, &expiry, |e, w| match &e.added {
            Some(action) => writeln!(
                w,
                "✓ Added {} to branch {} ({})",
                action.action_type, e.branch_id, action.effective_date
            ),
            None => writeln!(w, "Branch {} is not overdue", e.branch_id),
        });
    }

    let report = expire_all(&session.store, &ctx)?;
    lock.release();

    render(output, &report, |r, w| {
        writeln!(w, "✓ Sweep finished")?;
        pretty_kv(w, "checked", r.checked.to_string())?;
        pretty_kv(w, "expirations", r.expirations.to_string())?;
        pretty_kv(w, "appeal exp.", r.appeal_expirations.to_string())?;
        pretty_kv(w, "failed", r.failed.to_string())
    })
}
