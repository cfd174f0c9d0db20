//! Automatic expiration insertion.
//!
//! Expiration actions are never appended by hand: the scheduler calls
//! [`Branch::add_expiration_if_expired`] per branch (through [`expire_all`])
//! and the branch gains an EXPIRATION or APPEAL_EXPIRATION dated today once
//! its tail's deadline has lapsed.

use anyhow::Result;
use serde::Serialize;

use super::WorkflowContext;
use crate::db::query::{self, BranchFilter, BranchOrder};
use crate::db::{Store, records};
use crate::model::action::{Action, ActionType, NewAction};
use crate::model::branch::Branch;

/// The expiration `last` calls for today, if any.
#[must_use]
pub fn expiration_for(last: &Action, ctx: &WorkflowContext<'_>) -> Option<ActionType> {
    if !last.deadline_expired(ctx) {
        return None;
    }
    match last.action_type {
        ActionType::Request
        | ActionType::ClarificationResponse
        | ActionType::Confirmation
        | ActionType::Extension
        | ActionType::Remandment
        | ActionType::AdvancedRequest => Some(ActionType::Expiration),
        ActionType::Appeal => Some(ActionType::AppealExpiration),
        _ => None,
    }
}

impl Branch {
    /// Append the expiration the branch tail calls for, if any.
    ///
    /// The tail is re-read inside one `BEGIN IMMEDIATE` transaction, so
    /// concurrent schedulers cannot both insert. Calling again without a new
    /// action is a no-op, since expirations themselves never expire into
    /// another expiration.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or the insert fails.
    pub fn add_expiration_if_expired(
        &mut self,
        store: &Store,
        ctx: &WorkflowContext<'_>,
    ) -> Result<Option<Action>> {
        let branch_id = self.branch_id;
        let inserted = store.immediate(|| {
            let Some(last) = query::load_last_action(store, branch_id)? else {
                return Ok(None);
            };
            let Some(action_type) = expiration_for(&last, ctx) else {
                return Ok(None);
            };
            let action = records::insert_action(
                store,
                branch_id,
                &NewAction::new(action_type, ctx.today()),
                ctx.now_us(),
            )?;
            Ok(Some(action))
        })?;

        if let Some(action) = &inserted {
            self.record_appended(action);
            tracing::info!(
                branch_id,
                action_id = action.action_id,
                action_type = %action.action_type,
                effective_date = %action.effective_date,
                "inserted expiration"
            );
        }
        Ok(inserted)
    }
}

/// Outcome of one sweep over all branches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub expirations: usize,
    pub appeal_expirations: usize,
    pub failed: usize,
    pub swept_at_us: i64,
}

/// Run [`Branch::add_expiration_if_expired`] on every branch whose tail is
/// due, and record the sweep time.
///
/// Tails of all branches are read in one query, binding no ids, to pick
/// candidates; each candidate is then re-checked inside its own
/// transaction. A failing branch is logged and counted, and the sweep
/// continues.
///
/// # Errors
///
/// Returns an error if listing branches, reading their tails, or recording the
/// sweep fails.
pub fn expire_all(store: &Store, ctx: &WorkflowContext<'_>) -> Result<SweepReport> {
    let filter = BranchFilter {
        order: Some(BranchOrder::Pk { reverse: false }),
        ..BranchFilter::default()
    };
    let mut branches = query::list_branches(store, &filter)?;
    let mut tails = query::load_all_last_actions(store)?;
    for branch in &mut branches {
        branch.set_last_action(tails.remove(&branch.branch_id));
    }

    let mut report = SweepReport {
        checked: branches.len(),
        ..SweepReport::default()
    };

    for branch in &mut branches {
        let due = branch
            .last_action(store)?
            .is_some_and(|last| expiration_for(last, ctx).is_some());
        if !due {
            continue;
        }

        match branch.add_expiration_if_expired(store, ctx) {
            Ok(Some(action)) if action.action_type == ActionType::AppealExpiration => {
                report.appeal_expirations += 1;
            }
            Ok(Some(_)) => report.expirations += 1,
            Ok(None) => {}
            Err(err) => {
                report.failed += 1;
                tracing::warn!(branch_id = branch.branch_id, error = %err, "expiration failed");
            }
        }
    }

    report.swept_at_us = ctx.now_us();
    records::record_sweep(store, report.swept_at_us)?;
    tracing::info!(
        checked = report.checked,
        expirations = report.expirations,
        appeal_expirations = report.appeal_expirations,
        failed = report.failed,
        "expiration sweep finished"
    );
    Ok(report)
}
