//! `ir advance` — forward a request to other obligees.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use std::io::Write;

use super::Session;
use crate::output::{OutputMode, render};
use inforequests_core::model::{Action, Branch};
use inforequests_core::workflow::Advancement;

#[derive(Args, Debug)]
pub struct AdvanceArgs {
    /// Branch the obligee advanced from.
    pub branch: i64,

    /// Obligees the request was advanced to (repeatable).
    #[arg(long = "to", required = true, num_args = 1..)]
    pub to: Vec<i64>,

    /// Effective date (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long, default_value = "")]
    pub subject: String,

    #[arg(long, default_value = "")]
    pub content: String,

    /// Override the configured deadline in days.
    #[arg(long)]
    pub deadline: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Advanced {
    action: Action,
    branches: Vec<Branch>,
}

/// Append the advancement and print it with the spawned branches.
pub(crate) fn advance_branch(
    session: &Session,
    branch_id: i64,
    advancement: &Advancement,
    output: OutputMode,
) -> Result<()> {
    let ctx = session.ctx();
    let mut branch = session.branch(branch_id)?;
    let (action, branches) = branch.advance(&session.store, &ctx, advancement)?;

    let advanced = Advanced { action, branches };
    render(output, &advanced, |a, w| {
        writeln!(
            w,
            "✓ Advanced branch {} on {} (action {})",
            a.action.branch_id, a.action.effective_date, a.action.action_id
        )?;
        for child in &a.branches {
            writeln!(
                w,
                "  → branch {} for obligee {}",
                child.branch_id, child.obligee_id
            )?;
        }
        Ok(())
    })
}

/// Execute `ir advance`.
///
/// # Errors
///
/// Returns [`inforequests_core::error::WorkflowError::BranchNotFound`] for
/// an unknown branch, or the errors of
/// [`inforequests_core::model::Branch::advance`].
pub fn run_advance(args: &AdvanceArgs, session: &Session, output: OutputMode) -> Result<()> {
    let mut advancement = Advancement::new(
        args.date.unwrap_or_else(|| session.ctx().today()),
        args.to.iter().copied(),
    );
    advancement.subject.clone_from(&args.subject);
    advancement.content.clone_from(&args.content);
    advancement.deadline_days = args.deadline;
    advance_branch(session, args.branch, &advancement, output)
}
