//! `ir action` — record what happened on a branch.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use std::io::Write;

use super::Session;
use super::advance::advance_branch;
use crate::output::{OutputMode, render};
use inforequests_core::model::{ActionType, DisclosureLevel, NewAction};
use inforequests_core::workflow::Advancement;

#[derive(Subcommand, Debug)]
pub enum ActionCommand {
    /// Append an action to a branch.
    Add(ActionAddArgs),
}

#[derive(Args, Debug)]
pub struct ActionAddArgs {
    pub branch: i64,

    /// Action type, e.g. confirmation, disclosure, appeal.
    #[arg(long = "type")]
    pub action_type: String,

    /// Effective date (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long, default_value = "")]
    pub subject: String,

    #[arg(long, default_value = "")]
    pub content: String,

    /// none, partial or full; disclosures only.
    #[arg(long)]
    pub disclosure_level: Option<String>,

    /// Override the configured deadline in days.
    #[arg(long)]
    pub deadline: Option<u32>,

    /// Days an extension grants.
    #[arg(long)]
    pub extension: Option<u32>,

    /// Target obligees of an advancement (repeatable).
    #[arg(long = "to")]
    pub to: Vec<i64>,
}

/// Execute an `ir action` subcommand.
///
/// Type and level are parsed here rather than by clap so that bad values
/// surface with their error code.
///
/// # Errors
///
/// Returns a parse error for unknown type or level values, or the errors
/// of [`inforequests_core::model::Branch::append_action`].
pub fn run_action(command: &ActionCommand, session: &Session, output: OutputMode) -> Result<()> {
    let ActionCommand::Add(args) = command;

    let action_type: ActionType = args.action_type.parse()?;
    let disclosure_level = args
        .disclosure_level
        .as_deref()
        .map(str::parse::<DisclosureLevel>)
        .transpose()?;
    let effective_date = args.date.unwrap_or_else(|| session.ctx().today());

    if action_type == ActionType::Advancement {
        let mut advancement = Advancement::new(effective_date, args.to.iter().copied());
        advancement.subject.clone_from(&args.subject);
        advancement.content.clone_from(&args.content);
        advancement.deadline_days = args.deadline;
        return advance_branch(session, args.branch, &advancement, output);
    }

    let new = NewAction {
        action_type,
        subject: args.subject.clone(),
        content: args.content.clone(),
        effective_date,
        deadline_days: args.deadline,
        extension_days: args.extension,
        disclosure_level,
        message_id: None,
    };

    let ctx = session.ctx();
    let mut branch = session.branch(args.branch)?;
    let action = branch.append_action(&session.store, &ctx, &new)?;
    render(output, &action, |a, w| {
        writeln!(
            w,
            "✓ Added {} #{} to branch {} ({})",
            a.action_type, a.position, a.branch_id, a.effective_date
        )
    })
}
