//! `ir branch` — inspect one conversation thread.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::Write;

use super::Session;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};
use inforequests_core::model::obligee::format_addresses;
use inforequests_core::model::{Action, Addressee, Branch};
use inforequests_core::workflow::CapabilitySet;

#[derive(Subcommand, Debug)]
pub enum BranchCommand {
    /// Show actions, deadlines, open capabilities, and obligee addresses.
    Show(BranchShowArgs),
}

#[derive(Args, Debug)]
pub struct BranchShowArgs {
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct ActionLine {
    #[serde(flatten)]
    action: Action,
    deadline_date: Option<NaiveDate>,
    deadline_remaining: Option<i64>,
}

#[derive(Debug, Serialize)]
struct BranchView {
    #[serde(flatten)]
    branch: Branch,
    main: bool,
    obligee_name: String,
    actions: Vec<ActionLine>,
    capabilities: CapabilitySet,
    emails: Vec<Addressee>,
}

/// Execute an `ir branch` subcommand.
///
/// # Errors
///
/// Returns [`inforequests_core::error::WorkflowError::BranchNotFound`] for
/// an unknown id, or a store error.
pub fn run_branch(command: &BranchCommand, session: &Session, output: OutputMode) -> Result<()> {
    let BranchCommand::Show(args) = command;
    let store = &session.store;
    let ctx = session.ctx();

    let mut branch = session.branch(args.id)?;
    let obligee_name = branch.snapshot(store)?.name;
    let actions: Vec<ActionLine> = branch
        .actions(store)?
        .iter()
        .map(|action| ActionLine {
            deadline_date: action.deadline_date(ctx.deadlines),
            deadline_remaining: action.deadline_remaining(&ctx),
            action: action.clone(),
        })
        .collect();
    let capabilities = branch.capabilities(store, &ctx)?;
    let mut emails: Vec<Addressee> = branch.collect_obligee_emails(store)?.into_iter().collect();
    emails.sort();

    let view = BranchView {
        main: branch.is_main(),
        branch,
        obligee_name,
        actions,
        capabilities,
        emails,
    };
    render(output, &view, |v, w| {
        pretty_section(w, &format!("Branch {}", v.branch.branch_id))?;
        pretty_kv(w, "inforequest", v.branch.inforequest_id.to_string())?;
        pretty_kv(w, "obligee", &v.obligee_name)?;
        if let Some(advanced_by) = v.branch.advanced_by_id {
            pretty_kv(w, "advanced by", format!("action {advanced_by}"))?;
        }
        writeln!(w, "actions:")?;
        for line in &v.actions {
            let deadline = match (line.deadline_date, line.deadline_remaining) {
                (Some(date), Some(left)) if left < 0 => format!("expired {date}"),
                (Some(date), Some(left)) => format!("due {date} ({left} days left)"),
                _ => String::new(),
            };
            writeln!(
                w,
                "  {:>3}. {}  {:<22} {}",
                line.action.position, line.action.effective_date, line.action.action_type, deadline
            )?;
        }
        pretty_kv(w, "can add", v.capabilities.to_string())?;
        pretty_kv(w, "emails", format_addresses(&v.emails))
    })
}
