//! `ir inforequest` — open and inspect inforequests.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::Write;

use super::Session;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};
use inforequests_core::db::{prefetch, query};
use inforequests_core::error::WorkflowError;
use inforequests_core::model::{Action, Inforequest, NewInforequest};
use inforequests_core::workflow::append::open_inforequest;

#[derive(Subcommand, Debug)]
pub enum InforequestCommand {
    /// Create an inforequest with its main branch and REQUEST action.
    Create(CreateArgs),
    /// List inforequests.
    List(ListArgs),
    /// Show an inforequest and the tail of each branch.
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub applicant: String,

    /// Obligee the request is addressed to.
    #[arg(long)]
    pub obligee: i64,

    #[arg(long, default_value = "")]
    pub subject: String,

    #[arg(long, default_value = "")]
    pub content: String,

    /// Submission date (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Per-request address replies are received at.
    #[arg(long)]
    pub unique_email: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only closed inforequests.
    #[arg(long, conflicts_with = "open")]
    pub closed: bool,

    /// Only open inforequests.
    #[arg(long)]
    pub open: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct Created {
    inforequest_id: i64,
    branch_id: i64,
    request: Option<Action>,
}

#[derive(Debug, Serialize)]
struct BranchSummary {
    branch_id: i64,
    obligee_id: i64,
    main: bool,
    last_action: Option<Action>,
}

#[derive(Debug, Serialize)]
struct InforequestDetail {
    #[serde(flatten)]
    inforequest: Inforequest,
    branches: Vec<BranchSummary>,
}

fn write_header(w: &mut dyn Write, inforequest: &Inforequest) -> std::io::Result<()> {
    pretty_section(w, &format!("Inforequest {}", inforequest.inforequest_id))?;
    pretty_kv(w, "applicant", &inforequest.applicant)?;
    if !inforequest.subject.is_empty() {
        pretty_kv(w, "subject", &inforequest.subject)?;
    }
    pretty_kv(w, "submitted", inforequest.submission_date.to_string())?;
    pretty_kv(w, "closed", if inforequest.closed { "yes" } else { "no" })
}

/// Execute an `ir inforequest` subcommand.
///
/// # Errors
///
/// Returns [`WorkflowError::InforequestNotFound`] for an unknown id, the
/// creation errors of [`open_inforequest`], or a store error.
pub fn run_inforequest(
    command: &InforequestCommand,
    session: &Session,
    output: OutputMode,
) -> Result<()> {
    let store = &session.store;
    let ctx = session.ctx();

    match command {
        InforequestCommand::Create(args) => {
            let new = NewInforequest {
                applicant: args.applicant.clone(),
                subject: args.subject.clone(),
                content: args.content.clone(),
                unique_email: args.unique_email.clone(),
                submission_date: args.date.unwrap_or_else(|| ctx.today()),
            };
            let (inforequest, mut branch) = open_inforequest(store, &ctx, &new, args.obligee, None)?;
            let created = Created {
                inforequest_id: inforequest.inforequest_id,
                branch_id: branch.branch_id,
                request: branch.last_action(store)?.cloned(),
            };
            render(output, &created, |c, w| {
                writeln!(
                    w,
                    "✓ Created inforequest {} (main branch {})",
                    c.inforequest_id, c.branch_id
                )
            })
        }
        InforequestCommand::List(args) => {
            let closed = match (args.closed, args.open) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let inforequests = query::list_inforequests(store, closed)?;
            render(output, &inforequests, |list, w| {
                for ir in list {
                    writeln!(
                        w,
                        "{:<6} {}  {:<24} {}",
                        ir.inforequest_id, ir.submission_date, ir.applicant, ir.subject
                    )?;
                }
                Ok(())
            })
        }
        InforequestCommand::Show(args) => {
            let mut inforequest = query::get_inforequest(store, args.id)?
                .ok_or(WorkflowError::InforequestNotFound(args.id))?;
            inforequest.branches(store)?;
            prefetch::prefetch_last_action(
                store,
                inforequest.branches_mut(),
                &query::ActionQuery::default(),
            )?;

            let mut branches = Vec::new();
            for branch in inforequest.branches(store)? {
                branches.push(BranchSummary {
                    branch_id: branch.branch_id,
                    obligee_id: branch.obligee_id,
                    main: branch.is_main(),
                    last_action: branch.last_action(store)?.cloned(),
                });
            }

            let detail = InforequestDetail {
                inforequest,
                branches,
            };
            render(output, &detail, |d, w| {
                write_header(w, &d.inforequest)?;
                writeln!(w, "branches:")?;
                for b in &d.branches {
                    let tail = b
                        .last_action
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |a| {
                            format!("{} ({})", a.action_type, a.effective_date)
                        });
                    let kind = if b.main { "main" } else { "advanced" };
                    writeln!(
                        w,
                        "  #{:<6} {:<9} obligee {:<6} {}",
                        b.branch_id, kind, b.obligee_id, tail
                    )?;
                }
                Ok(())
            })
        }
    }
}
