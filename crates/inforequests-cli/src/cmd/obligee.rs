//! `ir obligee` — maintain the authorities requests are addressed to.
//!
//! Every add or update writes a snapshot; branches keep the snapshot that
//! was current when they were created.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::Write;

use super::Session;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};
use inforequests_core::clock::Clock;
use inforequests_core::db::{query, records};
use inforequests_core::error::WorkflowError;
use inforequests_core::model::obligee::format_addresses;
use inforequests_core::model::{Obligee, ObligeeFields, ObligeeSnapshot};

#[derive(Subcommand, Debug)]
pub enum ObligeeCommand {
    /// Register a new obligee.
    Add(ObligeeAddArgs),
    /// Change an obligee; existing branches are unaffected.
    Update(ObligeeUpdateArgs),
    /// Show an obligee and its snapshot history.
    Show(ObligeeShowArgs),
    /// List all obligees.
    List,
}

#[derive(Args, Debug)]
pub struct ObligeeAddArgs {
    pub name: String,

    /// Address list, e.g. "Office <office@a.com>, info@a.com".
    #[arg(long, default_value = "")]
    pub email: String,

    #[arg(long, default_value = "")]
    pub street: String,

    #[arg(long, default_value = "")]
    pub city: String,

    #[arg(long, default_value = "")]
    pub zip: String,
}

#[derive(Args, Debug)]
pub struct ObligeeUpdateArgs {
    pub id: i64,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub street: Option<String>,

    #[arg(long)]
    pub city: Option<String>,

    #[arg(long)]
    pub zip: Option<String>,
}

#[derive(Args, Debug)]
pub struct ObligeeShowArgs {
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct ObligeeDetail {
    #[serde(flatten)]
    obligee: Obligee,
    snapshots: Vec<ObligeeSnapshot>,
}

fn write_obligee(w: &mut dyn Write, obligee: &Obligee) -> std::io::Result<()> {
    pretty_section(w, &format!("Obligee {}", obligee.obligee_id))?;
    pretty_kv(w, "name", &obligee.name)?;
    if !obligee.street.is_empty() || !obligee.city.is_empty() {
        pretty_kv(
            w,
            "address",
            format!("{}, {} {}", obligee.street, obligee.zip, obligee.city),
        )?;
    }
    pretty_kv(w, "emails", format_addresses(&obligee.addresses()))
}

/// Execute an `ir obligee` subcommand.
///
/// # Errors
///
/// Returns [`WorkflowError::ObligeeNotFound`] for an unknown id, or an
/// error if the store cannot be read or written.
pub fn run_obligee(command: &ObligeeCommand, session: &Session, output: OutputMode) -> Result<()> {
    let store = &session.store;
    let now_us = session.clock.now_us();

    match command {
        ObligeeCommand::Add(args) => {
            let fields = ObligeeFields {
                name: args.name.clone(),
                street: args.street.clone(),
                city: args.city.clone(),
                zip: args.zip.clone(),
                emails: args.email.clone(),
            };
            let obligee = records::insert_obligee(store, &fields, now_us)?;
            render(output, &obligee, |o, w| write_obligee(w, o))
        }
        ObligeeCommand::Update(args) => {
            let current = query::get_obligee(store, args.id)?
                .ok_or(WorkflowError::ObligeeNotFound(args.id))?;
            let fields = ObligeeFields {
                name: args.name.clone().unwrap_or(current.name),
                street: args.street.clone().unwrap_or(current.street),
                city: args.city.clone().unwrap_or(current.city),
                zip: args.zip.clone().unwrap_or(current.zip),
                emails: args.email.clone().unwrap_or(current.emails),
            };
            let obligee = records::update_obligee(store, args.id, &fields, now_us)?;
            render(output, &obligee, |o, w| write_obligee(w, o))
        }
        ObligeeCommand::Show(args) => {
            let obligee = query::get_obligee(store, args.id)?
                .ok_or(WorkflowError::ObligeeNotFound(args.id))?;
            let snapshots = query::snapshots_for(store, args.id)?;
            let detail = ObligeeDetail { obligee, snapshots };
            render(output, &detail, |d, w| {
                write_obligee(w, &d.obligee)?;
                writeln!(w, "snapshots:")?;
                for snapshot in &d.snapshots {
                    writeln!(
                        w,
                        "  #{:<6} {}  {}",
                        snapshot.snapshot_id, snapshot.created_at_us, snapshot.name
                    )?;
                }
                Ok(())
            })
        }
        ObligeeCommand::List => {
            let obligees = query::list_obligees(store)?;
            render(output, &obligees, |list, w| {
                for obligee in list {
                    writeln!(w, "{:<6} {}", obligee.obligee_id, obligee.name)?;
                }
                Ok(())
            })
        }
    }
}
