//! Write-side helpers for the inforequests store.
//!
//! These functions persist rows as given. Workflow legality (capabilities,
//! date ordering, disclosure levels) is checked one level up, in
//! [`crate::workflow`]; the branch integrity rules are enforced here since
//! every writer must obey them.

use anyhow::{Context, Result};
use rusqlite::params;

use super::Store;
use super::query::{self, DATE_FORMAT};
use crate::error::{WorkflowError, integrity_or};
use crate::model::action::{Action, ActionDraft, NewAction, NewActionDraft};
use crate::model::branch::{Branch, NewBranch};
use crate::model::inforequest::{Inforequest, NewInforequest};
use crate::model::mail::NewMessage;
use crate::model::obligee::{Obligee, ObligeeFields};

// ---------------------------------------------------------------------------
// Obligees
// ---------------------------------------------------------------------------

/// Insert an obligee; the schema triggers record its first snapshot.
///
/// # Errors
///
/// Returns an error if the insert fails (e.g. an empty name).
pub fn insert_obligee(store: &Store, fields: &ObligeeFields, now_us: i64) -> Result<Obligee> {
    store
        .conn()
        .execute(
            "INSERT INTO obligees (name, street, city, zip, emails, updated_at_us) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                fields.name,
                fields.street,
                fields.city,
                fields.zip,
                fields.emails,
                now_us
            ],
        )
        .map_err(integrity_or)
        .context("insert obligee")?;

    let obligee_id = store.conn().last_insert_rowid();
    tracing::debug!(obligee_id, name = %fields.name, "inserted obligee");
    Ok(Obligee {
        obligee_id,
        name: fields.name.clone(),
        street: fields.street.clone(),
        city: fields.city.clone(),
        zip: fields.zip.clone(),
        emails: fields.emails.clone(),
        updated_at_us: now_us,
    })
}

/// Overwrite an obligee's fields; the schema triggers record a new
/// snapshot. Existing branches keep the snapshot they were created with.
///
/// # Errors
///
/// Returns [`WorkflowError::ObligeeNotFound`] if no such obligee exists.
pub fn update_obligee(
    store: &Store,
    obligee_id: i64,
    fields: &ObligeeFields,
    now_us: i64,
) -> Result<Obligee> {
    let changed = store
        .conn()
        .execute(
            "UPDATE obligees SET name = ?1, street = ?2, city = ?3, zip = ?4, emails = ?5, \
             updated_at_us = ?6 WHERE obligee_id = ?7",
            params![
                fields.name,
                fields.street,
                fields.city,
                fields.zip,
                fields.emails,
                now_us,
                obligee_id
            ],
        )
        .map_err(integrity_or)
        .with_context(|| format!("update obligee {obligee_id}"))?;

    if changed == 0 {
        return Err(WorkflowError::ObligeeNotFound(obligee_id).into());
    }

    tracing::debug!(obligee_id, "updated obligee");
    Ok(Obligee {
        obligee_id,
        name: fields.name.clone(),
        street: fields.street.clone(),
        city: fields.city.clone(),
        zip: fields.zip.clone(),
        emails: fields.emails.clone(),
        updated_at_us: now_us,
    })
}

// ---------------------------------------------------------------------------
// Inforequests
// ---------------------------------------------------------------------------

/// Insert an inforequest without branches.
///
/// # Errors
///
/// Returns an error if the insert fails (e.g. a duplicate unique email).
pub fn insert_inforequest(
    store: &Store,
    new: &NewInforequest,
    now_us: i64,
) -> Result<Inforequest> {
    store
        .conn()
        .execute(
            "INSERT INTO inforequests \
             (applicant, subject, content, unique_email, submission_date, created_at_us) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.applicant,
                new.subject,
                new.content,
                new.unique_email,
                new.submission_date.format(DATE_FORMAT).to_string(),
                now_us
            ],
        )
        .map_err(integrity_or)
        .context("insert inforequest")?;

    let inforequest_id = store.conn().last_insert_rowid();
    tracing::debug!(inforequest_id, "inserted inforequest");
    Ok(Inforequest::from_row(
        inforequest_id,
        new.applicant.clone(),
        new.subject.clone(),
        new.content.clone(),
        new.unique_email.clone(),
        new.submission_date,
        false,
        now_us,
    ))
}

/// Mark an inforequest closed or reopened.
///
/// # Errors
///
/// Returns [`WorkflowError::InforequestNotFound`] if no such inforequest exists.
pub fn set_inforequest_closed(store: &Store, inforequest_id: i64, closed: bool) -> Result<()> {
    let changed = store
        .conn()
        .execute(
            "UPDATE inforequests SET closed = ?1 WHERE inforequest_id = ?2",
            params![closed, inforequest_id],
        )
        .with_context(|| format!("update inforequest {inforequest_id}"))?;
    if changed == 0 {
        return Err(WorkflowError::InforequestNotFound(inforequest_id).into());
    }
    Ok(())
}

/// Delete an inforequest together with its branches, actions, and drafts.
///
/// Returns `false` when nothing was deleted.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_inforequest(store: &Store, inforequest_id: i64) -> Result<bool> {
    let deleted = store
        .conn()
        .execute(
            "DELETE FROM inforequests WHERE inforequest_id = ?1",
            params![inforequest_id],
        )
        .with_context(|| format!("delete inforequest {inforequest_id}"))?;
    tracing::debug!(inforequest_id, deleted, "deleted inforequest");
    Ok(deleted > 0)
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Insert a message and its recipients; returns the message id.
///
/// # Errors
///
/// Returns an error if any insert fails.
pub fn insert_message(store: &Store, message: &NewMessage) -> Result<i64> {
    store.immediate(|| {
        let conn = store.conn();
        conn.execute(
            "INSERT INTO messages (direction, from_name, from_mail, subject, text, processed_at_us) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.direction.as_str(),
                message.from_name,
                message.from_mail,
                message.subject,
                message.text,
                message.processed_at_us
            ],
        )
        .context("insert message")?;
        let message_id = conn.last_insert_rowid();

        let mut stmt = conn
            .prepare("INSERT INTO recipients (message_id, name, mail, kind) VALUES (?1, ?2, ?3, ?4)")
            .context("prepare recipient insert")?;
        for recipient in &message.recipients {
            stmt.execute(params![
                message_id,
                recipient.name,
                recipient.mail,
                recipient.kind.as_str()
            ])
            .map_err(integrity_or)
            .context("insert recipient")?;
        }
        Ok(message_id)
    })
}

// ---------------------------------------------------------------------------
// Branches
// ---------------------------------------------------------------------------

/// Insert a branch bound to its obligee's current snapshot.
///
/// Checks, in order: the obligee is set; no snapshot was supplied; the
/// obligee exists. A missing inforequest reaches SQLite and fails its
/// NOT NULL constraint.
///
/// # Errors
///
/// - [`WorkflowError::ObligeeMandatory`] without an obligee
/// - [`WorkflowError::ReadOnlyField`] when a snapshot id was supplied
/// - [`WorkflowError::ObligeeNotFound`] for an unknown obligee
/// - [`WorkflowError::Integrity`] for a missing inforequest or a dangling
///   reference
pub fn insert_branch(store: &Store, new: &NewBranch) -> Result<Branch> {
    let obligee_id = new.obligee_id.ok_or(WorkflowError::ObligeeMandatory)?;
    if new.obligee_snapshot_id.is_some() {
        return Err(WorkflowError::ReadOnlyField {
            field: "obligee_snapshot",
        }
        .into());
    }

    let snapshot = query::current_snapshot(store, obligee_id)?
        .ok_or(WorkflowError::ObligeeNotFound(obligee_id))?;

    store
        .conn()
        .execute(
            "INSERT INTO branches (inforequest_id, obligee_id, snapshot_id, advanced_by_id) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                new.inforequest_id,
                obligee_id,
                snapshot.snapshot_id,
                new.advanced_by_id
            ],
        )
        .map_err(integrity_or)?;

    let branch_id = store.conn().last_insert_rowid();
    tracing::debug!(
        branch_id,
        obligee_id,
        snapshot_id = snapshot.snapshot_id,
        "inserted branch"
    );

    // The insert succeeded, so the NOT NULL column was set.
    let inforequest_id = new.inforequest_id.unwrap_or_default();
    Ok(Branch::from_row(
        branch_id,
        inforequest_id,
        obligee_id,
        snapshot.snapshot_id,
        new.advanced_by_id,
    ))
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Append an action at the next position of a branch, without workflow
/// checks.
///
/// # Errors
///
/// Returns an integrity error for an unknown branch or message, or for a
/// disclosure level on a non-disclosure action.
pub fn insert_action(
    store: &Store,
    branch_id: i64,
    new: &NewAction,
    now_us: i64,
) -> Result<Action> {
    store.immediate(|| {
        let conn = store.conn();
        let position: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(position), 0) + 1 FROM actions WHERE branch_id = ?1",
                params![branch_id],
                |row| row.get(0),
            )
            .context("next action position")?;

        conn.execute(
            "INSERT INTO actions (branch_id, position, action_type, subject, content, \
             effective_date, deadline_days, extension_days, disclosure_level, message_id, \
             created_at_us) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                branch_id,
                position,
                new.action_type.as_str(),
                new.subject,
                new.content,
                new.effective_date.format(DATE_FORMAT).to_string(),
                new.deadline_days,
                new.extension_days,
                new.disclosure_level.map(|level| level.as_str()),
                new.message_id,
                now_us
            ],
        )
        .map_err(integrity_or)
        .with_context(|| format!("insert {} into branch {branch_id}", new.action_type))?;

        let action_id = conn.last_insert_rowid();
        tracing::debug!(
            action_id,
            branch_id,
            position,
            action_type = %new.action_type,
            "inserted action"
        );
        query::get_action(store, action_id)?
            .ok_or_else(|| WorkflowError::ActionNotFound(action_id).into())
    })
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// Insert an action draft.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_draft(store: &Store, new: &NewActionDraft) -> Result<ActionDraft> {
    let obligee_ids =
        serde_json::to_string(&new.obligee_ids).context("serialize draft obligee ids")?;
    store
        .conn()
        .execute(
            "INSERT INTO action_drafts (inforequest_id, branch_id, action_type, subject, \
             content, effective_date, deadline_days, disclosure_level, obligee_ids) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                new.inforequest_id,
                new.branch_id,
                new.action_type.as_str(),
                new.subject,
                new.content,
                new.effective_date
                    .map(|date| date.format(DATE_FORMAT).to_string()),
                new.deadline_days,
                new.disclosure_level.map(|level| level.as_str()),
                obligee_ids
            ],
        )
        .map_err(integrity_or)
        .context("insert action draft")?;

    Ok(ActionDraft {
        draft_id: store.conn().last_insert_rowid(),
        inforequest_id: new.inforequest_id,
        branch_id: new.branch_id,
        action_type: new.action_type,
        subject: new.subject.clone(),
        content: new.content.clone(),
        effective_date: new.effective_date,
        deadline_days: new.deadline_days,
        disclosure_level: new.disclosure_level,
        obligee_ids: new.obligee_ids.clone(),
    })
}

/// Delete a draft. Returns `false` when it did not exist.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_draft(store: &Store, draft_id: i64) -> Result<bool> {
    let deleted = store
        .conn()
        .execute(
            "DELETE FROM action_drafts WHERE draft_id = ?1",
            params![draft_id],
        )
        .with_context(|| format!("delete draft {draft_id}"))?;
    Ok(deleted > 0)
}

// ---------------------------------------------------------------------------
// Store metadata
// ---------------------------------------------------------------------------

/// Record the completion time of an expiration sweep.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn record_sweep(store: &Store, at_us: i64) -> Result<()> {
    store
        .conn()
        .execute(
            "UPDATE store_meta SET last_sweep_at_us = ?1 WHERE id = 1",
            params![at_us],
        )
        .context("record sweep timestamp")?;
    Ok(())
}
