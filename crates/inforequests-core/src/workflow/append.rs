//! Checked appends, advancement forks, and opening new inforequests.

use anyhow::Result;
use chrono::NaiveDate;

use super::WorkflowContext;
use super::capability::{Capability, successors};
use crate::db::{Store, query, records};
use crate::error::WorkflowError;
use crate::model::action::{Action, ActionType, NewAction};
use crate::model::branch::{Branch, NewBranch};
use crate::model::inforequest::{Inforequest, NewInforequest};

/// An advancement to other obligees.
///
/// Appends ADVANCEMENT to the branch and opens one child branch per target
/// obligee, each starting with an ADVANCED_REQUEST on the same date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advancement {
    pub effective_date: NaiveDate,
    pub subject: String,
    pub content: String,
    pub message_id: Option<i64>,
    pub deadline_days: Option<u32>,
    pub obligee_ids: Vec<i64>,
}

impl Advancement {
    #[must_use]
    pub fn new(effective_date: NaiveDate, obligee_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            effective_date,
            subject: String::new(),
            content: String::new(),
            message_id: None,
            deadline_days: None,
            obligee_ids: obligee_ids.into_iter().collect(),
        }
    }

    fn action(&self) -> NewAction {
        NewAction {
            action_type: ActionType::Advancement,
            subject: self.subject.clone(),
            content: self.content.clone(),
            effective_date: self.effective_date,
            deadline_days: self.deadline_days,
            extension_days: None,
            disclosure_level: None,
            message_id: self.message_id,
        }
    }
}

/// Validate `new` against the stored tail of `branch_id` and insert it.
/// Must run inside a transaction.
fn checked_insert(
    store: &Store,
    ctx: &WorkflowContext<'_>,
    branch_id: i64,
    new: &NewAction,
) -> Result<Action> {
    let capability = Capability::for_action_type(new.action_type).map_err(WorkflowError::from)?;

    let last = query::load_last_action(store, branch_id)?;
    let expired = last.as_ref().is_some_and(|action| action.deadline_expired(ctx));
    if !successors(last.as_ref(), expired).contains(capability) {
        return Err(WorkflowError::ActionNotAllowed {
            branch_id,
            action_type: new.action_type,
        }
        .into());
    }

    if let Some(last) = &last {
        if new.effective_date < last.effective_date {
            return Err(WorkflowError::EffectiveDateRegression {
                effective_date: new.effective_date,
                last_date: last.effective_date,
            }
            .into());
        }
    }

    match (new.action_type, new.disclosure_level) {
        (ActionType::Disclosure, None) => {
            return Err(WorkflowError::InvalidDisclosureLevel(
                "disclosure requires a disclosure level",
            )
            .into());
        }
        (ActionType::Disclosure, Some(_)) | (_, None) => {}
        (_, Some(_)) => {
            return Err(WorkflowError::InvalidDisclosureLevel(
                "only disclosures carry a disclosure level",
            )
            .into());
        }
    }

    records::insert_action(store, branch_id, new, ctx.now_us())
}

impl Branch {
    /// Append an applicant- or obligee-authored action, checking that its
    /// capability is open today, that its date does not precede the last
    /// action, and that the disclosure level is set exactly for
    /// disclosures.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::UnknownCapability`] for system action types
    /// - [`WorkflowError::ActionNotAllowed`] when the capability is closed
    /// - [`WorkflowError::EffectiveDateRegression`]
    /// - [`WorkflowError::InvalidDisclosureLevel`]
    /// - an integrity error for a dangling message id
    pub fn append_action(
        &mut self,
        store: &Store,
        ctx: &WorkflowContext<'_>,
        new: &NewAction,
    ) -> Result<Action> {
        let branch_id = self.branch_id;
        let action = store.immediate(|| checked_insert(store, ctx, branch_id, new))?;
        self.record_appended(&action);
        tracing::debug!(
            branch_id,
            action_id = action.action_id,
            action_type = %action.action_type,
            "appended action"
        );
        Ok(action)
    }

    /// Append an ADVANCEMENT and fork one child branch per target obligee.
    ///
    /// Everything happens in one transaction: a failure on any target
    /// leaves no advancement and no children behind. Each child's action
    /// cache is filled with its ADVANCED_REQUEST.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::ObligeeMandatory`] without targets, the
    /// errors of [`Branch::append_action`], or
    /// [`WorkflowError::ObligeeNotFound`] for an unknown target.
    pub fn advance(
        &mut self,
        store: &Store,
        ctx: &WorkflowContext<'_>,
        advancement: &Advancement,
    ) -> Result<(Action, Vec<Branch>)> {
        if advancement.obligee_ids.is_empty() {
            return Err(WorkflowError::ObligeeMandatory.into());
        }

        let branch_id = self.branch_id;
        let inforequest_id = self.inforequest_id;
        let (action, children) = store.immediate(|| {
            let action = checked_insert(store, ctx, branch_id, &advancement.action())?;

            let mut children = Vec::with_capacity(advancement.obligee_ids.len());
            for &obligee_id in &advancement.obligee_ids {
                let mut child = records::insert_branch(
                    store,
                    &NewBranch::advanced(inforequest_id, obligee_id, action.action_id),
                )?;
                let request = records::insert_action(
                    store,
                    child.branch_id,
                    &NewAction::new(ActionType::AdvancedRequest, advancement.effective_date),
                    ctx.now_us(),
                )?;
                child.set_actions(vec![request], true);
                children.push(child);
            }
            Ok((action, children))
        })?;

        self.record_appended(&action);
        tracing::info!(
            branch_id,
            action_id = action.action_id,
            children = children.len(),
            "advanced inforequest"
        );
        Ok((action, children))
    }
}

/// Create an inforequest with its main branch and the opening REQUEST.
///
/// The request is dated the submission date and may be bound to the sent
/// message.
///
/// # Errors
///
/// Returns [`WorkflowError::ObligeeNotFound`] for an unknown obligee, or
/// an error if any insert fails. Nothing is written on failure.
pub fn open_inforequest(
    store: &Store,
    ctx: &WorkflowContext<'_>,
    new: &NewInforequest,
    obligee_id: i64,
    message_id: Option<i64>,
) -> Result<(Inforequest, Branch)> {
    let (inforequest, branch) = store.immediate(|| {
        let mut inforequest = records::insert_inforequest(store, new, ctx.now_us())?;
        let mut branch = records::insert_branch(
            store,
            &NewBranch::main(inforequest.inforequest_id, obligee_id),
        )?;

        let mut request = NewAction::new(ActionType::Request, new.submission_date)
            .with_subject(new.subject.clone());
        request.content.clone_from(&new.content);
        request.message_id = message_id;
        let action = records::insert_action(store, branch.branch_id, &request, ctx.now_us())?;

        branch.set_actions(vec![action], true);
        inforequest.set_branches(vec![branch.clone()]);
        Ok((inforequest, branch))
    })?;

    tracing::info!(
        inforequest_id = inforequest.inforequest_id,
        branch_id = branch.branch_id,
        obligee_id,
        "opened inforequest"
    );
    Ok((inforequest, branch))
}
