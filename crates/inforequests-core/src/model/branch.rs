//! Branches: one conversation thread against one obligee snapshot.
//!
//! A `Branch` value carries lazily filled caches for its action sequence.
//! The caches belong to the in-memory instance only: they are filled by the
//! accessors below or by the batch loaders in [`crate::db::prefetch`], and
//! are dropped by [`Branch::reload`] / [`Branch::invalidate`]. Writes made
//! through another instance are not observed until then.

use anyhow::Result;
use serde::Serialize;
use std::fmt;

use super::action::{Action, ActionDraft};
use super::inforequest::Inforequest;
use super::obligee::ObligeeSnapshot;
use crate::db::Store;
use crate::db::query::{self, ActionQuery};
use crate::error::WorkflowError;

#[derive(Debug, Clone, Serialize)]
pub struct Branch {
    pub branch_id: i64,
    pub inforequest_id: i64,
    pub obligee_id: i64,
    snapshot_id: i64,
    /// The advancement (in another branch) that spawned this branch.
    pub advanced_by_id: Option<i64>,
    #[serde(skip)]
    actions: Option<Vec<Action>>,
    /// The `actions` cache holds every action in position order.
    #[serde(skip)]
    actions_full: bool,
    #[serde(skip)]
    actions_by_email: Option<Vec<Action>>,
    /// Outer `None`: not loaded. `Some(None)`: loaded, branch has no actions.
    #[serde(skip)]
    last_action: Option<Option<Action>>,
}

impl Branch {
    pub(crate) const fn from_row(
        branch_id: i64,
        inforequest_id: i64,
        obligee_id: i64,
        snapshot_id: i64,
        advanced_by_id: Option<i64>,
    ) -> Self {
        Self {
            branch_id,
            inforequest_id,
            obligee_id,
            snapshot_id,
            advanced_by_id,
            actions: None,
            actions_full: false,
            actions_by_email: None,
            last_action: None,
        }
    }

    /// The obligee snapshot this branch was bound to at creation.
    #[must_use]
    pub const fn snapshot_id(&self) -> i64 {
        self.snapshot_id
    }

    /// A branch is the main one of its inforequest iff no advancement
    /// spawned it.
    #[must_use]
    pub const fn is_main(&self) -> bool {
        self.advanced_by_id.is_none()
    }

    /// Actions ordered by position, loaded on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the actions cannot be loaded.
    pub fn actions(&mut self, store: &Store) -> Result<&[Action]> {
        if self.actions.is_none() {
            let mut loaded = query::load_actions(store, &[self.branch_id], &ActionQuery::default())?;
            self.actions = Some(loaded.remove(&self.branch_id).unwrap_or_default());
            self.actions_full = true;
            tracing::debug!(branch_id = self.branch_id, "loaded branch actions");
        }
        Ok(self.actions.as_deref().unwrap_or_default())
    }

    /// Actions with a bound email message, in action order.
    ///
    /// Derived from the cached [`Branch::actions`] when it holds the full
    /// sequence; otherwise loaded with a dedicated query.
    ///
    /// # Errors
    ///
    /// Returns an error if the actions cannot be loaded.
    pub fn actions_by_email(&mut self, store: &Store) -> Result<&[Action]> {
        if self.actions_by_email.is_none() {
            let by_email = if let Some(actions) = self.full_actions() {
                actions.iter().filter(|a| a.has_email()).cloned().collect()
            } else {
                let query = ActionQuery::default().with_email_only();
                let mut loaded = query::load_actions(store, &[self.branch_id], &query)?;
                loaded.remove(&self.branch_id).unwrap_or_default()
            };
            self.actions_by_email = Some(by_email);
        }
        Ok(self.actions_by_email.as_deref().unwrap_or_default())
    }

    /// The last action of the branch, or `None` for an empty branch.
    ///
    /// Uses the cached [`Branch::actions`] when it holds the full sequence;
    /// otherwise fetches only the final row.
    ///
    /// # Errors
    ///
    /// Returns an error if the action cannot be loaded.
    pub fn last_action(&mut self, store: &Store) -> Result<Option<&Action>> {
        if self.actions_full {
            return Ok(self.actions.as_deref().and_then(<[Action]>::last));
        }
        if self.last_action.is_none() {
            let loaded = query::load_last_action(store, self.branch_id)?;
            self.last_action = Some(loaded);
        }
        Ok(self.last_action.as_ref().and_then(Option::as_ref))
    }

    fn full_actions(&self) -> Option<&[Action]> {
        self.actions.as_deref().filter(|_| self.actions_full)
    }

    /// Drop every cached derived value.
    pub fn invalidate(&mut self) {
        self.actions = None;
        self.actions_full = false;
        self.actions_by_email = None;
        self.last_action = None;
    }

    /// Re-read the branch row and drop the caches.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::BranchNotFound`] if the branch was deleted.
    pub fn reload(&mut self, store: &Store) -> Result<()> {
        let fresh = query::get_branch(store, self.branch_id)?
            .ok_or(WorkflowError::BranchNotFound(self.branch_id))?;
        *self = fresh;
        Ok(())
    }

    /// Replace the `actions` cache. The derived caches are dropped; `full`
    /// tells whether `actions` is the whole sequence in position order.
    pub(crate) fn set_actions(&mut self, actions: Vec<Action>, full: bool) {
        self.invalidate();
        self.actions = Some(actions);
        self.actions_full = full;
    }

    pub(crate) fn set_actions_by_email(&mut self, actions: Vec<Action>) {
        self.actions_by_email = Some(actions);
    }

    pub(crate) fn set_last_action(&mut self, action: Option<Action>) {
        self.last_action = Some(action);
    }

    /// Keep loaded caches in step with an action appended through this
    /// instance. Caches whose tail does not directly precede `action` were
    /// outdated by another writer and are dropped, as is a narrowed
    /// `actions` cache.
    pub(crate) fn record_appended(&mut self, action: &Action) {
        if !self.actions_full {
            self.actions = None;
        }
        let known_tail = match (self.full_actions(), &self.last_action) {
            (Some(actions), _) => Some(actions.last().map_or(0, |a| a.position)),
            (None, Some(last)) => Some(last.as_ref().map_or(0, |a| a.position)),
            (None, None) => None,
        };
        if known_tail.is_none_or(|tail| tail + 1 != action.position) {
            self.invalidate();
        }

        if let Some(actions) = self.actions.as_mut() {
            actions.push(action.clone());
        }
        if action.has_email() {
            if let Some(by_email) = self.actions_by_email.as_mut() {
                by_email.push(action.clone());
            }
        }
        self.last_action = Some(Some(action.clone()));
    }

    /// The bound obligee snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot row is missing or unreadable.
    pub fn snapshot(&self, store: &Store) -> Result<ObligeeSnapshot> {
        query::get_snapshot(store, self.snapshot_id)?.ok_or_else(|| {
            anyhow::anyhow!(
                "branch {} references missing snapshot {}",
                self.branch_id,
                self.snapshot_id
            )
        })
    }

    /// The owning inforequest.
    ///
    /// # Errors
    ///
    /// Returns an error if the inforequest cannot be loaded.
    pub fn inforequest(&self, store: &Store) -> Result<Inforequest> {
        query::get_inforequest(store, self.inforequest_id)?
            .ok_or_else(|| WorkflowError::InforequestNotFound(self.inforequest_id).into())
    }

    /// The advancement that spawned this branch, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the action cannot be loaded.
    pub fn advanced_by(&self, store: &Store) -> Result<Option<Action>> {
        match self.advanced_by_id {
            Some(action_id) => query::get_action(store, action_id),
            None => Ok(None),
        }
    }

    /// Drafts composed against this branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the drafts cannot be loaded.
    pub fn drafts(&self, store: &Store) -> Result<Vec<ActionDraft>> {
        query::list_drafts(
            store,
            &query::DraftFilter {
                inforequest_id: None,
                branch_id: Some(self.branch_id),
            },
        )
    }
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.branch_id == other.branch_id
    }
}

impl Eq for Branch {}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Branch: {}>", self.branch_id)
    }
}

/// Fields for a new branch.
///
/// `inforequest_id` and `obligee_id` are required; they are optional here so
/// that a missing value is reported as a typed error rather than being
/// impossible to express from untyped input. `obligee_snapshot_id` must stay
/// `None`: the snapshot is always resolved on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewBranch {
    pub inforequest_id: Option<i64>,
    pub obligee_id: Option<i64>,
    pub advanced_by_id: Option<i64>,
    pub obligee_snapshot_id: Option<i64>,
}

impl NewBranch {
    #[must_use]
    pub const fn main(inforequest_id: i64, obligee_id: i64) -> Self {
        Self {
            inforequest_id: Some(inforequest_id),
            obligee_id: Some(obligee_id),
            advanced_by_id: None,
            obligee_snapshot_id: None,
        }
    }

    #[must_use]
    pub const fn advanced(inforequest_id: i64, obligee_id: i64, advanced_by_id: i64) -> Self {
        Self {
            inforequest_id: Some(inforequest_id),
            obligee_id: Some(obligee_id),
            advanced_by_id: Some(advanced_by_id),
            obligee_snapshot_id: None,
        }
    }
}
