use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use super::branch::Branch;
use crate::db::Store;
use crate::db::query::{self, BranchFilter, BranchOrder};

/// Root aggregate: one information request and its conversation branches.
#[derive(Debug, Clone, Serialize)]
pub struct Inforequest {
    pub inforequest_id: i64,
    pub applicant: String,
    pub subject: String,
    pub content: String,
    /// Per-request mailbox the obligees reply to.
    pub unique_email: Option<String>,
    pub submission_date: NaiveDate,
    pub closed: bool,
    pub created_at_us: i64,
    #[serde(skip)]
    branches: Option<Vec<Branch>>,
}

impl Inforequest {
    #[allow(clippy::too_many_arguments)]
    pub(crate) const fn from_row(
        inforequest_id: i64,
        applicant: String,
        subject: String,
        content: String,
        unique_email: Option<String>,
        submission_date: NaiveDate,
        closed: bool,
        created_at_us: i64,
    ) -> Self {
        Self {
            inforequest_id,
            applicant,
            subject,
            content,
            unique_email,
            submission_date,
            closed,
            created_at_us,
            branches: None,
        }
    }

    /// Branches ordered by primary key, loaded on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the branches cannot be loaded.
    pub fn branches(&mut self, store: &Store) -> Result<&mut [Branch]> {
        if self.branches.is_none() {
            let filter = BranchFilter {
                inforequest_id: Some(self.inforequest_id),
                order: Some(BranchOrder::Pk { reverse: false }),
                ..BranchFilter::default()
            };
            self.branches = Some(query::list_branches(store, &filter)?);
        }
        Ok(self.branches.as_deref_mut().unwrap_or_default())
    }

    /// Already loaded branches; empty when none were loaded yet.
    ///
    /// Used to compose batch loaders over branches of several inforequests.
    pub fn branches_mut(&mut self) -> std::slice::IterMut<'_, Branch> {
        self.branches.as_deref_mut().unwrap_or_default().iter_mut()
    }

    /// The branch no advancement spawned.
    ///
    /// # Errors
    ///
    /// Returns an error if the branches cannot be loaded.
    pub fn main_branch(&mut self, store: &Store) -> Result<Option<&mut Branch>> {
        Ok(self.branches(store)?.iter_mut().find(|b| b.is_main()))
    }

    pub(crate) fn set_branches(&mut self, branches: Vec<Branch>) {
        self.branches = Some(branches);
    }

    /// Drop the cached branches.
    pub fn invalidate(&mut self) {
        self.branches = None;
    }
}

impl PartialEq for Inforequest {
    fn eq(&self, other: &Self) -> bool {
        self.inforequest_id == other.inforequest_id
    }
}

impl Eq for Inforequest {}

impl fmt::Display for Inforequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Inforequest: {}>", self.inforequest_id)
    }
}

/// Fields for a new inforequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInforequest {
    pub applicant: String,
    pub subject: String,
    pub content: String,
    pub unique_email: Option<String>,
    pub submission_date: NaiveDate,
}

impl NewInforequest {
    #[must_use]
    pub fn new(applicant: impl Into<String>, submission_date: NaiveDate) -> Self {
        Self {
            applicant: applicant.into(),
            subject: String::new(),
            content: String::new(),
            unique_email: None,
            submission_date,
        }
    }
}
