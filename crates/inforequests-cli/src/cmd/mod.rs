pub mod action;
pub mod advance;
pub mod branch;
pub mod expire;
pub mod inforequest;
pub mod init;
pub mod obligee;

use anyhow::Result;
use std::path::{Path, PathBuf};

use inforequests_core::clock::SystemClock;
use inforequests_core::config::{self, Config};
use inforequests_core::db::{DATABASE_FILE, Store, query};
use inforequests_core::error::WorkflowError;
use inforequests_core::model::Branch;
use inforequests_core::workflow::WorkflowContext;

/// An opened data directory: config, store, and the configured clock.
pub struct Session {
    pub data_dir: PathBuf,
    pub config: Config,
    pub store: Store,
    pub clock: SystemClock,
}

impl Session {
    /// Open an initialized data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory was never initialized, or the
    /// config or database cannot be read.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let config = config::load_config(data_dir)?;
        let clock = SystemClock::new(config.tz()?);
        let store = Store::open_existing(&data_dir.join(DATABASE_FILE))?;
        tracing::debug!(data_dir = %data_dir.display(), "opened session");
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            config,
            store,
            clock,
        })
    }

    pub fn ctx(&self) -> WorkflowContext<'_> {
        WorkflowContext::new(&self.clock, &self.config.deadlines)
    }

    /// Load a branch by id.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::BranchNotFound`] for an unknown id.
    pub fn branch(&self, branch_id: i64) -> Result<Branch> {
        query::get_branch(&self.store, branch_id)?
            .ok_or_else(|| WorkflowError::BranchNotFound(branch_id).into())
    }
}
