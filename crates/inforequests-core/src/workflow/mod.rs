//! The branch/action workflow engine.
//!
//! - [`capability`]: the transition table and `can_add_*` queries
//! - [`deadline`]: statutory deadline arithmetic on actions
//! - [`expiration`]: automatic expiration insertion and the sweep
//! - [`emails`]: obligee address resolution for outgoing mail
//! - [`append`]: checked appends and advancement forks
//!
//! Every time-dependent decision reads "today" from the [`WorkflowContext`]
//! clock; nothing here consults ambient time.

pub mod append;
pub mod capability;
pub mod deadline;
pub mod emails;
pub mod expiration;

use chrono::NaiveDate;

use crate::clock::Clock;
use crate::config::DeadlineConfig;

pub use append::Advancement;
pub use capability::{Capability, CapabilitySet, UnknownCapability};
pub use expiration::SweepReport;

/// Clock and regulatory constants shared by workflow decisions.
#[derive(Clone, Copy)]
pub struct WorkflowContext<'a> {
    pub clock: &'a dyn Clock,
    pub deadlines: &'a DeadlineConfig,
}

impl<'a> WorkflowContext<'a> {
    #[must_use]
    pub const fn new(clock: &'a dyn Clock, deadlines: &'a DeadlineConfig) -> Self {
        Self { clock, deadlines }
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    #[must_use]
    pub fn now_us(&self) -> i64 {
        self.clock.now_us()
    }
}
