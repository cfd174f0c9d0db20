//! Statutory deadline arithmetic. All values are calendar days.

use chrono::{Days, NaiveDate};

use super::WorkflowContext;
use crate::config::DeadlineConfig;
use crate::model::action::{Action, ActionType};

impl Action {
    /// Length of this action's deadline: the explicit override, else the
    /// days an extension granted, else the configured period for its type.
    #[must_use]
    pub fn deadline_period(&self, deadlines: &DeadlineConfig) -> Option<u32> {
        self.deadline_days
            .or_else(|| {
                self.extension_days
                    .filter(|_| self.action_type == ActionType::Extension)
            })
            .or_else(|| deadlines.days_for(self.action_type))
    }

    /// Last day on which the deadline is still running.
    #[must_use]
    pub fn deadline_date(&self, deadlines: &DeadlineConfig) -> Option<NaiveDate> {
        let period = self.deadline_period(deadlines)?;
        self.effective_date
            .checked_add_days(Days::new(u64::from(period)))
    }

    /// Days since the effective date (negative for future dates).
    #[must_use]
    pub fn days_passed(&self, ctx: &WorkflowContext<'_>) -> i64 {
        (ctx.today() - self.effective_date).num_days()
    }

    /// Days left until the deadline date; zero on the last day, negative
    /// once expired. `None` for actions without a deadline.
    #[must_use]
    pub fn deadline_remaining(&self, ctx: &WorkflowContext<'_>) -> Option<i64> {
        self.deadline_date(ctx.deadlines)
            .map(|deadline| (deadline - ctx.today()).num_days())
    }

    /// Whether today is past the deadline date.
    #[must_use]
    pub fn deadline_expired(&self, ctx: &WorkflowContext<'_>) -> bool {
        self.deadline_date(ctx.deadlines)
            .is_some_and(|deadline| ctx.today() > deadline)
    }
}
