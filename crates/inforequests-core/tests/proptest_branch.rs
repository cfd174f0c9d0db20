//! Property tests for branch action sequences.

use chrono::{Days, NaiveDate};
use inforequests_core::clock::{Clock, FixedClock};
use inforequests_core::config::DeadlineConfig;
use inforequests_core::db::{Store, query, records};
use inforequests_core::model::{
    Action, ActionType, Branch, DisclosureLevel, NewAction, NewBranch, NewInforequest,
    NewMessage, ObligeeFields,
};
use inforequests_core::workflow::WorkflowContext;
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Step {
    action_type: ActionType,
    with_email: bool,
    days_later: u64,
}

fn step() -> impl Strategy<Value = Step> {
    (
        prop::sample::select(ActionType::ALL.to_vec()),
        any::<bool>(),
        0u64..20,
    )
        .prop_map(|(action_type, with_email, days_later)| Step {
            action_type,
            with_email,
            days_later,
        })
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2010, 7, 5).expect("valid date")
}

/// Write `steps` into a fresh branch without workflow checks and return an
/// uncached instance of it.
fn build(store: &Store, clock: &FixedClock, steps: &[Step]) -> Branch {
    let obligee = records::insert_obligee(
        store,
        &ObligeeFields::new("Obligee", "obligee@a.com"),
        clock.now_us(),
    )
    .expect("obligee");
    let inforequest = records::insert_inforequest(
        store,
        &NewInforequest::new("Applicant", start()),
        clock.now_us(),
    )
    .expect("inforequest");
    let branch = records::insert_branch(
        store,
        &NewBranch::main(inforequest.inforequest_id, obligee.obligee_id),
    )
    .expect("branch");

    let mut date = start();
    for step in steps {
        date = date + Days::new(step.days_later);
        let mut action = NewAction::new(step.action_type, date);
        if step.action_type == ActionType::Disclosure {
            action = action.with_disclosure_level(DisclosureLevel::Partial);
        }
        if step.with_email {
            let message = records::insert_message(store, &NewMessage::inbound("Clerk", "clerk@a.com"))
                .expect("message");
            action = action.with_message(message);
        }
        records::insert_action(store, branch.branch_id, &action, clock.now_us())
            .expect("action");
    }

    query::get_branch(store, branch.branch_id)
        .expect("query branch")
        .expect("branch exists")
}

proptest! {
    #[test]
    fn prop_actions_follow_insertion_order(steps in prop::collection::vec(step(), 0..12)) {
        let store = Store::open_in_memory().expect("store");
        let clock = FixedClock::on(start());
        let mut branch = build(&store, &clock, &steps);

        let actions = branch.actions(&store).expect("actions").to_vec();
        let positions: Vec<i64> = actions.iter().map(|a| a.position).collect();
        let expected: Vec<i64> = (1..).take(steps.len()).collect();
        prop_assert_eq!(positions, expected);

        let types: Vec<ActionType> = actions.iter().map(|a| a.action_type).collect();
        let inserted: Vec<ActionType> = steps.iter().map(|s| s.action_type).collect();
        prop_assert_eq!(types, inserted);
    }

    #[test]
    fn prop_derived_and_queried_views_agree(steps in prop::collection::vec(step(), 0..12)) {
        let store = Store::open_in_memory().expect("store");
        let clock = FixedClock::on(start());
        let branch = build(&store, &clock, &steps);

        let mut queried = branch.clone();
        let by_email_queried = queried.actions_by_email(&store).expect("by email").to_vec();
        let last_queried = queried.last_action(&store).expect("last").cloned();

        let mut derived = branch;
        let actions = derived.actions(&store).expect("actions").to_vec();
        let by_email_derived = derived.actions_by_email(&store).expect("derived").to_vec();
        let last_derived = derived.last_action(&store).expect("derived last").cloned();

        let filtered: Vec<Action> = actions.iter().filter(|a| a.has_email()).cloned().collect();
        prop_assert_eq!(&by_email_queried, &filtered);
        prop_assert_eq!(&by_email_derived, &filtered);
        prop_assert_eq!(&last_queried, &actions.last().cloned());
        prop_assert_eq!(&last_derived, &last_queried);
    }

    #[test]
    fn prop_expiration_is_idempotent(
        steps in prop::collection::vec(step(), 1..8),
        days_after in 0u64..120,
    ) {
        let store = Store::open_in_memory().expect("store");
        let clock = FixedClock::on(start());
        let deadlines = DeadlineConfig::default();
        let mut branch = build(&store, &clock, &steps);

        let last_date = branch
            .last_action(&store)
            .expect("last")
            .map(|a| a.effective_date)
            .expect("non-empty branch");
        clock.jump_to_date(last_date + Days::new(days_after));
        let ctx = WorkflowContext::new(&clock, &deadlines);

        let first = branch.add_expiration_if_expired(&store, &ctx).expect("first");
        let second = branch.add_expiration_if_expired(&store, &ctx).expect("second");
        prop_assert!(second.is_none());

        if let Some(inserted) = first {
            prop_assert!(matches!(
                inserted.action_type,
                ActionType::Expiration | ActionType::AppealExpiration
            ));
            prop_assert_eq!(inserted.position, i64::try_from(steps.len()).expect("small") + 1);
            prop_assert_eq!(inserted.effective_date, clock.today());
        }
    }
}
