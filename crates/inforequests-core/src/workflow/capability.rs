//! Which actions may follow the current tail of a branch.
//!
//! The whole legality table lives in [`successors`]: one `match` over the
//! last action type producing a [`CapabilitySet`], widened once the last
//! action's deadline has passed.

use anyhow::Result;
use serde::Serialize;
use std::fmt;

use super::WorkflowContext;
use crate::db::Store;
use crate::error::WorkflowError;
use crate::model::action::{Action, ActionType, DisclosureLevel};
use crate::model::branch::Branch;

use Capability as C;

/// An addable category of action.
///
/// Most correspond one-to-one to an [`ActionType`]; the four `*_action`
/// categories stand for "any applicant/obligee action, by email or not" and
/// are what user interfaces offer as generic entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Request,
    ClarificationResponse,
    Appeal,
    Confirmation,
    Extension,
    Advancement,
    ClarificationRequest,
    Disclosure,
    Refusal,
    Affirmation,
    Reversion,
    Remandment,
    ApplicantAction,
    ApplicantEmailAction,
    ObligeeAction,
    ObligeeEmailAction,
}

impl Capability {
    pub const ALL: [Self; 16] = [
        Self::Request,
        Self::ClarificationResponse,
        Self::Appeal,
        Self::Confirmation,
        Self::Extension,
        Self::Advancement,
        Self::ClarificationRequest,
        Self::Disclosure,
        Self::Refusal,
        Self::Affirmation,
        Self::Reversion,
        Self::Remandment,
        Self::ApplicantAction,
        Self::ApplicantEmailAction,
        Self::ObligeeAction,
        Self::ObligeeEmailAction,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::ClarificationResponse => "clarification_response",
            Self::Appeal => "appeal",
            Self::Confirmation => "confirmation",
            Self::Extension => "extension",
            Self::Advancement => "advancement",
            Self::ClarificationRequest => "clarification_request",
            Self::Disclosure => "disclosure",
            Self::Refusal => "refusal",
            Self::Affirmation => "affirmation",
            Self::Reversion => "reversion",
            Self::Remandment => "remandment",
            Self::ApplicantAction => "applicant_action",
            Self::ApplicantEmailAction => "applicant_email_action",
            Self::ObligeeAction => "obligee_action",
            Self::ObligeeEmailAction => "obligee_email_action",
        }
    }

    /// The capability guarding appends of `action_type`.
    ///
    /// # Errors
    ///
    /// System-generated types (advanced request, expiration, appeal
    /// expiration) are never appended by hand and have no capability.
    pub const fn for_action_type(action_type: ActionType) -> Result<Self, UnknownCapability> {
        match action_type {
            ActionType::Request => Ok(Self::Request),
            ActionType::ClarificationResponse => Ok(Self::ClarificationResponse),
            ActionType::Appeal => Ok(Self::Appeal),
            ActionType::Confirmation => Ok(Self::Confirmation),
            ActionType::Extension => Ok(Self::Extension),
            ActionType::Advancement => Ok(Self::Advancement),
            ActionType::ClarificationRequest => Ok(Self::ClarificationRequest),
            ActionType::Disclosure => Ok(Self::Disclosure),
            ActionType::Refusal => Ok(Self::Refusal),
            ActionType::Affirmation => Ok(Self::Affirmation),
            ActionType::Reversion => Ok(Self::Reversion),
            ActionType::Remandment => Ok(Self::Remandment),
            ActionType::AdvancedRequest | ActionType::Expiration | ActionType::AppealExpiration => {
                Err(UnknownCapability { action_type })
            }
        }
    }

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when asking whether an action type with no capability can be
/// added. Distinguishes a programming error from a legitimate `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownCapability {
    pub action_type: ActionType,
}

impl fmt::Display for UnknownCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "branch has no capability 'can_add_{}'", self.action_type)
    }
}

impl std::error::Error for UnknownCapability {}

/// A set of capabilities as a bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub const EMPTY: Self = Self(0);

    #[must_use]
    pub const fn of(capabilities: &[Capability]) -> Self {
        let mut bits = 0;
        let mut idx = 0;
        while idx < capabilities.len() {
            bits |= capabilities[idx].bit();
            idx += 1;
        }
        Self(bits)
    }

    #[must_use]
    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Members in [`Capability::ALL`] order.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |capability| self.contains(*capability))
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(Capability::as_str).collect();
        f.write_str(&names.join(", "))
    }
}

const OBLIGEE_ANSWERS: CapabilitySet = CapabilitySet::of(&[
    C::Confirmation,
    C::Extension,
    C::Advancement,
    C::ClarificationRequest,
    C::Disclosure,
    C::Refusal,
    C::ObligeeAction,
    C::ObligeeEmailAction,
]);

const OBLIGEE_FOLLOW_UPS: CapabilitySet = CapabilitySet::of(&[
    C::Extension,
    C::Advancement,
    C::ClarificationRequest,
    C::Disclosure,
    C::Refusal,
    C::ObligeeAction,
    C::ObligeeEmailAction,
]);

const OBLIGEE_DECISIONS: CapabilitySet = CapabilitySet::of(&[
    C::Disclosure,
    C::Refusal,
    C::ObligeeAction,
    C::ObligeeEmailAction,
]);

const REMANDED: CapabilitySet = CapabilitySet::of(&[
    C::Extension,
    C::Disclosure,
    C::Refusal,
    C::ObligeeAction,
    C::ObligeeEmailAction,
]);

const CLARIFYING: CapabilitySet = CapabilitySet::of(&[
    C::ClarificationResponse,
    C::ClarificationRequest,
    C::ObligeeAction,
    C::ObligeeEmailAction,
    C::ApplicantAction,
    C::ApplicantEmailAction,
]);

const APPEALABLE: CapabilitySet = CapabilitySet::of(&[C::Appeal, C::ApplicantAction]);

const APPEALED: CapabilitySet = CapabilitySet::of(&[
    C::Affirmation,
    C::Reversion,
    C::Remandment,
    C::ObligeeAction,
]);

/// Capabilities after `last`, given whether its deadline has expired.
///
/// An empty branch offers nothing; its first action is written when the
/// branch is created.
#[must_use]
pub const fn successors(last: Option<&Action>, expired: bool) -> CapabilitySet {
    let Some(last) = last else {
        return CapabilitySet::EMPTY;
    };

    let (open, on_expiry) = match last.action_type {
        ActionType::Request | ActionType::AdvancedRequest => (OBLIGEE_ANSWERS, APPEALABLE),
        ActionType::ClarificationResponse | ActionType::Confirmation => {
            (OBLIGEE_FOLLOW_UPS, APPEALABLE)
        }
        ActionType::Extension => (OBLIGEE_DECISIONS, APPEALABLE),
        ActionType::Remandment => (REMANDED, APPEALABLE),
        ActionType::ClarificationRequest => (CLARIFYING, CapabilitySet::EMPTY),
        ActionType::Appeal => (APPEALED, CapabilitySet::EMPTY),
        ActionType::Disclosure => match last.disclosure_level {
            Some(DisclosureLevel::Full) => (CapabilitySet::EMPTY, CapabilitySet::EMPTY),
            _ => (APPEALABLE, CapabilitySet::EMPTY),
        },
        ActionType::Advancement | ActionType::Refusal | ActionType::Expiration => {
            (APPEALABLE, CapabilitySet::EMPTY)
        }
        ActionType::Affirmation | ActionType::Reversion | ActionType::AppealExpiration => {
            (CapabilitySet::EMPTY, CapabilitySet::EMPTY)
        }
    };

    if expired { open.union(on_expiry) } else { open }
}

impl Branch {
    /// Everything that may be appended to this branch today.
    ///
    /// # Errors
    ///
    /// Returns an error if the last action cannot be loaded.
    pub fn capabilities(&mut self, store: &Store, ctx: &WorkflowContext<'_>) -> Result<CapabilitySet> {
        let last = self.last_action(store)?;
        let expired = last.is_some_and(|action| action.deadline_expired(ctx));
        Ok(successors(last, expired))
    }

    /// Whether `capability` is currently open.
    ///
    /// # Errors
    ///
    /// Returns an error if the last action cannot be loaded.
    pub fn can_add(
        &mut self,
        store: &Store,
        ctx: &WorkflowContext<'_>,
        capability: Capability,
    ) -> Result<bool> {
        Ok(self.capabilities(store, ctx)?.contains(capability))
    }

    /// Whether any of `action_types` may be appended now.
    ///
    /// Types are checked in order: one without a capability fails
    /// immediately unless an earlier type already answered `true`. An empty
    /// list is `false`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::UnknownCapability`] as described above, or an
    /// error if the last action cannot be loaded.
    pub fn can_add_action(
        &mut self,
        store: &Store,
        ctx: &WorkflowContext<'_>,
        action_types: &[ActionType],
    ) -> Result<bool> {
        if action_types.is_empty() {
            return Ok(false);
        }

        let open = self.capabilities(store, ctx)?;
        for action_type in action_types {
            let capability =
                Capability::for_action_type(*action_type).map_err(WorkflowError::from)?;
            if open.contains(capability) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{Capability, CapabilitySet, successors};
    use crate::model::action::{Action, ActionType, DisclosureLevel};
    use chrono::NaiveDate;

    fn action(action_type: ActionType) -> Action {
        Action {
            action_id: 1,
            branch_id: 1,
            position: 1,
            action_type,
            subject: String::new(),
            content: String::new(),
            effective_date: NaiveDate::from_ymd_opt(2010, 7, 5).expect("valid date"),
            deadline_days: None,
            extension_days: None,
            disclosure_level: None,
            message: None,
            created_at_us: 0,
        }
    }

    fn names(set: CapabilitySet) -> Vec<&'static str> {
        set.iter().map(Capability::as_str).collect()
    }

    #[test]
    fn system_types_have_no_capability() {
        for action_type in ActionType::ALL {
            let result = Capability::for_action_type(action_type);
            let system = matches!(
                action_type,
                ActionType::AdvancedRequest | ActionType::Expiration | ActionType::AppealExpiration
            );
            assert_eq!(result.is_err(), system, "{action_type}");
        }

        let err = Capability::for_action_type(ActionType::AppealExpiration).unwrap_err();
        assert_eq!(
            err.to_string(),
            "branch has no capability 'can_add_appeal_expiration'"
        );
    }

    #[test]
    fn request_widens_after_expiry() {
        let request = action(ActionType::Request);
        let open = successors(Some(&request), false);
        assert!(open.contains(Capability::Confirmation));
        assert!(!open.contains(Capability::ApplicantAction));
        assert!(!open.contains(Capability::Appeal));

        let expired = successors(Some(&request), true);
        assert!(expired.contains(Capability::Confirmation));
        assert!(expired.contains(Capability::ApplicantAction));
        assert!(expired.contains(Capability::Appeal));
    }

    #[test]
    fn disclosure_level_decides_appealability() {
        let mut disclosure = action(ActionType::Disclosure);
        disclosure.disclosure_level = Some(DisclosureLevel::Partial);
        assert_eq!(
            names(successors(Some(&disclosure), false)),
            ["appeal", "applicant_action"]
        );

        disclosure.disclosure_level = Some(DisclosureLevel::Full);
        assert!(successors(Some(&disclosure), true).is_empty());
    }

    #[test]
    fn terminal_types_and_empty_branch_offer_nothing() {
        for action_type in [
            ActionType::Affirmation,
            ActionType::Reversion,
            ActionType::AppealExpiration,
        ] {
            assert!(successors(Some(&action(action_type)), true).is_empty());
        }
        assert!(successors(None, true).is_empty());
    }

    #[test]
    fn set_renders_in_catalog_order() {
        let set = CapabilitySet::of(&[Capability::ObligeeAction, Capability::Appeal]);
        assert_eq!(set.to_string(), "appeal, obligee_action");
        assert_eq!(
            serde_json::to_string(&set).expect("serialize"),
            "[\"appeal\",\"obligee_action\"]"
        );
    }
}
