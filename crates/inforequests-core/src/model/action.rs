use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::mail::Message;

/// The fifteen legally meaningful steps of an inforequest conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Request,
    ClarificationRequest,
    ClarificationResponse,
    Confirmation,
    Extension,
    Advancement,
    Disclosure,
    Refusal,
    Appeal,
    Affirmation,
    Reversion,
    Remandment,
    AdvancedRequest,
    Expiration,
    AppealExpiration,
}

/// Which party (or the system itself) authors an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Applicant,
    Obligee,
    System,
}

impl ActionType {
    /// All action types in catalog order.
    pub const ALL: [Self; 15] = [
        Self::Request,
        Self::ClarificationRequest,
        Self::ClarificationResponse,
        Self::Confirmation,
        Self::Extension,
        Self::Advancement,
        Self::Disclosure,
        Self::Refusal,
        Self::Appeal,
        Self::Affirmation,
        Self::Reversion,
        Self::Remandment,
        Self::AdvancedRequest,
        Self::Expiration,
        Self::AppealExpiration,
    ];

    /// Canonical `snake_case` name, also used as the stored column value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::ClarificationRequest => "clarification_request",
            Self::ClarificationResponse => "clarification_response",
            Self::Confirmation => "confirmation",
            Self::Extension => "extension",
            Self::Advancement => "advancement",
            Self::Disclosure => "disclosure",
            Self::Refusal => "refusal",
            Self::Appeal => "appeal",
            Self::Affirmation => "affirmation",
            Self::Reversion => "reversion",
            Self::Remandment => "remandment",
            Self::AdvancedRequest => "advanced_request",
            Self::Expiration => "expiration",
            Self::AppealExpiration => "appeal_expiration",
        }
    }

    /// Who authors actions of this type.
    #[must_use]
    pub const fn origin(self) -> Origin {
        match self {
            Self::Request | Self::ClarificationResponse | Self::Appeal => Origin::Applicant,
            Self::Confirmation
            | Self::Extension
            | Self::Advancement
            | Self::ClarificationRequest
            | Self::Disclosure
            | Self::Refusal
            | Self::Affirmation
            | Self::Reversion
            | Self::Remandment => Origin::Obligee,
            Self::AdvancedRequest | Self::Expiration | Self::AppealExpiration => Origin::System,
        }
    }
}

/// How much of the requested information the obligee released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisclosureLevel {
    None,
    Partial,
    Full,
}

impl DisclosureLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Partial => "partial",
            Self::Full => "full",
        }
    }
}

/// A persisted action of a branch.
///
/// Actions are immutable once stored. The only relation that grows later is
/// the set of branches an advancement spawned, which lives on the branch side
/// (`branches.advanced_by_id`) and is queried on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub action_id: i64,
    pub branch_id: i64,
    /// Branch-local sequence number, starting at 1.
    pub position: i64,
    pub action_type: ActionType,
    pub subject: String,
    pub content: String,
    pub effective_date: NaiveDate,
    /// Explicit deadline in days, overriding the configured statutory period.
    pub deadline_days: Option<u32>,
    /// Days granted by an extension.
    pub extension_days: Option<u32>,
    pub disclosure_level: Option<DisclosureLevel>,
    pub message: Option<Message>,
    pub created_at_us: i64,
}

impl Action {
    /// Whether an email message is bound to this action.
    #[must_use]
    pub const fn has_email(&self) -> bool {
        self.message.is_some()
    }
}

/// Fields for a new action. Dates and the optional message id are supplied
/// by the caller; `position` and `created_at_us` are assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAction {
    pub action_type: ActionType,
    pub subject: String,
    pub content: String,
    pub effective_date: NaiveDate,
    pub deadline_days: Option<u32>,
    pub extension_days: Option<u32>,
    pub disclosure_level: Option<DisclosureLevel>,
    pub message_id: Option<i64>,
}

impl NewAction {
    /// A bare action of `action_type` effective on `effective_date`.
    #[must_use]
    pub const fn new(action_type: ActionType, effective_date: NaiveDate) -> Self {
        Self {
            action_type,
            subject: String::new(),
            content: String::new(),
            effective_date,
            deadline_days: None,
            extension_days: None,
            disclosure_level: None,
            message_id: None,
        }
    }

    #[must_use]
    pub const fn with_disclosure_level(mut self, level: DisclosureLevel) -> Self {
        self.disclosure_level = Some(level);
        self
    }

    #[must_use]
    pub const fn with_message(mut self, message_id: i64) -> Self {
        self.message_id = Some(message_id);
        self
    }

    #[must_use]
    pub const fn with_extension(mut self, days: u32) -> Self {
        self.extension_days = Some(days);
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }
}

/// An uncommitted action an applicant is still composing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDraft {
    pub draft_id: i64,
    pub inforequest_id: i64,
    pub branch_id: Option<i64>,
    pub action_type: ActionType,
    pub subject: String,
    pub content: String,
    pub effective_date: Option<NaiveDate>,
    pub deadline_days: Option<u32>,
    pub disclosure_level: Option<DisclosureLevel>,
    /// Target obligees of a drafted advancement.
    pub obligee_ids: Vec<i64>,
}

/// Fields for a new action draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActionDraft {
    pub inforequest_id: i64,
    pub branch_id: Option<i64>,
    pub action_type: ActionType,
    pub subject: String,
    pub content: String,
    pub effective_date: Option<NaiveDate>,
    pub deadline_days: Option<u32>,
    pub disclosure_level: Option<DisclosureLevel>,
    pub obligee_ids: Vec<i64>,
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DisclosureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase().replace('-', "_")
}

impl FromStr for ActionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                expected: "action type",
                got: s.to_string(),
            })
    }
}

impl FromStr for DisclosureLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "none" => Ok(Self::None),
            "partial" => Ok(Self::Partial),
            "full" => Ok(Self::Full),
            _ => Err(ParseEnumError {
                expected: "disclosure level",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionType, DisclosureLevel, NewAction, Origin};
    use chrono::NaiveDate;
    use std::str::FromStr;

    #[test]
    fn action_type_json_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&ActionType::ClarificationRequest).unwrap(),
            "\"clarification_request\""
        );
        assert_eq!(
            serde_json::from_str::<ActionType>("\"appeal_expiration\"").unwrap(),
            ActionType::AppealExpiration
        );
        assert_eq!(
            serde_json::to_string(&DisclosureLevel::Partial).unwrap(),
            "\"partial\""
        );
    }

    #[test]
    fn display_parse_roundtrips() {
        for value in ActionType::ALL {
            let rendered = value.to_string();
            assert_eq!(ActionType::from_str(&rendered).unwrap(), value);
        }
        for value in [
            DisclosureLevel::None,
            DisclosureLevel::Partial,
            DisclosureLevel::Full,
        ] {
            assert_eq!(DisclosureLevel::from_str(value.as_str()).unwrap(), value);
        }
    }

    #[test]
    fn parse_accepts_dashes_and_case() {
        assert_eq!(
            ActionType::from_str(" Advanced-Request ").unwrap(),
            ActionType::AdvancedRequest
        );
        assert_eq!(
            DisclosureLevel::from_str("FULL").unwrap(),
            DisclosureLevel::Full
        );
    }

    #[test]
    fn parse_rejects_unknown_values() {
        let err = ActionType::from_str("complaint").unwrap_err();
        assert_eq!(err.to_string(), "invalid action type: 'complaint'");
        assert!(DisclosureLevel::from_str("most").is_err());
    }

    #[test]
    fn origins_partition_the_catalog() {
        let system: Vec<_> = ActionType::ALL
            .into_iter()
            .filter(|t| t.origin() == Origin::System)
            .collect();
        assert_eq!(
            system,
            [
                ActionType::AdvancedRequest,
                ActionType::Expiration,
                ActionType::AppealExpiration
            ]
        );
        assert_eq!(ActionType::Appeal.origin(), Origin::Applicant);
        assert_eq!(ActionType::Remandment.origin(), Origin::Obligee);
    }

    #[test]
    fn new_action_builders_set_fields() {
        let date = NaiveDate::from_ymd_opt(2010, 7, 5).unwrap();
        let action = NewAction::new(ActionType::Disclosure, date)
            .with_disclosure_level(DisclosureLevel::Partial)
            .with_message(7)
            .with_subject("Re: budget");
        assert_eq!(action.disclosure_level, Some(DisclosureLevel::Partial));
        assert_eq!(action.message_id, Some(7));
        assert_eq!(action.subject, "Re: budget");
        assert_eq!(action.deadline_days, None);
    }
}
