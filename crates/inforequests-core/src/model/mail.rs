//! Email records bound to actions.
//!
//! Transport lives elsewhere; the tracker only keeps enough of each message
//! to resolve correspondence addresses and order messages in time.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::action::{ParseEnumError, normalize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from the obligee.
    Inbound,
    /// Sent on behalf of the applicant.
    Outbound,
}

impl Direction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

impl RecipientKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub name: String,
    pub mail: String,
    pub kind: RecipientKind,
}

impl Recipient {
    #[must_use]
    pub fn new(name: impl Into<String>, mail: impl Into<String>, kind: RecipientKind) -> Self {
        Self {
            name: name.into(),
            mail: mail.into(),
            kind,
        }
    }
}

/// A stored email message.
///
/// `recipients` is filled by the loaders that need it (address resolution);
/// action loaders leave it empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub direction: Direction,
    pub from_name: String,
    pub from_mail: String,
    pub subject: String,
    pub processed_at_us: Option<i64>,
    pub recipients: Vec<Recipient>,
}

/// Fields for a new message and its recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub direction: Direction,
    pub from_name: String,
    pub from_mail: String,
    pub subject: String,
    pub text: String,
    pub processed_at_us: Option<i64>,
    pub recipients: Vec<Recipient>,
}

impl NewMessage {
    #[must_use]
    pub fn inbound(from_name: impl Into<String>, from_mail: impl Into<String>) -> Self {
        Self {
            direction: Direction::Inbound,
            from_name: from_name.into(),
            from_mail: from_mail.into(),
            subject: String::new(),
            text: String::new(),
            processed_at_us: None,
            recipients: Vec::new(),
        }
    }

    #[must_use]
    pub fn outbound(from_mail: impl Into<String>, recipients: Vec<Recipient>) -> Self {
        Self {
            direction: Direction::Outbound,
            from_name: String::new(),
            from_mail: from_mail.into(),
            subject: String::new(),
            text: String::new(),
            processed_at_us: None,
            recipients,
        }
    }

    #[must_use]
    pub const fn processed_at(mut self, at_us: i64) -> Self {
        self.processed_at_us = Some(at_us);
        self
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RecipientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            _ => Err(ParseEnumError {
                expected: "direction",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for RecipientKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "to" => Ok(Self::To),
            "cc" => Ok(Self::Cc),
            "bcc" => Ok(Self::Bcc),
            _ => Err(ParseEnumError {
                expected: "recipient kind",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, NewMessage, Recipient, RecipientKind};
    use std::str::FromStr;

    #[test]
    fn enums_parse_and_render() {
        assert_eq!(Direction::from_str("Inbound").unwrap(), Direction::Inbound);
        assert_eq!(Direction::Outbound.to_string(), "outbound");
        assert_eq!(RecipientKind::from_str("bcc").unwrap(), RecipientKind::Bcc);
        assert!(RecipientKind::from_str("reply-to").is_err());
    }

    #[test]
    fn constructors_pick_direction() {
        let inbound = NewMessage::inbound("Refusal From", "refusal-from@a.com").processed_at(5);
        assert_eq!(inbound.direction, Direction::Inbound);
        assert_eq!(inbound.processed_at_us, Some(5));

        let outbound = NewMessage::outbound(
            "applicant@example.org",
            vec![Recipient::new("Office", "office@a.com", RecipientKind::To)],
        );
        assert_eq!(outbound.direction, Direction::Outbound);
        assert_eq!(outbound.recipients.len(), 1);
    }
}
