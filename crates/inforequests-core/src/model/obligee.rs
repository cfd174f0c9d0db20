//! Obligees and their historical snapshots.

use serde::Serialize;
use std::fmt;

/// A display-name / address pair used when composing correspondence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Addressee {
    pub name: String,
    pub address: String,
}

impl Addressee {
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Addressee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.address)
        } else if self.name.contains([',', '<', '>', '"']) {
            write!(f, "\"{}\" <{}>", self.name.replace('"', "'"), self.address)
        } else {
            write!(f, "{} <{}>", self.name, self.address)
        }
    }
}

/// Parse an address list such as `Office <office@a.com>, info@a.com`.
///
/// Commas inside double quotes or angle brackets do not split entries. Empty
/// entries are skipped.
#[must_use]
pub fn parse_addresses(raw: &str) -> Vec<Addressee> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;

    for ch in raw.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '<' if !in_quotes => {
                in_angle = true;
                current.push(ch);
            }
            '>' if !in_quotes => {
                in_angle = false;
                current.push(ch);
            }
            ',' if !in_quotes && !in_angle => entries.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    entries.push(current);

    entries
        .iter()
        .filter_map(|entry| parse_single(entry))
        .collect()
}

fn parse_single(entry: &str) -> Option<Addressee> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }

    match (entry.rfind('<'), entry.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let address = entry[open + 1..close].trim();
            if address.is_empty() {
                return None;
            }
            let name = entry[..open].trim().trim_matches('"').trim();
            Some(Addressee::new(name, address))
        }
        _ => Some(Addressee::new("", entry)),
    }
}

/// Render addressees back into the stored list format.
#[must_use]
pub fn format_addresses(addressees: &[Addressee]) -> String {
    addressees
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The current, mutable state of an obligee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Obligee {
    pub obligee_id: i64,
    pub name: String,
    pub street: String,
    pub city: String,
    pub zip: String,
    /// Raw address list, see [`parse_addresses`].
    pub emails: String,
    pub updated_at_us: i64,
}

impl Obligee {
    #[must_use]
    pub fn addresses(&self) -> Vec<Addressee> {
        parse_addresses(&self.emails)
    }
}

/// Fields for creating or updating an obligee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObligeeFields {
    pub name: String,
    pub street: String,
    pub city: String,
    pub zip: String,
    pub emails: String,
}

impl ObligeeFields {
    #[must_use]
    pub fn new(name: impl Into<String>, emails: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emails: emails.into(),
            ..Self::default()
        }
    }
}

/// Immutable point-in-time copy of an obligee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObligeeSnapshot {
    pub snapshot_id: i64,
    pub obligee_id: i64,
    pub name: String,
    pub street: String,
    pub city: String,
    pub zip: String,
    pub emails: String,
    pub created_at_us: i64,
}

impl ObligeeSnapshot {
    #[must_use]
    pub fn addresses(&self) -> Vec<Addressee> {
        parse_addresses(&self.emails)
    }
}

#[cfg(test)]
mod tests {
    use super::{Addressee, format_addresses, parse_addresses};

    #[test]
    fn parses_named_and_bare_addresses() {
        let parsed = parse_addresses("Obligee1 <oblige1@a.com>, oblige2@a.com");
        assert_eq!(
            parsed,
            vec![
                Addressee::new("Obligee1", "oblige1@a.com"),
                Addressee::new("", "oblige2@a.com"),
            ]
        );
    }

    #[test]
    fn quoted_names_may_contain_commas() {
        let parsed = parse_addresses("\"Office, Main\" <main@a.com>,branch@a.com");
        assert_eq!(parsed[0], Addressee::new("Office, Main", "main@a.com"));
        assert_eq!(parsed[1], Addressee::new("", "branch@a.com"));
    }

    #[test]
    fn empty_entries_are_skipped() {
        assert!(parse_addresses("").is_empty());
        assert!(parse_addresses(" , ,").is_empty());
        assert!(parse_addresses("Nobody <>").is_empty());
    }

    #[test]
    fn format_then_parse_preserves_entries() {
        let entries = vec![
            Addressee::new("Office, Main", "main@a.com"),
            Addressee::new("", "info@a.com"),
            Addressee::new("Clerk", "clerk@a.com"),
        ];
        let rendered = format_addresses(&entries);
        assert_eq!(
            rendered,
            "\"Office, Main\" <main@a.com>, info@a.com, Clerk <clerk@a.com>"
        );
        assert_eq!(parse_addresses(&rendered), entries);
    }
}
