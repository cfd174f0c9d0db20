use std::fmt;

use crate::model::action::ActionType;
use crate::workflow::capability::UnknownCapability;

/// Machine-readable error codes surfaced by the CLI and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    ObligeeNotFound,
    InforequestNotFound,
    BranchNotFound,
    ActionNotFound,
    ObligeeMandatory,
    ReadOnlyField,
    IntegrityViolation,
    UnknownCapability,
    ActionNotAllowed,
    EffectiveDateRegression,
    InvalidDisclosureLevel,
    InvalidEnumValue,
    CorruptDatabase,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ObligeeNotFound => "E2001",
            Self::InforequestNotFound => "E2002",
            Self::BranchNotFound => "E2003",
            Self::ActionNotFound => "E2004",
            Self::ObligeeMandatory => "E3001",
            Self::ReadOnlyField => "E3002",
            Self::IntegrityViolation => "E3003",
            Self::UnknownCapability => "E4001",
            Self::ActionNotAllowed => "E4002",
            Self::EffectiveDateRegression => "E4003",
            Self::InvalidDisclosureLevel => "E4004",
            Self::InvalidEnumValue => "E4005",
            Self::CorruptDatabase => "E5001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Data directory not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::ObligeeNotFound => "Obligee not found",
            Self::InforequestNotFound => "Inforequest not found",
            Self::BranchNotFound => "Branch not found",
            Self::ActionNotFound => "Action not found",
            Self::ObligeeMandatory => "Branch obligee is mandatory",
            Self::ReadOnlyField => "Field is read-only",
            Self::IntegrityViolation => "Database integrity violation",
            Self::UnknownCapability => "Unknown capability",
            Self::ActionNotAllowed => "Action not allowed at this point",
            Self::EffectiveDateRegression => "Effective date precedes the last action",
            Self::InvalidDisclosureLevel => "Invalid disclosure level",
            Self::InvalidEnumValue => "Invalid action type/level value",
            Self::CorruptDatabase => "Corrupt SQLite database",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `ir init` to create the data directory."),
            Self::ConfigParseError => Some("Fix syntax in config.toml and retry."),
            Self::ObligeeNotFound
            | Self::InforequestNotFound
            | Self::BranchNotFound
            | Self::ActionNotFound => None,
            Self::ObligeeMandatory => Some("Pass the obligee the branch is addressed to."),
            Self::ReadOnlyField => {
                Some("The obligee snapshot is resolved automatically when a branch is created.")
            }
            Self::IntegrityViolation => Some("Check that referenced records exist."),
            Self::UnknownCapability => Some(
                "advanced_request, expiration and appeal_expiration are added by the system only.",
            ),
            Self::ActionNotAllowed => Some("Run `ir branch show` to list the allowed actions."),
            Self::EffectiveDateRegression => {
                Some("Use a date on or after the last action of the branch.")
            }
            Self::InvalidDisclosureLevel => {
                Some("Disclosures need --disclosure-level; other actions must not set it.")
            }
            Self::InvalidEnumValue => Some("Use one of the documented action type values."),
            Self::CorruptDatabase => Some("Restore the database from a backup."),
            Self::LockContention => {
                Some("Retry after the other `ir expire` process releases its lock.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Typed failures of the branch/action workflow and its store.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Branch.obligee is mandatory")]
    ObligeeMandatory,

    #[error("Branch.{field} is read-only")]
    ReadOnlyField { field: &'static str },

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error(transparent)]
    UnknownCapability(#[from] UnknownCapability),

    #[error("cannot add {action_type} to branch {branch_id} at this point")]
    ActionNotAllowed {
        branch_id: i64,
        action_type: ActionType,
    },

    #[error("effective date {effective_date} precedes last action date {last_date}")]
    EffectiveDateRegression {
        effective_date: chrono::NaiveDate,
        last_date: chrono::NaiveDate,
    },

    #[error("{0}")]
    InvalidDisclosureLevel(&'static str),

    #[error("obligee {0} not found")]
    ObligeeNotFound(i64),

    #[error("inforequest {0} not found")]
    InforequestNotFound(i64),

    #[error("branch {0} not found")]
    BranchNotFound(i64),

    #[error("action {0} not found")]
    ActionNotFound(i64),
}

impl WorkflowError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ObligeeMandatory => ErrorCode::ObligeeMandatory,
            Self::ReadOnlyField { .. } => ErrorCode::ReadOnlyField,
            Self::Integrity(_) => ErrorCode::IntegrityViolation,
            Self::UnknownCapability(_) => ErrorCode::UnknownCapability,
            Self::ActionNotAllowed { .. } => ErrorCode::ActionNotAllowed,
            Self::EffectiveDateRegression { .. } => ErrorCode::EffectiveDateRegression,
            Self::InvalidDisclosureLevel(_) => ErrorCode::InvalidDisclosureLevel,
            Self::ObligeeNotFound(_) => ErrorCode::ObligeeNotFound,
            Self::InforequestNotFound(_) => ErrorCode::InforequestNotFound,
            Self::BranchNotFound(_) => ErrorCode::BranchNotFound,
            Self::ActionNotFound(_) => ErrorCode::ActionNotFound,
        }
    }
}

/// Map a SQLite constraint failure to [`WorkflowError::Integrity`]; other
/// errors pass through unchanged.
pub(crate) fn integrity_or(err: rusqlite::Error) -> anyhow::Error {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, ref message)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            let detail = message
                .clone()
                .unwrap_or_else(|| "constraint violation".to_string());
            WorkflowError::Integrity(detail).into()
        }
        other => other.into(),
    }
}

/// Best-effort classification of an `anyhow` error chain.
#[must_use]
pub fn classify(err: &anyhow::Error) -> ErrorCode {
    for cause in err.chain() {
        if let Some(workflow) = cause.downcast_ref::<WorkflowError>() {
            return workflow.code();
        }
        if cause.downcast_ref::<UnknownCapability>().is_some() {
            return ErrorCode::UnknownCapability;
        }
        if cause
            .downcast_ref::<crate::model::action::ParseEnumError>()
            .is_some()
        {
            return ErrorCode::InvalidEnumValue;
        }
        if cause.downcast_ref::<crate::db::StoreError>().is_some() {
            return ErrorCode::NotInitialized;
        }
        if let Some(sqlite) = cause.downcast_ref::<rusqlite::Error>() {
            if matches!(
                sqlite.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase)
            ) {
                return ErrorCode::CorruptDatabase;
            }
        }
        if let Some(lock) = cause.downcast_ref::<crate::lock::LockError>() {
            return lock.code();
        }
        if cause.downcast_ref::<toml::de::Error>().is_some() {
            return ErrorCode::ConfigParseError;
        }
    }
    ErrorCode::InternalUnexpected
}
