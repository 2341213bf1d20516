//! Tender and bid workflows: access checks, versioned edits, status
//! transitions and listings. Everything here runs on a borrowed
//! `PgConnection` and reports failures as [`WorkflowError`].

pub mod access;
pub mod bids;
pub mod tenders;

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use crate::domain::UnknownVariant;

pub const DEFAULT_LIMIT: i64 = 5;
pub const DEFAULT_OFFSET: i64 = 0;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("user is not authenticated")]
    Unauthenticated,
    #[error("insufficient permissions to perform this action")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("{0}")]
    Internal(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

/// Stored enum columns only hold values the CHECK constraints allow, so a
/// parse failure here means the row was written by something else.
pub(crate) fn stored<T>(value: &str) -> WorkflowResult<T>
where
    T: std::str::FromStr<Err = UnknownVariant>,
{
    value
        .parse()
        .map_err(|err: UnknownVariant| WorkflowError::Internal(format!("corrupt row: {err}")))
}

/// Caller-supplied input enums map parse failures to `InvalidInput`.
pub(crate) fn requested<T>(value: &str) -> WorkflowResult<T>
where
    T: std::str::FromStr<Err = UnknownVariant>,
{
    value
        .parse()
        .map_err(|err: UnknownVariant| WorkflowError::InvalidInput(err.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
        }
    }
}

impl Pagination {
    /// Builds pagination from raw query values. Absent or blank values fall
    /// back to the defaults; anything else must be a non-negative integer.
    pub fn parse(limit: Option<&str>, offset: Option<&str>) -> WorkflowResult<Self> {
        Ok(Self {
            limit: parse_bound("limit", limit, DEFAULT_LIMIT)?,
            offset: parse_bound("offset", offset, DEFAULT_OFFSET)?,
        })
    }
}

fn parse_bound(name: &str, raw: Option<&str>, default: i64) -> WorkflowResult<i64> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(default);
    };
    match raw.parse::<i64>() {
        Ok(value) if value >= 0 => Ok(value),
        _ => Err(WorkflowError::invalid(format!(
            "{name} must be a non-negative integer"
        ))),
    }
}

pub(crate) fn utc(value: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc)
}

/// A second writer inserting the same `(id, version)` loses with a conflict
/// instead of a generic database error.
pub(crate) fn version_conflict(err: DieselError) -> WorkflowError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            WorkflowError::conflict("entity was modified concurrently, retry the request")
        }
        other => WorkflowError::Database(other),
    }
}

/// Empty strings in partial updates mean "leave unchanged".
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TenderStatus;

    #[test]
    fn duplicate_version_rows_are_conflicts() {
        let duplicate = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key value violates unique constraint".to_string()),
        );
        assert!(matches!(
            version_conflict(duplicate),
            WorkflowError::Conflict(_)
        ));
        assert!(matches!(
            version_conflict(DieselError::NotFound),
            WorkflowError::Database(DieselError::NotFound)
        ));
    }

    #[test]
    fn pagination_defaults_when_absent_or_blank() {
        assert_eq!(Pagination::parse(None, None).unwrap(), Pagination::default());
        let parsed = Pagination::parse(Some(" "), Some("")).unwrap();
        assert_eq!(parsed.limit, 5);
        assert_eq!(parsed.offset, 0);
    }

    #[test]
    fn pagination_accepts_explicit_values() {
        let parsed = Pagination::parse(Some("10"), Some("5")).unwrap();
        assert_eq!(parsed, Pagination { limit: 10, offset: 5 });
    }

    #[test]
    fn pagination_rejects_negative_and_non_integer_values() {
        assert!(matches!(
            Pagination::parse(Some("-1"), None),
            Err(WorkflowError::InvalidInput(_))
        ));
        assert!(matches!(
            Pagination::parse(None, Some("two")),
            Err(WorkflowError::InvalidInput(_))
        ));
    }

    #[test]
    fn requested_and_stored_parse_failures_differ() {
        assert!(matches!(
            requested::<TenderStatus>("Open"),
            Err(WorkflowError::InvalidInput(_))
        ));
        assert!(matches!(
            stored::<TenderStatus>("Open"),
            Err(WorkflowError::Internal(_))
        ));
    }

    #[test]
    fn non_empty_trims_and_drops_blank_values() {
        assert_eq!(non_empty(Some("  name ")), Some("name"));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }
}
