//! Repository error types.
//!
//! # Responsibility
//! - Separate configuration, mapping, identity and store failures.
//! - Carry the entity and operation that triggered a store failure.
//!
//! # Invariants
//! - Store failures keep the original `rusqlite::Error` as `source()`.
//! - A missing row on `find_by_id` is never an error.

use crate::model::identity::IdentityError;
use crate::model::operation::CrudOperation;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DataResult<T> = Result<T, DataError>;

/// Repository wiring problems. Fatal, never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither a declared statement nor a default exists.
    SqlNotDefined {
        entity: &'static str,
        operation: CrudOperation,
    },
    /// Bulk delete SQL must contain exactly one `:ids` placeholder.
    InvalidIdsPlaceholder { entity: &'static str, found: usize },
    /// Entity has no mutable columns, whatever UPDATE SQL is configured.
    Immutable { entity: &'static str },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SqlNotDefined { entity, operation } => {
                write!(f, "SQL not defined for operation {operation} on entity {entity}")
            }
            Self::InvalidIdsPlaceholder { entity, found } => write!(
                f,
                "{} SQL for entity {entity} must contain exactly one `:ids` placeholder, found {found}",
                CrudOperation::DeleteMany
            ),
            Self::Immutable { entity } => {
                write!(f, "entity {entity} is immutable and cannot be updated")
            }
        }
    }
}

impl Error for ConfigError {}

/// Row-to-entity conversion failures. Aborts the current read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// Expected column label is not part of the result set.
    MissingColumn(String),
    /// Identity column for a required entity is null or not selected.
    MissingIdentity(String),
    /// Column value has the wrong type or cannot be parsed.
    InvalidValue { column: String, reason: String },
    /// Region text outside the closed enumeration.
    UnknownRegion(String),
}

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColumn(column) => write!(f, "result set has no column `{column}`"),
            Self::MissingIdentity(column) => {
                write!(f, "identity column `{column}` is null or missing")
            }
            Self::InvalidValue { column, reason } => {
                write!(f, "invalid value in column `{column}`: {reason}")
            }
            Self::UnknownRegion(value) => write!(f, "unknown region `{value}`"),
        }
    }
}

impl Error for MappingError {}

/// Error returned by every repository operation.
#[derive(Debug)]
pub enum DataError {
    Configuration(ConfigError),
    Mapping(MappingError),
    Identity(IdentityError),
    /// Failure talking to SQLite.
    Store {
        entity: &'static str,
        operation: CrudOperation,
        source: rusqlite::Error,
    },
    /// Update or delete matched no row.
    NotFound { entity: &'static str, id: i64 },
}

impl DataError {
    /// Returns a closure wrapping a `rusqlite::Error` with operation context.
    pub(crate) fn store(
        entity: &'static str,
        operation: CrudOperation,
    ) -> impl FnOnce(rusqlite::Error) -> DataError {
        move |source| DataError::Store {
            entity,
            operation,
            source,
        }
    }

    /// Stable short code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Mapping(_) => "mapping",
            Self::Identity(_) => "identity",
            Self::Store { .. } => "store",
            Self::NotFound { .. } => "not_found",
        }
    }
}

impl Display for DataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "{err}"),
            Self::Mapping(err) => write!(f, "{err}"),
            Self::Identity(err) => write!(f, "{err}"),
            Self::Store {
                entity,
                operation,
                source,
            } => write!(f, "{operation} on {entity} failed: {source}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(err) => Some(err),
            Self::Mapping(err) => Some(err),
            Self::Identity(err) => Some(err),
            Self::Store { source, .. } => Some(source),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<ConfigError> for DataError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value)
    }
}

impl From<MappingError> for DataError {
    fn from(value: MappingError) -> Self {
        Self::Mapping(value)
    }
}

impl From<IdentityError> for DataError {
    fn from(value: IdentityError) -> Self {
        Self::Identity(value)
    }
}
