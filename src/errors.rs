//! # Query Builder Error Types
//!
//! Every failure raised while assembling a query is terminal for that build
//! call: no partial AST is ever returned.
//!
//! ## Error Categories
//!
//! - **Validation**: malformed field, filter, order-by or operator shapes
//! - **Permission**: entity-level denial and identifiers rejected by the
//!   whitelist grammars (the injection firewall)
//! - **Type**: programmer misuse such as a negative limit
//! - **Internal**: collaborator failures (metadata, permission, share lookups)

use thiserror::Error;

use crate::catalog::errors::CatalogError;

/// Coarse classification used by callers to map errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Permission,
    Type,
    Internal,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("Invalid entity name: {0}")]
    InvalidEntity(String),

    #[error("Insufficient Permission for {0}")]
    InsufficientPermission(String),

    #[error(
        "Invalid field format for SELECT: {0}. Field names must be simple, quoted, table-qualified, aliased, a valid function call, or '*'."
    )]
    InvalidSelectField(String),

    #[error(
        "Invalid filter field format: {0}. Field names cannot contain special characters or disallowed patterns."
    )]
    InvalidFilterField(String),

    #[error("Invalid field format in Group By: {0}")]
    InvalidGroupBy(String),

    #[error("Invalid field format in Order By: {0}")]
    InvalidOrderBy(String),

    #[error("Invalid direction in Order By: {0}. Must be 'ASC' or 'DESC'.")]
    InvalidOrderDirection(String),

    #[error("Could not parse field: {0}")]
    UnparsableField(String),

    #[error("Unknown filter format: {0}")]
    UnknownFilterFormat(String),

    #[error("Unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("Unsupported filter value: {0}")]
    UnsupportedValue(String),

    #[error("Invalid query request: {0}")]
    InvalidRequest(String),

    #[error("Limit must be a non-negative integer, got {0}")]
    InvalidLimit(i64),

    #[error("Offset must be a non-negative integer, got {0}")]
    InvalidOffset(i64),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::InvalidEntity(_)
            | QueryError::InsufficientPermission(_)
            | QueryError::InvalidSelectField(_)
            | QueryError::InvalidFilterField(_)
            | QueryError::InvalidGroupBy(_)
            | QueryError::InvalidOrderBy(_) => ErrorKind::Permission,
            QueryError::InvalidOrderDirection(_)
            | QueryError::UnparsableField(_)
            | QueryError::UnknownFilterFormat(_)
            | QueryError::UnknownOperator(_)
            | QueryError::UnsupportedValue(_)
            | QueryError::InvalidRequest(_) => ErrorKind::Validation,
            QueryError::InvalidLimit(_) | QueryError::InvalidOffset(_) => ErrorKind::Type,
            QueryError::Catalog(_) => ErrorKind::Internal,
        }
    }

    pub fn is_permission_error(&self) -> bool {
        self.kind() == ErrorKind::Permission
    }
}
