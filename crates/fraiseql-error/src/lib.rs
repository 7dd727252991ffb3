//! Error taxonomy for the document engine.
//!
//! Every error the query/relationship/mutation engine can raise maps to one
//! of a fixed set of kinds. Kinds are the host's seam for mapping onto HTTP
//! status codes or other transport-level codes; this crate never does that
//! mapping itself.
//!
//! # Error Hierarchy
//!
//! ```text
//! EngineError
//! ├── Duplicate     - unique constraint, table/column/index already exists
//! ├── NotFound      - column, table, index, document, or collection missing
//! ├── Truncate      - value exceeds the declared column width
//! ├── Timeout       - statement cancelled by the backend timeout
//! ├── Transaction   - could not commit after retries
//! ├── Authorization - compile-time denial (no matching collection permission)
//! ├── Structure     - schema rule violation
//! ├── Limit         - too many attributes/indexes, row-width exceeded
//! ├── Query         - filter/order/select references an unknown attribute
//! ├── Dependency    - relationship target missing
//! ├── Conflict      - optimistic update against stale $updatedAt
//! ├── Restricted    - delete refused by onDelete=restrict
//! └── Database      - catch-all driver error
//! ```

#![allow(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Stable, machine-readable error kind. Independent of HTTP status: mapping
/// a kind onto a transport status code is the host's job, not this crate's.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unique constraint violation, table/column/index already exists.
    Duplicate,
    /// Column, table, index, document, or collection missing when required.
    NotFound,
    /// Value exceeds the declared column width.
    Truncate,
    /// Statement cancelled by the backend timeout.
    Timeout,
    /// Could not commit after retries.
    Transaction,
    /// Compile-time denial: no matching collection-level permission.
    Authorization,
    /// Schema rule violation (duplicate attribute id, invalid relationship side, unknown type).
    Structure,
    /// Too many attributes, too many indexes, row-width exceeded.
    Limit,
    /// Filter/order/select references an unknown or disallowed attribute.
    Query,
    /// Relationship target missing.
    Dependency,
    /// Optimistic update against stale `$updatedAt`.
    Conflict,
    /// Delete refused because a relationship uses `onDelete=restrict`.
    Restricted,
    /// Generic driver error not otherwise classified.
    Database,
}

impl ErrorKind {
    /// Stable machine-readable identifier for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::NotFound => "not_found",
            Self::Truncate => "truncate",
            Self::Timeout => "timeout",
            Self::Transaction => "transaction",
            Self::Authorization => "authorization",
            Self::Structure => "structure",
            Self::Limit => "limit",
            Self::Query => "query",
            Self::Dependency => "dependency",
            Self::Conflict => "conflict",
            Self::Restricted => "restricted",
            Self::Database => "database",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The engine's single error type. Every compile-time and driver-mapped
/// failure surfaces through one of these variants, each carrying the
/// offending identifier and a human-readable message.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Unique constraint violation, or the table/column/index already exists.
    #[error("duplicate {what}: {identifier}")]
    Duplicate {
        /// What kind of object was duplicated (e.g. "index", "column", "document").
        what: String,
        /// The offending identifier.
        identifier: String,
    },

    /// A column, table, index, document, or collection was missing.
    #[error("{what} not found: {identifier}")]
    NotFound {
        /// What kind of object was missing (e.g. "collection", "document").
        what: String,
        /// The identifier that was looked up.
        identifier: String,
    },

    /// A value exceeded the declared column width.
    #[error("value for '{attribute}' exceeds declared size {limit}")]
    Truncate {
        /// The attribute whose declared size was exceeded.
        attribute: String,
        /// The declared size limit.
        limit: u32,
    },

    /// A statement was cancelled by the backend timeout.
    #[error("statement timed out after {timeout_ms}ms")]
    Timeout {
        /// The configured timeout, in milliseconds.
        timeout_ms: u64,
    },

    /// A transaction could not commit after retries.
    #[error("transaction failed after {attempts} attempt(s): {message}")]
    Transaction {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Message describing the final failure.
        message: String,
    },

    /// Compile-time denial: no matching collection-level permission.
    #[error("authorization denied for {action} on {identifier}")]
    Authorization {
        /// The action that was denied (e.g. "read", "create").
        action: String,
        /// The collection or document the action was attempted against.
        identifier: String,
    },

    /// A schema rule was violated (duplicate attribute id, invalid
    /// relationship side, unknown type, ...).
    #[error("schema structure violation: {message}")]
    Structure {
        /// Message describing the violated rule.
        message: String,
    },

    /// Too many attributes, too many indexes, or row-width exceeded.
    #[error("limit exceeded: {message}")]
    Limit {
        /// Message describing which limit was exceeded.
        message: String,
    },

    /// A filter, order, or selection referenced an unknown or disallowed
    /// attribute.
    #[error("query error on '{attribute}': {message}")]
    Query {
        /// The attribute key the query referenced.
        attribute: String,
        /// Message describing why the reference is invalid.
        message: String,
    },

    /// A relationship's target collection or document was missing.
    #[error("relationship dependency missing: {identifier}")]
    Dependency {
        /// The missing related collection or document.
        identifier: String,
    },

    /// An optimistic update was attempted against a stale `$updatedAt`.
    #[error("conflict updating {identifier}: {message}")]
    Conflict {
        /// The document identifier involved in the conflict.
        identifier: String,
        /// Message describing the conflict.
        message: String,
    },

    /// A delete was refused because a relationship uses `onDelete=restrict`.
    #[error("delete of {identifier} restricted by relationship '{relationship}'")]
    Restricted {
        /// The document or collection the delete targeted.
        identifier: String,
        /// The relationship attribute enforcing the restriction.
        relationship: String,
    },

    /// A generic driver error, not otherwise classified.
    #[error("database error: {message}")]
    Database {
        /// Message from the underlying driver.
        message: String,
        /// Backend-native error code, if available (SQLSTATE, `MySQL` errno, ...).
        code: Option<String>,
    },
}

impl EngineError {
    /// Classify this error into its stable kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Truncate { .. } => ErrorKind::Truncate,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Transaction { .. } => ErrorKind::Transaction,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::Structure { .. } => ErrorKind::Structure,
            Self::Limit { .. } => ErrorKind::Limit,
            Self::Query { .. } => ErrorKind::Query,
            Self::Dependency { .. } => ErrorKind::Dependency,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Restricted { .. } => ErrorKind::Restricted,
            Self::Database { .. } => ErrorKind::Database,
        }
    }

    /// Whether a caller may reasonably retry the operation unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transaction { .. })
    }

    /// Build a [`Self::Duplicate`] error.
    pub fn duplicate(what: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::Duplicate { what: what.into(), identifier: identifier.into() }
    }

    /// Build a [`Self::NotFound`] error.
    pub fn not_found(what: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound { what: what.into(), identifier: identifier.into() }
    }

    /// Build a [`Self::Structure`] error.
    pub fn structure(message: impl Into<String>) -> Self {
        Self::Structure { message: message.into() }
    }

    /// Build a [`Self::Limit`] error.
    pub fn limit(message: impl Into<String>) -> Self {
        Self::Limit { message: message.into() }
    }

    /// Build a [`Self::Query`] error.
    pub fn query(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query { attribute: attribute.into(), message: message.into() }
    }

    /// Build a [`Self::Authorization`] error.
    pub fn authorization(action: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::Authorization { action: action.into(), identifier: identifier.into() }
    }

    /// Build a generic [`Self::Database`] error with no backend code.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database { message: message.into(), code: None }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Structure { message: format!("invalid JSON: {e}") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_maps_to_duplicate_kind() {
        let err = EngineError::duplicate("index", "idx_email");
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "duplicate index: idx_email");
    }

    #[test]
    fn timeout_and_transaction_are_retryable() {
        assert!(EngineError::Timeout { timeout_ms: 5000 }.is_retryable());
        assert!(
            EngineError::Transaction { attempts: 3, message: "rollback".into() }.is_retryable()
        );
        assert!(!EngineError::duplicate("index", "x").is_retryable());
    }

    #[test]
    fn kind_as_str_is_stable() {
        assert_eq!(ErrorKind::Restricted.as_str(), "restricted");
        assert_eq!(ErrorKind::Database.as_str(), "database");
    }

    #[test]
    fn from_serde_json_error_is_structure() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: EngineError = json_err.into();
        assert_eq!(err.kind(), ErrorKind::Structure);
    }
}
