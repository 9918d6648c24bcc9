//! Core Error Types
//!
//! The caller-facing error taxonomy. Every failure of every operation is
//! reported through [`QueryError`], each variant carrying a stable,
//! machine-checkable code.
//!
//! | Category | Codes |
//! |----------|-------|
//! | Usage | `E_INVALID_CRITERIA`, `E_INVALID_VALUES_TO_SET`, `E_INVALID_NEW_RECORDS`, `E_INVALID_POPULATES`, `E_INVALID_STREAM_ITERATEE`, `E_INVALID_NUMERIC_ATTR_NAME`, `E_UNKNOWN_MODEL` |
//! | Constraint | `E_UNIQUE` |
//! | Adapter | `E_ADAPTER`, `E_ADAPTER_CONTRACT`, `E_UNSUPPORTED_OPERATION` |
//! | Schema | `E_SCHEMA_DRIFT`, `E_TRANSFORM` |
//! | User code | `E_HOOK`, `E_ITERATEE` |
//!
//! Nothing in this crate retries; none of these are transient.

use serde_json::Value;
use thiserror::Error;

use super::context::Omen;
use crate::lifecycle::HookName;
use crate::query::Method;
use crate::schema::TransformError;
use crate::BoxError;

/// Result type for public operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Operation errors
#[derive(Debug, Error)]
pub enum QueryError {
    // ==================
    // Usage Errors
    // ==================
    /// Criteria shape violates the criteria grammar
    #[error("Invalid criteria.\nDetails:\n  {details}")]
    InvalidCriteria { details: String },

    /// Values to set reference unknown attributes or fail type checks
    #[error("Cannot perform {method} with the provided values.\nDetails:\n  {details}")]
    InvalidValuesToSet { method: Method, details: String },

    /// New records are malformed
    #[error("Invalid new record(s).\nDetails:\n  {details}")]
    InvalidNewRecords { details: String },

    /// Unknown association or invalid nested criteria
    #[error("Invalid populate(s).\nDetails:\n  {details}")]
    InvalidPopulates { details: String },

    /// Neither or both stream continuations supplied
    #[error(
        "An iteratee function should be passed in to `.stream()` via either \
         `.each_record()` or `.each_batch()` -- but not both.\nDetails:\n  {details}"
    )]
    InvalidStreamIteratee { details: String },

    /// Aggregated attribute is unknown or not numeric
    #[error("Invalid numeric attribute name.\nDetails:\n  {details}")]
    InvalidNumericAttrName { details: String },

    /// Query targets a model that is not registered
    #[error("Unknown model '{identity}'")]
    UnknownModel { identity: String },

    // ==================
    // Constraint Errors
    // ==================
    /// Uniqueness constraint violated, reported with logical attribute names
    #[error("{message}\nAttributes: {attr_names:?}\nCalled from: {origin}")]
    NotUnique {
        model: String,
        attr_names: Vec<String>,
        message: String,
        footprint: Value,
        origin: Omen,
    },

    // ==================
    // Adapter Errors
    // ==================
    /// Adapter failed the operation
    #[error("Adapter error in model '{model}' (datastore '{datastore}'): {message}")]
    Adapter {
        model: String,
        datastore: String,
        message: String,
        footprint: Option<Value>,
    },

    /// Adapter replied with a shape that violates its contract
    #[error(
        "Unexpected behavior in database adapter for datastore '{datastore}' \
         during `{method}` on model '{model}': {details}"
    )]
    AdapterContract {
        model: String,
        datastore: String,
        method: Method,
        details: String,
    },

    /// Bound adapter lacks the method this operation needs
    #[error(
        "Cannot complete query: the adapter used by model '{model}' doesn't \
         support the `{method}` method"
    )]
    UnsupportedOperation { model: String, method: Method },

    // ==================
    // Schema Errors
    // ==================
    /// Record from the datastore does not fit the logical schema
    #[error(
        "Record from model '{model}' does not match its schema (missing migration?): {details}"
    )]
    SchemaDrift { model: String, details: String },

    /// Attribute/column translation failed
    #[error("Transformation failed for model '{model}': {source}")]
    Transform {
        model: String,
        #[source]
        source: TransformError,
    },

    // ==================
    // User Code Errors
    // ==================
    /// A lifecycle hook failed.
    ///
    /// Displays the hook's own error unchanged; `hook` and `model` say where
    /// it was raised.
    #[error("{source}")]
    Hook {
        model: String,
        hook: HookName,
        #[source]
        source: BoxError,
    },

    /// A stream continuation failed or panicked
    #[error("Stream iteratee failed: {source}")]
    Iteratee {
        #[source]
        source: BoxError,
    },
}

impl QueryError {
    /// Get error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCriteria { .. } => "E_INVALID_CRITERIA",
            Self::InvalidValuesToSet { .. } => "E_INVALID_VALUES_TO_SET",
            Self::InvalidNewRecords { .. } => "E_INVALID_NEW_RECORDS",
            Self::InvalidPopulates { .. } => "E_INVALID_POPULATES",
            Self::InvalidStreamIteratee { .. } => "E_INVALID_STREAM_ITERATEE",
            Self::InvalidNumericAttrName { .. } => "E_INVALID_NUMERIC_ATTR_NAME",
            Self::UnknownModel { .. } => "E_UNKNOWN_MODEL",
            Self::NotUnique { .. } => "E_UNIQUE",
            Self::Adapter { .. } => "E_ADAPTER",
            Self::AdapterContract { .. } => "E_ADAPTER_CONTRACT",
            Self::UnsupportedOperation { .. } => "E_UNSUPPORTED_OPERATION",
            Self::SchemaDrift { .. } => "E_SCHEMA_DRIFT",
            Self::Transform { .. } => "E_TRANSFORM",
            Self::Hook { .. } => "E_HOOK",
            Self::Iteratee { .. } => "E_ITERATEE",
        }
    }

    /// Returns true if the caller supplied a malformed request
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCriteria { .. }
                | Self::InvalidValuesToSet { .. }
                | Self::InvalidNewRecords { .. }
                | Self::InvalidPopulates { .. }
                | Self::InvalidStreamIteratee { .. }
                | Self::InvalidNumericAttrName { .. }
                | Self::UnknownModel { .. }
        )
    }

    /// Call site the error was attributed to, if rebased
    pub fn origin(&self) -> Option<&Omen> {
        match self {
            Self::NotUnique { origin, .. } => Some(origin),
            _ => None,
        }
    }
}
