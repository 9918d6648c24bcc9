//! Compiler error types
//!
//! Error codes:
//! - E_INVALID_CRITERIA
//! - E_INVALID_VALUES_TO_SET
//! - E_INVALID_NEW_RECORDS
//! - E_INVALID_POPULATES
//! - E_INVALID_STREAM_ITERATEE
//! - E_INVALID_NUMERIC_ATTR_NAME
//! - E_NOOP (not a failure: the caller synthesizes an empty result)

use std::fmt;

use crate::core::QueryError;
use crate::query::Method;

/// Compiler error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorCode {
    /// Criteria shape violates the criteria grammar
    InvalidCriteria,
    /// Values to set are malformed
    InvalidValuesToSet,
    /// New record(s) are malformed
    InvalidNewRecords,
    /// Populate clause is malformed
    InvalidPopulates,
    /// Stream continuation missing or ambiguous
    InvalidStreamIteratee,
    /// Aggregate attribute is unknown or not numeric
    InvalidNumericAttrName,
    /// Query can never match anything
    Noop,
}

impl CompileErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            CompileErrorCode::InvalidCriteria => "E_INVALID_CRITERIA",
            CompileErrorCode::InvalidValuesToSet => "E_INVALID_VALUES_TO_SET",
            CompileErrorCode::InvalidNewRecords => "E_INVALID_NEW_RECORDS",
            CompileErrorCode::InvalidPopulates => "E_INVALID_POPULATES",
            CompileErrorCode::InvalidStreamIteratee => "E_INVALID_STREAM_ITERATEE",
            CompileErrorCode::InvalidNumericAttrName => "E_INVALID_NUMERIC_ATTR_NAME",
            CompileErrorCode::Noop => "E_NOOP",
        }
    }
}

impl fmt::Display for CompileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Compiler error with details for the caller
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    code: CompileErrorCode,
    details: String,
}

impl CompileError {
    pub fn new(code: CompileErrorCode, details: impl Into<String>) -> Self {
        Self {
            code,
            details: details.into(),
        }
    }

    pub fn invalid_criteria(details: impl Into<String>) -> Self {
        Self::new(CompileErrorCode::InvalidCriteria, details)
    }

    pub fn invalid_values_to_set(details: impl Into<String>) -> Self {
        Self::new(CompileErrorCode::InvalidValuesToSet, details)
    }

    pub fn invalid_new_records(details: impl Into<String>) -> Self {
        Self::new(CompileErrorCode::InvalidNewRecords, details)
    }

    pub fn invalid_populates(details: impl Into<String>) -> Self {
        Self::new(CompileErrorCode::InvalidPopulates, details)
    }

    pub fn invalid_stream_iteratee(details: impl Into<String>) -> Self {
        Self::new(CompileErrorCode::InvalidStreamIteratee, details)
    }

    pub fn invalid_numeric_attr_name(details: impl Into<String>) -> Self {
        Self::new(CompileErrorCode::InvalidNumericAttrName, details)
    }

    pub fn noop(details: impl Into<String>) -> Self {
        Self::new(CompileErrorCode::Noop, details)
    }

    pub fn code(&self) -> CompileErrorCode {
        self.code
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    /// Returns true if the query can simply be skipped
    pub fn is_noop(&self) -> bool {
        self.code == CompileErrorCode::Noop
    }

    /// Re-express as a caller-facing error.
    ///
    /// `E_NOOP` should be intercepted before this point; if it is not, it
    /// is reported as invalid criteria.
    pub fn into_query_error(self, method: Method) -> QueryError {
        let details = self.details;
        match self.code {
            CompileErrorCode::InvalidCriteria | CompileErrorCode::Noop => {
                QueryError::InvalidCriteria { details }
            }
            CompileErrorCode::InvalidValuesToSet => {
                QueryError::InvalidValuesToSet { method, details }
            }
            CompileErrorCode::InvalidNewRecords => QueryError::InvalidNewRecords { details },
            CompileErrorCode::InvalidPopulates => QueryError::InvalidPopulates { details },
            CompileErrorCode::InvalidStreamIteratee => {
                QueryError::InvalidStreamIteratee { details }
            }
            CompileErrorCode::InvalidNumericAttrName => {
                QueryError::InvalidNumericAttrName { details }
            }
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.details)
    }
}

impl std::error::Error for CompileError {}

/// Result type for compiler operations
pub type CompileResult<T> = Result<T, CompileError>;
