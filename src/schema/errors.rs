//! Registry initialization errors
//!
//! Initialization is a one-time phase; every error here is fatal and
//! describes a configuration mistake, never a runtime condition.

use thiserror::Error;

/// Result type for registry initialization
pub type InitResult<T> = Result<T, InitError>;

/// Errors raised while building the model registry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InitError {
    // ==================
    // Configuration Errors
    // ==================
    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Same identity registered twice
    #[error("Model '{0}' is registered more than once")]
    DuplicateModel(String),

    /// Model bound to a datastore that was never declared
    #[error("Model '{model}' uses unknown datastore '{datastore}'")]
    UnknownDatastore { model: String, datastore: String },

    /// Datastore bound to an adapter that was never supplied
    #[error("Datastore '{datastore}' uses unknown adapter '{adapter}'")]
    UnknownAdapter { datastore: String, adapter: String },

    /// Adapter refused a table definition
    #[error("Adapter '{adapter}' rejected table '{table}': {reason}")]
    AdapterRejected {
        adapter: String,
        table: String,
        reason: String,
    },

    /// Hooks supplied for a model that does not exist
    #[error("Lifecycle hooks registered for unknown model '{0}'")]
    HooksForUnknownModel(String),

    // ==================
    // Schema Errors
    // ==================
    /// Primary key attribute missing or not a plain value
    #[error("Model '{model}' has invalid primary key '{primary_key}': {reason}")]
    InvalidPrimaryKey {
        model: String,
        primary_key: String,
        reason: String,
    },

    /// Attribute definition is inconsistent
    #[error("Attribute '{attribute}' of model '{model}' is invalid: {reason}")]
    InvalidAttribute {
        model: String,
        attribute: String,
        reason: String,
    },

    /// Two attributes share a column
    #[error("Model '{model}' maps more than one attribute to column '{column}'")]
    DuplicateColumn { model: String, column: String },
}
