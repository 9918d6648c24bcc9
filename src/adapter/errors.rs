//! Adapter error types

use serde_json::{json, Value};
use thiserror::Error;

/// Footprint identity of a uniqueness violation
pub const NOT_UNIQUE: &str = "notUnique";

/// Error an adapter completes with
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    /// A recognized error value, optionally carrying a structured footprint
    #[error("{message}")]
    Failure {
        message: String,
        footprint: Option<Value>,
    },

    /// The adapter signalled failure with something that is not an error
    #[error("adapter signalled failure with a non-error value: {0}")]
    Malformed(Value),
}

impl AdapterError {
    /// Plain failure with no footprint
    pub fn new(message: impl Into<String>) -> Self {
        AdapterError::Failure {
            message: message.into(),
            footprint: None,
        }
    }

    /// Attach a footprint (no-op on malformed errors)
    pub fn with_footprint(self, footprint: Value) -> Self {
        match self {
            AdapterError::Failure { message, .. } => AdapterError::Failure {
                message,
                footprint: Some(footprint),
            },
            malformed => malformed,
        }
    }

    /// Uniqueness violation on the given physical columns
    pub fn not_unique(columns: Vec<String>) -> Self {
        AdapterError::new(
            "Would violate uniqueness constraint-- a record already exists with \
             conflicting value(s).",
        )
        .with_footprint(json!({ "identity": NOT_UNIQUE, "keys": columns }))
    }

    pub fn footprint(&self) -> Option<&Value> {
        match self {
            AdapterError::Failure { footprint, .. } => footprint.as_ref(),
            AdapterError::Malformed(_) => None,
        }
    }
}

/// Parsed view of a footprint value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footprint {
    pub identity: String,
    pub keys: Vec<String>,
}

impl Footprint {
    /// Parse a footprint, or `None` if it does not have the expected shape.
    ///
    /// A missing `keys` entry reads as no keys; a `keys` entry that is not a
    /// list of strings makes the whole footprint unrecognized.
    pub fn parse(value: &Value) -> Option<Self> {
        let identity = value.get("identity")?.as_str()?.to_string();
        let keys = match value.get("keys") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|k| k.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()?,
            Some(_) => return None,
        };
        Some(Self { identity, keys })
    }

    pub fn is_not_unique(&self) -> bool {
        self.identity == NOT_UNIQUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_unique_footprint() {
        let err = AdapterError::not_unique(vec!["email_address".into()]);
        let footprint = Footprint::parse(err.footprint().unwrap()).unwrap();
        assert!(footprint.is_not_unique());
        assert_eq!(footprint.keys, vec!["email_address"]);
    }

    #[test]
    fn test_footprint_parse_is_defensive() {
        assert!(Footprint::parse(&json!("notUnique")).is_none());
        assert!(Footprint::parse(&json!({"keys": ["a"]})).is_none());
        assert!(Footprint::parse(&json!({"identity": "notUnique", "keys": [1]})).is_none());
        assert!(Footprint::parse(&json!({"identity": "notUnique", "keys": "a"})).is_none());

        let bare = Footprint::parse(&json!({"identity": "catchall"})).unwrap();
        assert!(bare.keys.is_empty());
        assert!(!bare.is_not_unique());
    }

    #[test]
    fn test_malformed_has_no_footprint() {
        let err = AdapterError::Malformed(json!(42)).with_footprint(json!({}));
        assert!(err.footprint().is_none());
    }
}
