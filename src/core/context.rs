//! Operation Context
//!
//! Context carried explicitly through one operation's chain of suspension
//! points. It holds the omen: the call site of the public operation,
//! captured before the first suspension so errors detected deep inside the
//! adapter round-trip can still report where the caller invoked them.

use std::fmt;
use std::panic::Location;
use std::time::Instant;

use uuid::Uuid;

use crate::query::Method;

/// Call-site marker captured at a public entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Omen {
    method: Method,
    location: &'static Location<'static>,
}

impl Omen {
    /// Capture the caller's location.
    ///
    /// Every function between the public operation and this call must be
    /// `#[track_caller]` for the location to point at user code.
    #[track_caller]
    pub fn capture(method: Method) -> Self {
        Self {
            method,
            location: Location::caller(),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    pub fn line(&self) -> u32 {
        self.location.line()
    }

    pub fn column(&self) -> u32 {
        self.location.column()
    }
}

impl fmt::Display for Omen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}() at {}", self.method, self.location)
    }
}

/// Context carried through one operation
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Operation ID for tracing
    pub operation_id: Uuid,

    /// Identity of the model the operation targets
    pub model: String,

    /// Where the caller invoked the operation
    pub omen: Omen,

    /// Start time for duration tracking
    started_at: Instant,
}

impl OperationContext {
    /// Create a new operation context
    pub fn new(model: impl Into<String>, omen: Omen) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            model: model.into(),
            omen,
            started_at: Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_omen_points_at_caller() {
        let line = line!() + 1;
        let omen = Omen::capture(Method::Update);

        assert_eq!(omen.file(), file!());
        assert_eq!(omen.line(), line);
        assert_eq!(omen.method(), Method::Update);
        assert!(omen.to_string().starts_with(".update() at "));
    }

    #[test]
    fn test_contexts_get_distinct_ids() {
        let a = OperationContext::new("user", Omen::capture(Method::Find));
        let b = OperationContext::new("user", Omen::capture(Method::Find));
        assert_ne!(a.operation_id, b.operation_id);
        assert_eq!(a.model, "user");
    }
}
