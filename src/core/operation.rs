//! Operation outcomes
//!
//! The logical result of running one query descriptor to completion.

use crate::query::{Meta, Method, Record};

/// Result of a completed operation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A mutation that did not fetch, or a finished stream
    Nothing,
    /// Logical records, in result order
    Records(Vec<Record>),
    Count(u64),
    Number(f64),
}

impl Outcome {
    /// The empty success a query that can never match completes with
    pub fn noop(method: Method, meta: Meta) -> Self {
        match method {
            Method::Create | Method::CreateEach | Method::Update | Method::Destroy => {
                if meta.fetch {
                    Outcome::Records(Vec::new())
                } else {
                    Outcome::Nothing
                }
            }
            Method::Find => Outcome::Records(Vec::new()),
            Method::Count => Outcome::Count(0),
            Method::Sum | Method::Avg => Outcome::Number(0.0),
            Method::Stream => Outcome::Nothing,
        }
    }

    /// Records, or `None` for [`Outcome::Nothing`]
    pub fn into_records(self) -> Option<Vec<Record>> {
        match self {
            Outcome::Records(records) => Some(records),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            Outcome::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Outcome::Number(n) => Some(*n),
            _ => None,
        }
    }
}
