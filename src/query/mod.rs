//! # Query Descriptor
//!
//! The in-memory representation of one logical operation, from the raw
//! caller-supplied form through the normalized criteria vocabulary shared by
//! the compilers.

mod criteria;
mod descriptor;
mod iteratee;
mod meta;
mod method;

pub use criteria::{Clause, Criteria, FilterOp, Predicate, SortDirection, SortSpec};
pub use descriptor::QueryDescriptor;
pub use iteratee::{EachBatch, EachRecord, Flow, Iteratee, IterateeResult};
pub use meta::Meta;
pub use method::Method;

/// A flat field -> value record
pub type Record = serde_json::Map<String, serde_json::Value>;
