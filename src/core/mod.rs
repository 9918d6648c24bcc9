//! # Execution core
//!
//! Public operation surface and the pipeline every operation runs through.
//!
//! ## Design Principles
//!
//! - One pipeline for every method
//! - Context (operation id, omen) is passed explicitly, never ambient
//! - Errors carry the call site of the public operation that raised them

pub mod context;
pub mod error;
pub mod model;
pub mod operation;
pub mod pipeline;

pub use context::{Omen, OperationContext};
pub use error::{QueryError, QueryResult};
pub use model::ModelHandle;
pub use operation::Outcome;
pub use pipeline::execute;
