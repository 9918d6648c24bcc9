//! sluice - query-execution core for an object-relational mapping layer
//!
//! A logical, datastore-agnostic query is compiled in stages and dispatched
//! to a pluggable storage adapter:
//!
//! ```text
//! QueryDescriptor ─▶ stage 2 ─▶ before hook ─▶ stage 3 ─▶ adapter
//!                                                          │
//!   caller ◀── after hooks (per record) ◀── materialize ◀──┘
//! ```
//!
//! The streaming cursor sits on top of this chain and re-expresses an
//! unbounded read as a sequence of bounded `find` calls.

pub mod adapter;
pub mod config;
pub mod core;
pub mod lifecycle;
pub mod materialize;
pub mod planner;
pub mod query;
pub mod schema;
pub mod stream;

pub use adapter::{Adapter, AdapterError, AdapterFuture, AdapterReply, MemoryAdapter};
pub use config::{DatastoreConfig, OrmConfig};
pub use crate::core::{ModelHandle, Omen, OperationContext, Outcome, QueryError, QueryResult};
pub use lifecycle::{HookName, LifecycleHooks};
pub use query::{Flow, Meta, Method, QueryDescriptor, Record};
pub use schema::{AttributeDef, AttributeType, ModelDef, Orm, OrmBuilder};

/// Boxed error accepted from user-supplied hooks and iteratees
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
