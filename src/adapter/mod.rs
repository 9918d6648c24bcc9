//! Storage adapters
//!
//! An adapter executes physical queries against one kind of datastore. It
//! is an external plugin: the dispatcher checks every reply before use.
//!
//! Each entry point returns `None` when the adapter does not implement that
//! method, which the dispatcher reports as an unsupported operation.
//! Otherwise it returns a future completing with either an
//! [`AdapterError`] or the raw result:
//!
//! | Method | `fetch` unset | `fetch` set |
//! |--------|---------------|-------------|
//! | `create` | nothing | list holding the created record |
//! | `createEach` / `update` / `destroy` | nothing | list of affected records |
//! | `find` | list of records | list of records |
//! | `count` | non-negative integer | |
//! | `sum` / `avg` | number | |

mod dispatcher;
mod errors;
mod memory;
mod uniqueness;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::planner::PhysicalQuery;

pub use dispatcher::{dispatch, Dispatched};
pub use errors::{AdapterError, Footprint, NOT_UNIQUE};
pub use memory::MemoryAdapter;
pub use uniqueness::normalize_adapter_error;

/// Raw adapter completion
pub type AdapterReply = Result<Option<Value>, AdapterError>;

/// Future returned by adapter entry points
pub type AdapterFuture<'a> = BoxFuture<'a, AdapterReply>;

/// Physical table description handed to an adapter at initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub table: String,
    pub primary_key: String,
    /// The adapter generates numeric primary keys for records without one
    pub auto_increment: bool,
    pub unique_columns: Vec<String>,
}

/// Storage adapter interface
pub trait Adapter: Send + Sync {
    /// Adapter name for logging
    fn identity(&self) -> &str;

    /// Register a table before any query runs against it
    fn define(&self, datastore: &str, table: &TableDefinition) -> Result<(), AdapterError> {
        let _ = (datastore, table);
        Ok(())
    }

    fn create<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        let _ = (datastore, query);
        None
    }

    fn create_each<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        let _ = (datastore, query);
        None
    }

    fn update<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        let _ = (datastore, query);
        None
    }

    fn destroy<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        let _ = (datastore, query);
        None
    }

    fn find<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        let _ = (datastore, query);
        None
    }

    fn count<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        let _ = (datastore, query);
        None
    }

    fn sum<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        let _ = (datastore, query);
        None
    }

    fn avg<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        let _ = (datastore, query);
        None
    }
}
