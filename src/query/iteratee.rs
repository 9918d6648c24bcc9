//! Stream iteratees
//!
//! A stream routes each fetched batch to exactly one caller continuation:
//! either once per record or once per batch. A continuation answers with
//! [`Flow`] to keep going or stop early, or with an error to abort.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use super::Record;
use crate::BoxError;

/// What the cursor should do after a continuation completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Fetch and deliver more records
    Continue,
    /// End the stream successfully without fetching further batches
    Stop,
}

/// Result of one continuation invocation
pub type IterateeResult = Result<Flow, BoxError>;

/// Per-record continuation
pub trait EachRecord: Send + Sync {
    fn call(&self, record: Record) -> BoxFuture<'static, IterateeResult>;
}

impl<F, Fut> EachRecord for F
where
    F: Fn(Record) -> Fut + Send + Sync,
    Fut: Future<Output = IterateeResult> + Send + 'static,
{
    fn call(&self, record: Record) -> BoxFuture<'static, IterateeResult> {
        Box::pin(self(record))
    }
}

/// Per-batch continuation
pub trait EachBatch: Send + Sync {
    fn call(&self, batch: Vec<Record>) -> BoxFuture<'static, IterateeResult>;
}

impl<F, Fut> EachBatch for F
where
    F: Fn(Vec<Record>) -> Fut + Send + Sync,
    Fut: Future<Output = IterateeResult> + Send + 'static,
{
    fn call(&self, batch: Vec<Record>) -> BoxFuture<'static, IterateeResult> {
        Box::pin(self(batch))
    }
}

/// The single continuation a validated stream query carries
#[derive(Clone)]
pub enum Iteratee {
    EachRecord(Arc<dyn EachRecord>),
    EachBatch(Arc<dyn EachBatch>),
}

impl Iteratee {
    /// Get iteratee kind for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Iteratee::EachRecord(_) => "eachRecord",
            Iteratee::EachBatch(_) => "eachBatch",
        }
    }
}

impl fmt::Debug for Iteratee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iteratee::{}", self.kind())
    }
}
