//! Streaming cursor
//!
//! Re-expresses an unbounded read as a sequence of bounded `find` calls of
//! [`BATCH_SIZE`] records. Batch `i` reads `skip = base + i * BATCH_SIZE`
//! with `limit = min(BATCH_SIZE, remaining)`. The cursor ends on the first
//! empty batch, when the caller's limit is used up, or when the iteratee
//! answers [`Flow::Stop`]. An iteratee error (or panic) ends it with an
//! error; nothing is fetched after that.
//!
//! Batches are fetched strictly one after another: batch `i + 1` is never
//! requested before the iteratee has finished with batch `i`.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::trace;

use crate::adapter::{dispatch, Dispatched};
use crate::core::{OperationContext, QueryError, QueryResult};
use crate::materialize::Materializer;
use crate::planner::{forge_stage_three, StageTwoQuery};
use crate::query::{Flow, Iteratee, IterateeResult, Method, Record};
use crate::schema::{Orm, RegisteredModel};

/// Records fetched per adapter call
pub const BATCH_SIZE: u64 = 30;

/// Cursor over one compiled stream query
pub struct StreamCursor<'a> {
    orm: &'a Orm,
    model: &'a RegisteredModel,
    query: StageTwoQuery,
    iteratee: Iteratee,
}

impl<'a> StreamCursor<'a> {
    pub fn new(
        orm: &'a Orm,
        model: &'a RegisteredModel,
        mut query: StageTwoQuery,
    ) -> QueryResult<Self> {
        let iteratee = query
            .iteratee
            .take()
            .ok_or_else(|| QueryError::InvalidStreamIteratee {
                details: "no iteratee to deliver records to".to_string(),
            })?;
        Ok(Self {
            orm,
            model,
            query,
            iteratee,
        })
    }

    /// Fetch and deliver batches until the stream ends
    pub async fn run(self, ctx: &OperationContext) -> QueryResult<()> {
        let base_skip = self.query.criteria.skip;
        let mut remaining = self.query.criteria.limit;
        let mut batch_index: u64 = 0;

        loop {
            let limit = match remaining {
                Some(0) => break,
                Some(left) => left.min(BATCH_SIZE),
                None => BATCH_SIZE,
            };

            let records = self
                .fetch(base_skip + batch_index * BATCH_SIZE, limit, ctx)
                .await?;
            trace!(
                operation_id = %ctx.operation_id,
                batch = batch_index,
                size = records.len(),
                "fetched stream batch"
            );
            if records.is_empty() {
                break;
            }

            let fetched = records.len() as u64;
            if deliver(&self.iteratee, records).await? == Flow::Stop {
                trace!(
                    operation_id = %ctx.operation_id,
                    batch = batch_index,
                    "iteratee stopped the stream"
                );
                break;
            }

            if let Some(left) = remaining.as_mut() {
                *left = left.saturating_sub(fetched);
            }
            batch_index += 1;
        }

        Ok(())
    }

    async fn fetch(
        &self,
        skip: u64,
        limit: u64,
        ctx: &OperationContext,
    ) -> QueryResult<Vec<Record>> {
        let mut batch = self.query.clone();
        batch.method = Method::Find;
        batch.criteria.skip = skip;
        batch.criteria.limit = Some(limit);

        let physical = forge_stage_three(batch, self.model, self.orm).map_err(|source| {
            QueryError::Transform {
                model: self.model.identity().to_string(),
                source,
            }
        })?;

        match dispatch(self.model, &physical, ctx).await? {
            Dispatched::Records(rows) => {
                Materializer::new(self.orm, self.model, &physical.joins, self.query.meta)
                    .materialize(rows)
            }
            other => Err(QueryError::AdapterContract {
                model: self.model.identity().to_string(),
                datastore: self.model.datastore().to_string(),
                method: Method::Find,
                details: format!("expected a list of records, but got: {:?}", other),
            }),
        }
    }
}

/// Hand one batch to the iteratee
async fn deliver(iteratee: &Iteratee, records: Vec<Record>) -> QueryResult<Flow> {
    match iteratee {
        Iteratee::EachBatch(f) => guarded(|| f.call(records)).await,
        Iteratee::EachRecord(f) => {
            for record in records {
                if guarded(|| f.call(record)).await? == Flow::Stop {
                    return Ok(Flow::Stop);
                }
            }
            Ok(Flow::Continue)
        }
    }
}

/// Run one iteratee call, folding panics from either its synchronous or
/// its asynchronous part into the error channel
async fn guarded<F>(start: F) -> QueryResult<Flow>
where
    F: FnOnce() -> BoxFuture<'static, IterateeResult>,
{
    let future = std::panic::catch_unwind(AssertUnwindSafe(start)).map_err(panicked)?;
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(flow)) => Ok(flow),
        Ok(Err(source)) => Err(QueryError::Iteratee { source }),
        Err(payload) => Err(panicked(payload)),
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> QueryError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    QueryError::Iteratee {
        source: format!("iteratee panicked: {}", message).into(),
    }
}
