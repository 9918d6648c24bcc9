//! Execution pipeline
//!
//! Drives one query descriptor through the whole chain:
//!
//! 1. Stage 2: validate and normalize the descriptor
//! 2. Before hook (mutations only)
//! 3. Stage 3: logical to physical
//! 4. Adapter dispatch
//! 5. Materialization, then after hooks once per fetched record
//!
//! A query that can never match short-circuits after stage 2 with an empty
//! success; the adapter is never consulted for it. Streams hand over to the
//! cursor after stage 2.

use chrono::Utc;
use tracing::debug;

use super::context::OperationContext;
use super::error::{QueryError, QueryResult};
use super::operation::Outcome;
use crate::adapter::{dispatch, Dispatched};
use crate::lifecycle::{HookName, HookRunner};
use crate::materialize::Materializer;
use crate::planner::{forge_stage_three, forge_stage_two};
use crate::query::{Method, QueryDescriptor};
use crate::schema::Orm;
use crate::stream::StreamCursor;

/// Run a descriptor to completion
pub async fn execute(
    orm: &Orm,
    desc: QueryDescriptor,
    ctx: &OperationContext,
) -> QueryResult<Outcome> {
    let model = orm.require_model(&desc.using)?;
    let method = desc.method;
    let meta = desc.meta;

    let mut query = match forge_stage_two(desc, orm, Utc::now()) {
        Ok(query) => query,
        Err(e) if e.is_noop() => {
            debug!(
                operation_id = %ctx.operation_id,
                model = %model.identity(),
                method = %method,
                reason = %e.details(),
                "query can never match; skipping adapter"
            );
            return Ok(Outcome::noop(method, meta));
        }
        Err(e) => return Err(e.into_query_error(method)),
    };

    if method == Method::Stream {
        StreamCursor::new(orm, model, query)?.run(ctx).await?;
        debug!(
            operation_id = %ctx.operation_id,
            model = %model.identity(),
            duration_ms = ctx.elapsed_ms(),
            "stream finished"
        );
        return Ok(Outcome::Nothing);
    }

    let hooks = HookRunner::new(model, meta);
    match method {
        Method::Create | Method::CreateEach => {
            let records = std::mem::take(&mut query.new_records);
            query.new_records = hooks.before_each(HookName::BeforeCreate, records).await?;
        }
        Method::Update => {
            if let Some(values) = query.values_to_set.take() {
                query.values_to_set = Some(hooks.before(HookName::BeforeUpdate, values).await?);
            }
        }
        Method::Destroy => {
            let criteria = std::mem::take(&mut query.criteria);
            query.criteria = hooks.before_destroy(criteria).await?;
        }
        _ => {}
    }

    let physical = forge_stage_three(query, model, orm).map_err(|source| QueryError::Transform {
        model: model.identity().to_string(),
        source,
    })?;

    let outcome = match dispatch(model, &physical, ctx).await? {
        Dispatched::Nothing => Outcome::Nothing,
        Dispatched::Count(n) => Outcome::Count(n),
        Dispatched::Number(n) => Outcome::Number(n),
        Dispatched::Records(rows) => {
            let records = Materializer::new(orm, model, &physical.joins, meta).materialize(rows)?;
            let records = match after_hook(method) {
                Some(name) => hooks.after_each(name, records).await?,
                None => records,
            };
            Outcome::Records(records)
        }
    };

    debug!(
        operation_id = %ctx.operation_id,
        model = %model.identity(),
        method = %method,
        duration_ms = ctx.elapsed_ms(),
        "operation complete"
    );
    Ok(outcome)
}

fn after_hook(method: Method) -> Option<HookName> {
    match method {
        Method::Create | Method::CreateEach => Some(HookName::AfterCreate),
        Method::Update => Some(HookName::AfterUpdate),
        Method::Destroy => Some(HookName::AfterDestroy),
        _ => None,
    }
}
