//! Adapter dispatcher
//!
//! Selects the adapter entry point for a physical query, awaits its single
//! completion and checks the reply against the adapter contract before any
//! of it reaches the rest of the pipeline.

use serde_json::Value;
use tracing::{debug, warn};

use super::uniqueness::normalize_adapter_error;
use super::{Adapter, AdapterFuture};
use crate::core::{OperationContext, QueryError, QueryResult};
use crate::planner::PhysicalQuery;
use crate::query::{Method, Record};
use crate::schema::RegisteredModel;

/// Validated adapter reply
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// No result: a mutation that did not fetch
    Nothing,
    /// Physical records, in adapter order
    Records(Vec<Record>),
    Count(u64),
    Number(f64),
}

fn entry_point<'a>(
    adapter: &'a dyn Adapter,
    datastore: &'a str,
    query: &'a PhysicalQuery,
) -> Option<AdapterFuture<'a>> {
    match query.method {
        Method::Create => adapter.create(datastore, query),
        Method::CreateEach => adapter.create_each(datastore, query),
        Method::Update => adapter.update(datastore, query),
        Method::Destroy => adapter.destroy(datastore, query),
        Method::Find => adapter.find(datastore, query),
        Method::Count => adapter.count(datastore, query),
        Method::Sum => adapter.sum(datastore, query),
        Method::Avg => adapter.avg(datastore, query),
        // the cursor dispatches a series of finds instead
        Method::Stream => None,
    }
}

/// Run `query` against the model's adapter
pub async fn dispatch(
    model: &RegisteredModel,
    query: &PhysicalQuery,
    ctx: &OperationContext,
) -> QueryResult<Dispatched> {
    let adapter = model.adapter();
    let method = query.method;

    let call = entry_point(adapter, model.datastore(), query).ok_or_else(|| {
        QueryError::UnsupportedOperation {
            model: model.identity().to_string(),
            method,
        }
    })?;

    debug!(
        operation_id = %ctx.operation_id,
        model = %model.identity(),
        adapter = %adapter.identity(),
        method = %method,
        table = %query.table,
        "dispatching to adapter"
    );

    let raw = call
        .await
        .map_err(|e| normalize_adapter_error(e, model, method, ctx))?;

    ReplyValidator { model, query }.validate(raw)
}

struct ReplyValidator<'a> {
    model: &'a RegisteredModel,
    query: &'a PhysicalQuery,
}

impl ReplyValidator<'_> {
    fn contract(&self, details: String) -> QueryError {
        QueryError::AdapterContract {
            model: self.model.identity().to_string(),
            datastore: self.model.datastore().to_string(),
            method: self.query.method,
            details,
        }
    }

    fn validate(&self, raw: Option<Value>) -> QueryResult<Dispatched> {
        let method = self.query.method;
        match method {
            Method::Create | Method::CreateEach | Method::Update | Method::Destroy => {
                if !self.query.meta.fetch {
                    return Ok(self.discard(raw));
                }
                let records = self.records(raw)?;
                if method == Method::Create && records.len() != 1 {
                    return Err(self.contract(format!(
                        "expected exactly one created record, but got {}",
                        records.len()
                    )));
                }
                Ok(Dispatched::Records(records))
            }
            Method::Find | Method::Stream => Ok(Dispatched::Records(self.records(raw)?)),
            Method::Count => match raw.as_ref().and_then(Value::as_u64) {
                Some(n) => Ok(Dispatched::Count(n)),
                None => Err(self.contract(format!(
                    "expected a non-negative integer, but got: {}",
                    describe(&raw)
                ))),
            },
            Method::Sum | Method::Avg => match raw.as_ref().and_then(Value::as_f64) {
                Some(n) => Ok(Dispatched::Number(n)),
                None => Err(self.contract(format!(
                    "expected a number, but got: {}",
                    describe(&raw)
                ))),
            },
        }
    }

    /// A non-fetching mutation never surfaces a payload
    fn discard(&self, raw: Option<Value>) -> Dispatched {
        let unexpected = match &raw {
            None | Some(Value::Null) => false,
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        };
        if unexpected {
            warn!(
                model = %self.model.identity(),
                adapter = %self.model.adapter().identity(),
                method = %self.query.method,
                "adapter returned records although `fetch` was not requested; \
                 this is a bug in the adapter, the payload was ignored"
            );
        }
        Dispatched::Nothing
    }

    fn records(&self, raw: Option<Value>) -> QueryResult<Vec<Record>> {
        let items = match raw {
            Some(Value::Array(items)) => items,
            other => {
                return Err(self.contract(format!(
                    "expected a list of records, but got: {}",
                    describe(&other)
                )))
            }
        };
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(self.contract(format!(
                    "expected record #{} to be a dictionary, but got: {}",
                    index, other
                ))),
            })
            .collect()
    }
}

fn describe(raw: &Option<Value>) -> String {
    match raw {
        None => "nothing".to_string(),
        Some(value) => value.to_string(),
    }
}
