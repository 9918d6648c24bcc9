//! Hook runner
//!
//! Runs registered hooks around the adapter call. Every invocation is
//! awaited before the next one starts; the first failure aborts the rest.

use tracing::trace;

use super::hooks::{Hook, HookName};
use crate::core::{QueryError, QueryResult};
use crate::query::{Criteria, Meta, Record};
use crate::schema::RegisteredModel;

/// Runs one model's hooks for one operation
pub struct HookRunner<'a> {
    model: &'a RegisteredModel,
    meta: Meta,
}

impl<'a> HookRunner<'a> {
    pub fn new(model: &'a RegisteredModel, meta: Meta) -> Self {
        Self { model, meta }
    }

    fn record_hook(&self, name: HookName) -> Option<&'a dyn Hook<Record>> {
        if self.meta.skip_all_lifecycle_callbacks {
            return None;
        }
        self.model.hooks().record_hook(name)
    }

    fn failed(&self, name: HookName, source: crate::BoxError) -> QueryError {
        QueryError::Hook {
            model: self.model.identity().to_string(),
            hook: name,
            source,
        }
    }

    /// Runs a before-hook on one logical payload, returning what it yields
    pub async fn before(&self, name: HookName, payload: Record) -> QueryResult<Record> {
        let Some(hook) = self.record_hook(name) else {
            return Ok(payload);
        };
        trace!(model = %self.model.identity(), hook = %name, "running hook");
        hook.call(payload).await.map_err(|e| self.failed(name, e))
    }

    /// Runs a before-hook on each payload in order
    pub async fn before_each(
        &self,
        name: HookName,
        payloads: Vec<Record>,
    ) -> QueryResult<Vec<Record>> {
        if self.record_hook(name).is_none() {
            return Ok(payloads);
        }
        let mut out = Vec::with_capacity(payloads.len());
        for payload in payloads {
            out.push(self.before(name, payload).await?);
        }
        Ok(out)
    }

    /// Runs `beforeDestroy` on the normalized criteria
    pub async fn before_destroy(&self, criteria: Criteria) -> QueryResult<Criteria> {
        if self.meta.skip_all_lifecycle_callbacks {
            return Ok(criteria);
        }
        let Some(hook) = self.model.hooks().criteria_hook() else {
            return Ok(criteria);
        };
        trace!(model = %self.model.identity(), hook = %HookName::BeforeDestroy, "running hook");
        hook.call(criteria)
            .await
            .map_err(|e| self.failed(HookName::BeforeDestroy, e))
    }

    /// Runs an after-hook once per record, in result order
    pub async fn after_each(
        &self,
        name: HookName,
        records: Vec<Record>,
    ) -> QueryResult<Vec<Record>> {
        let Some(hook) = self.record_hook(name) else {
            return Ok(records);
        };
        let mut out = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            trace!(model = %self.model.identity(), hook = %name, index, "running hook");
            out.push(hook.call(record).await.map_err(|e| self.failed(name, e))?);
        }
        Ok(out)
    }
}
