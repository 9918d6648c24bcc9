//! Model handle
//!
//! The public operation surface of one registered model. Every operation
//! captures its omen synchronously, at the caller's line, before handing
//! back a future; nothing inside the returned future can observe the
//! original call site any more.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use super::context::{Omen, OperationContext};
use super::error::QueryResult;
use super::operation::Outcome;
use super::pipeline::execute;
use crate::query::{IterateeResult, Meta, Method, QueryDescriptor, Record};
use crate::schema::Orm;

/// Handle for running operations against one model
#[derive(Clone)]
pub struct ModelHandle {
    orm: Arc<Orm>,
    identity: String,
}

impl ModelHandle {
    pub(crate) fn new(orm: Arc<Orm>, identity: &str) -> Self {
        Self {
            orm,
            identity: identity.to_string(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    fn run(
        &self,
        desc: QueryDescriptor,
        omen: Omen,
    ) -> impl Future<Output = QueryResult<Outcome>> + Send + 'static {
        let orm = Arc::clone(&self.orm);
        async move {
            let ctx = OperationContext::new(desc.using.clone(), omen);
            execute(&orm, desc, &ctx).await
        }
    }

    /// Create one record. Yields the created record when `meta.fetch` is set.
    #[track_caller]
    pub fn create(
        &self,
        new_record: Value,
        meta: Meta,
    ) -> impl Future<Output = QueryResult<Option<Record>>> + Send + 'static {
        let desc = QueryDescriptor::create(&self.identity, new_record).with_meta(meta);
        let run = self.run(desc, Omen::capture(Method::Create));
        async move { Ok(run.await?.into_records().and_then(|mut records| records.pop())) }
    }

    /// Create several records in one adapter call
    #[track_caller]
    pub fn create_each(
        &self,
        new_records: Value,
        meta: Meta,
    ) -> impl Future<Output = QueryResult<Option<Vec<Record>>>> + Send + 'static {
        let desc = QueryDescriptor::create_each(&self.identity, new_records).with_meta(meta);
        let run = self.run(desc, Omen::capture(Method::CreateEach));
        async move { Ok(run.await?.into_records()) }
    }

    /// Apply `values_to_set` to every matching record
    #[track_caller]
    pub fn update(
        &self,
        criteria: Value,
        values_to_set: Value,
        meta: Meta,
    ) -> impl Future<Output = QueryResult<Option<Vec<Record>>>> + Send + 'static {
        let desc = QueryDescriptor::update(&self.identity, criteria, values_to_set).with_meta(meta);
        let run = self.run(desc, Omen::capture(Method::Update));
        async move { Ok(run.await?.into_records()) }
    }

    #[track_caller]
    pub fn destroy(
        &self,
        criteria: Value,
        meta: Meta,
    ) -> impl Future<Output = QueryResult<Option<Vec<Record>>>> + Send + 'static {
        let desc = QueryDescriptor::destroy(&self.identity, criteria).with_meta(meta);
        let run = self.run(desc, Omen::capture(Method::Destroy));
        async move { Ok(run.await?.into_records()) }
    }

    #[track_caller]
    pub fn find(
        &self,
        criteria: Value,
    ) -> impl Future<Output = QueryResult<Vec<Record>>> + Send + 'static {
        let desc = QueryDescriptor::find(&self.identity, criteria);
        let run = self.run(desc, Omen::capture(Method::Find));
        async move { Ok(run.await?.into_records().unwrap_or_default()) }
    }

    #[track_caller]
    pub fn count(
        &self,
        criteria: Value,
    ) -> impl Future<Output = QueryResult<u64>> + Send + 'static {
        let desc = QueryDescriptor::count(&self.identity, criteria);
        let run = self.run(desc, Omen::capture(Method::Count));
        async move { Ok(run.await?.as_count().unwrap_or(0)) }
    }

    #[track_caller]
    pub fn sum(
        &self,
        numeric_attr_name: &str,
        criteria: Value,
    ) -> impl Future<Output = QueryResult<f64>> + Send + 'static {
        let desc = QueryDescriptor::sum(&self.identity, numeric_attr_name, criteria);
        let run = self.run(desc, Omen::capture(Method::Sum));
        async move { Ok(run.await?.as_number().unwrap_or(0.0)) }
    }

    #[track_caller]
    pub fn avg(
        &self,
        numeric_attr_name: &str,
        criteria: Value,
    ) -> impl Future<Output = QueryResult<f64>> + Send + 'static {
        let desc = QueryDescriptor::avg(&self.identity, numeric_attr_name, criteria);
        let run = self.run(desc, Omen::capture(Method::Avg));
        async move { Ok(run.await?.as_number().unwrap_or(0.0)) }
    }

    /// Stream matching records to `f`, one at a time
    #[track_caller]
    pub fn each_record<F, Fut>(
        &self,
        criteria: Value,
        f: F,
    ) -> impl Future<Output = QueryResult<()>> + Send + 'static
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IterateeResult> + Send + 'static,
    {
        let desc = QueryDescriptor::stream(&self.identity, criteria).each_record(f);
        let run = self.run(desc, Omen::capture(Method::Stream));
        async move { run.await.map(|_| ()) }
    }

    /// Stream matching records to `f`, one batch at a time
    #[track_caller]
    pub fn each_batch<F, Fut>(
        &self,
        criteria: Value,
        f: F,
    ) -> impl Future<Output = QueryResult<()>> + Send + 'static
    where
        F: Fn(Vec<Record>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IterateeResult> + Send + 'static,
    {
        let desc = QueryDescriptor::stream(&self.identity, criteria).each_batch(f);
        let run = self.run(desc, Omen::capture(Method::Stream));
        async move { run.await.map(|_| ()) }
    }

    /// Run an arbitrary descriptor against this model.
    ///
    /// `desc.using` is replaced with this handle's identity.
    #[track_caller]
    pub fn execute(
        &self,
        mut desc: QueryDescriptor,
    ) -> impl Future<Output = QueryResult<Outcome>> + Send + 'static {
        desc.using = self.identity.clone();
        let omen = Omen::capture(desc.method);
        self.run(desc, omen)
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("identity", &self.identity)
            .finish()
    }
}
