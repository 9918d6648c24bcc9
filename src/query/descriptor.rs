//! Query descriptor (stage 1)
//!
//! The caller-facing description of one logical operation. Every query key
//! is still raw JSON here; nothing has been validated. The stage-2 compiler
//! consumes a descriptor and either produces a canonical query or rejects it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::iteratee::{EachBatch, EachRecord, IterateeResult};
use super::meta::Meta;
use super::method::Method;
use super::Record;

/// Raw, unvalidated query
#[derive(Clone)]
pub struct QueryDescriptor {
    /// Operation to perform
    pub method: Method,
    /// Identity of the target model
    pub using: String,
    /// Filter/sort/paging specification
    pub criteria: Option<Value>,
    /// Attribute values to apply (update)
    pub values_to_set: Option<Value>,
    /// Record dictionary (create) or array of dictionaries (createEach)
    pub new_records: Option<Value>,
    /// Attribute to aggregate over (sum, avg)
    pub numeric_attr_name: Option<String>,
    /// Association name -> nested criteria (or `true`)
    pub populates: Option<Map<String, Value>>,
    /// Per-record stream continuation
    pub each_record_fn: Option<Arc<dyn EachRecord>>,
    /// Per-batch stream continuation
    pub each_batch_fn: Option<Arc<dyn EachBatch>>,
    /// Options
    pub meta: Meta,
}

impl QueryDescriptor {
    /// Creates an empty descriptor for the given method and model
    pub fn new(method: Method, using: impl Into<String>) -> Self {
        Self {
            method,
            using: using.into(),
            criteria: None,
            values_to_set: None,
            new_records: None,
            numeric_attr_name: None,
            populates: None,
            each_record_fn: None,
            each_batch_fn: None,
            meta: Meta::default(),
        }
    }

    pub fn create(using: impl Into<String>, new_record: Value) -> Self {
        Self::new(Method::Create, using).with_new_records(new_record)
    }

    pub fn create_each(using: impl Into<String>, new_records: Value) -> Self {
        Self::new(Method::CreateEach, using).with_new_records(new_records)
    }

    pub fn update(using: impl Into<String>, criteria: Value, values_to_set: Value) -> Self {
        Self::new(Method::Update, using)
            .with_criteria(criteria)
            .with_values_to_set(values_to_set)
    }

    pub fn destroy(using: impl Into<String>, criteria: Value) -> Self {
        Self::new(Method::Destroy, using).with_criteria(criteria)
    }

    pub fn find(using: impl Into<String>, criteria: Value) -> Self {
        Self::new(Method::Find, using).with_criteria(criteria)
    }

    pub fn count(using: impl Into<String>, criteria: Value) -> Self {
        Self::new(Method::Count, using).with_criteria(criteria)
    }

    pub fn sum(using: impl Into<String>, attr: impl Into<String>, criteria: Value) -> Self {
        Self::new(Method::Sum, using)
            .with_numeric_attr_name(attr)
            .with_criteria(criteria)
    }

    pub fn avg(using: impl Into<String>, attr: impl Into<String>, criteria: Value) -> Self {
        Self::new(Method::Avg, using)
            .with_numeric_attr_name(attr)
            .with_criteria(criteria)
    }

    pub fn stream(using: impl Into<String>, criteria: Value) -> Self {
        Self::new(Method::Stream, using).with_criteria(criteria)
    }

    /// Sets the criteria
    pub fn with_criteria(mut self, criteria: Value) -> Self {
        self.criteria = Some(criteria);
        self
    }

    /// Sets the values to apply
    pub fn with_values_to_set(mut self, values: Value) -> Self {
        self.values_to_set = Some(values);
        self
    }

    /// Sets the new record(s)
    pub fn with_new_records(mut self, records: Value) -> Self {
        self.new_records = Some(records);
        self
    }

    /// Sets the aggregated attribute
    pub fn with_numeric_attr_name(mut self, attr: impl Into<String>) -> Self {
        self.numeric_attr_name = Some(attr.into());
        self
    }

    /// Adds an association to populate
    pub fn with_populate(mut self, association: impl Into<String>, criteria: Value) -> Self {
        self.populates
            .get_or_insert_with(Map::new)
            .insert(association.into(), criteria);
        self
    }

    /// Sets the per-record stream continuation
    pub fn each_record<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IterateeResult> + Send + 'static,
    {
        let f: Arc<dyn EachRecord> = Arc::new(f);
        self.each_record_fn = Some(f);
        self
    }

    /// Sets the per-batch stream continuation
    pub fn each_batch<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Vec<Record>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IterateeResult> + Send + 'static,
    {
        let f: Arc<dyn EachBatch> = Arc::new(f);
        self.each_batch_fn = Some(f);
        self
    }

    /// Replaces the meta options
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }
}

impl fmt::Debug for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDescriptor")
            .field("method", &self.method)
            .field("using", &self.using)
            .field("criteria", &self.criteria)
            .field("values_to_set", &self.values_to_set)
            .field("new_records", &self.new_records)
            .field("numeric_attr_name", &self.numeric_attr_name)
            .field("populates", &self.populates)
            .field("each_record_fn", &self.each_record_fn.is_some())
            .field("each_batch_fn", &self.each_batch_fn.is_some())
            .field("meta", &self.meta)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Flow;
    use serde_json::json;

    #[test]
    fn test_update_descriptor() {
        let query = QueryDescriptor::update("user", json!({"id": 1}), json!({"name": "a"}))
            .with_meta(Meta::new().fetch());

        assert_eq!(query.method, Method::Update);
        assert_eq!(query.using, "user");
        assert!(query.values_to_set.is_some());
        assert!(query.meta.fetch);
    }

    #[test]
    fn test_stream_descriptor_with_iteratee() {
        let query = QueryDescriptor::stream("user", json!({}))
            .with_populate("pets", json!(true))
            .each_record(|_record| async { Ok::<_, crate::BoxError>(Flow::Continue) });

        assert!(query.each_record_fn.is_some());
        assert!(query.each_batch_fn.is_none());
        assert_eq!(query.populates.as_ref().map(|p| p.len()), Some(1));
        assert!(format!("{:?}", query).contains("each_record_fn: true"));
    }
}
