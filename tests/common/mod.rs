//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use sluice::adapter::{Adapter, AdapterFuture, AdapterReply};
use sluice::planner::PhysicalQuery;
use sluice::schema::{AttributeDef, ModelDef, Orm};
use sluice::{LifecycleHooks, OrmConfig, Record};
use tracing_subscriber::fmt::MakeWriter;

// =============================================================================
// Scripted adapter
// =============================================================================

/// Adapter that records every physical query and answers from a script.
///
/// Mutations and count pop the next scripted reply (`Ok(None)` once the
/// script runs dry). Finds page through `rows`. `destroy` is not supported.
#[derive(Default)]
pub struct ScriptedAdapter {
    calls: Mutex<Vec<PhysicalQuery>>,
    replies: Mutex<VecDeque<AdapterReply>>,
    rows: Mutex<Vec<Record>>,
}

impl ScriptedAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, reply: AdapterReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn set_rows(&self, rows: Vec<Record>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn calls(&self) -> Vec<PhysicalQuery> {
        self.calls.lock().unwrap().clone()
    }

    fn scripted<'a>(&'a self, query: &PhysicalQuery) -> AdapterFuture<'a> {
        self.calls.lock().unwrap().push(query.clone());
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Ok(None));
        Box::pin(async move { reply })
    }
}

impl Adapter for ScriptedAdapter {
    fn identity(&self) -> &str {
        "scripted"
    }

    fn create<'a>(&'a self, _: &'a str, query: &'a PhysicalQuery) -> Option<AdapterFuture<'a>> {
        Some(self.scripted(query))
    }

    fn create_each<'a>(
        &'a self,
        _: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        Some(self.scripted(query))
    }

    fn update<'a>(&'a self, _: &'a str, query: &'a PhysicalQuery) -> Option<AdapterFuture<'a>> {
        Some(self.scripted(query))
    }

    fn count<'a>(&'a self, _: &'a str, query: &'a PhysicalQuery) -> Option<AdapterFuture<'a>> {
        Some(self.scripted(query))
    }

    fn find<'a>(&'a self, _: &'a str, query: &'a PhysicalQuery) -> Option<AdapterFuture<'a>> {
        self.calls.lock().unwrap().push(query.clone());
        let rows = self.rows.lock().unwrap();
        let skip = query.criteria.skip as usize;
        let limit = query.criteria.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let page: Vec<Value> = rows
            .iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .map(Value::Object)
            .collect();
        Some(Box::pin(async move { Ok(Some(Value::Array(page))) }))
    }
}

// =============================================================================
// Registry fixtures
// =============================================================================

/// `user` and `pet` models on one datastore backed by `adapter`
pub fn orm_with(adapter: Arc<ScriptedAdapter>, hooks: LifecycleHooks) -> Arc<Orm> {
    let shared: Arc<dyn Adapter> = adapter;
    let config = OrmConfig::new()
        .with_datastore("default", "scripted")
        .with_model(
            ModelDef::new("user", "default")
                .with_attribute("id", AttributeDef::number())
                .with_attribute("name", AttributeDef::string().required().column("full_name"))
                .with_attribute("email", AttributeDef::string().unique().column("email_address"))
                .with_attribute("age", AttributeDef::number())
                .with_attribute("pets", AttributeDef::has_many("pet", "owner")),
        )
        .with_model(
            ModelDef::new("pet", "default")
                .with_attribute("id", AttributeDef::number())
                .with_attribute("owner", AttributeDef::belongs_to("user").column("owner_id")),
        );
    Orm::builder(config)
        .with_shared_adapter("scripted", shared)
        .with_hooks("user", hooks)
        .build()
        .unwrap()
}

/// Physical `user` row
pub fn user_row(id: u64, name: &str) -> Record {
    let mut row = Record::new();
    row.insert("id".into(), Value::from(id));
    row.insert("full_name".into(), Value::from(name));
    row
}

pub fn user_rows(n: u64) -> Vec<Record> {
    (0..n).map(|i| user_row(i, &format!("user-{}", i))).collect()
}

pub fn ids(records: &[Record]) -> Vec<u64> {
    records.iter().map(|r| r["id"].as_u64().unwrap()).collect()
}

// =============================================================================
// Log capture
// =============================================================================

/// In-memory sink for formatted log lines
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Capture warnings on the current thread until the guard drops
pub fn capture_warnings() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
