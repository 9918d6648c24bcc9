//! In-memory adapter
//!
//! Keeps rows per (datastore, table) in insertion order behind a
//! `RwLock`. Enforces primary-key and declared uniqueness, generates
//! primary keys, and performs joins for populates. Useful for tests and as
//! a reference implementation of the adapter contract.

mod filters;
mod sorter;

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;
use tracing::trace;

use super::{Adapter, AdapterError, AdapterFuture, AdapterReply, TableDefinition};
use crate::planner::{Join, PhysicalQuery};
use crate::query::{Clause, Criteria, Predicate, Record};

pub use filters::ClauseFilter;
pub use sorter::RowSorter;

type TableKey = (String, String);

struct Table {
    def: TableDefinition,
    rows: Vec<Record>,
    next_id: u64,
}

impl Table {
    fn new(def: TableDefinition) -> Self {
        Self {
            def,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    /// Rows matching the criteria, sorted and paged
    fn select(&self, criteria: &Criteria) -> Vec<Record> {
        let mut rows: Vec<Record> = self
            .rows
            .iter()
            .filter(|row| ClauseFilter::matches(row, &criteria.where_clause))
            .cloned()
            .collect();
        RowSorter::sort(&mut rows, &criteria.sort);
        let skip = usize::try_from(criteria.skip).unwrap_or(usize::MAX);
        let limit = criteria
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        rows.into_iter().skip(skip).take(limit).collect()
    }

    /// Positions of rows matching a mutation's where clause
    fn positions(&self, criteria: &Criteria) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| ClauseFilter::matches(row, &criteria.where_clause))
            .map(|(i, _)| i)
            .collect()
    }

    fn unique_columns(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.def.primary_key).chain(
            self.def
                .unique_columns
                .iter()
                .filter(|c| **c != self.def.primary_key),
        )
    }

    /// Fills in a missing primary key
    fn assign_primary_key(&mut self, row: &mut Record) {
        let pk = self.def.primary_key.clone();
        match row.get(&pk) {
            Some(Value::Number(n)) => {
                if let Some(n) = n.as_u64() {
                    self.next_id = self.next_id.max(n.saturating_add(1));
                }
            }
            Some(Value::Null) | None => {
                let id = if self.def.auto_increment {
                    let id = self.next_id;
                    self.next_id += 1;
                    Value::from(id)
                } else {
                    Value::String(uuid::Uuid::new_v4().to_string())
                };
                row.insert(pk, id);
            }
            Some(_) => {}
        }
    }

    /// First unique column on which `row` collides with an existing row
    /// other than those at `ignore`
    fn collision(&self, row: &Record, ignore: &[usize]) -> Option<String> {
        self.unique_columns()
            .find(|column| {
                let Some(value) = row.get(*column).filter(|v| !v.is_null()) else {
                    return false;
                };
                self.rows
                    .iter()
                    .enumerate()
                    .any(|(i, existing)| {
                        !ignore.contains(&i) && existing.get(*column) == Some(value)
                    })
            })
            .cloned()
    }
}

/// Process-local adapter storing rows in memory
pub struct MemoryAdapter {
    identity: String,
    tables: RwLock<HashMap<TableKey, Table>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self {
            identity: "memory".to_string(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot of a table's rows in stored order
    pub fn rows(&self, datastore: &str, table: &str) -> Result<Vec<Record>, AdapterError> {
        let tables = self.tables.read().map_err(|e| AdapterError::new(e.to_string()))?;
        let table = Self::table(&tables, datastore, table)?;
        Ok(table.rows.clone())
    }

    fn table<'t>(
        tables: &'t HashMap<TableKey, Table>,
        datastore: &str,
        table: &str,
    ) -> Result<&'t Table, AdapterError> {
        tables
            .get(&(datastore.to_string(), table.to_string()))
            .ok_or_else(|| {
                AdapterError::new(format!(
                    "Unknown table `{}` in datastore `{}`",
                    table, datastore
                ))
            })
    }

    fn table_mut<'t>(
        tables: &'t mut HashMap<TableKey, Table>,
        datastore: &str,
        table: &str,
    ) -> Result<&'t mut Table, AdapterError> {
        tables
            .get_mut(&(datastore.to_string(), table.to_string()))
            .ok_or_else(|| {
                AdapterError::new(format!(
                    "Unknown table `{}` in datastore `{}`",
                    table, datastore
                ))
            })
    }

    fn fetched(query: &PhysicalQuery, rows: Vec<Record>) -> Option<Value> {
        query
            .meta
            .fetch
            .then(|| Value::Array(rows.into_iter().map(Value::Object).collect()))
    }

    fn run_create(&self, datastore: &str, query: &PhysicalQuery) -> AdapterReply {
        let mut tables = self.tables.write().map_err(|e| AdapterError::new(e.to_string()))?;
        let table = Self::table_mut(&mut tables, datastore, &query.table)?;

        // a collision anywhere in the batch rolls back the whole batch
        let first_new = table.rows.len();
        let next_id = table.next_id;
        let mut created = Vec::with_capacity(query.new_records.len());
        for record in &query.new_records {
            let mut row = record.clone();
            table.assign_primary_key(&mut row);
            if let Some(column) = table.collision(&row, &[]) {
                table.rows.truncate(first_new);
                table.next_id = next_id;
                return Err(AdapterError::not_unique(vec![column]));
            }
            table.rows.push(row.clone());
            created.push(row);
        }

        trace!(table = %query.table, count = created.len(), "created rows");
        Ok(Self::fetched(query, created))
    }

    fn run_update(&self, datastore: &str, query: &PhysicalQuery) -> AdapterReply {
        let mut tables = self.tables.write().map_err(|e| AdapterError::new(e.to_string()))?;
        let table = Self::table_mut(&mut tables, datastore, &query.table)?;
        let values = query.values_to_set.clone().unwrap_or_default();

        let positions = table.positions(&query.criteria);
        let mut updated = Vec::with_capacity(positions.len());
        for &i in &positions {
            let mut row = table.rows[i].clone();
            for (column, value) in &values {
                row.insert(column.clone(), value.clone());
            }
            updated.push(row);
        }

        for (n, row) in updated.iter().enumerate() {
            let clash_with_batch = table
                .unique_columns()
                .filter(|c| values.contains_key(*c))
                .find(|c| {
                    let value = row.get(*c).filter(|v| !v.is_null());
                    value.is_some() && updated[..n].iter().any(|other| other.get(*c) == value)
                })
                .cloned();
            if let Some(column) = clash_with_batch.or_else(|| table.collision(row, &positions)) {
                return Err(AdapterError::not_unique(vec![column]));
            }
        }

        for (&i, row) in positions.iter().zip(&updated) {
            table.rows[i] = row.clone();
        }

        trace!(table = %query.table, count = updated.len(), "updated rows");
        Ok(Self::fetched(query, updated))
    }

    fn run_destroy(&self, datastore: &str, query: &PhysicalQuery) -> AdapterReply {
        let mut tables = self.tables.write().map_err(|e| AdapterError::new(e.to_string()))?;
        let table = Self::table_mut(&mut tables, datastore, &query.table)?;

        let (destroyed, kept): (Vec<Record>, Vec<Record>) = std::mem::take(&mut table.rows)
            .into_iter()
            .partition(|row| ClauseFilter::matches(row, &query.criteria.where_clause));
        table.rows = kept;

        trace!(table = %query.table, count = destroyed.len(), "destroyed rows");
        Ok(Self::fetched(query, destroyed))
    }

    fn run_find(&self, datastore: &str, query: &PhysicalQuery) -> AdapterReply {
        let tables = self.tables.read().map_err(|e| AdapterError::new(e.to_string()))?;
        let table = Self::table(&tables, datastore, &query.table)?;

        let mut rows = table.select(&query.criteria);
        for join in &query.joins {
            let child = Self::table(&tables, datastore, &join.child_table)?;
            for row in rows.iter_mut() {
                let embedded = Self::embed(child, join, row.get(&join.parent_key));
                row.insert(join.alias.clone(), embedded);
            }
        }

        let rows = rows
            .into_iter()
            .map(|row| {
                let aliases = query.joins.iter().map(|j| j.alias.as_str());
                Value::Object(project(row, query.criteria.select.as_deref(), aliases))
            })
            .collect();
        Ok(Some(Value::Array(rows)))
    }

    fn embed(child: &Table, join: &Join, parent_value: Option<&Value>) -> Value {
        let Some(parent_value) = parent_value.filter(|v| !v.is_null()) else {
            return if join.collection {
                Value::Array(Vec::new())
            } else {
                Value::Null
            };
        };

        if !join.collection {
            return child
                .rows
                .iter()
                .find(|r| r.get(&join.child_key) == Some(parent_value))
                .cloned()
                .map(Value::Object)
                .unwrap_or(Value::Null);
        }

        let Some(criteria) = &join.criteria else {
            return Value::Array(Vec::new());
        };
        let mut scoped = criteria.clone();
        scoped.where_clause = Clause::And(vec![
            Clause::Predicate(Predicate::eq(join.child_key.clone(), parent_value.clone())),
            criteria.where_clause.clone(),
        ]);
        Value::Array(
            child
                .select(&scoped)
                .into_iter()
                .map(|r| Value::Object(project(r, criteria.select.as_deref(), std::iter::empty())))
                .collect(),
        )
    }

    fn aggregate(
        &self,
        datastore: &str,
        query: &PhysicalQuery,
    ) -> Result<Vec<Record>, AdapterError> {
        let tables = self.tables.read().map_err(|e| AdapterError::new(e.to_string()))?;
        Ok(Self::table(&tables, datastore, &query.table)?.select(&query.criteria))
    }

    fn run_count(&self, datastore: &str, query: &PhysicalQuery) -> AdapterReply {
        let rows = self.aggregate(datastore, query)?;
        Ok(Some(Value::from(rows.len() as u64)))
    }

    fn numbers(&self, datastore: &str, query: &PhysicalQuery) -> Result<Vec<f64>, AdapterError> {
        let column = query
            .numeric_column
            .as_deref()
            .ok_or_else(|| AdapterError::new("No numeric column to aggregate"))?;
        Ok(self
            .aggregate(datastore, query)?
            .iter()
            .filter_map(|row| row.get(column).and_then(Value::as_f64))
            .collect())
    }

    fn run_sum(&self, datastore: &str, query: &PhysicalQuery) -> AdapterReply {
        let sum: f64 = self.numbers(datastore, query)?.iter().sum();
        Ok(Some(Value::from(sum)))
    }

    fn run_avg(&self, datastore: &str, query: &PhysicalQuery) -> AdapterReply {
        let numbers = self.numbers(datastore, query)?;
        let avg = if numbers.is_empty() {
            0.0
        } else {
            numbers.iter().sum::<f64>() / numbers.len() as f64
        };
        Ok(Some(Value::from(avg)))
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep only selected columns plus embedded associations
fn project<'a>(
    row: Record,
    select: Option<&[String]>,
    aliases: impl Iterator<Item = &'a str>,
) -> Record {
    let Some(select) = select else {
        return row;
    };
    let aliases: Vec<&str> = aliases.collect();
    row.into_iter()
        .filter(|(column, _)| select.contains(column) || aliases.contains(&column.as_str()))
        .collect()
}

impl Adapter for MemoryAdapter {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn define(&self, datastore: &str, table: &TableDefinition) -> Result<(), AdapterError> {
        let mut tables = self.tables.write().map_err(|e| AdapterError::new(e.to_string()))?;
        tables
            .entry((datastore.to_string(), table.table.clone()))
            .and_modify(|existing| existing.def = table.clone())
            .or_insert_with(|| Table::new(table.clone()));
        Ok(())
    }

    fn create<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        Some(Box::pin(async move { self.run_create(datastore, query) }))
    }

    fn create_each<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        Some(Box::pin(async move { self.run_create(datastore, query) }))
    }

    fn update<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        Some(Box::pin(async move { self.run_update(datastore, query) }))
    }

    fn destroy<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        Some(Box::pin(async move { self.run_destroy(datastore, query) }))
    }

    fn find<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        Some(Box::pin(async move { self.run_find(datastore, query) }))
    }

    fn count<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        Some(Box::pin(async move { self.run_count(datastore, query) }))
    }

    fn sum<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        Some(Box::pin(async move { self.run_sum(datastore, query) }))
    }

    fn avg<'a>(
        &'a self,
        datastore: &'a str,
        query: &'a PhysicalQuery,
    ) -> Option<AdapterFuture<'a>> {
        Some(Box::pin(async move { self.run_avg(datastore, query) }))
    }
}
