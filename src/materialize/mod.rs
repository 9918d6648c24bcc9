//! Result materialization
//!
//! Maps physical rows back to logical records and checks them against the
//! model schema. Fields an adapter adds on its own are tolerated; declared
//! attributes holding the wrong type are reported as schema drift.

use serde_json::Value;

use crate::core::{QueryError, QueryResult};
use crate::planner::Join;
use crate::query::{Meta, Record};
use crate::schema::{AttributeKind, Orm, RegisteredModel};

/// Materializes the rows of one adapter reply
pub struct Materializer<'a> {
    orm: &'a Orm,
    model: &'a RegisteredModel,
    joins: &'a [Join],
    verify: bool,
}

impl<'a> Materializer<'a> {
    pub fn new(orm: &'a Orm, model: &'a RegisteredModel, joins: &'a [Join], meta: Meta) -> Self {
        Self {
            orm,
            model,
            joins,
            verify: !meta.skip_record_verification,
        }
    }

    /// Materialize rows, preserving their order
    pub fn materialize(&self, rows: Vec<Record>) -> QueryResult<Vec<Record>> {
        rows.into_iter().map(|row| self.record(row)).collect()
    }

    fn record(&self, mut row: Record) -> QueryResult<Record> {
        let embedded: Vec<(&Join, Option<Value>)> = self
            .joins
            .iter()
            .map(|join| (join, row.remove(&join.alias)))
            .collect();

        let mut record = unserialize(self.model, row)?;

        for (join, value) in embedded {
            let child = self.orm.require_model(&join.child_model)?;
            let value = match (value, join.collection) {
                (None, true) => Value::Array(Vec::new()),
                (None, false) | (Some(Value::Null), false) => Value::Null,
                (Some(Value::Array(children)), true) => Value::Array(
                    children
                        .into_iter()
                        .map(|c| self.child(child, c, &join.alias).map(Value::Object))
                        .collect::<QueryResult<_>>()?,
                ),
                (Some(value @ Value::Object(_)), false) => {
                    Value::Object(self.child(child, value, &join.alias)?)
                }
                (Some(other), _) => {
                    return Err(drift(
                        self.model,
                        format!("populated `{}` has an unexpected shape: {}", join.alias, other),
                    ))
                }
            };
            record.insert(join.alias.clone(), value);
        }

        if self.verify {
            verify(self.model, &record)?;
        }
        Ok(record)
    }

    fn child(&self, child: &RegisteredModel, raw: Value, alias: &str) -> QueryResult<Record> {
        let Value::Object(row) = raw else {
            return Err(drift(
                self.model,
                format!("populated `{}` contains a non-record: {}", alias, raw),
            ));
        };
        let record = unserialize(child, row)?;
        if self.verify {
            verify(child, &record)?;
        }
        Ok(record)
    }
}

fn unserialize(model: &RegisteredModel, row: Record) -> QueryResult<Record> {
    model
        .transformer()
        .unserialize(row)
        .map_err(|source| QueryError::Transform {
            model: model.identity().to_string(),
            source,
        })
}

fn drift(model: &RegisteredModel, details: String) -> QueryError {
    QueryError::SchemaDrift {
        model: model.identity().to_string(),
        details,
    }
}

/// Checks a logical record against its model's declared attributes
pub fn verify(model: &RegisteredModel, record: &Record) -> QueryResult<()> {
    let def = model.def();
    match record.get(&def.primary_key) {
        None | Some(Value::Null) => {
            return Err(drift(
                model,
                format!("record is missing its primary key `{}`", def.primary_key),
            ))
        }
        Some(_) => {}
    }

    for (name, attr) in &def.attributes {
        let Some(value) = record.get(name) else {
            continue;
        };
        let fits = match attr.kind() {
            _ if value.is_null() => !attr.required,
            AttributeKind::Scalar(attr_type) => attr_type.accepts(value),
            AttributeKind::Model(_) => value.is_string() || value.is_number() || value.is_object(),
            AttributeKind::Collection { .. } => value.is_array(),
        };
        if !fits {
            return Err(drift(
                model,
                format!("attribute `{}` holds an unexpected value: {}", name, value),
            ));
        }
    }
    Ok(())
}
