//! Stage-2 compiler
//!
//! Consumes a raw [`QueryDescriptor`] and produces a validated, canonical
//! [`StageTwoQuery`]. Nothing in the result refers to physical columns yet.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::criteria::normalize_criteria;
use super::errors::{CompileError, CompileResult};
use super::values::{normalize_new_record, normalize_new_records, normalize_values_to_set};
use crate::query::{Criteria, Iteratee, Meta, Method, QueryDescriptor, Record};
use crate::schema::{AttributeKind, AttributeType, ModelDef, Orm};

/// Association to populate on each parent record
#[derive(Debug, Clone, PartialEq)]
pub struct Populate {
    /// Child criteria; `None` when it can never match, so every parent gets
    /// an empty collection without consulting the adapter about children
    pub criteria: Option<Criteria>,
}

/// Validated, canonical query
#[derive(Debug, Clone)]
pub struct StageTwoQuery {
    pub method: Method,
    pub using: String,
    pub criteria: Criteria,
    pub values_to_set: Option<Record>,
    pub new_records: Vec<Record>,
    pub numeric_attr_name: Option<String>,
    pub populates: BTreeMap<String, Populate>,
    pub iteratee: Option<Iteratee>,
    pub meta: Meta,
}

/// Compile a raw descriptor against the registry.
///
/// `now` stamps every `autoCreatedAt` / `autoUpdatedAt` attribute so all
/// records of one operation share a timestamp.
pub fn forge_stage_two(
    desc: QueryDescriptor,
    orm: &Orm,
    now: DateTime<Utc>,
) -> CompileResult<StageTwoQuery> {
    let method = desc.method;
    let model = orm
        .model(&desc.using)
        .map(|m| m.def())
        .ok_or_else(|| CompileError::invalid_criteria(format!("Unknown model `{}`", desc.using)))?;

    reject_unexpected(&desc)?;

    let criteria = if method.takes_criteria() {
        normalize_criteria(desc.criteria.as_ref(), model, method)?
    } else {
        Criteria::new()
    };

    let values_to_set = match (&desc.values_to_set, method.takes_values_to_set()) {
        (Some(raw), true) => Some(normalize_values_to_set(raw, model, now)?),
        (None, true) => {
            return Err(CompileError::invalid_values_to_set(
                "Values to set must be provided",
            ))
        }
        _ => None,
    };

    let new_records = match (&desc.new_records, method) {
        (Some(raw), Method::Create) => vec![normalize_new_record(raw, model, now)?],
        (Some(raw), Method::CreateEach) => normalize_new_records(raw, model, now)?,
        (None, Method::Create | Method::CreateEach) => {
            return Err(CompileError::invalid_new_records(
                "New record(s) must be provided",
            ))
        }
        _ => Vec::new(),
    };

    let numeric_attr_name = if method.takes_numeric_attr_name() {
        Some(numeric_attr_name(desc.numeric_attr_name.as_deref(), model)?)
    } else {
        None
    };

    let populates = match &desc.populates {
        Some(raw) => populates(raw, model, orm)?,
        None => BTreeMap::new(),
    };

    let iteratee = match (method, desc.each_record_fn, desc.each_batch_fn) {
        (Method::Stream, Some(f), None) => Some(Iteratee::EachRecord(f)),
        (Method::Stream, None, Some(f)) => Some(Iteratee::EachBatch(f)),
        (Method::Stream, Some(_), Some(_)) => {
            return Err(CompileError::invalid_stream_iteratee(
                "Both `each_record` and `each_batch` were provided",
            ))
        }
        (Method::Stream, None, None) => {
            return Err(CompileError::invalid_stream_iteratee(
                "Neither `each_record` nor `each_batch` was provided",
            ))
        }
        _ => None,
    };

    Ok(StageTwoQuery {
        method,
        using: desc.using,
        criteria,
        values_to_set,
        new_records,
        numeric_attr_name,
        populates,
        iteratee,
        meta: desc.meta,
    })
}

/// Descriptor keys the method does not take
fn reject_unexpected(desc: &QueryDescriptor) -> CompileResult<()> {
    let method = desc.method;
    let unexpected = |key: &str| format!("`.{}()` does not take {}", method, key);

    if desc.criteria.is_some() && !method.takes_criteria() {
        return Err(CompileError::invalid_criteria(unexpected("criteria")));
    }
    if desc.values_to_set.is_some() && !method.takes_values_to_set() {
        return Err(CompileError::invalid_values_to_set(unexpected("values to set")));
    }
    if desc.new_records.is_some() && !method.takes_new_records() {
        return Err(CompileError::invalid_new_records(unexpected("new records")));
    }
    if desc.numeric_attr_name.is_some() && !method.takes_numeric_attr_name() {
        return Err(CompileError::invalid_numeric_attr_name(unexpected(
            "a numeric attribute name",
        )));
    }
    if desc.populates.is_some() && !method.takes_populates() {
        return Err(CompileError::invalid_populates(unexpected("populates")));
    }
    let has_iteratee = desc.each_record_fn.is_some() || desc.each_batch_fn.is_some();
    if has_iteratee && method != Method::Stream {
        return Err(CompileError::invalid_stream_iteratee(unexpected(
            "an iteratee",
        )));
    }
    Ok(())
}

fn numeric_attr_name(raw: Option<&str>, model: &ModelDef) -> CompileResult<String> {
    let attr = raw.ok_or_else(|| {
        CompileError::invalid_numeric_attr_name("A numeric attribute name must be provided")
    })?;
    match model.attribute(attr).map(|a| a.kind()) {
        Some(AttributeKind::Scalar(AttributeType::Number)) => Ok(attr.to_string()),
        Some(_) => Err(CompileError::invalid_numeric_attr_name(format!(
            "`{}` is not a number attribute",
            attr
        ))),
        None => Err(CompileError::invalid_numeric_attr_name(format!(
            "Unknown attribute `{}` of model `{}`",
            attr, model.identity
        ))),
    }
}

fn populates(
    raw: &serde_json::Map<String, Value>,
    model: &ModelDef,
    orm: &Orm,
) -> CompileResult<BTreeMap<String, Populate>> {
    let mut out = BTreeMap::new();
    for (assoc, subcriteria) in raw {
        let kind = model.attribute(assoc).map(|a| a.kind()).ok_or_else(|| {
            CompileError::invalid_populates(format!(
                "Unknown association `{}` of model `{}`",
                assoc, model.identity
            ))
        })?;

        let subcriteria = match subcriteria {
            Value::Bool(true) | Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            other => Some(other),
        };

        let target = match kind {
            AttributeKind::Model(target) => {
                if subcriteria.is_some() {
                    return Err(CompileError::invalid_populates(format!(
                        "`{}` is a singular association and cannot take subcriteria",
                        assoc
                    )));
                }
                target
            }
            AttributeKind::Collection { collection, .. } => collection,
            AttributeKind::Scalar(_) => {
                return Err(CompileError::invalid_populates(format!(
                    "`{}` is not an association",
                    assoc
                )))
            }
        };

        let child = orm.model(target).map(|m| m.def()).ok_or_else(|| {
            CompileError::invalid_populates(format!("Unknown model `{}`", target))
        })?;
        if child.datastore != model.datastore {
            return Err(CompileError::invalid_populates(format!(
                "`{}` lives in datastore `{}`; cross-datastore populates are not supported",
                target, child.datastore
            )));
        }

        let criteria = match normalize_criteria(subcriteria, child, Method::Find) {
            Ok(criteria) => Some(criteria),
            Err(e) if e.is_noop() => None,
            Err(e) => {
                return Err(CompileError::invalid_populates(format!(
                    "Invalid subcriteria for `{}`: {}",
                    assoc,
                    e.details()
                )))
            }
        };
        out.insert(assoc.clone(), Populate { criteria });
    }
    Ok(out)
}
