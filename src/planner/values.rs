//! Values-to-set and new-record normalization

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::errors::{CompileError, CompileResult};
use crate::query::Record;
use crate::schema::{AttributeDef, AttributeKind, AttributeType, ModelDef};

/// Timestamp in the representation the attribute declares
fn timestamp(def: &AttributeDef, now: DateTime<Utc>) -> Value {
    match def.attr_type {
        Some(AttributeType::Number) => Value::from(now.timestamp_millis()),
        _ => Value::String(now.to_rfc3339()),
    }
}

/// Checks one logical value against its attribute, returning a description
/// of the mismatch
fn check_value(attr: &str, def: &AttributeDef, value: &Value) -> Result<(), String> {
    if value.is_null() {
        return if def.required {
            Err(format!("`{}` is required and cannot be null", attr))
        } else {
            Ok(())
        };
    }
    match def.kind() {
        AttributeKind::Scalar(attr_type) if attr_type.accepts(value) => Ok(()),
        AttributeKind::Scalar(attr_type) => Err(format!(
            "`{}` expects a {}, but got: {}",
            attr,
            attr_type.type_name(),
            value
        )),
        AttributeKind::Model(_) if value.is_string() || value.is_number() => Ok(()),
        AttributeKind::Model(target) => Err(format!(
            "`{}` expects the primary key of a `{}` record, but got: {}",
            attr, target, value
        )),
        AttributeKind::Collection { .. } => Err(format!(
            "`{}` is a plural association and cannot be set directly",
            attr
        )),
    }
}

/// Normalize the values to set of an `update`.
///
/// Every key must be a known singular attribute other than the primary
/// key. Attributes flagged `autoUpdatedAt` are stamped unless provided.
pub fn normalize_values_to_set(
    raw: &Value,
    model: &ModelDef,
    now: DateTime<Utc>,
) -> CompileResult<Record> {
    let Value::Object(map) = raw else {
        return Err(CompileError::invalid_values_to_set(format!(
            "Expected a dictionary, but got: {}",
            raw
        )));
    };

    let mut values = Record::new();
    for (attr, value) in map {
        let def = model.attribute(attr).ok_or_else(|| {
            CompileError::invalid_values_to_set(format!(
                "Unknown attribute `{}` of model `{}`",
                attr, model.identity
            ))
        })?;
        if *attr == model.primary_key {
            return Err(CompileError::invalid_values_to_set(format!(
                "The primary key `{}` cannot be changed",
                attr
            )));
        }
        check_value(attr, def, value).map_err(CompileError::invalid_values_to_set)?;
        values.insert(attr.clone(), value.clone());
    }

    for (attr, def) in &model.attributes {
        if def.auto_updated_at && !values.contains_key(attr) {
            values.insert(attr.clone(), timestamp(def, now));
        }
    }

    Ok(values)
}

/// Normalize one new record.
///
/// Missing attributes take their `defaultsTo` value, a timestamp, or null.
/// A missing required attribute is an error. The primary key may be left
/// out for the adapter to generate.
pub fn normalize_new_record(
    raw: &Value,
    model: &ModelDef,
    now: DateTime<Utc>,
) -> CompileResult<Record> {
    let Value::Object(map) = raw else {
        return Err(CompileError::invalid_new_records(format!(
            "Expected a dictionary, but got: {}",
            raw
        )));
    };

    let mut record = Record::new();
    for (attr, value) in map {
        let def = model.attribute(attr).ok_or_else(|| {
            CompileError::invalid_new_records(format!(
                "Unknown attribute `{}` of model `{}`",
                attr, model.identity
            ))
        })?;
        if *attr == model.primary_key && value.is_null() {
            continue;
        }
        check_value(attr, def, value).map_err(CompileError::invalid_new_records)?;
        record.insert(attr.clone(), value.clone());
    }

    for (attr, def) in &model.attributes {
        if record.contains_key(attr) || !def.has_column() || *attr == model.primary_key {
            continue;
        }
        let value = if let Some(default) = &def.defaults_to {
            default.clone()
        } else if def.auto_created_at || def.auto_updated_at {
            timestamp(def, now)
        } else if def.required {
            return Err(CompileError::invalid_new_records(format!(
                "Missing value for required attribute `{}`",
                attr
            )));
        } else {
            Value::Null
        };
        record.insert(attr.clone(), value);
    }

    Ok(record)
}

/// Normalize a list of new records
pub fn normalize_new_records(
    raw: &Value,
    model: &ModelDef,
    now: DateTime<Utc>,
) -> CompileResult<Vec<Record>> {
    let Value::Array(items) = raw else {
        return Err(CompileError::invalid_new_records(format!(
            "Expected a list of new records, but got: {}",
            raw
        )));
    };
    if items.is_empty() {
        return Err(CompileError::noop("No records to create"));
    }
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            normalize_new_record(item, model, now).map_err(|e| {
                CompileError::invalid_new_records(format!("record #{}: {}", index, e.details()))
            })
        })
        .collect()
}
