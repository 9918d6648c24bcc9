//! Attribute <-> column transformer
//!
//! Maps logical attribute names to physical column names and back.
//! Plural associations have no column and are absent from both maps.

use std::collections::HashMap;

use thiserror::Error;

use super::types::ModelDef;
use crate::query::Record;

/// Errors raised while translating between attribute and column names
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// Logical name with no column behind it
    #[error("Attribute '{attribute}' of model '{model}' has no physical column")]
    UnknownAttribute { model: String, attribute: String },

    /// Two raw fields resolved to the same attribute
    #[error(
        "Column '{column}' and another field both map to attribute '{attribute}' \
         of model '{model}'"
    )]
    Collision {
        model: String,
        column: String,
        attribute: String,
    },

    /// Association target cannot be resolved
    #[error("Model '{identity}' is not registered")]
    UnknownModel { identity: String },
}

/// Bidirectional attribute/column mapping for one model
#[derive(Debug, Clone)]
pub struct Transformer {
    model: String,
    to_column: HashMap<String, String>,
    to_attribute: HashMap<String, String>,
}

impl Transformer {
    /// Builds the mapping from a model definition
    pub fn for_model(model: &ModelDef) -> Self {
        let mut to_column = HashMap::new();
        let mut to_attribute = HashMap::new();

        for (name, def) in &model.attributes {
            if !def.has_column() {
                continue;
            }
            let column = def.column_name.clone().unwrap_or_else(|| name.clone());
            to_attribute.insert(column.clone(), name.clone());
            to_column.insert(name.clone(), column);
        }

        Self {
            model: model.identity.clone(),
            to_column,
            to_attribute,
        }
    }

    /// Column backing an attribute
    pub fn column_for(&self, attribute: &str) -> Option<&str> {
        self.to_column.get(attribute).map(String::as_str)
    }

    /// Attribute stored in a column
    pub fn attribute_for(&self, column: &str) -> Option<&str> {
        self.to_attribute.get(column).map(String::as_str)
    }

    /// Column backing an attribute, or an error naming the attribute
    pub fn require_column(&self, attribute: &str) -> Result<String, TransformError> {
        self.column_for(attribute)
            .map(str::to_string)
            .ok_or_else(|| TransformError::UnknownAttribute {
                model: self.model.clone(),
                attribute: attribute.to_string(),
            })
    }

    /// Rewrites a logical record into physical column names.
    ///
    /// Every key must be a column-backed attribute.
    pub fn serialize(&self, record: Record) -> Result<Record, TransformError> {
        record
            .into_iter()
            .map(|(attr, value)| Ok((self.require_column(&attr)?, value)))
            .collect()
    }

    /// Rewrites a physical record into logical attribute names.
    ///
    /// Columns that no attribute claims are kept under their own name, so
    /// implementation fields added by an adapter survive.
    pub fn unserialize(&self, raw: Record) -> Result<Record, TransformError> {
        let mut out = Record::new();
        for (column, value) in raw {
            let key = self
                .attribute_for(&column)
                .map(str::to_string)
                .unwrap_or_else(|| column.clone());
            if out.contains_key(&key) {
                return Err(TransformError::Collision {
                    model: self.model.clone(),
                    column,
                    attribute: key,
                });
            }
            out.insert(key, value);
        }
        Ok(out)
    }
}
