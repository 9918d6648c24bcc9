//! Model and attribute definitions
//!
//! Supported logical types:
//! - string: UTF-8 string
//! - number: JSON number
//! - boolean: true/false
//! - json: any JSON value
//! - ref: opaque value passed through untouched
//!
//! Associations are attributes too: a singular `model` association stores
//! the foreign key on this model, a plural `collection` association is
//! resolved through the `via` attribute on the child model and has no column.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical attribute types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Number,
    Boolean,
    Json,
    Ref,
}

impl AttributeType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Number => "number",
            AttributeType::Boolean => "boolean",
            AttributeType::Json => "json",
            AttributeType::Ref => "ref",
        }
    }

    /// Checks a non-null value against this type. No coercion.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            AttributeType::String => value.is_string(),
            AttributeType::Number => value.is_number(),
            AttributeType::Boolean => value.is_boolean(),
            AttributeType::Json | AttributeType::Ref => true,
        }
    }
}

/// What an attribute stands for, resolved from its definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind<'a> {
    /// Plain value column
    Scalar(AttributeType),
    /// Foreign key to one record of another model
    Model(&'a str),
    /// Many records of another model pointing back through `via`
    Collection {
        collection: &'a str,
        via: Option<&'a str>,
    },
}

/// Attribute definition
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDef {
    /// Logical type (scalar attributes only)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub attr_type: Option<AttributeType>,
    /// Whether a value must always be present and non-null
    #[serde(default)]
    pub required: bool,
    /// Physical column name (defaults to the attribute name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    /// Value applied on create when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults_to: Option<Value>,
    /// Stamp with the current time on create
    #[serde(default)]
    pub auto_created_at: bool,
    /// Stamp with the current time on create and update
    #[serde(default)]
    pub auto_updated_at: bool,
    /// Datastore enforces uniqueness of this column
    #[serde(default)]
    pub unique: bool,
    /// Target identity of a singular association
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Target identity of a plural association
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Attribute on the child model pointing back here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
}

impl AttributeDef {
    fn scalar(attr_type: AttributeType) -> Self {
        Self {
            attr_type: Some(attr_type),
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::scalar(AttributeType::String)
    }

    pub fn number() -> Self {
        Self::scalar(AttributeType::Number)
    }

    pub fn boolean() -> Self {
        Self::scalar(AttributeType::Boolean)
    }

    pub fn json() -> Self {
        Self::scalar(AttributeType::Json)
    }

    pub fn reference() -> Self {
        Self::scalar(AttributeType::Ref)
    }

    /// Singular association to `model`
    pub fn belongs_to(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }

    /// Plural association to `collection` through its `via` attribute
    pub fn has_many(collection: impl Into<String>, via: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            via: Some(via.into()),
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column_name = Some(name.into());
        self
    }

    pub fn defaults_to(mut self, value: Value) -> Self {
        self.defaults_to = Some(value);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_created_at(mut self) -> Self {
        self.auto_created_at = true;
        self
    }

    pub fn auto_updated_at(mut self) -> Self {
        self.auto_updated_at = true;
        self
    }

    /// Resolves what this attribute stands for
    pub fn kind(&self) -> AttributeKind<'_> {
        if let Some(model) = &self.model {
            return AttributeKind::Model(model);
        }
        if let Some(collection) = &self.collection {
            return AttributeKind::Collection {
                collection,
                via: self.via.as_deref(),
            };
        }
        AttributeKind::Scalar(self.attr_type.unwrap_or(AttributeType::Json))
    }

    /// Returns true if the attribute is stored in a column of its own model
    pub fn has_column(&self) -> bool {
        !matches!(self.kind(), AttributeKind::Collection { .. })
    }
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// Logical model definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDef {
    /// Unique model identity
    pub identity: String,
    /// Name of the datastore this model lives in
    pub datastore: String,
    /// Physical table name (defaults to the identity)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Primary key attribute name
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Attribute definitions
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeDef>,
}

impl ModelDef {
    /// Create a model with an `id` primary key and no attributes
    pub fn new(identity: impl Into<String>, datastore: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            datastore: datastore.into(),
            table_name: None,
            primary_key: default_primary_key(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_primary_key(mut self, attr: impl Into<String>) -> Self {
        self.primary_key = attr.into();
        self
    }

    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, def: AttributeDef) -> Self {
        self.attributes.insert(name.into(), def);
        self
    }

    /// Physical table name
    pub fn table(&self) -> &str {
        self.table_name.as_deref().unwrap_or(&self.identity)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.get(name)
    }

    /// Primary key definition (presence is checked at initialization)
    pub fn primary_key_def(&self) -> Option<&AttributeDef> {
        self.attributes.get(&self.primary_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_kind_resolution() {
        assert_eq!(
            AttributeDef::number().kind(),
            AttributeKind::Scalar(AttributeType::Number)
        );
        assert_eq!(AttributeDef::belongs_to("user").kind(), AttributeKind::Model("user"));
        assert!(matches!(
            AttributeDef::has_many("pet", "owner").kind(),
            AttributeKind::Collection { collection: "pet", via: Some("owner") }
        ));
        assert!(!AttributeDef::has_many("pet", "owner").has_column());
    }

    #[test]
    fn test_no_type_coercion() {
        assert!(AttributeType::Number.accepts(&json!(3)));
        assert!(!AttributeType::Number.accepts(&json!("3")));
        assert!(!AttributeType::String.accepts(&json!(3)));
        assert!(AttributeType::Json.accepts(&json!({"a": [1]})));
    }

    #[test]
    fn test_model_definition_parsing() {
        let json = r#"{
            "identity": "user",
            "datastore": "default",
            "tableName": "users",
            "attributes": {
                "id": {"type": "number"},
                "emailAddress": {"type": "string", "columnName": "email_address", "unique": true},
                "pets": {"collection": "pet", "via": "owner"}
            }
        }"#;
        let model: ModelDef = serde_json::from_str(json).unwrap();

        assert_eq!(model.primary_key, "id");
        assert_eq!(model.table(), "users");
        let email = model.attribute("emailAddress").unwrap();
        assert_eq!(email.column_name.as_deref(), Some("email_address"));
        assert!(email.unique);
        assert!(!model.attribute("pets").unwrap().has_column());
    }
}
