//! ORM configuration
//!
//! Declares datastores and model definitions. Usually loaded from JSON:
//!
//! ```text
//! {
//!   "datastores": { "default": { "adapter": "memory" } },
//!   "models": [
//!     { "identity": "user", "datastore": "default",
//!       "attributes": { "id": { "type": "number" }, "name": { "type": "string" } } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{InitError, InitResult, ModelDef};

/// A named datastore and the adapter that serves it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Name under which the adapter was registered
    pub adapter: String,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrmConfig {
    #[serde(default)]
    pub datastores: BTreeMap<String, DatastoreConfig>,
    #[serde(default)]
    pub models: Vec<ModelDef>,
}

impl OrmConfig {
    /// Empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from JSON text
    pub fn from_json_str(json: &str) -> InitResult<Self> {
        serde_json::from_str(json).map_err(|e| InitError::InvalidConfig(e.to_string()))
    }

    /// Declare a datastore
    pub fn with_datastore(mut self, name: impl Into<String>, adapter: impl Into<String>) -> Self {
        self.datastores.insert(
            name.into(),
            DatastoreConfig {
                adapter: adapter.into(),
            },
        );
        self
    }

    /// Declare a model
    pub fn with_model(mut self, model: ModelDef) -> Self {
        self.models.push(model);
        self
    }
}
