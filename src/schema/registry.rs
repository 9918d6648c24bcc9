//! Model registry
//!
//! Built once by [`OrmBuilder::build`] and immutable afterwards. Every
//! operation receives the registry explicitly through an `Arc<Orm>`; there
//! is no ambient lookup.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use super::errors::{InitError, InitResult};
use super::transformer::Transformer;
use super::types::{AttributeKind, AttributeType, ModelDef};
use crate::adapter::{Adapter, TableDefinition};
use crate::config::OrmConfig;
use crate::core::{ModelHandle, QueryError, QueryResult};
use crate::lifecycle::LifecycleHooks;

/// One model with everything an operation needs to run against it
pub struct RegisteredModel {
    def: ModelDef,
    transformer: Transformer,
    hooks: LifecycleHooks,
    adapter: Arc<dyn Adapter>,
}

impl RegisteredModel {
    pub fn identity(&self) -> &str {
        &self.def.identity
    }

    pub fn def(&self) -> &ModelDef {
        &self.def
    }

    pub fn transformer(&self) -> &Transformer {
        &self.transformer
    }

    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    pub fn adapter(&self) -> &dyn Adapter {
        self.adapter.as_ref()
    }

    /// Datastore reference handed to the adapter
    pub fn datastore(&self) -> &str {
        &self.def.datastore
    }
}

/// The process-wide model registry
pub struct Orm {
    models: BTreeMap<String, RegisteredModel>,
}

impl Orm {
    /// Start building a registry from configuration
    pub fn builder(config: OrmConfig) -> OrmBuilder {
        OrmBuilder::new(config)
    }

    /// Look up a model by identity
    pub fn model(&self, identity: &str) -> Option<&RegisteredModel> {
        self.models.get(identity)
    }

    /// Look up a model, failing with `E_UNKNOWN_MODEL`
    pub fn require_model(&self, identity: &str) -> QueryResult<&RegisteredModel> {
        self.model(identity).ok_or_else(|| QueryError::UnknownModel {
            identity: identity.to_string(),
        })
    }

    /// Registered identities in lexicographic order
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Public operation surface of one model
    pub fn handle(self: &Arc<Self>, identity: &str) -> QueryResult<ModelHandle> {
        self.require_model(identity)?;
        Ok(ModelHandle::new(Arc::clone(self), identity))
    }
}

/// Builder for registry construction
pub struct OrmBuilder {
    config: OrmConfig,
    adapters: HashMap<String, Arc<dyn Adapter>>,
    hooks: HashMap<String, LifecycleHooks>,
}

impl OrmBuilder {
    /// Create a new builder
    pub fn new(config: OrmConfig) -> Self {
        Self {
            config,
            adapters: HashMap::new(),
            hooks: HashMap::new(),
        }
    }

    /// Register an adapter under the name datastores refer to
    pub fn with_adapter(self, name: impl Into<String>, adapter: impl Adapter + 'static) -> Self {
        self.with_shared_adapter(name, Arc::new(adapter))
    }

    /// Register an adapter the caller keeps a handle to
    pub fn with_shared_adapter(
        mut self,
        name: impl Into<String>,
        adapter: Arc<dyn Adapter>,
    ) -> Self {
        self.adapters.insert(name.into(), adapter);
        self
    }

    /// Register lifecycle hooks for a model
    pub fn with_hooks(mut self, identity: impl Into<String>, hooks: LifecycleHooks) -> Self {
        self.hooks.insert(identity.into(), hooks);
        self
    }

    /// Validate everything and freeze the registry
    pub fn build(mut self) -> InitResult<Arc<Orm>> {
        let mut seen = HashSet::new();
        for model in &self.config.models {
            if !seen.insert(model.identity.as_str()) {
                return Err(InitError::DuplicateModel(model.identity.clone()));
            }
        }

        if let Some(identity) = self.hooks.keys().find(|id| !seen.contains(id.as_str())) {
            return Err(InitError::HooksForUnknownModel(identity.clone()));
        }

        let defs: HashMap<&str, &ModelDef> = self
            .config
            .models
            .iter()
            .map(|m| (m.identity.as_str(), m))
            .collect();
        for model in &self.config.models {
            validate_model(model, &defs)?;
        }

        let mut models = BTreeMap::new();
        for def in self.config.models.clone() {
            let adapter = self.resolve_adapter(&def)?;
            let transformer = Transformer::for_model(&def);

            adapter
                .define(&def.datastore, &table_definition(&def, &transformer))
                .map_err(|e| InitError::AdapterRejected {
                    adapter: adapter.identity().to_string(),
                    table: def.table().to_string(),
                    reason: e.to_string(),
                })?;

            debug!(
                model = %def.identity,
                datastore = %def.datastore,
                table = %def.table(),
                "registered model"
            );

            let hooks = self.hooks.remove(&def.identity).unwrap_or_default();
            models.insert(
                def.identity.clone(),
                RegisteredModel {
                    def,
                    transformer,
                    hooks,
                    adapter,
                },
            );
        }

        info!(models = models.len(), "model registry initialized");
        Ok(Arc::new(Orm { models }))
    }

    fn resolve_adapter(&self, def: &ModelDef) -> InitResult<Arc<dyn Adapter>> {
        let datastore = self.config.datastores.get(&def.datastore).ok_or_else(|| {
            InitError::UnknownDatastore {
                model: def.identity.clone(),
                datastore: def.datastore.clone(),
            }
        })?;
        self.adapters
            .get(&datastore.adapter)
            .cloned()
            .ok_or_else(|| InitError::UnknownAdapter {
                datastore: def.datastore.clone(),
                adapter: datastore.adapter.clone(),
            })
    }
}

fn table_definition(def: &ModelDef, transformer: &Transformer) -> TableDefinition {
    let column = |attr: &str| {
        transformer
            .column_for(attr)
            .unwrap_or(attr)
            .to_string()
    };
    let auto_increment = matches!(
        def.primary_key_def().map(|a| a.kind()),
        Some(AttributeKind::Scalar(AttributeType::Number))
    );

    TableDefinition {
        table: def.table().to_string(),
        primary_key: column(&def.primary_key),
        auto_increment,
        unique_columns: def
            .attributes
            .iter()
            .filter(|(_, a)| a.unique)
            .map(|(name, _)| column(name))
            .collect(),
    }
}

fn validate_model(model: &ModelDef, defs: &HashMap<&str, &ModelDef>) -> InitResult<()> {
    let invalid_pk = |reason: &str| InitError::InvalidPrimaryKey {
        model: model.identity.clone(),
        primary_key: model.primary_key.clone(),
        reason: reason.to_string(),
    };

    match model.primary_key_def().map(|a| a.kind()) {
        None => return Err(invalid_pk("attribute is not declared")),
        Some(AttributeKind::Scalar(AttributeType::String))
        | Some(AttributeKind::Scalar(AttributeType::Number)) => {}
        Some(_) => return Err(invalid_pk("must be a string or number attribute")),
    }

    let mut columns = HashSet::new();
    for (name, attr) in &model.attributes {
        let invalid = |reason: String| InitError::InvalidAttribute {
            model: model.identity.clone(),
            attribute: name.clone(),
            reason,
        };

        let declared = [
            attr.attr_type.is_some(),
            attr.model.is_some(),
            attr.collection.is_some(),
        ];
        if declared.iter().filter(|d| **d).count() != 1 {
            return Err(invalid(
                "exactly one of `type`, `model` or `collection` must be set".into(),
            ));
        }

        match attr.kind() {
            AttributeKind::Scalar(attr_type) => {
                if attr.via.is_some() {
                    return Err(invalid("`via` is only valid on collections".into()));
                }
                let stamped = attr.auto_created_at || attr.auto_updated_at;
                if stamped
                    && !matches!(attr_type, AttributeType::String | AttributeType::Number)
                {
                    return Err(invalid(
                        "timestamps must be string or number attributes".into(),
                    ));
                }
            }
            AttributeKind::Model(target) => {
                if !defs.contains_key(target) {
                    return Err(invalid(format!("unknown model '{}'", target)));
                }
            }
            AttributeKind::Collection { collection, via } => {
                let child = defs
                    .get(collection)
                    .ok_or_else(|| invalid(format!("unknown collection '{}'", collection)))?;
                let via = via.ok_or_else(|| invalid("collections require `via`".into()))?;
                match child.attribute(via).map(|a| a.kind()) {
                    Some(AttributeKind::Model(back)) if back == model.identity => {}
                    _ => {
                        return Err(invalid(format!(
                            "`via` must name a `model: '{}'` attribute of '{}'",
                            model.identity, collection
                        )))
                    }
                }
                continue;
            }
        }

        let column = attr.column_name.clone().unwrap_or_else(|| name.clone());
        if !columns.insert(column.clone()) {
            return Err(InitError::DuplicateColumn {
                model: model.identity.clone(),
                column,
            });
        }
    }

    Ok(())
}
