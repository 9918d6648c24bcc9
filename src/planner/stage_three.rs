//! Stage-3 compiler
//!
//! Consumes a [`StageTwoQuery`] and produces the [`PhysicalQuery`] handed to
//! an adapter: table and column names instead of model identities and
//! attribute names, projections made explicit, populates turned into joins.

use super::stage_two::{Populate, StageTwoQuery};
use crate::query::{Criteria, Meta, Method, Record};
use crate::schema::{AttributeKind, Orm, RegisteredModel, TransformError};

/// One association to embed in each parent row
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Field the child row(s) are embedded under
    pub alias: String,
    /// Parent column matched against `child_key`
    pub parent_key: String,
    pub child_table: String,
    pub child_key: String,
    /// Identity of the child model
    pub child_model: String,
    /// Embed a list of children rather than at most one
    pub collection: bool,
    /// Physical child criteria; `None` never matches
    pub criteria: Option<Criteria>,
}

/// Query in physical vocabulary
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalQuery {
    pub method: Method,
    pub table: String,
    pub criteria: Criteria,
    pub values_to_set: Option<Record>,
    pub new_records: Vec<Record>,
    pub numeric_column: Option<String>,
    pub joins: Vec<Join>,
    pub meta: Meta,
}

/// Compile a stage-2 query for `model`.
pub fn forge_stage_three(
    query: StageTwoQuery,
    model: &RegisteredModel,
    orm: &Orm,
) -> Result<PhysicalQuery, TransformError> {
    let transformer = model.transformer();
    let def = model.def();

    let mut criteria = query.criteria;
    if !criteria.omit.is_empty() {
        let omit = std::mem::take(&mut criteria.omit);
        criteria.select = Some(
            def.attributes
                .iter()
                .filter(|(name, attr)| attr.has_column() && !omit.contains(name))
                .map(|(name, _)| name.clone())
                .collect(),
        );
    }

    let mut joins = Vec::with_capacity(query.populates.len());
    for (alias, populate) in query.populates {
        let join = forge_join(&alias, populate, model, orm)?;
        if let (Some(select), false) = (criteria.select.as_mut(), join.collection) {
            if !select.contains(&alias) {
                select.push(alias.clone());
            }
        }
        joins.push(join);
    }

    let criteria = criteria.rename_fields(|attr| transformer.require_column(&attr))?;
    let values_to_set = query
        .values_to_set
        .map(|values| transformer.serialize(values))
        .transpose()?;
    let new_records = query
        .new_records
        .into_iter()
        .map(|record| transformer.serialize(record))
        .collect::<Result<_, _>>()?;
    let numeric_column = query
        .numeric_attr_name
        .map(|attr| transformer.require_column(&attr))
        .transpose()?;

    Ok(PhysicalQuery {
        method: query.method,
        table: def.table().to_string(),
        criteria,
        values_to_set,
        new_records,
        numeric_column,
        joins,
        meta: query.meta,
    })
}

fn forge_join(
    alias: &str,
    populate: Populate,
    parent: &RegisteredModel,
    orm: &Orm,
) -> Result<Join, TransformError> {
    let unknown_attribute = || TransformError::UnknownAttribute {
        model: parent.identity().to_string(),
        attribute: alias.to_string(),
    };
    let attr = parent.def().attribute(alias).ok_or_else(unknown_attribute)?;
    let lookup = |identity: &str| {
        orm.model(identity).ok_or_else(|| TransformError::UnknownModel {
            identity: identity.to_string(),
        })
    };
    let parent_pk = parent.transformer().require_column(&parent.def().primary_key)?;

    match attr.kind() {
        AttributeKind::Model(target) => {
            let child = lookup(target)?;
            Ok(Join {
                alias: alias.to_string(),
                parent_key: parent.transformer().require_column(alias)?,
                child_table: child.def().table().to_string(),
                child_key: child.transformer().require_column(&child.def().primary_key)?,
                child_model: child.identity().to_string(),
                collection: false,
                criteria: Some(Criteria::new()),
            })
        }
        AttributeKind::Collection { collection, via } => {
            let child = lookup(collection)?;
            let via = via.ok_or_else(unknown_attribute)?;
            let child_key = child.transformer().require_column(via)?;
            let criteria = match populate.criteria {
                Some(mut criteria) => {
                    if let Some(select) = criteria.select.as_mut() {
                        if !select.iter().any(|s| s == via) {
                            select.push(via.to_string());
                        }
                    }
                    Some(criteria.rename_fields(|a| child.transformer().require_column(&a))?)
                }
                None => None,
            };
            Ok(Join {
                alias: alias.to_string(),
                parent_key: parent_pk,
                child_table: child.def().table().to_string(),
                child_key,
                child_model: child.identity().to_string(),
                collection: true,
                criteria,
            })
        }
        AttributeKind::Scalar(_) => Err(unknown_attribute()),
    }
}
