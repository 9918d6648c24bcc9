//! Adapter error normalization
//!
//! Every adapter error is tagged with the model it came from. Uniqueness
//! violations are rewritten into the logical vocabulary and attributed to
//! the caller's call site.

use serde_json::json;
use tracing::warn;

use super::errors::{AdapterError, Footprint};
use crate::core::{OperationContext, QueryError};
use crate::query::Method;
use crate::schema::RegisteredModel;

/// Turn an adapter error into the caller-facing error
pub fn normalize_adapter_error(
    err: AdapterError,
    model: &RegisteredModel,
    method: Method,
    ctx: &OperationContext,
) -> QueryError {
    let (message, footprint) = match err {
        AdapterError::Malformed(value) => {
            return QueryError::AdapterContract {
                model: model.identity().to_string(),
                datastore: model.datastore().to_string(),
                method,
                details: format!("expected an error value, but got: {}", value),
            }
        }
        AdapterError::Failure { message, footprint } => (message, footprint),
    };

    match footprint.as_ref().and_then(Footprint::parse) {
        Some(parsed) if parsed.is_not_unique() => {
            let attr_names = parsed
                .keys
                .iter()
                .map(|column| match model.transformer().attribute_for(column) {
                    Some(attr) => attr.to_string(),
                    None => {
                        warn!(
                            model = %model.identity(),
                            column = %column,
                            "uniqueness footprint names a column no attribute maps to"
                        );
                        column.clone()
                    }
                })
                .collect::<Vec<_>>();

            QueryError::NotUnique {
                model: model.identity().to_string(),
                footprint: json!({ "identity": parsed.identity, "keys": attr_names }),
                attr_names,
                message,
                origin: ctx.omen,
            }
        }
        _ => QueryError::Adapter {
            model: model.identity().to_string(),
            datastore: model.datastore().to_string(),
            message,
            footprint,
        },
    }
}
