//! Model registry subsystem
//!
//! Holds the logical models: attribute schemas, attribute/column
//! transformers, lifecycle hooks and adapter bindings. Established once at
//! initialization and read-only afterwards.

mod errors;
mod registry;
mod transformer;
mod types;

pub use errors::{InitError, InitResult};
pub use registry::{Orm, OrmBuilder, RegisteredModel};
pub use transformer::{TransformError, Transformer};
pub use types::{AttributeDef, AttributeKind, AttributeType, ModelDef};
