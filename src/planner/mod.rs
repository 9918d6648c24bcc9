//! Query compilers
//!
//! Two one-directional stages, each consuming the previous value:
//!
//! 1. Stage 2 validates a raw descriptor against the model registry and
//!    normalizes it into canonical, logical form (or reports `E_NOOP` when
//!    the query provably matches nothing).
//! 2. Stage 3 resolves attribute names to column names and associations to
//!    joins, producing the physical query an adapter executes.

mod criteria;
mod errors;
mod stage_three;
mod stage_two;
mod values;

pub use criteria::{normalize_criteria, simplify};
pub use errors::{CompileError, CompileErrorCode, CompileResult};
pub use stage_three::{forge_stage_three, Join, PhysicalQuery};
pub use stage_two::{forge_stage_two, Populate, StageTwoQuery};
pub use values::{normalize_new_record, normalize_new_records, normalize_values_to_set};
