//! Query meta options

use serde::{Deserialize, Serialize};

/// Configuration bag attached to a query.
///
/// Unrecognized keys are accepted but dropped when deserializing; only the
/// options below reach the pipeline or the adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Meta {
    /// Send back the affected records after a mutation
    pub fetch: bool,

    /// Do not run any lifecycle callbacks for this query
    pub skip_all_lifecycle_callbacks: bool,

    /// Do not verify records coming back from the adapter
    pub skip_record_verification: bool,
}

impl Meta {
    /// Create meta with every option off
    pub fn new() -> Self {
        Self::default()
    }

    /// Request affected records back from a mutation
    pub fn fetch(mut self) -> Self {
        self.fetch = true;
        self
    }

    /// Skip lifecycle callbacks
    pub fn skip_lifecycle_callbacks(mut self) -> Self {
        self.skip_all_lifecycle_callbacks = true;
        self
    }

    /// Skip record verification
    pub fn skip_record_verification(mut self) -> Self {
        self.skip_record_verification = true;
        self
    }
}
