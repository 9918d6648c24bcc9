//! Query methods
//!
//! Every logical operation is tagged with exactly one method. The method
//! decides which query keys are required, which are forbidden, and which
//! adapter entry point a compiled query is dispatched to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The logical operation a query performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    Create,
    CreateEach,
    Update,
    Destroy,
    Find,
    Count,
    Sum,
    Avg,
    Stream,
}

impl Method {
    /// Get method name for logging and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::CreateEach => "createEach",
            Self::Update => "update",
            Self::Destroy => "destroy",
            Self::Find => "find",
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Stream => "stream",
        }
    }

    /// Returns true if the method changes datastore contents
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::CreateEach | Self::Update | Self::Destroy
        )
    }

    /// Returns true if the method accepts a criteria
    pub fn takes_criteria(&self) -> bool {
        matches!(
            self,
            Self::Update
                | Self::Destroy
                | Self::Find
                | Self::Count
                | Self::Sum
                | Self::Avg
                | Self::Stream
        )
    }

    /// Returns true if the method requires a values-to-set payload
    pub fn takes_values_to_set(&self) -> bool {
        matches!(self, Self::Update)
    }

    /// Returns true if the method requires one or more new records
    pub fn takes_new_records(&self) -> bool {
        matches!(self, Self::Create | Self::CreateEach)
    }

    /// Returns true if the method may populate associations
    pub fn takes_populates(&self) -> bool {
        matches!(self, Self::Find | Self::Stream)
    }

    /// Returns true if the method aggregates over a numeric attribute
    pub fn takes_numeric_attr_name(&self) -> bool {
        matches!(self, Self::Sum | Self::Avg)
    }

    /// Returns true if the criteria may carry paging, sorting and projection
    pub fn allows_full_criteria(&self) -> bool {
        matches!(self, Self::Find | Self::Stream)
    }

    /// Returns true if the criteria may carry paging and sorting (no projection)
    pub fn allows_paging(&self) -> bool {
        matches!(
            self,
            Self::Find | Self::Stream | Self::Count | Self::Sum | Self::Avg
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
