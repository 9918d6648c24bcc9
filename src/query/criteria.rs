//! Normalized criteria structures
//!
//! The stage-2 compiler turns caller-supplied JSON criteria into these
//! types; the stage-3 compiler rewrites their field names into physical
//! column names. The same structures therefore appear on both sides of the
//! logical/physical boundary.

use serde_json::Value;

/// Filter operation types
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Equality: field = value
    Eq(Value),
    /// Inequality: field != value
    Neq(Value),
    /// Membership: field in [values]
    In(Vec<Value>),
    /// Non-membership: field not in [values]
    Nin(Vec<Value>),
    /// Greater than: field > value
    Gt(Value),
    /// Greater than or equal: field >= value
    Gte(Value),
    /// Less than: field < value
    Lt(Value),
    /// Less than or equal: field <= value
    Lte(Value),
    /// Substring match
    Contains(String),
    /// Prefix match
    StartsWith(String),
    /// Suffix match
    EndsWith(String),
    /// Pattern match with `%` wildcards
    Like(String),
}

impl FilterOp {
    /// Returns the modifier name as it appears in criteria
    pub fn op_name(&self) -> &'static str {
        match self {
            FilterOp::Eq(_) => "eq",
            FilterOp::Neq(_) => "!=",
            FilterOp::In(_) => "in",
            FilterOp::Nin(_) => "nin",
            FilterOp::Gt(_) => ">",
            FilterOp::Gte(_) => ">=",
            FilterOp::Lt(_) => "<",
            FilterOp::Lte(_) => "<=",
            FilterOp::Contains(_) => "contains",
            FilterOp::StartsWith(_) => "startsWith",
            FilterOp::EndsWith(_) => "endsWith",
            FilterOp::Like(_) => "like",
        }
    }

    /// Returns true if this operation can never match any record
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, FilterOp::In(values) if values.is_empty())
    }

    /// Returns true if this operation matches every record
    pub fn is_tautology(&self) -> bool {
        matches!(self, FilterOp::Nin(values) if values.is_empty())
    }
}

/// A single predicate (field + operation)
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Field name (attribute name before stage 3, column name after)
    pub field: String,
    /// Filter operation
    pub op: FilterOp,
}

impl Predicate {
    /// Create an equality predicate
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq(value),
        }
    }

    /// Create a membership predicate
    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::In(values),
        }
    }

    /// Create a range predicate (gt)
    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Gt(value),
        }
    }

    /// Create a range predicate (lt)
    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Lt(value),
        }
    }
}

/// Boolean structure of a where clause
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Every child must match; an empty conjunction matches everything
    And(Vec<Clause>),
    /// At least one child must match
    Or(Vec<Clause>),
    /// Leaf predicate
    Predicate(Predicate),
}

impl Clause {
    /// Clause that matches every record
    pub fn all() -> Self {
        Clause::And(Vec::new())
    }

    /// Returns true if the clause places no constraint on records
    pub fn is_match_all(&self) -> bool {
        matches!(self, Clause::And(children) if children.is_empty())
    }

    /// Visits every leaf predicate in depth-first order
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            Clause::And(children) | Clause::Or(children) => {
                for child in children {
                    child.collect_predicates(out);
                }
            }
            Clause::Predicate(p) => out.push(p),
        }
    }

    /// Rewrites every predicate field name
    pub fn rename_fields<E>(
        self,
        rename: &mut impl FnMut(String) -> Result<String, E>,
    ) -> Result<Self, E> {
        Ok(match self {
            Clause::And(children) => Clause::And(
                children
                    .into_iter()
                    .map(|c| c.rename_fields(rename))
                    .collect::<Result<_, _>>()?,
            ),
            Clause::Or(children) => Clause::Or(
                children
                    .into_iter()
                    .map(|c| c.rename_fields(rename))
                    .collect::<Result<_, _>>()?,
            ),
            Clause::Predicate(p) => Clause::Predicate(Predicate {
                field: rename(p.field)?,
                op: p.op,
            }),
        })
    }
}

impl Default for Clause {
    fn default() -> Self {
        Self::all()
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Sort specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Field to sort by
    pub field: String,
    /// Sort direction
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Normalized criteria
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Criteria {
    /// Filter
    pub where_clause: Clause,
    /// Maximum number of records (`None` = unbounded)
    pub limit: Option<u64>,
    /// Number of records to skip
    pub skip: u64,
    /// Sort specifications, applied in order
    pub sort: Vec<SortSpec>,
    /// Projection (`None` = every field)
    pub select: Option<Vec<String>>,
    /// Fields to leave out
    pub omit: Vec<String>,
}

impl Criteria {
    /// Criteria matching every record
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the where clause
    pub fn with_where(mut self, clause: Clause) -> Self {
        self.where_clause = clause;
        self
    }

    /// Sets the limit
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the skip
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Appends a sort specification
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort.push(sort);
        self
    }

    /// Rewrites every field name referenced by the criteria
    pub fn rename_fields<E>(
        self,
        mut rename: impl FnMut(String) -> Result<String, E>,
    ) -> Result<Self, E> {
        let where_clause = self.where_clause.rename_fields(&mut rename)?;
        let sort = self
            .sort
            .into_iter()
            .map(|s| {
                Ok(SortSpec {
                    field: rename(s.field)?,
                    direction: s.direction,
                })
            })
            .collect::<Result<_, E>>()?;
        let select = match self.select {
            Some(fields) => Some(
                fields
                    .into_iter()
                    .map(&mut rename)
                    .collect::<Result<_, E>>()?,
            ),
            None => None,
        };
        let omit = self
            .omit
            .into_iter()
            .map(&mut rename)
            .collect::<Result<_, E>>()?;

        Ok(Self {
            where_clause,
            limit: self.limit,
            skip: self.skip,
            sort,
            select,
            omit,
        })
    }
}
