//! Criteria normalization
//!
//! Accepted shapes:
//!
//! - primary key shorthand: `7` or `"abc"`
//! - list of primary keys: `[1, 2, 3]`
//! - a dictionary of top-level clauses (`where`, `limit`, `skip`, `sort`,
//!   `select`, `omit`); a dictionary with none of them is an implicit
//!   `where` clause
//!
//! Where-clause values are either an equality operand, a list (`in`), or a
//! dictionary of modifiers: `in`, `nin`, `<`, `<=`, `>`, `>=`, `!=`,
//! `contains`, `startsWith`, `endsWith`, `like`. `and` / `or` take lists of
//! nested where clauses.

use serde_json::{Map, Value};

use super::errors::{CompileError, CompileResult};
use crate::query::{Clause, Criteria, FilterOp, Method, Predicate, SortDirection, SortSpec};
use crate::schema::{AttributeDef, AttributeKind, ModelDef};

const CLAUSE_KEYS: [&str; 6] = ["where", "limit", "skip", "sort", "select", "omit"];

/// Normalize raw criteria for `method` against `model`.
///
/// Fails with `E_NOOP` when the criteria can provably never match.
pub fn normalize_criteria(
    raw: Option<&Value>,
    model: &ModelDef,
    method: Method,
) -> CompileResult<Criteria> {
    let clauses = match raw {
        None | Some(Value::Null) => return Ok(Criteria::new()),
        Some(pk @ (Value::String(_) | Value::Number(_))) => {
            let mut where_clause = Map::new();
            where_clause.insert(model.primary_key.clone(), pk.clone());
            single("where", Value::Object(where_clause))
        }
        Some(Value::Array(pks)) => {
            let mut where_clause = Map::new();
            where_clause.insert(
                model.primary_key.clone(),
                Value::Object(single("in", Value::Array(pks.clone()))),
            );
            single("where", Value::Object(where_clause))
        }
        Some(Value::Object(map)) => top_level_clauses(map)?,
        Some(other) => {
            return Err(CompileError::invalid_criteria(format!(
                "Expected a dictionary, a primary key value or a list of primary keys, \
                 but got: {}",
                other
            )))
        }
    };

    for key in clauses.keys() {
        let allowed = match key.as_str() {
            "where" => true,
            "limit" | "skip" | "sort" => method.allows_paging(),
            _ => method.allows_full_criteria(),
        };
        if !allowed {
            return Err(CompileError::invalid_criteria(format!(
                "Cannot use `{}` with `.{}()`",
                key, method
            )));
        }
    }

    let parser = CriteriaParser { model };
    let mut criteria = Criteria::new();

    if let Some(raw_where) = clauses.get("where") {
        let clause = parser.where_clause(raw_where)?;
        criteria.where_clause = simplify(clause).ok_or_else(|| {
            CompileError::noop("`where` clause can never match any record")
        })?;
    }
    if let Some(raw_skip) = clauses.get("skip") {
        criteria.skip = raw_skip.as_u64().ok_or_else(|| {
            CompileError::invalid_criteria(format!(
                "`skip` must be a non-negative integer, but got: {}",
                raw_skip
            ))
        })?;
    }
    if let Some(raw_sort) = clauses.get("sort") {
        criteria.sort = parser.sort(raw_sort)?;
    }
    if let Some(raw_select) = clauses.get("select") {
        criteria.select = parser.select(raw_select)?;
    }
    if let Some(raw_omit) = clauses.get("omit") {
        if criteria.select.is_some() {
            return Err(CompileError::invalid_criteria(
                "Cannot use both `select` and `omit`",
            ));
        }
        criteria.omit = parser.omit(raw_omit)?;
    }
    if let Some(raw_limit) = clauses.get("limit") {
        let limit = raw_limit.as_u64().ok_or_else(|| {
            CompileError::invalid_criteria(format!(
                "`limit` must be a non-negative integer, but got: {}",
                raw_limit
            ))
        })?;
        if limit == 0 {
            return Err(CompileError::noop("`limit` is zero"));
        }
        criteria.limit = Some(limit);
    }

    Ok(criteria)
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

fn top_level_clauses(map: &Map<String, Value>) -> CompileResult<Map<String, Value>> {
    let recognized = map.keys().any(|k| CLAUSE_KEYS.contains(&k.as_str()));
    if !recognized {
        return Ok(single("where", Value::Object(map.clone())));
    }

    let mut clauses = Map::new();
    let mut implicit_where = Map::new();
    for (key, value) in map {
        if CLAUSE_KEYS.contains(&key.as_str()) {
            clauses.insert(key.clone(), value.clone());
        } else {
            implicit_where.insert(key.clone(), value.clone());
        }
    }

    if !implicit_where.is_empty() {
        if clauses.contains_key("where") {
            let stray: Vec<&String> = implicit_where.keys().collect();
            return Err(CompileError::invalid_criteria(format!(
                "Unrecognized top-level key(s) alongside `where`: {:?}",
                stray
            )));
        }
        clauses.insert("where".to_string(), Value::Object(implicit_where));
    }

    Ok(clauses)
}

struct CriteriaParser<'a> {
    model: &'a ModelDef,
}

impl<'a> CriteriaParser<'a> {
    /// Attribute that can be filtered, sorted or projected on
    fn column_attribute(&self, attr: &str, clause: &str) -> CompileResult<&'a AttributeDef> {
        let def = self.model.attribute(attr).ok_or_else(|| {
            CompileError::invalid_criteria(format!(
                "`{}` references unknown attribute `{}` of model `{}`",
                clause, attr, self.model.identity
            ))
        })?;
        if !def.has_column() {
            return Err(CompileError::invalid_criteria(format!(
                "`{}` cannot reference plural association `{}`",
                clause, attr
            )));
        }
        Ok(def)
    }

    fn where_clause(&self, raw: &Value) -> CompileResult<Clause> {
        let Value::Object(map) = raw else {
            return Err(CompileError::invalid_criteria(format!(
                "`where` must be a dictionary, but got: {}",
                raw
            )));
        };

        let mut children = Vec::new();
        for (key, value) in map {
            match key.as_str() {
                "and" | "or" => {
                    let branches = match value {
                        Value::Array(items) if !items.is_empty() => items
                            .iter()
                            .map(|item| self.where_clause(item))
                            .collect::<CompileResult<Vec<_>>>()?,
                        _ => {
                            return Err(CompileError::invalid_criteria(format!(
                                "`{}` must be a non-empty list of where clauses",
                                key
                            )))
                        }
                    };
                    children.push(if key == "and" {
                        Clause::And(branches)
                    } else {
                        Clause::Or(branches)
                    });
                }
                attr => {
                    let predicates = self.constraint(attr, value)?;
                    children.extend(predicates.into_iter().map(Clause::Predicate));
                }
            }
        }

        if children.len() == 1 {
            if let Some(only) = children.pop() {
                return Ok(only);
            }
        }
        Ok(Clause::And(children))
    }

    fn constraint(&self, attr: &str, value: &Value) -> CompileResult<Vec<Predicate>> {
        let def = self.column_attribute(attr, "where")?;
        let predicate = |op| Predicate {
            field: attr.to_string(),
            op,
        };

        match value {
            Value::Array(items) => Ok(vec![predicate(FilterOp::In(
                self.operands(attr, def, items)?,
            ))]),
            Value::Object(modifiers) => {
                if modifiers.is_empty() {
                    return Err(CompileError::invalid_criteria(format!(
                        "Empty modifier dictionary for `{}`",
                        attr
                    )));
                }
                modifiers
                    .iter()
                    .map(|(name, operand)| Ok(predicate(self.modifier(attr, def, name, operand)?)))
                    .collect()
            }
            operand => Ok(vec![predicate(FilterOp::Eq(
                self.operand(attr, def, operand)?,
            ))]),
        }
    }

    fn modifier(
        &self,
        attr: &str,
        def: &AttributeDef,
        name: &str,
        operand: &Value,
    ) -> CompileResult<FilterOp> {
        let comparable = || {
            if operand.is_number() || operand.is_string() {
                Ok(operand.clone())
            } else {
                Err(CompileError::invalid_criteria(format!(
                    "`{}` modifier on `{}` requires a number or string, but got: {}",
                    name, attr, operand
                )))
            }
        };
        let text = || match operand {
            Value::String(s) => Ok(s.clone()),
            other => Err(CompileError::invalid_criteria(format!(
                "`{}` modifier on `{}` requires a string, but got: {}",
                name, attr, other
            ))),
        };
        let list = || match operand {
            Value::Array(items) => self.operands(attr, def, items),
            other => Err(CompileError::invalid_criteria(format!(
                "`{}` modifier on `{}` requires a list, but got: {}",
                name, attr, other
            ))),
        };

        Ok(match name {
            "in" => FilterOp::In(list()?),
            "nin" => FilterOp::Nin(list()?),
            "<" => FilterOp::Lt(comparable()?),
            "<=" => FilterOp::Lte(comparable()?),
            ">" => FilterOp::Gt(comparable()?),
            ">=" => FilterOp::Gte(comparable()?),
            "!=" => FilterOp::Neq(self.operand(attr, def, operand)?),
            "contains" => FilterOp::Contains(text()?),
            "startsWith" => FilterOp::StartsWith(text()?),
            "endsWith" => FilterOp::EndsWith(text()?),
            "like" => FilterOp::Like(text()?),
            other => {
                return Err(CompileError::invalid_criteria(format!(
                    "Unrecognized modifier `{}` on `{}`",
                    other, attr
                )))
            }
        })
    }

    fn operands(
        &self,
        attr: &str,
        def: &AttributeDef,
        items: &[Value],
    ) -> CompileResult<Vec<Value>> {
        items
            .iter()
            .map(|item| self.operand(attr, def, item))
            .collect()
    }

    fn operand(&self, attr: &str, def: &AttributeDef, value: &Value) -> CompileResult<Value> {
        let fits = match def.kind() {
            _ if value.is_null() => true,
            AttributeKind::Scalar(attr_type) => attr_type.accepts(value),
            AttributeKind::Model(_) => value.is_string() || value.is_number(),
            AttributeKind::Collection { .. } => false,
        };
        if !fits || value.is_array() || value.is_object() {
            return Err(CompileError::invalid_criteria(format!(
                "Invalid operand for `{}`: {}",
                attr, value
            )));
        }
        Ok(value.clone())
    }

    fn sort(&self, raw: &Value) -> CompileResult<Vec<SortSpec>> {
        match raw {
            Value::String(term) => Ok(vec![self.sort_term(term)?]),
            // dictionary keys are unordered
            Value::Object(pairs) if pairs.len() > 1 => Err(CompileError::invalid_criteria(format!(
                "A `sort` dictionary may name only one attribute; use a list of them to \
                 sort on several, but got: {}",
                raw
            ))),
            Value::Object(pairs) => pairs
                .iter()
                .map(|(attr, direction)| match direction {
                    Value::String(direction) => self.sort_spec(attr, direction),
                    other => Err(CompileError::invalid_criteria(format!(
                        "Sort direction for `{}` must be \"ASC\" or \"DESC\", but got: {}",
                        attr, other
                    ))),
                })
                .collect(),
            Value::Array(items) => {
                let mut specs = Vec::new();
                for item in items {
                    if item.is_array() {
                        return Err(CompileError::invalid_criteria("`sort` lists cannot nest"));
                    }
                    specs.extend(self.sort(item)?);
                }
                Ok(specs)
            }
            other => Err(CompileError::invalid_criteria(format!(
                "`sort` must be a string, a dictionary or a list, but got: {}",
                other
            ))),
        }
    }

    fn sort_term(&self, term: &str) -> CompileResult<SortSpec> {
        let mut parts = term.split_whitespace();
        let (Some(attr), direction, None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(CompileError::invalid_criteria(format!(
                "Sort term must look like \"attribute ASC\", but got: {:?}",
                term
            )));
        };
        self.sort_spec(attr, direction.unwrap_or("ASC"))
    }

    fn sort_spec(&self, attr: &str, direction: &str) -> CompileResult<SortSpec> {
        self.column_attribute(attr, "sort")?;
        let direction = match direction.to_ascii_uppercase().as_str() {
            "ASC" => SortDirection::Asc,
            "DESC" => SortDirection::Desc,
            _ => {
                return Err(CompileError::invalid_criteria(format!(
                    "Sort direction for `{}` must be \"ASC\" or \"DESC\", but got: {:?}",
                    attr, direction
                )))
            }
        };
        Ok(SortSpec {
            field: attr.to_string(),
            direction,
        })
    }

    fn attribute_list(&self, raw: &Value, clause: &str) -> CompileResult<Vec<String>> {
        let Value::Array(items) = raw else {
            return Err(CompileError::invalid_criteria(format!(
                "`{}` must be a list of attribute names",
                clause
            )));
        };
        let mut names: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let Value::String(name) = item else {
                return Err(CompileError::invalid_criteria(format!(
                    "`{}` must be a list of attribute names, but found: {}",
                    clause, item
                )));
            };
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        Ok(names)
    }

    fn select(&self, raw: &Value) -> CompileResult<Option<Vec<String>>> {
        let mut names = self.attribute_list(raw, "select")?;
        if names.iter().any(|n| n == "*") {
            if names.len() > 1 {
                return Err(CompileError::invalid_criteria(
                    "`*` cannot be combined with other attributes in `select`",
                ));
            }
            return Ok(None);
        }
        for name in &names {
            self.column_attribute(name, "select")?;
        }
        if !names.contains(&self.model.primary_key) {
            names.insert(0, self.model.primary_key.clone());
        }
        Ok(Some(names))
    }

    fn omit(&self, raw: &Value) -> CompileResult<Vec<String>> {
        let names = self.attribute_list(raw, "omit")?;
        for name in &names {
            self.column_attribute(name, "omit")?;
            if *name == self.model.primary_key {
                return Err(CompileError::invalid_criteria(
                    "Cannot omit the primary key",
                ));
            }
        }
        Ok(names)
    }
}

/// Simplify a clause, or `None` if it can never match
pub fn simplify(clause: Clause) -> Option<Clause> {
    match clause {
        Clause::Predicate(p) if p.op.is_unsatisfiable() => None,
        Clause::Predicate(p) if p.op.is_tautology() => Some(Clause::all()),
        Clause::Predicate(p) => Some(Clause::Predicate(p)),
        Clause::And(children) => {
            let mut kept = Vec::new();
            for child in children {
                let child = simplify(child)?;
                match child {
                    Clause::And(grandchildren) => kept.extend(grandchildren),
                    other => kept.push(other),
                }
            }
            Some(collapse(kept, Clause::And))
        }
        Clause::Or(children) => {
            let mut kept = Vec::new();
            for child in children {
                match simplify(child) {
                    None => continue,
                    Some(c) if c.is_match_all() => return Some(Clause::all()),
                    Some(c) => kept.push(c),
                }
            }
            if kept.is_empty() {
                return None;
            }
            Some(collapse(kept, Clause::Or))
        }
    }
}

fn collapse(mut children: Vec<Clause>, wrap: fn(Vec<Clause>) -> Clause) -> Clause {
    if children.len() == 1 {
        if let Some(only) = children.pop() {
            return only;
        }
    }
    wrap(children)
}
