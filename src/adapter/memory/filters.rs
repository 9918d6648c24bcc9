//! Where-clause evaluation for the memory adapter
//!
//! No type coercion: `1` never equals `"1"`. Range modifiers compare
//! numbers with numbers and strings with strings; mixed pairs never match.
//! String modifiers are case-insensitive.

use std::cmp::Ordering;

use serde_json::Value;

use crate::query::{Clause, FilterOp, Predicate, Record};

/// Evaluates physical where clauses against rows
pub struct ClauseFilter;

impl ClauseFilter {
    /// Checks if a row matches a clause
    pub fn matches(row: &Record, clause: &Clause) -> bool {
        match clause {
            Clause::And(children) => children.iter().all(|c| Self::matches(row, c)),
            Clause::Or(children) => children.iter().any(|c| Self::matches(row, c)),
            Clause::Predicate(p) => Self::matches_predicate(row, p),
        }
    }

    fn matches_predicate(row: &Record, predicate: &Predicate) -> bool {
        // Missing field reads as null
        let actual = row.get(&predicate.field).unwrap_or(&Value::Null);

        match &predicate.op {
            FilterOp::Eq(expected) => actual == expected,
            FilterOp::Neq(expected) => actual != expected,
            FilterOp::In(values) => values.contains(actual),
            FilterOp::Nin(values) => !values.contains(actual),
            FilterOp::Gt(bound) => Self::compare(actual, bound) == Some(Ordering::Greater),
            FilterOp::Gte(bound) => matches!(
                Self::compare(actual, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt(bound) => Self::compare(actual, bound) == Some(Ordering::Less),
            FilterOp::Lte(bound) => matches!(
                Self::compare(actual, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Contains(needle) => {
                Self::text(actual).is_some_and(|s| s.contains(&needle.to_lowercase()))
            }
            FilterOp::StartsWith(prefix) => {
                Self::text(actual).is_some_and(|s| s.starts_with(&prefix.to_lowercase()))
            }
            FilterOp::EndsWith(suffix) => {
                Self::text(actual).is_some_and(|s| s.ends_with(&suffix.to_lowercase()))
            }
            FilterOp::Like(pattern) => Self::text(actual).is_some_and(|s| {
                let subject: Vec<char> = s.chars().collect();
                let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
                like_match(&subject, &pattern)
            }),
        }
    }

    fn text(value: &Value) -> Option<String> {
        value.as_str().map(str::to_lowercase)
    }

    /// Orders comparable pairs; `None` for anything else
    fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
        match (actual, bound) {
            (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// `%` matches any run of characters, `_` exactly one
fn like_match(subject: &[char], pattern: &[char]) -> bool {
    // matched[j]: pattern[..j] matches the subject prefix seen so far
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for j in 1..=pattern.len() {
        matched[j] = matched[j - 1] && pattern[j - 1] == '%';
    }

    for &c in subject {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matched[j],
                '_' => matched[j - 1],
                p => matched[j - 1] && p == c,
            };
        }
        matched = next;
    }

    matched[pattern.len()]
}
