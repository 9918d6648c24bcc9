//! Row sorting for the memory adapter

use std::cmp::Ordering;

use serde_json::Value;

use crate::query::{Record, SortDirection, SortSpec};

/// Sorts rows
pub struct RowSorter;

impl RowSorter {
    /// Sorts rows by each spec in turn.
    ///
    /// Sort is stable: rows equal on every key keep their stored order.
    pub fn sort(rows: &mut [Record], specs: &[SortSpec]) {
        if specs.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            specs
                .iter()
                .map(|spec| {
                    let ordering = Self::compare_values(a.get(&spec.field), b.get(&spec.field));
                    match spec.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    /// Compares two JSON values for sorting.
    ///
    /// Ordering rules:
    /// - missing < null < bool < number < string
    /// - For same types, natural ordering
    fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a_val), Some(b_val)) => {
                let type_order = |v: &Value| -> u8 {
                    match v {
                        Value::Null => 0,
                        Value::Bool(_) => 1,
                        Value::Number(_) => 2,
                        Value::String(_) => 3,
                        Value::Array(_) => 4,
                        Value::Object(_) => 5,
                    }
                };

                let a_type = type_order(a_val);
                let b_type = type_order(b_val);
                if a_type != b_type {
                    return a_type.cmp(&b_type);
                }

                match (a_val, b_val) {
                    (Value::Bool(a_b), Value::Bool(b_b)) => a_b.cmp(b_b),
                    (Value::Number(a_n), Value::Number(b_n)) => {
                        let a_f = a_n.as_f64().unwrap_or(0.0);
                        let b_f = b_n.as_f64().unwrap_or(0.0);
                        a_f.partial_cmp(&b_f).unwrap_or(Ordering::Equal)
                    }
                    (Value::String(a_s), Value::String(b_s)) => a_s.cmp(b_s),
                    // Arrays and objects are not compared
                    _ => Ordering::Equal,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_row(id: &str, age: Value) -> Record {
        json!({"id": id, "age": age}).as_object().cloned().unwrap()
    }

    fn ids(rows: &[Record]) -> Vec<&str> {
        rows.iter().map(|r| r["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_sort_ascending() {
        let mut rows = vec![
            make_row("c", json!(30)),
            make_row("a", json!(20)),
            make_row("b", json!(25)),
        ];
        RowSorter::sort(&mut rows, &[SortSpec::asc("age")]);
        assert_eq!(ids(&rows), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_descending() {
        let mut rows = vec![
            make_row("c", json!(30)),
            make_row("a", json!(20)),
            make_row("b", json!(25)),
        ];
        RowSorter::sort(&mut rows, &[SortSpec::desc("age")]);
        assert_eq!(ids(&rows), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_sort_stable() {
        let mut rows = vec![
            make_row("a", json!(25)),
            make_row("b", json!(25)),
            make_row("c", json!(25)),
        ];
        RowSorter::sort(&mut rows, &[SortSpec::asc("age")]);
        assert_eq!(ids(&rows), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_secondary_key_breaks_ties() {
        let mut rows = vec![
            make_row("b", json!(25)),
            make_row("a", json!(25)),
            make_row("c", json!(20)),
        ];
        RowSorter::sort(&mut rows, &[SortSpec::asc("age"), SortSpec::desc("id")]);
        assert_eq!(ids(&rows), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_nulls_sort_first() {
        let mut rows = vec![make_row("a", json!(1)), make_row("b", Value::Null)];
        RowSorter::sort(&mut rows, &[SortSpec::asc("age")]);
        assert_eq!(ids(&rows), vec!["b", "a"]);
    }
}
