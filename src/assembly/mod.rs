//! # Result assembly
//!
//! Turns the flat rows an executor returns for a [`QueryPlan`] back into JSON in the
//! requested format. List plans rebuild nested documents (see [`list`]); aggregate, group-by
//! and cube plans lay cells out over their edges (see [`cube`]).

pub mod cube;
pub mod errors;
pub mod list;
pub mod table;

pub use errors::AssemblyError;

use serde_json::{Map, Value};

use crate::expressions::literal::number_value;
use crate::planner::{Pull, QueryPlan};
use crate::query::{Format, Shape};
use crate::utils::field_path::split_field;

pub fn assemble(plan: &QueryPlan, rows: &[Vec<Value>]) -> Result<Value, AssemblyError> {
    for (i, row) in rows.iter().enumerate() {
        if row.len() != plan.width {
            return Err(AssemblyError::RowArity {
                row: i,
                expected: plan.width,
                found: row.len(),
            });
        }
    }
    match plan.shape {
        Shape::List => {
            let records = list::records(plan, rows)?;
            Ok(match plan.format {
                Format::List => Value::Array(records),
                Format::Table => table::records_table(plan, &records),
                Format::Cube => table::records_cube(plan, &records),
            })
        }
        Shape::Aggregate => Ok(cube::aggregate(plan, rows.first())),
        Shape::GroupBy | Shape::Cube => cube::coordinates(plan, rows),
    }
}

/// Convert one raw cell to JSON.
pub fn pull(pull: Pull, cell: &Value) -> Value {
    match (pull, cell) {
        (_, Value::Null) => Value::Null,
        (Pull::Text, Value::String(s)) if s.is_empty() => Value::Null,
        (Pull::Number, Value::Number(n)) => n.as_f64().map(number_value).unwrap_or(Value::Null),
        (Pull::Boolean, Value::Number(n)) => Value::Bool(n.as_f64().map_or(false, |f| f != 0.0)),
        (Pull::Sqrt, Value::Number(n)) => n
            .as_f64()
            .map(|f| number_value(f.max(0.0).sqrt()))
            .unwrap_or(Value::Null),
        _ => cell.clone(),
    }
}

/// One step into a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    Key(String),
    Index(usize),
}

pub(crate) fn field_steps(path: &str) -> impl Iterator<Item = Step> {
    split_field(path).into_iter().map(Step::Key)
}

/// The value at `steps`, created (as `null`) along the way.
pub(crate) fn slot<'a>(mut current: &'a mut Value, steps: &[Step]) -> &'a mut Value {
    for step in steps {
        current = match step {
            Step::Key(key) => {
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                &mut current[key.as_str()]
            }
            Step::Index(i) => {
                match &mut *current {
                    Value::Array(items) if items.len() <= *i => items.resize(*i + 1, Value::Null),
                    Value::Array(_) => {}
                    other => *other = Value::Array(vec![Value::Null; *i + 1]),
                }
                &mut current[*i]
            }
        };
    }
    current
}

/// Read a dotted path; arrays on the way are mapped over.
pub(crate) fn get_path(value: &Value, path: &str) -> Value {
    fn walk(value: &Value, keys: &[String]) -> Value {
        let Some((key, rest)) = keys.split_first() else {
            return value.clone();
        };
        match value {
            Value::Object(map) => map.get(key).map_or(Value::Null, |v| walk(v, rest)),
            Value::Array(items) => Value::Array(items.iter().map(|v| walk(v, keys)).collect()),
            _ => Value::Null,
        }
    }
    walk(value, &split_field(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pull_conversions() {
        assert_eq!(pull(Pull::Boolean, &json!(1)), json!(true));
        assert_eq!(pull(Pull::Boolean, &json!(0)), json!(false));
        assert_eq!(pull(Pull::Number, &json!(2.0)), json!(2));
        assert_eq!(pull(Pull::Text, &json!("")), Value::Null);
        assert_eq!(pull(Pull::Sqrt, &json!(4.0)), json!(2));
        assert_eq!(pull(Pull::Raw, &json!("x")), json!("x"));
    }

    #[test]
    fn test_slot_creates_containers() {
        let mut v = Value::Null;
        *slot(&mut v, &[Step::Key("b".into()), Step::Index(1), Step::Key("c".into())]) = json!(2);
        assert_eq!(v, json!({"b": [null, {"c": 2}]}));
    }

    #[test]
    fn test_get_path_maps_arrays() {
        let v = json!({"a": 1, "b": [{"c": 10}, {"c": 20}]});
        assert_eq!(get_path(&v, "b.c"), json!([10, 20]));
        assert_eq!(get_path(&v, "a"), json!(1));
        assert_eq!(get_path(&v, "."), v);
        assert_eq!(get_path(&v, "z"), Value::Null);
    }
}
