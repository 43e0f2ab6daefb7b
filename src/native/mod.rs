//! In-process evaluation of jx expressions against JSON documents.
//!
//! [`Expression::to_native`] simplifies for [`NativeLang`] and builds one closure per node.
//! A variable reads a dotted path; paths that cross arrays collect every element's value.

mod ops;

use std::sync::Arc;

use serde_json::Value;

use crate::expressions::literal::is_null_value;
use crate::expressions::{dispatch, CompileError, Expr, Expression, NativeLang};
use crate::utils::field_path::split_field;

pub type NativeFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

pub trait ToNative {
    fn to_native(&self, this: &Expression) -> Result<NativeFn, CompileError>;
}

impl Expression {
    pub fn to_native(&self) -> Result<NativeFn, CompileError> {
        let simple = self.partial_eval::<NativeLang>();
        dispatch!(simple.node(), op => op.to_native(&simple))
    }

    /// Compile and run once.
    pub fn evaluate(&self, doc: &Value) -> Result<Value, CompileError> {
        Ok(self.to_native()?(doc))
    }
}

/// Value at a dotted path. Missing paths give `null`; crossing arrays gathers a list.
pub fn get_path(doc: &Value, path: &str) -> Value {
    let segments = split_field(path);
    let mut found = Vec::new();
    lookup(doc, &segments, &mut found);
    match found.len() {
        0 => Value::Null,
        1 => found.remove(0),
        _ => Value::Array(found),
    }
}

fn lookup(value: &Value, path: &[String], out: &mut Vec<Value>) {
    match (value, path.split_first()) {
        (Value::Array(items), _) => {
            for item in items {
                lookup(item, path, out);
            }
        }
        (v, None) => {
            if !is_null_value(v) {
                out.push(v.clone());
            }
        }
        (Value::Object(map), Some((head, rest))) => {
            if let Some(child) = map.get(head) {
                lookup(child, rest, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(expr: Value, doc: Value) -> Value {
        Expression::from_json(&expr).unwrap().evaluate(&doc).unwrap()
    }

    #[test]
    fn test_get_path_through_arrays() {
        let doc = json!({"a": 1, "b": [{"c": 10}, {"c": 20}, {"d": 1}]});
        assert_eq!(get_path(&doc, "a"), json!(1));
        assert_eq!(get_path(&doc, "b.c"), json!([10, 20]));
        assert_eq!(get_path(&doc, "x.y"), Value::Null);
    }

    #[test]
    fn test_connectives_are_two_valued() {
        let doc = json!({"a": 1});
        assert_eq!(eval(json!({"and": [{"gt": {"a": 0}}, {"gt": {"b": 0}}]}), doc.clone()), json!(false));
        assert_eq!(eval(json!({"or": [{"gt": {"a": 0}}, {"gt": {"b": 0}}]}), doc.clone()), json!(true));
        assert_eq!(eval(json!({"gt": {"b": 0}}), doc), Value::Null);
    }

    #[test]
    fn test_arithmetic_defaults() {
        let doc = json!({"a": 7, "b": 0});
        assert_eq!(eval(json!({"div": ["a", "b"], "default": -1}), doc.clone()), json!(-1));
        assert_eq!(eval(json!({"mod": ["a", 3]}), doc.clone()), json!(1));
        assert_eq!(eval(json!({"mod": [-7, 3]}), doc.clone()), json!(2));
        assert_eq!(eval(json!({"sum": ["a", "missing"]}), doc.clone()), json!(7));
        assert_eq!(eval(json!({"add": ["a", "missing"]}), doc), Value::Null);
    }

    #[test]
    fn test_strings() {
        let doc = json!({"s": "hello world"});
        assert_eq!(eval(json!({"left": {"s": 5}}), doc.clone()), json!("hello"));
        assert_eq!(eval(json!({"not_left": {"s": 6}}), doc.clone()), json!("world"));
        assert_eq!(eval(json!({"find": {"s": "o"}, "start": 5}), doc.clone()), json!(7));
        assert_eq!(eval(json!({"between": {"s": ["h", " "]}}), doc.clone()), json!("ello"));
        assert_eq!(eval(json!({"regexp": {"s": "hel+o.*"}}), doc.clone()), json!(true));
        assert_eq!(eval(json!({"regexp": {"s": "world"}}), doc), json!(false));
    }

    #[test]
    fn test_when_and_case() {
        let doc = json!({"a": -3});
        let when = json!({"when": {"lt": {"a": 0}}, "then": {"literal": "neg"}, "else": {"literal": "pos"}});
        assert_eq!(eval(when, doc.clone()), json!("neg"));
        let case = json!({"case": [
            {"when": {"gt": {"a": 0}}, "then": 1},
            {"when": {"lt": {"a": 0}}, "then": -1},
            0
        ]});
        assert_eq!(eval(case, doc), json!(-1));
    }
}
