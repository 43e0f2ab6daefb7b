//! # Structural types over JSON values
//!
//! A `JxType` is either a primitive tag or a mapping from field name to `JxType`.
//! Union (`a | b`) is commutative, associative and idempotent:
//!
//! - `IsNull` is the identity
//! - two primitives sharing a type key widen (`Integer | Number == Number`)
//! - primitives with different keys become a mapping keyed by type key (`$number`, `$string`, ...)
//! - mappings merge per key
//!
//! Arrays are mappings with a single `$nested` key holding the element type.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::field_path::concat_field;

pub const NESTED_KEY: &str = "$nested";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonType {
    IsNull,
    Boolean,
    Integer,
    Number,
    Time,
    Interval,
    String,
}

impl JsonType {
    /// Key under which values of this type are stored. Integers share `$number`.
    pub fn type_key(self) -> Option<&'static str> {
        match self {
            JsonType::IsNull => None,
            JsonType::Boolean => Some("$boolean"),
            JsonType::Integer | JsonType::Number => Some("$number"),
            JsonType::Time => Some("$time"),
            JsonType::Interval => Some("$interval"),
            JsonType::String => Some("$string"),
        }
    }

    pub fn from_type_key(key: &str) -> Option<JsonType> {
        match key {
            "$boolean" => Some(JsonType::Boolean),
            "$number" => Some(JsonType::Number),
            "$time" => Some(JsonType::Time),
            "$interval" => Some(JsonType::Interval),
            "$string" => Some(JsonType::String),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            JsonType::Integer | JsonType::Number | JsonType::Time | JsonType::Interval
        )
    }

    /// Union of two primitives that share a type key.
    fn widen(self, other: JsonType) -> JsonType {
        match (self, other) {
            (a, b) if a == b => a,
            (JsonType::Integer, JsonType::Number) | (JsonType::Number, JsonType::Integer) => {
                JsonType::Number
            }
            (a, _) => a,
        }
    }

    /// SQLite column affinity used for physical columns of this type.
    pub fn sql_type(self) -> &'static str {
        match self {
            JsonType::Boolean => "INTEGER",
            JsonType::String | JsonType::IsNull => "TEXT",
            _ => "NUMERIC",
        }
    }

    pub fn of_value(value: &Value) -> JsonType {
        match value {
            Value::Null => JsonType::IsNull,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
            Value::Number(_) => JsonType::Number,
            Value::String(s) if s.is_empty() => JsonType::IsNull,
            Value::String(_) => JsonType::String,
            Value::Array(a) if a.is_empty() => JsonType::IsNull,
            Value::Array(_) | Value::Object(_) => JsonType::String,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JsonType::IsNull => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::Time => "time",
            JsonType::Interval => "interval",
            JsonType::String => "string",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JxType {
    Primitive(JsonType),
    Object(BTreeMap<String, JxType>),
}

impl JxType {
    pub const IS_NULL: JxType = JxType::Primitive(JsonType::IsNull);

    pub fn empty_object() -> JxType {
        JxType::Object(BTreeMap::new())
    }

    pub fn array_of(element: JxType) -> JxType {
        if element.is_null() {
            return JxType::IS_NULL;
        }
        let mut fields = BTreeMap::new();
        fields.insert(NESTED_KEY.to_string(), element);
        JxType::Object(fields)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JxType::Primitive(JsonType::IsNull))
    }

    pub fn union(&self, other: &JxType) -> JxType {
        match (self, other) {
            (JxType::Primitive(JsonType::IsNull), b) => b.clone(),
            (a, JxType::Primitive(JsonType::IsNull)) => a.clone(),
            (JxType::Primitive(a), JxType::Primitive(b)) => {
                if a.type_key() == b.type_key() {
                    JxType::Primitive(a.widen(*b))
                } else {
                    let mut fields = BTreeMap::new();
                    merge_primitive(&mut fields, *a);
                    merge_primitive(&mut fields, *b);
                    JxType::Object(fields)
                }
            }
            (JxType::Primitive(p), JxType::Object(fields))
            | (JxType::Object(fields), JxType::Primitive(p)) => {
                let mut fields = fields.clone();
                merge_primitive(&mut fields, *p);
                JxType::Object(fields)
            }
            (JxType::Object(left), JxType::Object(right)) => {
                let mut fields = left.clone();
                for (key, value) in right {
                    let merged = match fields.get(key) {
                        Some(existing) => existing.union(value),
                        None => value.clone(),
                    };
                    fields.insert(key.clone(), merged);
                }
                JxType::Object(fields)
            }
        }
    }

    /// Structural containment: every shape `self` admits is admitted by `other`.
    pub fn is_in(&self, other: &JxType) -> bool {
        &self.union(other) == other
    }

    /// Dotted path and primitive of every leaf. Type keys and `$nested` do not add a segment.
    pub fn leaves(&self) -> Vec<(String, JsonType)> {
        let mut out = Vec::new();
        self.collect_leaves(".", &mut out);
        out
    }

    fn collect_leaves(&self, path: &str, out: &mut Vec<(String, JsonType)>) {
        match self {
            JxType::Primitive(JsonType::IsNull) => {}
            JxType::Primitive(p) => out.push((path.to_string(), *p)),
            JxType::Object(fields) => {
                for (key, value) in fields {
                    if key.starts_with('$') {
                        value.collect_leaves(path, out);
                    } else {
                        value.collect_leaves(&concat_field(path, &escape(key)), out);
                    }
                }
            }
        }
    }
}

fn escape(key: &str) -> String {
    crate::utils::field_path::escape_key(key)
}

fn merge_primitive(fields: &mut BTreeMap<String, JxType>, p: JsonType) {
    let Some(key) = p.type_key() else {
        return;
    };
    let merged = match fields.get(key) {
        Some(existing) => existing.union(&JxType::Primitive(p)),
        None => JxType::Primitive(p),
    };
    fields.insert(key.to_string(), merged);
}

impl BitOr for JxType {
    type Output = JxType;

    fn bitor(self, rhs: JxType) -> JxType {
        self.union(&rhs)
    }
}

impl BitOr for &JxType {
    type Output = JxType;

    fn bitor(self, rhs: &JxType) -> JxType {
        self.union(rhs)
    }
}

impl From<JsonType> for JxType {
    fn from(value: JsonType) -> Self {
        JxType::Primitive(value)
    }
}

/// Infer the structural type of a JSON value. Nulls, empty strings and empty arrays
/// contribute nothing.
pub fn to_type(value: &Value) -> JxType {
    match value {
        Value::Array(items) => {
            let element = items
                .iter()
                .fold(JxType::IS_NULL, |acc, item| acc.union(&to_type(item)));
            JxType::array_of(element)
        }
        Value::Object(map) => {
            let mut fields = BTreeMap::new();
            for (key, item) in map {
                let t = to_type(item);
                if !t.is_null() {
                    fields.insert(key.clone(), t);
                }
            }
            JxType::Object(fields)
        }
        other => JxType::Primitive(JsonType::of_value(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_widening() {
        let int = JxType::from(JsonType::Integer);
        let num = JxType::from(JsonType::Number);
        assert_eq!(&int | &num, num);
        assert_eq!(&int | &int, int);
    }

    #[test]
    fn test_mixed_primitives_become_mapping() {
        let t = JxType::from(JsonType::String) | JxType::from(JsonType::Integer);
        match &t {
            JxType::Object(fields) => {
                assert_eq!(fields.len(), 2);
                assert!(fields.contains_key("$string"));
                assert!(fields.contains_key("$number"));
            }
            other => panic!("expected mapping, got {:?}", other),
        }
        assert!(JxType::from(JsonType::String).is_in(&t));
    }

    #[test]
    fn test_null_is_not_empty_object() {
        assert_ne!(JxType::IS_NULL, JxType::empty_object());
        assert_eq!(JxType::empty_object() | JxType::IS_NULL, JxType::empty_object());
    }

    #[test]
    fn test_to_type_and_leaves() {
        let t = to_type(&json!({"a": 1, "b": [{"c": "x"}, {"c": 2.5}], "d": null}));
        let leaves = t.leaves();
        assert_eq!(
            leaves,
            vec![
                ("a".to_string(), JsonType::Integer),
                ("b.c".to_string(), JsonType::Number),
                ("b.c".to_string(), JsonType::String),
            ]
        );
        assert_eq!(to_type(&json!([])), JxType::IS_NULL);
        assert_eq!(to_type(&json!("")), JxType::IS_NULL);
    }
}
