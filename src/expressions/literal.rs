//! Value-level helpers shared by constant folding and native evaluation.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// jx treats `null`, `""` and `[]` alike: the value is missing.
pub fn is_null_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Collapse the null forms to `Value::Null`.
pub fn normalize(value: Value) -> Value {
    if is_null_value(&value) {
        Value::Null
    } else {
        value
    }
}

pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Whole numbers come back as integers so `2.0` and `2` compare and print alike.
pub fn number_value(f: f64) -> Value {
    if !f.is_finite() {
        return Value::Null;
    }
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        return Value::Number(Number::from(f as i64));
    }
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Ordering for comparisons; `None` when the values are not comparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Number(_)) => compare_values(&Value::from(*x as i64), b),
        (Value::Number(_), Value::Bool(y)) => compare_values(a, &Value::from(*y as i64)),
        _ => None,
    }
}

/// Equality under null semantics: two missing values are equal, a missing value equals nothing else.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (is_null_value(a), is_null_value(b)) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        _ => compare_values(a, b) == Some(Ordering::Equal) || a == b,
    }
}

pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        v if is_null_value(v) => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Boolean reading of a value; `None` when missing.
pub fn truthy(value: &Value) -> Option<bool> {
    match value {
        v if is_null_value(v) => None,
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => Some(!matches!(s.to_lowercase().as_str(), "false" | "0" | "f" | "no")),
        _ => Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_forms() {
        assert!(is_null_value(&json!(null)));
        assert!(is_null_value(&json!("")));
        assert!(is_null_value(&json!([])));
        assert!(!is_null_value(&json!(0)));
        assert!(!is_null_value(&json!({})));
    }

    #[test]
    fn test_number_value_prefers_integers() {
        assert_eq!(number_value(2.0), json!(2));
        assert_eq!(number_value(2.5), json!(2.5));
        assert_eq!(number_value(f64::NAN), json!(null));
    }

    #[test]
    fn test_equality_and_ordering() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!(null), &json!("")));
        assert!(!values_equal(&json!(null), &json!(0)));
        assert_eq!(compare_values(&json!("a"), &json!("b")), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("a"), &json!(1)), None);
    }
}
