//! SQLite quoting helpers. Every literal that reaches generated SQL goes through here.

use serde_json::Value;

/// Quote an identifier (table, column or alias).
pub fn quote_column(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `alias."column"`
pub fn qualified(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, quote_column(column))
}

pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Inline a JSON value as a SQL literal. Booleans become 1/0; structured values are
/// stored as their JSON text.
pub fn quote_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => quote_number(n),
        Value::String(s) => quote_string(s),
        Value::Array(_) | Value::Object(_) => quote_string(&value.to_string()),
    }
}

fn quote_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            // keep REAL affinity for whole floats
            format!("{:.1}", f)
        }
        _ => n.to_string(),
    }
}

/// Format a float for SQL without losing the REAL type.
pub fn quote_float(f: f64) -> String {
    if f.is_finite() {
        if f.fract() == 0.0 && f.abs() < 1e15 {
            format!("{:.1}", f)
        } else {
            format!("{}", f)
        }
    } else {
        "NULL".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_values() {
        assert_eq!(quote_value(&json!(null)), "NULL");
        assert_eq!(quote_value(&json!(true)), "1");
        assert_eq!(quote_value(&json!(3)), "3");
        assert_eq!(quote_value(&json!(2.0)), "2.0");
        assert_eq!(quote_value(&json!("it's")), "'it''s'");
        assert_eq!(quote_value(&json!([1, 2])), "'[1,2]'");
    }

    #[test]
    fn test_quote_identifiers() {
        assert_eq!(quote_column("a.$number"), "\"a.$number\"");
        assert_eq!(quote_column("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualified("t0", "__id__"), "t0.\"__id__\"");
    }
}
