//! # SQLite compilation
//!
//! Each operator type implements [`ToSql`]; [`Expression::to_sql`] simplifies for
//! [`SqlLang`] and dispatches on the node kind. The result is an [`SqlScript`]: a
//! self-contained scalar SQL expression (callers parenthesize), its result type and the jx
//! expression telling when it is missing.
//!
//! Variables are resolved through a [`ColumnResolver`] supplied by the planner, which knows
//! which table aliases are in scope for the statement being built.

mod arithmetic;
mod conditional;
mod logical;
mod strings;

use serde_json::Value;

use crate::expressions::{dispatch, CompileError, Expr, Expression, SqlLang};
use crate::jx_type::JsonType;

/// Compiled fragment of one expression.
#[derive(Debug, Clone)]
pub struct SqlScript {
    pub sql: String,
    pub json_type: JsonType,
    /// True exactly when `sql` evaluates to NULL.
    pub missing: Expression,
    pub source: Expression,
}

impl SqlScript {
    pub fn new(sql: impl Into<String>, json_type: JsonType, source: &Expression) -> Self {
        SqlScript {
            sql: sql.into(),
            json_type,
            missing: source.missing_simplified::<SqlLang>(),
            source: source.clone(),
        }
    }

    pub fn null(source: &Expression) -> Self {
        SqlScript {
            sql: "NULL".to_string(),
            json_type: JsonType::IsNull,
            missing: Expression::boolean(true),
            source: source.clone(),
        }
    }

    pub fn is_never_missing(&self) -> bool {
        self.missing.is_false()
    }

    pub fn is_null(&self) -> bool {
        self.sql == "NULL"
    }

    /// Parenthesized text, for embedding in a larger expression.
    pub fn wrapped(&self) -> String {
        format!("({})", self.sql)
    }

    /// Two-valued reading: NULL counts as false.
    pub fn condition(&self) -> String {
        if self.is_never_missing() {
            self.wrapped()
        } else {
            format!("COALESCE({}, 0)", self.wrapped())
        }
    }
}

/// A physical column visible to the statement under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub sql: String,
    pub json_type: JsonType,
}

pub trait ColumnResolver {
    /// Every column holding `var` (one per stored type). Empty when `var` names an object;
    /// `UnknownVariable` when nothing was ever stored under it.
    fn resolve(&self, var: &str) -> Result<Vec<ColumnRef>, CompileError>;
}

pub trait ToSql {
    fn to_sql(
        &self,
        this: &Expression,
        schema: &dyn ColumnResolver,
    ) -> Result<SqlScript, CompileError>;
}

impl Expression {
    pub fn to_sql(&self, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let simple = self.partial_eval::<SqlLang>();
        dispatch!(simple.node(), op => op.to_sql(&simple, schema))
    }
}

fn unsupported(this: &Expression) -> CompileError {
    CompileError::Unsupported {
        dialect: "sql".to_string(),
        expr: this.to_string(),
    }
}

/// Result type of several alternatives: their common type, text when they disagree.
fn common_type(types: impl IntoIterator<Item = JsonType>) -> JsonType {
    let mut out = JsonType::IsNull;
    for t in types {
        out = match (out, t) {
            (JsonType::IsNull, t) | (t, JsonType::IsNull) => t,
            (a, b) if a == b => a,
            (a, b) if a.is_numeric() && b.is_numeric() => JsonType::Number,
            _ => JsonType::String,
        };
    }
    out
}

fn literal_text(value: &Value) -> String {
    crate::utils::sql_quote::quote_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct Columns(HashMap<&'static str, ColumnRef>);

    impl ColumnResolver for Columns {
        fn resolve(&self, var: &str) -> Result<Vec<ColumnRef>, CompileError> {
            match self.0.get(var) {
                Some(column) => Ok(vec![column.clone()]),
                None => Err(CompileError::UnknownVariable {
                    var: var.to_string(),
                    expr: var.to_string(),
                }),
            }
        }
    }

    fn columns() -> Columns {
        let mut m = HashMap::new();
        m.insert(
            "a",
            ColumnRef {
                sql: "t0.\"a.$number\"".to_string(),
                json_type: JsonType::Number,
            },
        );
        m.insert(
            "s",
            ColumnRef {
                sql: "t0.\"s.$string\"".to_string(),
                json_type: JsonType::String,
            },
        );
        Columns(m)
    }

    fn sql(v: serde_json::Value) -> String {
        Expression::from_json(&v).unwrap().to_sql(&columns()).unwrap().sql
    }

    #[test]
    fn test_literal_and_variable() {
        assert_eq!(sql(json!(3)), "3");
        assert_eq!(sql(json!({"literal": "it's"})), "'it''s'");
        assert_eq!(sql(json!("a")), "t0.\"a.$number\"");
        let err = Expression::variable("unknown").to_sql(&columns()).unwrap_err();
        assert!(matches!(err, CompileError::UnknownVariable { var, .. } if var == "unknown"));
    }

    #[test]
    fn test_inequality_keeps_nulls() {
        assert_eq!(sql(json!({"gt": {"a": 1}})), "(t0.\"a.$number\") > (1)");
        assert_eq!(sql(json!({"lt": [2, "a"]})), "(t0.\"a.$number\") > (2)");
    }

    #[test]
    fn test_eq_against_literal_is_two_valued() {
        assert_eq!(
            sql(json!({"eq": {"a": 1}})),
            "COALESCE((t0.\"a.$number\") = (1), 0)"
        );
    }

    #[test]
    fn test_missing_and_exists() {
        assert_eq!(sql(json!({"missing": "a"})), "(t0.\"a.$number\") IS NULL");
        assert_eq!(sql(json!({"exists": "a"})), "NOT ((t0.\"a.$number\") IS NULL)");
        assert_eq!(sql(json!({"missing": "unknown"})), "1");
    }

    #[test]
    fn test_and_coalesces_possibly_missing_terms() {
        let out = sql(json!({"and": [{"gt": {"a": 1}}, {"missing": "s"}]}));
        assert_eq!(
            out,
            "COALESCE(((t0.\"a.$number\") > (1)), 0) AND ((t0.\"s.$string\") IS NULL)"
        );
    }

    #[test]
    fn test_division_guards_zero() {
        let out = sql(json!({"div": ["a", 2], "default": 0}));
        assert!(out.starts_with("COALESCE(CASE WHEN (2) = 0 THEN NULL"));
        assert!(out.ends_with(", 0)"));
    }

    #[test]
    fn test_in_list() {
        assert_eq!(
            sql(json!({"in": {"s": ["x", "y"]}})),
            "COALESCE((t0.\"s.$string\") IN ('x', 'y'), 0)"
        );
    }

    #[test]
    fn test_tuple_is_unsupported() {
        let err = Expression::from_json(&json!(["a", "s"]))
            .unwrap()
            .to_sql(&columns())
            .unwrap_err();
        assert!(matches!(err, CompileError::Unsupported { .. }));
    }
}
