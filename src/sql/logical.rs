//! Leaves, connectives and predicates.

use serde_json::Value;

use super::{common_type, literal_text, unsupported, ColumnResolver, SqlScript, ToSql};
use crate::expressions::{
    AndOp, CompareExpr, CompareOp, CompileError, DateLiteral, ExistsOp, Expr, Expression, InOp,
    Leaves, Literal, MissingOp, NotOp, OrOp, TupleOp, Variable,
};
use crate::jx_type::JsonType;
use crate::utils::sql_quote::quote_float;

impl ToSql for Literal {
    fn to_sql(&self, this: &Expression, _schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        if self.value.is_null() {
            return Ok(SqlScript::null(this));
        }
        Ok(SqlScript::new(
            literal_text(&self.value),
            JsonType::of_value(&self.value),
            this,
        ))
    }
}

fn columns_sql(
    this: &Expression,
    var: &str,
    schema: &dyn ColumnResolver,
) -> Result<SqlScript, CompileError> {
    let columns = schema.resolve(var)?;
    match columns.len() {
        0 => Ok(SqlScript::null(this)),
        1 => Ok(SqlScript::new(
            columns[0].sql.clone(),
            columns[0].json_type,
            this,
        )),
        _ => {
            let parts: Vec<&str> = columns.iter().map(|c| c.sql.as_str()).collect();
            Ok(SqlScript::new(
                format!("COALESCE({})", parts.join(", ")),
                common_type(columns.iter().map(|c| c.json_type)),
                this,
            ))
        }
    }
}

impl ToSql for Variable {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        columns_sql(this, &self.var, schema)
    }
}

impl ToSql for Leaves {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        columns_sql(this, &self.prefix, schema)
    }
}

impl ToSql for DateLiteral {
    fn to_sql(&self, this: &Expression, _schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        Ok(SqlScript::new(quote_float(self.seconds), JsonType::Time, this))
    }
}

impl ToSql for TupleOp {
    fn to_sql(&self, this: &Expression, _schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        // a tuple has no scalar SQL form; `in` inlines literal tuples itself
        Err(unsupported(this))
    }
}

impl ToSql for NotOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let term = self.term.to_sql(schema)?;
        if term.is_null() {
            return Ok(SqlScript::null(this));
        }
        Ok(SqlScript::new(
            format!("NOT {}", term.wrapped()),
            JsonType::Boolean,
            this,
        ))
    }
}

fn connective(
    this: &Expression,
    terms: &[Expression],
    joiner: &str,
    empty: &str,
    schema: &dyn ColumnResolver,
) -> Result<SqlScript, CompileError> {
    if terms.is_empty() {
        return Ok(SqlScript::new(empty, JsonType::Boolean, this));
    }
    let parts = terms
        .iter()
        .map(|t| t.to_sql(schema).map(|s| s.condition()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SqlScript::new(parts.join(joiner), JsonType::Boolean, this))
}

impl ToSql for AndOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        connective(this, &self.terms, " AND ", "1", schema)
    }
}

impl ToSql for OrOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        connective(this, &self.terms, " OR ", "0", schema)
    }
}

impl ToSql for MissingOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let sql = match self.term.node() {
            Expr::Variable(Variable { var }) | Expr::Leaves(Leaves { prefix: var }) => {
                let columns = match schema.resolve(var) {
                    // nothing was ever stored under the name
                    Err(CompileError::UnknownVariable { .. }) => Vec::new(),
                    result => result?,
                };
                if columns.is_empty() {
                    "1".to_string()
                } else {
                    columns
                        .iter()
                        .map(|c| format!("({}) IS NULL", c.sql))
                        .collect::<Vec<_>>()
                        .join(" AND ")
                }
            }
            _ => {
                let term = self.term.to_sql(schema)?;
                if term.is_null() {
                    "1".to_string()
                } else {
                    format!("{} IS NULL", term.wrapped())
                }
            }
        };
        Ok(SqlScript::new(sql, JsonType::Boolean, this))
    }
}

impl ToSql for ExistsOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let term = self.term.to_sql(schema)?;
        let sql = if term.is_null() {
            "0".to_string()
        } else {
            format!("{} IS NOT NULL", term.wrapped())
        };
        Ok(SqlScript::new(sql, JsonType::Boolean, this))
    }
}

impl ToSql for InOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let Some(Value::Array(items)) = self.superset.as_literal() else {
            return Err(unsupported(this));
        };
        let value = self.value.to_sql(schema)?;
        if value.is_null() {
            return Ok(SqlScript::new("0", JsonType::Boolean, this));
        }
        let list: Vec<String> = items.iter().map(literal_text).collect();
        let test = format!("{} IN ({})", value.wrapped(), list.join(", "));
        let sql = if value.is_never_missing() {
            test
        } else {
            format!("COALESCE({}, 0)", test)
        };
        Ok(SqlScript::new(sql, JsonType::Boolean, this))
    }
}

/// Equality under null semantics, as SQL that is never NULL.
fn null_equal(lhs: &SqlScript, rhs: &SqlScript) -> String {
    let (l, r) = (lhs.wrapped(), rhs.wrapped());
    match (lhs.is_never_missing(), rhs.is_never_missing()) {
        (true, true) => format!("{} = {}", l, r),
        (false, true) | (true, false) => format!("COALESCE({} = {}, 0)", l, r),
        (false, false) => format!(
            "CASE WHEN {l} IS NULL THEN {r} IS NULL WHEN {r} IS NULL THEN 0 ELSE {l} = {r} END",
            l = l,
            r = r
        ),
    }
}

impl ToSql for CompareExpr {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let lhs = self.lhs.to_sql(schema)?;
        let rhs = self.rhs.to_sql(schema)?;
        let sql = match self.op {
            CompareOp::Eq => null_equal(&lhs, &rhs),
            CompareOp::Ne => format!("NOT ({})", null_equal(&lhs, &rhs)),
            op => {
                if lhs.is_null() || rhs.is_null() {
                    return Ok(SqlScript::null(this));
                }
                format!("{} {} {}", lhs.wrapped(), op.sql(), rhs.wrapped())
            }
        };
        Ok(SqlScript::new(sql, JsonType::Boolean, this))
    }
}
