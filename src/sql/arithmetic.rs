use super::{ColumnResolver, SqlScript, ToSql};
use crate::expressions::{
    BinaryExpr, BinaryOp, CompileError, Expression, MultiExpr, MultiOp, ReduceExpr, ReduceOp,
    UnaryExpr, UnaryOp,
};
use crate::jx_type::JsonType;

/// `floor(q)` without relying on the math extension.
fn floor_sql(q: &str) -> String {
    format!(
        "(CAST({q} AS INTEGER) - (CAST({q} AS INTEGER) > {q}))",
        q = q
    )
}

fn with_default(sql: String, default: &SqlScript) -> String {
    if default.is_null() {
        sql
    } else {
        format!("COALESCE({}, {})", sql, default.wrapped())
    }
}

impl ToSql for BinaryExpr {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let lhs = self.lhs.to_sql(schema)?;
        let rhs = self.rhs.to_sql(schema)?;
        let default = self.default.to_sql(schema)?;
        if lhs.is_null() || rhs.is_null() {
            return Ok(SqlScript::new(default.sql.clone(), default.json_type, this));
        }
        let (l, r) = (lhs.wrapped(), rhs.wrapped());
        let quotient = format!("(CAST({} AS REAL) / {})", l, r);
        let core = match self.op {
            BinaryOp::Sub => format!("{} - {}", l, r),
            BinaryOp::Div => format!("CAST({} AS REAL) / {}", l, r),
            BinaryOp::Exp => format!("POWER({}, {})", l, r),
            BinaryOp::Mod => format!("{} - {} * {}", l, r, floor_sql(&quotient)),
            BinaryOp::Floor => format!("{} * {}", floor_sql(&quotient), r),
        };
        let guarded = match self.op {
            BinaryOp::Div | BinaryOp::Mod | BinaryOp::Floor => {
                format!("CASE WHEN {} = 0 THEN NULL ELSE {} END", r, core)
            }
            _ => core,
        };
        Ok(SqlScript::new(
            with_default(guarded, &default),
            JsonType::Number,
            this,
        ))
    }
}

impl ToSql for MultiExpr {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let default = self.default.to_sql(schema)?;
        let terms = self
            .terms
            .iter()
            .map(|t| t.to_sql(schema))
            .collect::<Result<Vec<_>, _>>()?;
        let joiner = format!(" {} ", self.op.sql());
        let identity = match self.op {
            MultiOp::Add => "0",
            MultiOp::Mul => "1",
        };

        let sql = if !self.nulls {
            terms.iter().map(|t| t.wrapped()).collect::<Vec<_>>().join(&joiner)
        } else {
            let parts: Vec<String> = terms
                .iter()
                .map(|t| {
                    if t.is_never_missing() {
                        t.wrapped()
                    } else {
                        format!("COALESCE({}, {})", t.wrapped(), identity)
                    }
                })
                .collect();
            if terms.iter().any(|t| t.is_never_missing()) {
                parts.join(&joiner)
            } else {
                let all_missing: Vec<String> = terms
                    .iter()
                    .map(|t| format!("{} IS NULL", t.wrapped()))
                    .collect();
                format!(
                    "CASE WHEN {} THEN NULL ELSE {} END",
                    all_missing.join(" AND "),
                    parts.join(&joiner)
                )
            }
        };
        Ok(SqlScript::new(
            with_default(sql, &default),
            JsonType::Number,
            this,
        ))
    }
}

impl ToSql for UnaryExpr {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let term = self.term.to_sql(schema)?;
        let sql = match self.op {
            UnaryOp::Abs => format!("ABS({})", term.sql),
            UnaryOp::Neg => format!("-{}", term.wrapped()),
        };
        Ok(SqlScript::new(sql, JsonType::Number, this))
    }
}

impl ToSql for ReduceExpr {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let terms = self
            .terms
            .iter()
            .map(|t| t.to_sql(schema))
            .collect::<Result<Vec<_>, _>>()?;
        match self.op {
            ReduceOp::Count => {
                let sql = if terms.is_empty() {
                    "0".to_string()
                } else {
                    terms
                        .iter()
                        .map(|t| format!("({} IS NOT NULL)", t.wrapped()))
                        .collect::<Vec<_>>()
                        .join(" + ")
                };
                Ok(SqlScript::new(sql, JsonType::Integer, this))
            }
            ReduceOp::Max | ReduceOp::Min => {
                if terms.is_empty() {
                    return Ok(SqlScript::null(this));
                }
                if terms.len() == 1 {
                    return Ok(SqlScript::new(terms[0].sql.clone(), JsonType::Number, this));
                }
                // multi-argument MAX/MIN is NULL when any argument is; rotate a COALESCE so
                // each argument falls back to the others
                let n = terms.len();
                let args: Vec<String> = (0..n)
                    .map(|i| {
                        let rotated: Vec<String> =
                            (0..n).map(|j| terms[(i + j) % n].wrapped()).collect();
                        format!("COALESCE({})", rotated.join(", "))
                    })
                    .collect();
                let func = if self.op == ReduceOp::Max { "MAX" } else { "MIN" };
                Ok(SqlScript::new(
                    format!("{}({})", func, args.join(", ")),
                    JsonType::Number,
                    this,
                ))
            }
        }
    }
}
