use super::{common_type, ColumnResolver, SqlScript, ToSql};
use crate::expressions::{
    CaseOp, CastExpr, CastOp, CoalesceOp, CompileError, Expression, PickExpr, WhenOp,
};
use crate::jx_type::JsonType;

impl ToSql for CoalesceOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let terms: Vec<SqlScript> = self
            .terms
            .iter()
            .map(|t| t.to_sql(schema))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|t| !t.is_null())
            .collect();
        match terms.len() {
            0 => Ok(SqlScript::null(this)),
            1 => Ok(SqlScript::new(terms[0].sql.clone(), terms[0].json_type, this)),
            _ => Ok(SqlScript::new(
                format!(
                    "COALESCE({})",
                    terms.iter().map(|t| t.sql.as_str()).collect::<Vec<_>>().join(", ")
                ),
                common_type(terms.iter().map(|t| t.json_type)),
                this,
            )),
        }
    }
}

impl ToSql for PickExpr {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        // columns hold scalars, so the pick is the value itself
        let term = self.term.to_sql(schema)?;
        Ok(SqlScript::new(term.sql, term.json_type, this))
    }
}

impl ToSql for WhenOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let when = self.when.to_sql(schema)?;
        let then = self.then.to_sql(schema)?;
        let els = self.els.to_sql(schema)?;
        let mut sql = format!("CASE WHEN {} THEN {}", when.wrapped(), then.sql);
        if !els.is_null() {
            sql.push_str(&format!(" ELSE {}", els.sql));
        }
        sql.push_str(" END");
        Ok(SqlScript::new(
            sql,
            common_type([then.json_type, els.json_type]),
            this,
        ))
    }
}

impl ToSql for CaseOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let mut sql = String::from("CASE");
        let mut types = Vec::new();
        for (when, then) in &self.whens {
            let when = when.to_sql(schema)?;
            let then = then.to_sql(schema)?;
            sql.push_str(&format!(" WHEN {} THEN {}", when.wrapped(), then.sql));
            types.push(then.json_type);
        }
        let els = self.els.to_sql(schema)?;
        if !els.is_null() {
            sql.push_str(&format!(" ELSE {}", els.sql));
        }
        types.push(els.json_type);
        sql.push_str(" END");
        Ok(SqlScript::new(sql, common_type(types), this))
    }
}

/// Text that looks numeric; anything else casts to NULL rather than SQLite's 0.
fn numeric_text(x: &str) -> String {
    format!("CASE WHEN TRIM({x}) GLOB '*[0-9]*' THEN CAST(TRIM({x}) AS NUMERIC) END", x = x)
}

impl ToSql for CastExpr {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let term = self.term.to_sql(schema)?;
        if term.is_null() {
            return Ok(SqlScript::null(this));
        }
        let x = term.wrapped();
        let (sql, json_type) = match self.op {
            CastOp::String => match term.json_type {
                JsonType::Boolean => (
                    format!("CASE WHEN {x} IS NULL THEN NULL WHEN {x} THEN 'true' ELSE 'false' END", x = x),
                    JsonType::String,
                ),
                JsonType::String => (term.sql.clone(), JsonType::String),
                _ => (format!("CAST({} AS TEXT)", x), JsonType::String),
            },
            CastOp::Number => {
                let sql = if term.json_type.is_numeric() || term.json_type == JsonType::Boolean {
                    format!("CAST({} AS NUMERIC)", x)
                } else {
                    numeric_text(&x)
                };
                (sql, JsonType::Number)
            }
            CastOp::Integer => {
                let sql = if term.json_type.is_numeric() || term.json_type == JsonType::Boolean {
                    format!("CAST({} AS INTEGER)", x)
                } else {
                    format!("CAST({} AS INTEGER)", numeric_text(&x))
                };
                (sql, JsonType::Integer)
            }
            CastOp::Boolean => {
                let sql = match term.json_type {
                    JsonType::Boolean => term.sql.clone(),
                    t if t.is_numeric() => format!("{} <> 0", x),
                    _ => format!(
                        "CASE WHEN {x} IS NULL THEN NULL WHEN typeof({x}) = 'text' \
                         THEN LOWER({x}) NOT IN ('false', '0', 'f', 'no') ELSE {x} <> 0 END",
                        x = x
                    ),
                };
                (sql, JsonType::Boolean)
            }
        };
        Ok(SqlScript::new(sql, json_type, this))
    }
}
