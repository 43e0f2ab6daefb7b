//! String operators. SQLite's `SUBSTR`, `INSTR` and `LENGTH` count characters, which
//! matches the zero-based character positions of the jx operators after a `+ 1` shift.

use serde_json::Value;

use super::{ColumnResolver, SqlScript, ToSql};
use crate::expressions::{
    AffixExpr, AffixOp, BetweenOp, CompileError, ConcatOp, Expression, FindOp, RegExpOp,
    SliceExpr, SliceOp, StringUnaryExpr, StringUnaryOp,
};
use crate::jx_type::JsonType;
use crate::utils::sql_quote::quote_string;

fn or_default(sql: String, default: &SqlScript) -> String {
    if default.is_null() {
        sql
    } else {
        format!("COALESCE({}, {})", sql, default.wrapped())
    }
}

impl ToSql for ConcatOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let default = self.default.to_sql(schema)?;
        let terms: Vec<SqlScript> = self
            .terms
            .iter()
            .map(|t| t.to_sql(schema))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|t| !t.is_null())
            .collect();
        if terms.is_empty() {
            return Ok(SqlScript::new(default.sql.clone(), default.json_type, this));
        }
        let sep = quote_string(&self.separator);
        // every present term is prefixed by the separator, then the leading one is cut off
        let pieces: Vec<String> = terms
            .iter()
            .map(|t| format!("COALESCE({} || {}, '')", sep, t.wrapped()))
            .collect();
        let sql = format!(
            "NULLIF(SUBSTR({}, {}), '')",
            pieces.join(" || "),
            self.separator.chars().count() + 1
        );
        Ok(SqlScript::new(or_default(sql, &default), JsonType::String, this))
    }
}

impl ToSql for StringUnaryExpr {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let term = self.term.to_sql(schema)?;
        if term.is_null() {
            return Ok(SqlScript::null(this));
        }
        let (sql, json_type) = match self.op {
            StringUnaryOp::Length => (format!("LENGTH({})", term.sql), JsonType::Integer),
            StringUnaryOp::Lower => (format!("LOWER({})", term.sql), JsonType::String),
            StringUnaryOp::Upper => (format!("UPPER({})", term.sql), JsonType::String),
            StringUnaryOp::Trim => (format!("NULLIF(TRIM({}), '')", term.sql), JsonType::String),
        };
        Ok(SqlScript::new(sql, json_type, this))
    }
}

impl ToSql for SliceExpr {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let value = self.value.to_sql(schema)?;
        let length = self.length.to_sql(schema)?;
        if value.is_null() || length.is_null() {
            return Ok(SqlScript::null(this));
        }
        let v = value.wrapped();
        let n = format!("MAX({}, 0)", length.wrapped());
        let sql = match self.op {
            SliceOp::Left => format!("NULLIF(SUBSTR({}, 1, {}), '')", v, n),
            SliceOp::Right => format!(
                "CASE WHEN {n} = 0 THEN NULL ELSE NULLIF(SUBSTR({v}, -{n}), '') END",
                n = n,
                v = v
            ),
            SliceOp::NotLeft => format!("NULLIF(SUBSTR({}, {} + 1), '')", v, n),
            SliceOp::NotRight => format!(
                "NULLIF(SUBSTR({v}, 1, MAX(LENGTH({v}) - {n}, 0)), '')",
                v = v,
                n = n
            ),
        };
        Ok(SqlScript::new(sql, JsonType::String, this))
    }
}

impl ToSql for AffixExpr {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let value = self.value.to_sql(schema)?;
        let affix = self.affix.to_sql(schema)?;
        let (v, a) = (value.wrapped(), affix.wrapped());
        let test = match self.op {
            AffixOp::Prefix => format!("COALESCE(SUBSTR({v}, 1, LENGTH({a})) = {a}, 0)", v = v, a = a),
            AffixOp::Suffix => format!("COALESCE(SUBSTR({v}, -LENGTH({a})) = {a}, 0)", v = v, a = a),
        };
        let sql = if affix.is_never_missing() {
            test
        } else {
            format!("CASE WHEN {} IS NULL THEN 1 ELSE {} END", a, test)
        };
        Ok(SqlScript::new(sql, JsonType::Boolean, this))
    }
}

impl ToSql for FindOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let value = self.value.to_sql(schema)?;
        let find = self.find.to_sql(schema)?;
        let start = self.start.to_sql(schema)?;
        let default = self.default.to_sql(schema)?;
        let s = start.wrapped();
        let index = format!(
            "INSTR(SUBSTR({}, {} + 1), {})",
            value.wrapped(),
            s,
            find.wrapped()
        );
        let mut sql = format!("CASE WHEN {i} > 0 THEN {s} + {i} - 1", i = index, s = s);
        if !default.is_null() {
            sql.push_str(&format!(" ELSE {}", default.sql));
        }
        sql.push_str(" END");
        Ok(SqlScript::new(sql, JsonType::Integer, this))
    }
}

impl ToSql for BetweenOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let value = self.value.to_sql(schema)?;
        let prefix = self.prefix.to_sql(schema)?;
        let suffix = self.suffix.to_sql(schema)?;
        let start = self.start.to_sql(schema)?;
        let default = self.default.to_sql(schema)?;

        let tail = format!("SUBSTR({}, {} + 1)", value.wrapped(), start.wrapped());
        let p = prefix.wrapped();
        let prefix_at = format!("INSTR({}, {})", tail, p);
        let after = format!("SUBSTR({}, {} + LENGTH({}))", tail, prefix_at, p);
        let suffix_at = format!("INSTR({}, {})", after, suffix.wrapped());
        let sql = format!(
            "CASE WHEN {pa} > 0 AND {sa} > 0 THEN NULLIF(SUBSTR({after}, 1, {sa} - 1), '') END",
            pa = prefix_at,
            sa = suffix_at,
            after = after
        );
        Ok(SqlScript::new(or_default(sql, &default), JsonType::String, this))
    }
}

impl ToSql for RegExpOp {
    fn to_sql(&self, this: &Expression, schema: &dyn ColumnResolver) -> Result<SqlScript, CompileError> {
        let value = self.value.to_sql(schema)?;
        // `X REGEXP Y` calls the executor's regexp(Y, X); the pattern must match the whole value
        let pattern = match self.pattern.as_literal() {
            Some(Value::String(p)) => quote_string(&format!("^(?:{})$", p)),
            _ => {
                let p = self.pattern.to_sql(schema)?;
                format!("('^(?:' || {} || ')$')", p.wrapped())
            }
        };
        Ok(SqlScript::new(
            format!("COALESCE({} REGEXP {}, 0)", value.wrapped(), pattern),
            JsonType::Boolean,
            this,
        ))
    }
}
