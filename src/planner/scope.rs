//! Table aliases in scope for one statement, and routing of expressions to the nesting
//! level they read from.

use std::collections::BTreeMap;

use crate::expressions::{CompileError, Expression};
use crate::schema::{Column, Schema, TableInfo, ORDER, PARENT, UID};
use crate::sql::{ColumnRef, ColumnResolver};
use crate::utils::field_path::startswith_field;
use crate::utils::sql_quote::{qualified, quote_column};

/// Alias of a table joined along the nesting chain.
pub(crate) fn chain_alias(table: &TableInfo) -> String {
    format!("t{}", table.depth())
}

/// Tables from the fact table down to `query_path`, root first.
pub(crate) fn chain(schema: &dyn Schema, query_path: &str) -> Result<Vec<TableInfo>, CompileError> {
    let table = get_table(schema, query_path)?;
    table
        .nested_path
        .iter()
        .rev()
        .map(|qp| get_table(schema, qp))
        .collect()
}

pub(crate) fn get_table(schema: &dyn Schema, query_path: &str) -> Result<TableInfo, CompileError> {
    schema
        .get_table(query_path)
        .map_err(|_| CompileError::UnknownNestedPath {
            fact: schema.fact().to_string(),
            path: query_path.to_string(),
        })
}

/// `FROM` clause joining `tables` (root first) along parent keys, listed from the table at
/// `anchor` outward so every `ON` only names tables already joined. `anchor_on` ties the
/// anchor to an earlier relation; `None` makes it the first one.
pub(crate) fn join_chain(tables: &[TableInfo], anchor: usize, anchor_on: Option<&str>) -> String {
    let mut out = String::new();
    let Some(anchor_table) = tables.get(anchor) else {
        return out;
    };
    let alias = chain_alias(anchor_table);
    match anchor_on {
        None => out.push_str(&format!("{} {}", quote_column(&anchor_table.name), alias)),
        Some(on) => out.push_str(&format!(
            " JOIN {} {} ON {} = {}",
            quote_column(&anchor_table.name),
            alias,
            qualified(&alias, UID),
            on
        )),
    }
    // ancestors, nearest first
    for i in (0..anchor).rev() {
        let (table, child) = (&tables[i], &tables[i + 1]);
        out.push_str(&format!(
            " JOIN {} {} ON {} = {}",
            quote_column(&table.name),
            chain_alias(table),
            qualified(&chain_alias(table), UID),
            qualified(&chain_alias(child), PARENT)
        ));
    }
    for i in anchor + 1..tables.len() {
        let (table, parent) = (&tables[i], &tables[i - 1]);
        out.push_str(&format!(
            " JOIN {} {} ON {} = {}",
            quote_column(&table.name),
            chain_alias(table),
            qualified(&chain_alias(table), PARENT),
            qualified(&chain_alias(parent), UID)
        ));
    }
    out
}

/// Tables an expression reads, deepest first for each variable. A variable holding a value
/// reads the tables storing it; an object reads every table under it.
pub(crate) fn tables_read(schema: &dyn Schema, expr: &Expression) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for var in expr.vars() {
        let groups = schema.split_values(&var);
        let holds_value = |columns: &Vec<Column>| columns.iter().any(|c| c.name == var);
        let exact = groups.iter().any(|(_, columns)| holds_value(columns));
        for (qp, columns) in &groups {
            if (!exact || holds_value(columns)) && !out.contains(qp) {
                out.push(qp.clone());
            }
        }
    }
    out
}

/// The table an expression belongs to, seen from the queried table `base`: the deepest
/// table it reads when that lies at or below `base`, else `base` itself. Expressions reading
/// tables on different branches cannot be joined row by row.
pub(crate) fn level_of(schema: &dyn Schema, base: &str, expr: &Expression) -> Result<String, CompileError> {
    let mut level = base.to_string();
    let mut reached: Vec<String> = vec![base.to_string()];
    for qp in tables_read(schema, expr) {
        if !reached.iter().all(|r| startswith_field(r, &qp) || startswith_field(&qp, r)) {
            reached.push(qp);
            return Err(CompileError::SpansNestingLevels {
                levels: reached,
                expr: expr.to_string(),
            });
        }
        if qp != level && startswith_field(&qp, &level) {
            level = qp.clone();
        }
        reached.push(qp);
    }
    Ok(level)
}

/// `EXISTS` over the tables from just below `base` down to `level`, correlated on the
/// `base` row of the enclosing statement. `terms` filter the nested rows.
pub(crate) fn exists_sql(
    schema: &dyn Schema,
    base: &str,
    level: &str,
    terms: Vec<Expression>,
) -> Result<String, CompileError> {
    let anchor = chain(schema, base)?.len() - 1;
    let tables = chain(schema, level)?;
    let (Some(parent), Some(first)) = (tables.get(anchor), tables.get(anchor + 1)) else {
        return Err(CompileError::SpansNestingLevels {
            levels: vec![base.to_string(), level.to_string()],
            expr: Expression::all(terms).to_string(),
        });
    };
    let scope = Scope::new(schema, &tables);
    let condition = Expression::all(terms).to_sql(&scope)?.condition();
    Ok(format!(
        "EXISTS (SELECT 1 FROM {} WHERE {} = {} AND {})",
        join_chain(&tables[anchor + 1..], 0, None),
        qualified(&chain_alias(first), PARENT),
        qualified(&chain_alias(parent), UID),
        condition
    ))
}

/// Resolver over the tables one statement has joined.
pub(crate) struct Scope<'a> {
    schema: &'a dyn Schema,
    aliases: BTreeMap<String, String>,
    /// `LEFT JOIN`s added to reach the first element of nested tables.
    first_elements: Vec<String>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(schema: &'a dyn Schema, tables: &[TableInfo]) -> Self {
        Scope {
            schema,
            aliases: tables
                .iter()
                .map(|t| (t.query_path.clone(), chain_alias(t)))
                .collect(),
            first_elements: Vec::new(),
        }
    }

    /// Make the first element of every table below `base` that `expr` reads visible.
    pub(crate) fn join_first_elements(&mut self, base: &str, expr: &Expression) -> Result<(), CompileError> {
        for qp in tables_read(self.schema, expr) {
            if self.aliases.contains_key(&qp) {
                continue;
            }
            if !startswith_field(&qp, base) {
                return Err(CompileError::SpansNestingLevels {
                    levels: vec![base.to_string(), qp],
                    expr: expr.to_string(),
                });
            }
            let table = get_table(self.schema, &qp)?;
            // outermost missing table first
            for hop in table.nested_path.iter().rev() {
                if self.aliases.contains_key(hop) {
                    continue;
                }
                let hop_table = get_table(self.schema, hop)?;
                let parent_alias = hop_table
                    .parent()
                    .and_then(|p| self.aliases.get(p))
                    .cloned()
                    .ok_or_else(|| CompileError::SpansNestingLevels {
                        levels: vec![base.to_string(), hop.clone()],
                        expr: expr.to_string(),
                    })?;
                let alias = format!("f{}", self.first_elements.len());
                self.first_elements.push(format!(
                    " LEFT JOIN {} {} ON {} = {} AND {} = 0",
                    quote_column(&hop_table.name),
                    alias,
                    qualified(&alias, PARENT),
                    qualified(&parent_alias, UID),
                    qualified(&alias, ORDER)
                ));
                self.aliases.insert(hop.clone(), alias);
            }
        }
        Ok(())
    }

    pub(crate) fn first_element_joins(&self) -> String {
        self.first_elements.concat()
    }
}

impl ColumnResolver for Scope<'_> {
    fn resolve(&self, var: &str) -> Result<Vec<ColumnRef>, CompileError> {
        let leaves = self.schema.leaves(var);
        if leaves.is_empty() && var != "." {
            return Err(CompileError::UnknownVariable {
                var: var.to_string(),
                expr: serde_json::Value::String(var.to_string()).to_string(),
            });
        }
        let mut out = Vec::new();
        for column in leaves.into_iter().filter(|c| c.name == var) {
            let Some(alias) = self.aliases.get(column.query_path()) else {
                let mut levels: Vec<String> = self.aliases.keys().cloned().collect();
                levels.push(column.query_path().to_string());
                return Err(CompileError::SpansNestingLevels {
                    levels,
                    expr: serde_json::Value::String(var.to_string()).to_string(),
                });
            };
            out.push(ColumnRef {
                sql: qualified(alias, &column.es_column),
                json_type: column.json_type,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Snowflake;
    use serde_json::json;

    fn nested() -> Snowflake {
        let snowflake = Snowflake::new("t");
        snowflake
            .insert(&[json!({"a": 1, "b": [{"c": 10, "d": [{"e": 1}]}], "x": [{"y": 2}]})])
            .unwrap();
        snowflake
    }

    #[test]
    fn test_join_chain_from_nested_anchor() {
        let snowflake = nested();
        let tables = chain(&snowflake, "b.d").unwrap();
        assert_eq!(
            join_chain(&tables, 1, Some("b.\"__id__\"")),
            " JOIN \"t.b\" t1 ON t1.\"__id__\" = b.\"__id__\" JOIN \"t\" t0 ON t0.\"__id__\" = t1.\"__parent__\" JOIN \"t.b.d\" t2 ON t2.\"__parent__\" = t1.\"__id__\""
        );
    }

    #[test]
    fn test_level_routing() {
        let snowflake = nested();
        let level = |e: serde_json::Value| level_of(&snowflake, ".", &Expression::from_json(&e).unwrap());
        assert_eq!(level(json!({"eq": {"a": 1}})).unwrap(), ".");
        assert_eq!(level(json!({"gt": ["b.d.e", "a"]})).unwrap(), "b.d");
        assert!(matches!(
            level(json!({"eq": ["b.c", "x.y"]})),
            Err(CompileError::SpansNestingLevels { .. })
        ));
    }

    #[test]
    fn test_tables_read() {
        let snowflake = nested();
        let read = |e: serde_json::Value| tables_read(&snowflake, &Expression::from_json(&e).unwrap());
        assert_eq!(read(json!("b")), vec!["b.d".to_string(), "b".to_string()]);
        assert_eq!(read(json!({"add": ["b.c", "a"]})), vec![".".to_string(), "b".to_string()]);
        assert!(read(json!("nope")).is_empty());
    }

    #[test]
    fn test_unknown_variable() {
        let snowflake = nested();
        let tables = chain(&snowflake, ".").unwrap();
        let scope = Scope::new(&snowflake, &tables);
        assert!(matches!(
            Expression::from_json(&json!({"add": ["nope", 1]})).unwrap().to_sql(&scope),
            Err(CompileError::UnknownVariable { var, .. }) if var == "nope"
        ));
        assert_eq!(
            Expression::from_json(&json!({"missing": "nope"})).unwrap().to_sql(&scope).unwrap().sql,
            "1"
        );
        // an object has leaves but no value of its own
        assert_eq!(Expression::variable("b").to_sql(&scope).unwrap().sql, "NULL");
    }

    #[test]
    fn test_first_element_join() {
        let snowflake = nested();
        let tables = chain(&snowflake, ".").unwrap();
        let mut scope = Scope::new(&snowflake, &tables);
        let expr = Expression::variable("b.c");
        assert!(matches!(
            expr.to_sql(&scope),
            Err(CompileError::SpansNestingLevels { .. })
        ));
        scope.join_first_elements(".", &expr).unwrap();
        assert_eq!(expr.to_sql(&scope).unwrap().sql, "f0.\"c.$number\"");
        assert_eq!(
            scope.first_element_joins(),
            " LEFT JOIN \"t.b\" f0 ON f0.\"__parent__\" = t0.\"__id__\" AND f0.\"__order__\" = 0"
        );
    }
}
