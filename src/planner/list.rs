//! List queries: rows of the queried table, with nested arrays pulled back in.
//!
//! The statement has a `"__base__"` CTE that filters, sorts and limits rows of the queried
//! table, numbering them `"__row__"`. Each nested table the select reaches gets its own
//! `SELECT` joined to `"__base__"`; all of them share one column layout:
//!
//! | column        | holds                                                    |
//! |---------------|----------------------------------------------------------|
//! | `__level__`   | 0 for base rows, else the nested level                   |
//! | `__row__`     | base row number                                          |
//! | `__id__`      | uid of the row in its own table                          |
//! | `__parent__`  | uid of the enclosing row                                 |
//! | `__tK__/__oK__` | level and array position of the chain table K levels down |
//! | `cN`          | select values, `NULL` outside the row's level             |
//!
//! Ordering by `__row__` then every `(__tK__, __oK__)` pair lists each row directly before
//! its nested rows, in array order.

use std::collections::BTreeMap;

use log::debug;

use super::column_mapping::{ColumnMapping, Placement, Pull};
use super::scope::{chain, chain_alias, get_table, join_chain, Scope};
use super::{resolve_select_names, routed_where, row_filter, where_sql, Level, QueryPlan};
use crate::config::CompilerConfig;
use crate::expressions::{CompileError, Expr, Expression};
use crate::query::{Query, SelectColumn, Shape};
use crate::schema::{Column, Schema, ORDER, PARENT, UID};
use crate::utils::field_path::{concat_field, pre_order_key, relative_field, startswith_field};
use crate::utils::sql_quote::{qualified, quote_column, quote_value};

const BASE: &str = "__base__";

/// A select value before it is given its result column.
struct Output {
    name: String,
    /// Table the value is read from; the queried table for base-level values.
    table: String,
    sql: String,
    pull: Pull,
    /// Output path inside the record.
    path: String,
    /// Array boundary of every nested table between the queried one and `table`.
    boundaries: Vec<(String, String)>,
}

pub fn plan_list(
    query: &Query,
    schema: &dyn Schema,
    config: &CompilerConfig,
    nested_path: &str,
) -> Result<QueryPlan, CompileError> {
    let base_chain = chain(schema, nested_path)?;
    let anchor = base_chain.len() - 1;
    let base_table = base_chain[anchor].clone();
    let mut base_scope = Scope::new(schema, &base_chain);

    let routed = routed_where(query, schema, nested_path)?;

    let mut outputs = Vec::new();
    for select in &query.select {
        expand_select(query, select, schema, nested_path, &mut base_scope, &mut outputs)?;
    }

    // every nested table between the queried one and an output table gets a level
    let mut nested_tables: Vec<String> = Vec::new();
    for output in &outputs {
        if output.table == nested_path {
            continue;
        }
        let table = get_table(schema, &output.table)?;
        for qp in &table.nested_path {
            if qp == nested_path {
                break;
            }
            if !nested_tables.contains(qp) {
                nested_tables.push(qp.clone());
            }
        }
    }
    nested_tables.sort_by_key(|qp| pre_order_key(qp));
    let mut levels = vec![Level {
        query_path: nested_path.to_string(),
        depth: 0,
        elements: Vec::new(),
    }];
    for qp in &nested_tables {
        let table = get_table(schema, qp)?;
        levels.push(Level {
            query_path: qp.clone(),
            depth: table.depth() - base_table.depth(),
            elements: Vec::new(),
        });
    }
    let max_depth = levels.iter().map(|l| l.depth).max().unwrap_or(0);
    let data_start = 4 + 2 * max_depth;
    let level_index: BTreeMap<String, usize> = levels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.query_path.clone(), i))
        .collect();

    let mut columns = Vec::with_capacity(outputs.len());
    for (i, output) in outputs.iter().enumerate() {
        let level = level_index.get(&output.table).copied().unwrap_or(0);
        let mut placement = Vec::new();
        let mut current = ".".to_string();
        let mut nested = Vec::new();
        for (qp, boundary) in &output.boundaries {
            let table = get_table(schema, qp)?;
            placement.push(Placement::Field(relative_field(boundary, &current)));
            placement.push(Placement::Element {
                unwrap: table.multi <= 1,
            });
            nested.push(qp.clone());
            current = boundary.clone();
        }
        let sub_path = relative_field(&output.path, &current);
        placement.push(Placement::Field(sub_path.clone()));

        // register the element containers this value needs
        for (k, qp) in nested.iter().enumerate() {
            let prefix = placement[..2 * (k + 1)].to_vec();
            let bare = k + 1 == nested.len() && sub_path == ".";
            if let Some(level) = level_index.get(qp).and_then(|l| levels.get_mut(*l)) {
                match level.elements.iter_mut().find(|(p, _)| *p == prefix) {
                    Some(existing) => existing.1 = existing.1 && bare,
                    None => level.elements.push((prefix, bare)),
                }
            }
        }

        nested.reverse();
        nested.push(nested_path.to_string());
        let mut mapping = ColumnMapping::new(&output.name, data_start + i, &output.sql, output.pull)
            .with_sub_path(sub_path);
        mapping.level = level;
        mapping.placement = placement;
        mapping.nested_path = nested;
        columns.push(mapping);
    }

    // base CTE
    let mut sorts = Vec::new();
    for sort in &query.sort {
        let expr = resolve_select_names(query, &sort.value);
        base_scope.join_first_elements(nested_path, &expr)?;
        let script = expr.to_sql(&base_scope)?;
        sorts.push(format!("{}{}", script.wrapped(), sort.order.sql()));
    }
    sorts.push(qualified(&chain_alias(&base_table), UID));
    // nested terms whose table has no level statement restrict the base rows instead
    let filter = row_filter(schema, nested_path, &routed, &base_scope, |table| {
        levels[1..].iter().any(|l| startswith_field(&l.query_path, table))
    })?;
    let limit = config.effective_limit(query.limit);
    let base_values: Vec<String> = columns
        .iter()
        .filter(|c| c.level == 0)
        .map(|c| format!(", {} AS {}", c.sql, data_column(c.index - data_start)))
        .collect();
    let base_sql = format!(
        "{} AS (SELECT ROW_NUMBER() OVER (ORDER BY {}) AS \"__row__\", {} AS \"__id__\"{} FROM {}{}{} ORDER BY \"__row__\" LIMIT {})",
        quote_column(BASE),
        sorts.join(", "),
        qualified(&chain_alias(&base_table), UID),
        base_values.concat(),
        join_chain(&base_chain, anchor, None),
        base_scope.first_element_joins(),
        filter,
        limit
    );

    let mut selects = Vec::with_capacity(levels.len());
    for (index, level) in levels.iter().enumerate() {
        let mut fields = vec![format!("{} AS \"__level__\"", index), "b.\"__row__\" AS \"__row__\"".to_string()];
        let mut from = format!("{} b", quote_column(BASE));
        let mut filter = String::new();
        if index == 0 {
            fields.push("b.\"__id__\" AS \"__id__\"".to_string());
            fields.push("NULL AS \"__parent__\"".to_string());
            for k in 1..=max_depth {
                fields.push(format!("NULL AS \"__t{}__\"", k));
                fields.push(format!("NULL AS \"__o{}__\"", k));
            }
        } else {
            let tables = chain(schema, &level.query_path)?;
            let own = chain_alias(&tables[tables.len() - 1]);
            fields.push(format!("{} AS \"__id__\"", qualified(&own, UID)));
            fields.push(format!("{} AS \"__parent__\"", qualified(&own, PARENT)));
            for k in 1..=max_depth {
                match tables.get(anchor + k) {
                    Some(table) if k <= level.depth => {
                        let ordinal = level_index.get(&table.query_path).copied().unwrap_or(0);
                        fields.push(format!("{} AS \"__t{}__\"", ordinal, k));
                        fields.push(format!(
                            "{} AS \"__o{}__\"",
                            qualified(&chain_alias(table), ORDER),
                            k
                        ));
                    }
                    _ => {
                        fields.push(format!("NULL AS \"__t{}__\"", k));
                        fields.push(format!("NULL AS \"__o{}__\"", k));
                    }
                }
            }
            from.push_str(&join_chain(&tables, anchor, Some("b.\"__id__\"")));
            let scope = Scope::new(schema, &tables);
            let terms: Vec<Expression> = routed
                .iter()
                .filter(|(l, _)| l != nested_path && startswith_field(&level.query_path, l))
                .map(|(_, t)| t.clone())
                .collect();
            filter = where_sql(&terms, &scope)?;
        }
        for column in &columns {
            let name = data_column(column.index - data_start);
            if column.level != index {
                fields.push(format!("NULL AS {}", name));
            } else if index == 0 {
                fields.push(format!("b.{} AS {}", name, name));
            } else {
                fields.push(format!("{} AS {}", column.sql, name));
            }
        }
        selects.push(format!("SELECT {} FROM {}{}", fields.join(", "), from, filter));
    }

    let mut order = vec!["\"__row__\"".to_string()];
    for k in 1..=max_depth {
        order.push(format!("\"__t{}__\"", k));
        order.push(format!("\"__o{}__\"", k));
    }
    let sql = if selects.len() == 1 {
        format!("WITH {} {} ORDER BY {}", base_sql, selects[0], order.join(", "))
    } else {
        format!(
            "WITH {} SELECT * FROM ({}) ORDER BY {}",
            base_sql,
            selects.join(" UNION ALL "),
            order.join(", ")
        )
    };
    debug!(
        "List plan over `{}`: {} levels, {} value columns",
        nested_path,
        levels.len(),
        columns.len()
    );

    Ok(QueryPlan {
        sql,
        shape: Shape::List,
        format: query.format(),
        select_names: query.select.iter().map(|s| s.name.clone()).collect(),
        select_is_list: query.select_is_list,
        width: data_start + columns.len(),
        columns,
        levels,
        edges: Vec::new(),
    })
}

fn data_column(i: usize) -> String {
    quote_column(&format!("c{}", i))
}

fn expand_select(
    query: &Query,
    select: &SelectColumn,
    schema: &dyn Schema,
    nested_path: &str,
    base_scope: &mut Scope,
    outputs: &mut Vec<Output>,
) -> Result<(), CompileError> {
    let prefix = if query.select_is_list {
        select.name.clone()
    } else {
        ".".to_string()
    };
    let (var, wildcard) = match select.value.node() {
        Expr::Variable(v) => (v.var.clone(), v.var == "."),
        Expr::Leaves(l) => (l.prefix.clone(), true),
        _ => {
            base_scope.join_first_elements(nested_path, &select.value)?;
            let script = select.value.to_sql(&*base_scope)?;
            outputs.push(Output {
                name: select.name.clone(),
                table: nested_path.to_string(),
                sql: with_default(script.sql, select),
                pull: Pull::for_type(script.json_type),
                path: prefix,
                boundaries: Vec::new(),
            });
            return Ok(());
        }
    };

    let reachable = |c: &Column| {
        startswith_field(c.query_path(), nested_path) || startswith_field(nested_path, c.query_path())
    };
    let leaves = schema.leaves(&var);
    if !wildcard {
        if let Some(column) = leaves.iter().find(|c| !reachable(*c)) {
            return Err(CompileError::SpansNestingLevels {
                levels: vec![nested_path.to_string(), column.query_path().to_string()],
                expr: select.value.to_string(),
            });
        }
    }
    let leaves: Vec<Column> = leaves.into_iter().filter(|c| reachable(c)).collect();
    if leaves.is_empty() {
        outputs.push(Output {
            name: select.name.clone(),
            table: nested_path.to_string(),
            sql: with_default("NULL".to_string(), select),
            pull: Pull::Raw,
            path: prefix,
            boundaries: Vec::new(),
        });
        return Ok(());
    }

    let default_named = query.select_is_list && select.name == var;
    let single = leaves.len() == 1;
    for column in leaves {
        let path = concat_field(&prefix, &relative_field(&column.name, &var));
        let table = get_table(schema, column.query_path())?;
        let nested = table.query_path != nested_path && startswith_field(&table.query_path, nested_path);
        let alias = chain_alias(&table);
        let mut sql = qualified(&alias, &column.es_column);
        if single {
            sql = with_default(sql, select);
        }
        let boundaries = if nested {
            let mut chain_below: Vec<&String> = table
                .nested_path
                .iter()
                .take_while(|qp| qp.as_str() != nested_path)
                .collect();
            chain_below.reverse();
            chain_below
                .into_iter()
                .map(|qp| (qp.clone(), boundary(qp, &var, &prefix, default_named)))
                .collect()
        } else {
            Vec::new()
        };
        outputs.push(Output {
            name: select.name.clone(),
            table: if nested {
                table.query_path.clone()
            } else {
                nested_path.to_string()
            },
            sql,
            pull: Pull::for_type(column.json_type),
            path,
            boundaries,
        });
    }
    Ok(())
}

/// Where the array stored at `table` lands in the output record.
fn boundary(table: &str, var: &str, prefix: &str, default_named: bool) -> String {
    if startswith_field(table, var) {
        concat_field(prefix, &relative_field(table, var))
    } else if default_named {
        table.to_string()
    } else {
        prefix.to_string()
    }
}

fn with_default(sql: String, select: &SelectColumn) -> String {
    match &select.default {
        Some(v) if !v.is_null() => format!("COALESCE({}, {})", sql, quote_value(v)),
        _ => sql,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Snowflake;
    use serde_json::json;

    fn scenario() -> Snowflake {
        let snowflake = Snowflake::new("t");
        snowflake
            .insert(&[
                json!({"a": 1, "b": [{"c": 10}, {"c": 20}]}),
                json!({"a": 2, "b": []}),
            ])
            .unwrap();
        snowflake
    }

    fn plan(snowflake: &Snowflake, q: serde_json::Value) -> QueryPlan {
        let query = Query::from_json(&q).unwrap();
        plan_list(&query, snowflake, &CompilerConfig::default(), ".").unwrap()
    }

    #[test]
    fn test_flat_select_single_statement() {
        let snowflake = scenario();
        let plan = plan(&snowflake, json!({"from": "t", "select": "a"}));
        assert_eq!(plan.levels.len(), 1);
        assert_eq!(plan.width, 5);
        assert_eq!(
            plan.sql,
            "WITH \"__base__\" AS (SELECT ROW_NUMBER() OVER (ORDER BY t0.\"__id__\") AS \"__row__\", t0.\"__id__\" AS \"__id__\", t0.\"a.$number\" AS \"c0\" FROM \"t\" t0 ORDER BY \"__row__\" LIMIT 10) \
             SELECT 0 AS \"__level__\", b.\"__row__\" AS \"__row__\", b.\"__id__\" AS \"__id__\", NULL AS \"__parent__\", b.\"c0\" AS \"c0\" FROM \"__base__\" b ORDER BY \"__row__\""
        );
    }

    #[test]
    fn test_nested_select_adds_level() {
        let snowflake = scenario();
        let plan = plan(&snowflake, json!({"from": "t", "select": ["a", "b.c"]}));
        assert_eq!(plan.levels.len(), 2);
        assert_eq!(plan.levels[1].query_path, "b");
        let c = &plan.columns[1];
        assert_eq!(c.level, 1);
        assert_eq!(c.index, 7);
        assert_eq!(c.nested_path, vec!["b".to_string(), ".".to_string()]);
        assert_eq!(
            c.placement,
            vec![
                Placement::Field("b".to_string()),
                Placement::Element { unwrap: false },
                Placement::Field("c".to_string())
            ]
        );
        assert!(plan.sql.contains("UNION ALL SELECT 1 AS \"__level__\""));
        assert!(plan.sql.contains("JOIN \"t.b\" t1 ON t1.\"__parent__\" = t0.\"__id__\""));
        assert!(plan.sql.ends_with("ORDER BY \"__row__\", \"__t1__\", \"__o1__\""));
    }

    #[test]
    fn test_where_routing_and_first_element_sort() {
        let snowflake = scenario();
        let plan = plan(
            &snowflake,
            json!({"from": "t", "select": ["a", "b.c"], "where": {"and": [{"gt": {"a": 0}}, {"gt": {"b.c": 15}}]}, "sort": "b.c", "limit": 3}),
        );
        let base = &plan.sql[..plan.sql.find(") SELECT").unwrap()];
        assert!(base.contains("LEFT JOIN \"t.b\" f0 ON f0.\"__parent__\" = t0.\"__id__\" AND f0.\"__order__\" = 0"));
        assert!(base.contains("ORDER BY (f0.\"c.$number\"), t0.\"__id__\""));
        assert!(base.contains(" WHERE ") && base.contains("(t0.\"a.$number\") > (0)"));
        assert!(base.ends_with("LIMIT 3"));
        assert!(plan.sql.contains("(t1.\"c.$number\") > (15)"));
    }

    #[test]
    fn test_nested_where_without_nested_select() {
        let snowflake = scenario();
        let plan = plan(&snowflake, json!({"from": "t", "select": "a", "where": {"gt": {"b.c": 15}}}));
        assert_eq!(plan.levels.len(), 1);
        let base = &plan.sql[..plan.sql.find(") SELECT").unwrap()];
        assert!(base.contains(
            " WHERE EXISTS (SELECT 1 FROM \"t.b\" t1 WHERE t1.\"__parent__\" = t0.\"__id__\" AND "
        ));
        assert!(base.contains("(t1.\"c.$number\") > (15)"));
    }

    #[test]
    fn test_sibling_branch_rejected() {
        let snowflake = Snowflake::new("t");
        snowflake
            .insert(&[json!({"b": [{"c": 1}, {"c": 2}], "x": [{"y": 1}, {"y": 2}]})])
            .unwrap();
        let query = Query::from_json(&json!({"from": "t.b", "select": "x.y"})).unwrap();
        assert!(matches!(
            plan_list(&query, &snowflake, &CompilerConfig::default(), "b"),
            Err(CompileError::SpansNestingLevels { .. })
        ));
    }
}
