//! Cube queries: every coordinate of the edge domains, including empty ones.
//!
//! Each edge becomes a `"__eK__"("__i__", "__p__")` relation listing its partitions. Rows
//! are bucketed in `"__data__"`, aggregated per bucket in `"__grouped__"`, and the cross
//! join of all edge relations is left joined to the aggregates. Evenly spaced domains
//! are generated from a ten-row digits table instead of being inlined.

use log::debug;
use serde_json::Value;

use super::aggregates::aggregate_columns;
use super::column_mapping::{ColumnMapping, Pull};
use super::groupby::{aggregate_input, aggregate_mapping};
use super::scope::{chain, join_chain, Scope};
use super::{routed_where, row_filter, EdgeLayout, QueryPlan};
use crate::config::CompilerConfig;
use crate::expressions::CompileError;
use crate::query::{Domain, Edge, Query, Shape};
use crate::schema::Schema;
use crate::utils::sql_quote::{quote_column, quote_float, quote_value};

const BUCKET_EPSILON: &str = "1e-9";

pub fn plan_cube(
    query: &Query,
    schema: &dyn Schema,
    config: &CompilerConfig,
    nested_path: &str,
) -> Result<QueryPlan, CompileError> {
    let tables = chain(schema, nested_path)?;
    let scope = Scope::new(schema, &tables);
    let from = join_chain(&tables, tables.len() - 1, None);
    let routed = routed_where(query, schema, nested_path)?;
    let filter = row_filter(schema, nested_path, &routed, &scope, |_| false)?;

    let mut ctes = Vec::new();
    let mut needs_digits = false;
    let mut data_fields = Vec::new();
    let mut columns = Vec::new();
    let mut edges = Vec::new();
    for (k, edge) in query.edges.iter().enumerate() {
        let script = edge.value.to_sql(&scope)?;
        let allow_nulls = edge.allow_nulls.unwrap_or(config.allow_nulls);
        let partitions = edge.domain.partitions(&edge.name, config.max_range_partitions)?;
        let bucket = quote_column(&format!("__b{}__", k));
        let value = script.wrapped();

        let (relation, bucket_sql) = match &partitions {
            Some(parts) if edge.domain.spacing().is_some() => {
                needs_digits = true;
                let (min, interval) = edge.domain.spacing().unwrap_or((0.0, 1.0));
                let n = parts.len();
                let upper = min + n as f64 * interval;
                (
                    spaced_relation(config, min, interval, n, allow_nulls),
                    // the epsilon keeps values on a boundary out of the bucket below it
                    format!(
                        "CASE WHEN {v} >= {min} AND {v} < {max} THEN MIN(CAST(({v} - {min}) / {step} + {eps} AS INTEGER), {last}) ELSE {n} END",
                        v = value,
                        min = quote_float(min),
                        max = quote_float(upper),
                        step = quote_float(interval),
                        eps = BUCKET_EPSILON,
                        last = n.saturating_sub(1),
                        n = n
                    ),
                )
            }
            Some(parts) => {
                let n = parts.len();
                let mut cases: Vec<String> = parts
                    .iter()
                    .enumerate()
                    .map(|(i, p)| format!("WHEN {} = {} THEN {}", value, quote_value(p), i))
                    .collect();
                let bucket_sql = if cases.is_empty() {
                    n.to_string()
                } else {
                    cases.push(format!("ELSE {} END", n));
                    format!("CASE {}", cases.join(" "))
                };
                (set_relation(parts, allow_nulls), bucket_sql)
            }
            None => {
                let distinct = quote_column(&format!("__d{}__", k));
                let limit = match edge.domain {
                    Domain::Default { limit: Some(limit) } => limit,
                    _ => config.default_domain_limit,
                };
                let keep_value = if filter.is_empty() {
                    format!(" WHERE {} IS NOT NULL", value)
                } else {
                    format!(" AND {} IS NOT NULL", value)
                };
                ctes.push(format!(
                    "{} AS (SELECT DISTINCT {} AS \"v\" FROM {}{}{} ORDER BY \"v\"{} LIMIT {})",
                    distinct,
                    value,
                    from,
                    filter,
                    keep_value,
                    edge.sort.sql(),
                    limit
                ));
                let mut relation = format!(
                    "SELECT ROW_NUMBER() OVER (ORDER BY \"v\"{}) - 1, \"v\" FROM {}",
                    edge.sort.sql(),
                    distinct
                );
                if allow_nulls {
                    relation.push_str(&format!(" UNION ALL SELECT COUNT(*), NULL FROM {}", distinct));
                }
                (relation, value.clone())
            }
        };
        ctes.push(format!(
            "{} (\"__i__\", \"__p__\") AS ({})",
            quote_column(&format!("__e{}__", k)),
            relation
        ));
        data_fields.push(format!("{} AS {}", bucket_sql, bucket));
        columns.push(
            ColumnMapping::new(&edge.name, 2 * k, &script.sql, Pull::for_type(script.json_type)).edge(),
        );
        edges.push(EdgeLayout {
            name: edge.name.clone(),
            domain: edge.domain.clone(),
            partitions,
            allow_nulls,
            index_column: 2 * k,
            part_column: 2 * k + 1,
        });
    }

    let mut aggregates = Vec::new();
    for (j, select) in query.select.iter().enumerate() {
        let input = aggregate_input(select, &scope)?;
        let column = quote_column(&format!("v{}", j));
        let input = input.map(|(sql, json_type)| {
            data_fields.push(format!("{} AS {}", sql, column));
            (column.clone(), json_type)
        });
        let input = input.as_ref().map(|(sql, t)| (sql.as_str(), *t));
        for aggregate in aggregate_columns(select.aggregate, input, select.default.as_ref()) {
            let index = 2 * query.edges.len() + aggregates.len();
            aggregates.push(format!("{} AS {}", aggregate.sql, quote_column(&format!("a{}", index))));
            columns.push(aggregate_mapping(&select.name, index, aggregate));
        }
    }

    let buckets: Vec<String> = (0..query.edges.len())
        .map(|k| quote_column(&format!("__b{}__", k)))
        .collect();
    ctes.push(format!(
        "\"__data__\" AS (SELECT {} FROM {}{})",
        data_fields.join(", "),
        from,
        filter
    ));
    ctes.push(format!(
        "\"__grouped__\" AS (SELECT {}, {} FROM \"__data__\" GROUP BY {})",
        buckets.join(", "),
        aggregates.join(", "),
        buckets.join(", ")
    ));
    if needs_digits {
        ctes.insert(0, digits_cte(config));
    }

    let mut fields = Vec::new();
    let mut joins = Vec::new();
    let mut on = Vec::new();
    let mut order = Vec::new();
    for (k, edge) in query.edges.iter().enumerate() {
        let alias = format!("e{}", k);
        fields.push(format!("{}.\"__i__\" AS \"__i{}__\"", alias, k));
        fields.push(format!("{}.\"__p__\" AS \"__p{}__\"", alias, k));
        let relation = format!("{} {}", quote_column(&format!("__e{}__", k)), alias);
        joins.push(if k == 0 {
            relation
        } else {
            format!(" CROSS JOIN {}", relation)
        });
        on.push(bucket_match(edge, &buckets[k], &alias));
        order.push(format!("{}.\"__i__\"", alias));
    }
    for mapping in columns.iter().filter(|c| !c.is_edge) {
        let cell = format!("g.{}", quote_column(&format!("a{}", mapping.index)));
        fields.push(if mapping.empty.is_null() {
            format!("{} AS \"a{}\"", cell, mapping.index)
        } else {
            format!("COALESCE({}, {}) AS \"a{}\"", cell, quote_value(&mapping.empty), mapping.index)
        });
    }
    let sql = format!(
        "WITH {} SELECT {} FROM {} LEFT JOIN \"__grouped__\" g ON {} ORDER BY {}",
        ctes.join(", "),
        fields.join(", "),
        joins.concat(),
        on.join(" AND "),
        order.join(", ")
    );
    debug!("Cube plan with {} edges, {} cells per coordinate", edges.len(), columns.len() - edges.len());

    Ok(QueryPlan {
        sql,
        shape: Shape::Cube,
        format: query.format(),
        select_names: query.select.iter().map(|s| s.name.clone()).collect(),
        select_is_list: query.select_is_list,
        width: columns.len() + edges.len(),
        columns,
        levels: Vec::new(),
        edges,
    })
}

fn bucket_match(edge: &Edge, bucket: &str, alias: &str) -> String {
    if edge.domain.is_declared() {
        format!("g.{} = {}.\"__i__\"", bucket, alias)
    } else {
        format!("g.{} IS {}.\"__p__\"", bucket, alias)
    }
}

fn digits_cte(config: &CompilerConfig) -> String {
    let digits: Vec<String> = (0..10).map(|d| format!("({})", d)).collect();
    format!(
        "{}(\"d\") AS (VALUES {})",
        quote_column(&config.digits_table),
        digits.join(", ")
    )
}

const EMPTY_RELATION: &str = "SELECT NULL, NULL WHERE 0";

fn set_relation(parts: &[Value], allow_nulls: bool) -> String {
    let mut rows: Vec<String> = parts
        .iter()
        .enumerate()
        .map(|(i, p)| format!("({}, {})", i, quote_value(p)))
        .collect();
    if allow_nulls {
        rows.push(format!("({}, NULL)", parts.len()));
    }
    if rows.is_empty() {
        EMPTY_RELATION.to_string()
    } else {
        format!("VALUES {}", rows.join(", "))
    }
}

/// `n` evenly spaced partitions counted out of the digits table.
fn spaced_relation(config: &CompilerConfig, min: f64, interval: f64, n: usize, allow_nulls: bool) -> String {
    let null_row = if allow_nulls {
        format!(" UNION ALL SELECT {}, NULL", n)
    } else {
        String::new()
    };
    if n == 0 {
        return if allow_nulls {
            "SELECT 0, NULL".to_string()
        } else {
            EMPTY_RELATION.to_string()
        };
    }
    let places = n.saturating_sub(1).to_string().len();
    let digits = quote_column(&config.digits_table);
    let terms: Vec<String> = (0..places)
        .map(|p| {
            if p == 0 {
                "d0.\"d\"".to_string()
            } else {
                format!("{} * d{}.\"d\"", 10usize.pow(p as u32), p)
            }
        })
        .collect();
    let from: Vec<String> = (0..places).map(|p| format!("{} d{}", digits, p)).collect();
    format!(
        "SELECT \"i\", {} + \"i\" * {} FROM (SELECT {} AS \"i\" FROM {}) WHERE \"i\" < {}{}",
        quote_float(min),
        quote_float(interval),
        terms.join(" + "),
        from.join(" CROSS JOIN "),
        n,
        null_row
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Snowflake;
    use serde_json::json;

    fn plan(q: serde_json::Value) -> QueryPlan {
        let snowflake = Snowflake::new("t");
        snowflake
            .insert(&[json!({"a": 1}), json!({"a": 1}), json!({"a": 2}), json!({"a": 1})])
            .unwrap();
        let query = Query::from_json(&q).unwrap();
        plan_cube(&query, &snowflake, &CompilerConfig::default(), ".").unwrap()
    }

    #[test]
    fn test_set_domain_cube() {
        let plan = plan(json!({
            "from": "t",
            "edges": [{"value": "a", "domain": {"type": "set", "partitions": [1, 2, 3]}}]
        }));
        assert!(plan.sql.starts_with(
            "WITH \"__e0__\" (\"__i__\", \"__p__\") AS (VALUES (0, 1), (1, 2), (2, 3)), \
             \"__data__\" AS (SELECT CASE WHEN (t0.\"a.$number\") = 1 THEN 0 WHEN (t0.\"a.$number\") = 2 THEN 1 \
             WHEN (t0.\"a.$number\") = 3 THEN 2 ELSE 3 END AS \"__b0__\" FROM \"t\" t0)"
        ));
        assert!(plan.sql.ends_with(
            "SELECT e0.\"__i__\" AS \"__i0__\", e0.\"__p__\" AS \"__p0__\", COALESCE(g.\"a2\", 0) AS \"a2\" \
             FROM \"__e0__\" e0 LEFT JOIN \"__grouped__\" g ON g.\"__b0__\" = e0.\"__i__\" ORDER BY e0.\"__i__\""
        ));
        assert_eq!(plan.edges[0].partitions, Some(vec![json!(1), json!(2), json!(3)]));
        assert_eq!(plan.width, 3);
    }

    #[test]
    fn test_range_domain_uses_digits() {
        let plan = plan(json!({
            "from": "t",
            "edges": [{"value": "a", "allowNulls": true, "domain": {"type": "range", "min": 0, "max": 30, "interval": 2}}]
        }));
        assert!(plan.sql.starts_with("WITH \"__digits__\"(\"d\") AS (VALUES (0), (1)"));
        assert!(plan.sql.contains(
            "SELECT \"i\", 0.0 + \"i\" * 2.0 FROM (SELECT d0.\"d\" + 10 * d1.\"d\" AS \"i\" FROM \"__digits__\" d0 CROSS JOIN \"__digits__\" d1) WHERE \"i\" < 15 UNION ALL SELECT 15, NULL"
        ));
        assert!(plan.sql.contains(
            "THEN MIN(CAST(((t0.\"a.$number\") - 0.0) / 2.0 + 1e-9 AS INTEGER), 14) ELSE 15 END"
        ));
    }

    #[test]
    fn test_default_domain_discovers_values() {
        let plan = plan(json!({"from": "t", "edges": ["a"], "select": {"value": "a", "aggregate": "sum"}}));
        assert!(plan.sql.contains(
            "\"__d0__\" AS (SELECT DISTINCT (t0.\"a.$number\") AS \"v\" FROM \"t\" t0 WHERE (t0.\"a.$number\") IS NOT NULL ORDER BY \"v\" LIMIT 100)"
        ));
        assert!(plan.sql.contains("g.\"__b0__\" IS e0.\"__p__\""));
        assert_eq!(plan.edges[0].partitions, None);
        assert_eq!(plan.columns[1].sql, "SUM((\"v0\"))");
    }
}
